//! Cutover Orchestrations - blue-green and rolling deployment workflows
//!
//! This crate turns a deployment request into an ordered sequence of calls
//! against a [`platform::Platform`]: listing and classifying previous
//! releases, creating the new generation, resizing, swapping routes and
//! rolling any of it back.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cutover_orchestrations::context::TaskContext;
//! use cutover_orchestrations::names::orchestrations;
//! use cutover_orchestrations::platform::CfCliPlatform;
//! use cutover_orchestrations::progress::TracingLogSink;
//! use cutover_orchestrations::registry::create_task_registry;
//! use cutover_orchestrations::TaskRequest;
//!
//! # async fn example(request: TaskRequest) -> anyhow::Result<()> {
//! let registry = create_task_registry();
//! let ctx = TaskContext::new(Arc::new(CfCliPlatform::new("cf")), Arc::new(TracingLogSink));
//!
//! let response = registry
//!     .execute(&ctx, orchestrations::BLUE_GREEN_SETUP, request)
//!     .await?;
//! println!("{:?}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod error;
pub mod manifest;
pub mod names;
pub mod naming;
pub mod platform;
pub mod progress;
pub mod registry;
pub mod resolver;
pub mod steady_state;
pub mod types;

mod activities;
mod orchestrations;

pub use error::TaskError;
pub use types::*;
