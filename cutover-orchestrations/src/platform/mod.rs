//! Platform facade
//!
//! The only interface the orchestrations depend on. Every call receives the
//! invocation's [`RequestConfig`] so implementations can authenticate and
//! target the right space.

use async_trait::async_trait;
use cutover_models::{
    ApplicationDescriptor, ApplicationSummary, AutoscalerRequest, CreateApplicationRequest,
    RenameRequest, RequestConfig,
};

pub mod cf_cli;
pub mod memory;

pub use cf_cli::CfCliPlatform;
pub use memory::{InMemoryPlatform, PlatformCall, PlatformOperation};

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Application '{0}' not found")]
    NotFound(String),

    #[error("Platform command failed: {0}")]
    CommandFailed(String),

    #[error("Unexpected platform response: {0}")]
    InvalidResponse(String),

    #[error("Platform rejected the request: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

#[async_trait]
pub trait Platform: Send + Sync {
    /// Applications whose names start with `prefix`, oldest first.
    async fn list_previous_releases(
        &self,
        config: &RequestConfig,
        prefix: &str,
    ) -> PlatformResult<Vec<ApplicationSummary>>;

    async fn get_application_by_name(
        &self,
        config: &RequestConfig,
        name: &str,
    ) -> PlatformResult<ApplicationDescriptor>;

    async fn create_application(
        &self,
        config: &RequestConfig,
        request: &CreateApplicationRequest,
    ) -> PlatformResult<ApplicationDescriptor>;

    async fn resize_application(
        &self,
        config: &RequestConfig,
        name: &str,
        desired_count: u32,
    ) -> PlatformResult<ApplicationDescriptor>;

    async fn delete_application(&self, config: &RequestConfig, name: &str) -> PlatformResult<()>;

    async fn rename_application(
        &self,
        config: &RequestConfig,
        request: &RenameRequest,
    ) -> PlatformResult<()>;

    async fn map_routes(
        &self,
        config: &RequestConfig,
        name: &str,
        routes: &[String],
    ) -> PlatformResult<()>;

    async fn unmap_routes(
        &self,
        config: &RequestConfig,
        name: &str,
        routes: &[String],
    ) -> PlatformResult<()>;

    async fn check_autoscaler_enabled(
        &self,
        config: &RequestConfig,
        request: &AutoscalerRequest,
    ) -> PlatformResult<bool>;

    /// Returns whether the binding changed.
    async fn enable_autoscaler(
        &self,
        config: &RequestConfig,
        request: &AutoscalerRequest,
    ) -> PlatformResult<bool>;

    /// Returns whether the binding changed.
    async fn disable_autoscaler(
        &self,
        config: &RequestConfig,
        request: &AutoscalerRequest,
    ) -> PlatformResult<bool>;
}
