//! Registry of Cutover orchestrations
//!
//! Requests are dispatched by orchestration name to a [`TaskHandler`]. Each
//! handler owns exactly one [`TaskRequest`] variant.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::TaskContext;
use crate::error::TaskError;
use crate::names::orchestrations;
use crate::orchestrations::{
    resize::Resize,
    rollback::ResizeRollback,
    rolling::{RollingDeploy, RollingRollback},
    setup::{BasicSetup, BlueGreenSetup},
    swap_rollback::SwapRollback,
    swap_routes::SwapRoutes,
};
use crate::types::{TaskOutput, TaskRequest, TaskResponse};

#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the orchestration. A request variant the handler does not own is
    /// rejected with [`TaskError::InvalidArguments`] before any platform call.
    async fn execute(&self, ctx: &TaskContext, request: TaskRequest) -> Result<TaskOutput, TaskError>;
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    handlers: HashMap<&'static str, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    pub fn builder() -> TaskRegistryBuilder {
        TaskRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Registered orchestration names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Run `request` through the orchestration registered as `name`.
    ///
    /// Returns `Err` only for caller errors (unknown orchestration, wrong
    /// request variant, missing fields). Every other failure is reported as a
    /// FAILURE [`TaskResponse`].
    pub async fn execute(
        &self,
        ctx: &TaskContext,
        name: &str,
        request: TaskRequest,
    ) -> Result<TaskResponse, TaskError> {
        let handler = self
            .get(name)
            .ok_or_else(|| TaskError::UnknownOrchestration(name.to_string()))?;

        tracing::info!(
            orchestration = name,
            prefix = request.release_name_prefix(),
            "Starting orchestration"
        );
        match handler.execute(ctx, request).await {
            Ok(output) => {
                tracing::info!(orchestration = name, "Orchestration succeeded");
                Ok(TaskResponse::success(output))
            }
            Err(e) if e.is_invalid_arguments() => Err(e),
            Err(e) => {
                tracing::error!(orchestration = name, "Orchestration failed: {}", e);
                Ok(TaskResponse::failure(&e))
            }
        }
    }
}

#[derive(Default)]
pub struct TaskRegistryBuilder {
    handlers: HashMap<&'static str, Arc<dyn TaskHandler>>,
}

impl TaskRegistryBuilder {
    pub fn register(mut self, handler: impl TaskHandler + 'static) -> Self {
        self.handlers.insert(handler.name(), Arc::new(handler));
        self
    }

    pub fn build(self) -> TaskRegistry {
        TaskRegistry {
            handlers: self.handlers,
        }
    }
}

/// Create a TaskRegistry with all Cutover orchestrations
///
/// # Example
///
/// ```rust,no_run
/// use cutover_orchestrations::registry::create_task_registry;
///
/// let registry = create_task_registry();
/// ```
pub fn create_task_registry() -> TaskRegistry {
    TaskRegistry::builder()
        .register(BasicSetup)
        .register(BlueGreenSetup)
        .register(Resize)
        .register(ResizeRollback)
        .register(SwapRoutes)
        .register(SwapRollback)
        .register(RollingDeploy)
        .register(RollingRollback)
        .build()
}
