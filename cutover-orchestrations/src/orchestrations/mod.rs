//! Orchestration handlers, one per request variant

pub mod resize;
pub mod rollback;
pub mod rolling;
pub mod setup;
pub mod swap_rollback;
pub mod swap_routes;

use crate::error::TaskError;
use crate::types::TaskRequest;

/// Error for a request variant the orchestration does not own
pub(crate) fn mismatch(orchestration: &str, request: &TaskRequest) -> TaskError {
    TaskError::InvalidArguments(format!(
        "{} cannot run a {} request",
        orchestration,
        request.variant_name()
    ))
}

pub(crate) fn require(value: &str, field: &str) -> Result<(), TaskError> {
    if value.trim().is_empty() {
        return Err(TaskError::InvalidArguments(format!("{} is required", field)));
    }
    Ok(())
}
