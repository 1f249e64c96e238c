//! Request and output types for the deployment orchestrations

use cutover_models::{
    ApplicationInfo, ArtifactReference, CommandExecutionStatus, InfraConfig, InstanceData,
    NamingStrategy, ResizeStrategy,
};
use serde::{Deserialize, Serialize};

use crate::error::TaskError;

fn default_timeout_in_min() -> u32 {
    10
}

fn default_versions_to_keep() -> u32 {
    3
}

// ============================================================================
// Setup
// ============================================================================

/// Input for the basic and blue-green setup orchestrations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetupRequest {
    pub infra: InfraConfig,
    /// Logical service name shared by every generation
    pub release_name_prefix: String,
    /// Rendered manifest text
    pub manifest: String,
    pub artifact: ArtifactReference,
    /// Production routes
    #[serde(default)]
    pub routes: Vec<String>,
    /// Routes the new application carries until the swap (blue-green only)
    #[serde(default)]
    pub temp_routes: Vec<String>,
    /// Older releases kept before deletion
    #[serde(default = "default_versions_to_keep")]
    pub older_active_version_count_to_keep: u32,
    #[serde(default)]
    pub use_app_autoscaler: bool,
    #[serde(default)]
    pub naming_strategy: NamingStrategy,
    #[serde(default = "default_timeout_in_min")]
    pub timeout_interval_in_min: u32,
}

/// One rename performed during an orchestration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameRecord {
    pub guid: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetupOutput {
    pub new_application: ApplicationInfo,
    /// Application serving production when setup ran
    pub active_application: Option<ApplicationInfo>,
    /// Rollback target after setup's renames
    pub inactive_application: Option<ApplicationInfo>,
    pub renames: Vec<RenameRecord>,
    pub deleted_releases: Vec<String>,
    /// Revision number the release set yielded for this run
    pub revision: u32,
    pub total_previous_instance_count: u32,
    pub naming_strategy: NamingStrategy,
}

// ============================================================================
// Resize
// ============================================================================

/// Input for the resize orchestration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResizeRequest {
    pub infra: InfraConfig,
    pub release_name_prefix: String,
    pub new_application: ApplicationInfo,
    /// Application giving up capacity
    #[serde(default)]
    pub old_application: Option<ApplicationInfo>,
    pub upsize_count: u32,
    #[serde(default)]
    pub downsize_count: u32,
    #[serde(default)]
    pub resize_strategy: ResizeStrategy,
    #[serde(default)]
    pub use_app_autoscaler: bool,
    /// Routes mapped onto the new application when it first comes up
    #[serde(default)]
    pub routes: Vec<String>,
    #[serde(default)]
    pub blue_green: bool,
    #[serde(default = "default_timeout_in_min")]
    pub timeout_interval_in_min: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResizeOutput {
    pub instance_data: Vec<InstanceData>,
    pub new_application: ApplicationInfo,
    pub old_application: Option<ApplicationInfo>,
}

// ============================================================================
// Route swap
// ============================================================================

/// Input for the route swap orchestration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwapRoutesRequest {
    pub infra: InfraConfig,
    pub release_name_prefix: String,
    /// Application serving production before the swap
    #[serde(default)]
    pub active_application: Option<ApplicationInfo>,
    #[serde(default)]
    pub inactive_application: Option<ApplicationInfo>,
    pub new_application: ApplicationInfo,
    pub final_routes: Vec<String>,
    #[serde(default)]
    pub temp_routes: Vec<String>,
    #[serde(default)]
    pub downsize_old_application: bool,
    /// Instance count the outgoing application is reduced to
    #[serde(default)]
    pub idle_instance_count: u32,
    #[serde(default)]
    pub use_app_autoscaler: bool,
    #[serde(default)]
    pub naming_strategy: NamingStrategy,
    #[serde(default = "default_timeout_in_min")]
    pub timeout_interval_in_min: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwapRoutesOutput {
    /// The former new application, now serving production
    pub active_application: ApplicationInfo,
    /// The former active application
    pub inactive_application: Option<ApplicationInfo>,
    pub renames: Vec<RenameRecord>,
    pub downsized: bool,
}

// ============================================================================
// Rollback
// ============================================================================

/// Input for the resize rollback orchestration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResizeRollbackRequest {
    pub infra: InfraConfig,
    pub release_name_prefix: String,
    pub new_application: ApplicationInfo,
    #[serde(default)]
    pub active_application: Option<ApplicationInfo>,
    #[serde(default)]
    pub inactive_application: Option<ApplicationInfo>,
    /// Instance data reported by the forward resize
    pub instance_data: Vec<InstanceData>,
    #[serde(default)]
    pub resize_strategy: ResizeStrategy,
    #[serde(default)]
    pub use_app_autoscaler: bool,
    /// Production routes restored onto applications that come back up
    #[serde(default)]
    pub routes: Vec<String>,
    /// Delete the new application once it is at zero instances
    #[serde(default)]
    pub delete_new_application: bool,
    #[serde(default = "default_timeout_in_min")]
    pub timeout_interval_in_min: u32,
}

/// Input for the swap rollback orchestration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwapRollbackRequest {
    pub infra: InfraConfig,
    pub release_name_prefix: String,
    /// Application that served production before the deployment
    #[serde(default)]
    pub active_application: Option<ApplicationInfo>,
    /// Rollback target that existed before the deployment
    #[serde(default)]
    pub inactive_application: Option<ApplicationInfo>,
    pub new_application: ApplicationInfo,
    pub final_routes: Vec<String>,
    #[serde(default)]
    pub temp_routes: Vec<String>,
    #[serde(default)]
    pub instance_data: Vec<InstanceData>,
    pub swap_route_occurred: bool,
    #[serde(default = "default_true")]
    pub upsize_inactive_app: bool,
    #[serde(default)]
    pub use_app_autoscaler: bool,
    #[serde(default)]
    pub naming_strategy: NamingStrategy,
    #[serde(default = "default_timeout_in_min")]
    pub timeout_interval_in_min: u32,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollbackOutput {
    /// Application serving production after the rollback
    pub restored_application: Option<ApplicationInfo>,
    pub instance_data: Vec<InstanceData>,
    pub renames: Vec<RenameRecord>,
    pub deleted_application: Option<String>,
}

// ============================================================================
// Rolling update
// ============================================================================

/// Manifest and artifact of a release, enough to push it again
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseConfiguration {
    pub manifest: String,
    pub artifact: ArtifactReference,
}

/// Input for the rolling deploy orchestration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollingDeployRequest {
    pub infra: InfraConfig,
    pub application_name: String,
    pub manifest: String,
    pub artifact: ArtifactReference,
    #[serde(default)]
    pub routes: Vec<String>,
    /// Falls back to the manifest's `instances`, then 1
    #[serde(default)]
    pub desired_instance_count: Option<u32>,
    #[serde(default)]
    pub use_app_autoscaler: bool,
    #[serde(default = "default_timeout_in_min")]
    pub timeout_interval_in_min: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollingDeployOutput {
    pub application: ApplicationInfo,
    /// State before the update; `None` on a first deployment
    pub prior_application: Option<ApplicationInfo>,
    pub first_deployment: bool,
}

/// Input for the rolling rollback orchestration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollingRollbackRequest {
    pub infra: InfraConfig,
    pub application_name: String,
    /// State captured by the rolling deploy; `None` deletes the application
    #[serde(default)]
    pub prior_application: Option<ApplicationInfo>,
    /// Release to push again before restoring counts
    #[serde(default)]
    pub previous_release: Option<ReleaseConfiguration>,
    #[serde(default)]
    pub use_app_autoscaler: bool,
    #[serde(default = "default_timeout_in_min")]
    pub timeout_interval_in_min: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollingRollbackOutput {
    pub application: Option<ApplicationInfo>,
    pub deleted: bool,
}

// ============================================================================
// Dispatch
// ============================================================================

/// Every request an orchestration accepts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskRequest {
    BasicSetup(SetupRequest),
    BlueGreenSetup(SetupRequest),
    Resize(ResizeRequest),
    Rollback(ResizeRollbackRequest),
    SwapRoutes(SwapRoutesRequest),
    SwapRollback(SwapRollbackRequest),
    RollingDeploy(RollingDeployRequest),
    RollingRollback(RollingRollbackRequest),
}

impl TaskRequest {
    pub fn variant_name(&self) -> &'static str {
        match self {
            TaskRequest::BasicSetup(_) => "basic_setup",
            TaskRequest::BlueGreenSetup(_) => "blue_green_setup",
            TaskRequest::Resize(_) => "resize",
            TaskRequest::Rollback(_) => "rollback",
            TaskRequest::SwapRoutes(_) => "swap_routes",
            TaskRequest::SwapRollback(_) => "swap_rollback",
            TaskRequest::RollingDeploy(_) => "rolling_deploy",
            TaskRequest::RollingRollback(_) => "rolling_rollback",
        }
    }

    /// Prefix (or application name) the request operates on
    pub fn release_name_prefix(&self) -> &str {
        match self {
            TaskRequest::BasicSetup(r) | TaskRequest::BlueGreenSetup(r) => &r.release_name_prefix,
            TaskRequest::Resize(r) => &r.release_name_prefix,
            TaskRequest::Rollback(r) => &r.release_name_prefix,
            TaskRequest::SwapRoutes(r) => &r.release_name_prefix,
            TaskRequest::SwapRollback(r) => &r.release_name_prefix,
            TaskRequest::RollingDeploy(r) => &r.application_name,
            TaskRequest::RollingRollback(r) => &r.application_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskOutput {
    Setup(SetupOutput),
    Resize(ResizeOutput),
    SwapRoutes(SwapRoutesOutput),
    Rollback(RollbackOutput),
    RollingDeploy(RollingDeployOutput),
    RollingRollback(RollingRollbackOutput),
}

/// Structured result of one orchestration run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResponse {
    pub status: CommandExecutionStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Failures hit while undoing a partial forward operation
    #[serde(default)]
    pub revert_errors: Vec<String>,
    #[serde(default)]
    pub output: Option<TaskOutput>,
}

impl TaskResponse {
    pub fn success(output: TaskOutput) -> Self {
        Self {
            status: CommandExecutionStatus::Success,
            error_message: None,
            revert_errors: Vec::new(),
            output: Some(output),
        }
    }

    pub fn failure(error: &TaskError) -> Self {
        let (primary, revert_errors) = match error {
            TaskError::Reverted {
                source,
                revert_errors,
            } => (source.to_string(), revert_errors.clone()),
            other => (other.to_string(), Vec::new()),
        };
        Self {
            status: CommandExecutionStatus::Failure,
            error_message: Some(primary),
            revert_errors,
            output: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandExecutionStatus::Success
    }
}
