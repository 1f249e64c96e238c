//! Shared data model for Cutover
//!
//! Types describing applications on the platform, the connection details
//! threaded through every platform call, and the server's task records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

// ============================================================================
// Applications
// ============================================================================

/// Requested lifecycle state of an application
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestedState {
    Started,
    #[default]
    Stopped,
}

/// One application as reported by a release listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationSummary {
    pub name: String,
    /// Platform-assigned identifier, stable across renames
    pub guid: String,
    pub requested_state: RequestedState,
    pub instance_count: u32,
    pub running_instance_count: u32,
    /// Routes currently mapped to the application
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ApplicationSummary {
    pub fn has_route(&self, route: &str) -> bool {
        self.urls.iter().any(|url| url == route)
    }

    pub fn has_any_route(&self, routes: &[String]) -> bool {
        routes.iter().any(|route| self.has_route(route))
    }
}

/// Full view of one deployed application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationDescriptor {
    pub name: String,
    pub guid: String,
    pub requested_state: RequestedState,
    pub instance_count: u32,
    pub running_instance_count: u32,
    #[serde(default)]
    pub attached_routes: Vec<String>,
    #[serde(default)]
    pub is_autoscaler_enabled: bool,
    /// Name held before the most recent rename, if one happened in this flow
    #[serde(default)]
    pub old_name: Option<String>,
}

impl ApplicationDescriptor {
    pub fn is_steady_at(&self, desired: u32) -> bool {
        self.running_instance_count == desired
    }

    pub fn has_route(&self, route: &str) -> bool {
        self.attached_routes.iter().any(|r| r == route)
    }
}

impl From<ApplicationSummary> for ApplicationDescriptor {
    fn from(summary: ApplicationSummary) -> Self {
        Self {
            name: summary.name,
            guid: summary.guid,
            requested_state: summary.requested_state,
            instance_count: summary.instance_count,
            running_instance_count: summary.running_instance_count,
            attached_routes: summary.urls,
            is_autoscaler_enabled: false,
            old_name: None,
        }
    }
}

/// Setup-time snapshot of an application, carried between pipeline stages
///
/// Later stages re-resolve the application by `application_guid`; the name
/// stored here is only what it was called when the snapshot was taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ApplicationInfo {
    pub application_name: String,
    pub application_guid: String,
    /// Name before Setup renamed it, when it did
    #[serde(default)]
    pub old_name: Option<String>,
    #[serde(default)]
    pub attached_routes: Vec<String>,
    #[serde(default)]
    pub running_count: u32,
    #[serde(default)]
    pub is_autoscaler_enabled: bool,
}

impl From<&ApplicationDescriptor> for ApplicationInfo {
    fn from(app: &ApplicationDescriptor) -> Self {
        Self {
            application_name: app.name.clone(),
            application_guid: app.guid.clone(),
            old_name: app.old_name.clone(),
            attached_routes: app.attached_routes.clone(),
            running_count: app.instance_count,
            is_autoscaler_enabled: app.is_autoscaler_enabled,
        }
    }
}

impl From<&ApplicationSummary> for ApplicationInfo {
    fn from(app: &ApplicationSummary) -> Self {
        Self {
            application_name: app.name.clone(),
            application_guid: app.guid.clone(),
            old_name: None,
            attached_routes: app.urls.clone(),
            running_count: app.instance_count,
            is_autoscaler_enabled: false,
        }
    }
}

/// Instance-count change applied to one application by a resize
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceData {
    pub name: String,
    pub guid: String,
    pub previous_count: u32,
    pub desired_count: u32,
    /// The resize disabled this application's autoscaler and left it disabled
    #[serde(default)]
    pub disable_autoscaler_performed: bool,
}

// ============================================================================
// Strategies
// ============================================================================

/// Order in which the two applications of a resize are changed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResizeStrategy {
    #[default]
    UpscaleNewFirst,
    DownscaleOldFirst,
}

/// How generations of one service are named
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NamingStrategy {
    /// Every generation is `<prefix>__<n>`
    Versioned,
    /// Fixed slots: `<prefix>` is active, `<prefix>__INACTIVE` is the previous version
    #[default]
    NonVersioned,
}

// ============================================================================
// Platform connection
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CliVersion {
    V6,
    #[default]
    V7,
}

/// Already-decrypted platform credentials
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Target platform for one request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InfraConfig {
    pub endpoint_url: String,
    pub organization: String,
    pub space: String,
    pub credentials: Credentials,
    #[serde(default)]
    pub cli_version: CliVersion,
    #[serde(default)]
    pub skip_ssl_validation: bool,
}

/// Connection details threaded through every platform call of one invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestConfig {
    pub endpoint_url: String,
    pub organization: String,
    pub space: String,
    pub credentials: Credentials,
    pub cli_version: CliVersion,
    pub skip_ssl_validation: bool,
    pub timeout_in_mins: u32,
    /// Scratch directory owned by the invocation (manifests, CLI home)
    pub working_directory: PathBuf,
}

impl RequestConfig {
    pub fn new(infra: &InfraConfig, timeout_in_mins: u32, working_directory: PathBuf) -> Self {
        Self {
            endpoint_url: infra.endpoint_url.clone(),
            organization: infra.organization.clone(),
            space: infra.space.clone(),
            credentials: infra.credentials.clone(),
            cli_version: infra.cli_version,
            skip_ssl_validation: infra.skip_ssl_validation,
            timeout_in_mins,
            working_directory,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameRequest {
    /// Identity of the application being renamed
    pub guid: String,
    pub name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoscalerRequest {
    pub application_name: String,
    pub application_guid: String,
    /// State the caller expects to find before changing it
    pub expected_enabled: bool,
    pub timeout_in_mins: u32,
}

/// Deployable content for a new application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactReference {
    /// Local package file or directory
    Package { path: PathBuf },
    /// Container image reference
    Image { image: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateApplicationRequest {
    pub application_name: String,
    /// Rendered manifest text
    pub manifest: String,
    /// Where the rendered manifest was written
    pub manifest_path: PathBuf,
    pub artifact: ArtifactReference,
    /// Update an existing application in place with the rolling strategy
    #[serde(default)]
    pub rolling: bool,
}

// ============================================================================
// Execution status
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandExecutionStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandUnitStatus {
    Running,
    Success,
    Failure,
}

// ============================================================================
// Server task records
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// Listing view of a submitted task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSummary {
    pub id: Uuid,
    pub orchestration: String,
    pub release_name_prefix: String,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
