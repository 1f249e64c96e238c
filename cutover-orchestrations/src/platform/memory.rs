//! Simulated platform space
//!
//! Holds applications, routes and autoscaler bindings in memory and records
//! every call made against it. Tests seed it and assert on the call log; the
//! server's `memory` mode uses it for dry runs.

use async_trait::async_trait;
use cutover_models::{
    ApplicationDescriptor, ApplicationSummary, AutoscalerRequest, CreateApplicationRequest,
    RenameRequest, RequestConfig, RequestedState,
};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{Platform, PlatformError, PlatformResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlatformOperation {
    ListReleases,
    Get,
    Create,
    Resize,
    Delete,
    Rename,
    MapRoutes,
    UnmapRoutes,
    CheckAutoscaler,
    EnableAutoscaler,
    DisableAutoscaler,
}

impl PlatformOperation {
    /// Operations that change the space
    pub fn is_mutation(self) -> bool {
        !matches!(
            self,
            PlatformOperation::ListReleases
                | PlatformOperation::Get
                | PlatformOperation::CheckAutoscaler
        )
    }
}

/// One recorded call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformCall {
    pub operation: PlatformOperation,
    /// Application name (or prefix for listings) the call targeted
    pub target: String,
    /// Guid of the targeted application at call time, when it existed
    pub guid: Option<String>,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Convergence {
    Immediate,
    AfterPolls(u32),
    Never,
}

#[derive(Debug, Clone)]
struct SimulatedApp {
    guid: String,
    name: String,
    instance_count: u32,
    running_instance_count: u32,
    requested_state: RequestedState,
    routes: Vec<String>,
    /// `None` when no autoscaler is bound
    autoscaler: Option<bool>,
    convergence: Convergence,
    pending_polls: u32,
    created: u64,
}

impl SimulatedApp {
    fn descriptor(&self) -> ApplicationDescriptor {
        ApplicationDescriptor {
            name: self.name.clone(),
            guid: self.guid.clone(),
            requested_state: self.requested_state,
            instance_count: self.instance_count,
            running_instance_count: self.running_instance_count,
            attached_routes: self.routes.clone(),
            is_autoscaler_enabled: self.autoscaler.unwrap_or(false),
            old_name: None,
        }
    }

    fn summary(&self) -> ApplicationSummary {
        ApplicationSummary {
            name: self.name.clone(),
            guid: self.guid.clone(),
            requested_state: self.requested_state,
            instance_count: self.instance_count,
            running_instance_count: self.running_instance_count,
            urls: self.routes.clone(),
            created_at: None,
        }
    }

    fn scale_to(&mut self, desired: u32) {
        self.instance_count = desired;
        self.requested_state = if desired > 0 {
            RequestedState::Started
        } else {
            RequestedState::Stopped
        };
        match self.convergence {
            Convergence::Immediate => self.running_instance_count = desired,
            Convergence::AfterPolls(polls) => {
                if polls == 0 {
                    self.running_instance_count = desired;
                } else {
                    self.pending_polls = polls;
                }
            }
            Convergence::Never => {}
        }
    }

    fn observe(&mut self) {
        if self.pending_polls > 0 {
            self.pending_polls -= 1;
            if self.pending_polls == 0 {
                self.running_instance_count = self.instance_count;
            }
        }
    }
}

#[derive(Debug, Clone)]
struct FailureRule {
    operation: PlatformOperation,
    target: Option<String>,
    /// Apply the effect before failing (a create that half-succeeded)
    apply_effect: bool,
}

#[derive(Debug, Default)]
struct SpaceState {
    apps: Vec<SimulatedApp>,
    calls: Vec<PlatformCall>,
    failures: Vec<FailureRule>,
    sequence: u64,
}

impl SpaceState {
    fn position(&self, name: &str) -> Option<usize> {
        self.apps.iter().position(|app| app.name == name)
    }

    fn app_mut(&mut self, name: &str) -> PlatformResult<&mut SimulatedApp> {
        self.apps
            .iter_mut()
            .find(|app| app.name == name)
            .ok_or_else(|| PlatformError::NotFound(name.to_string()))
    }

    fn record(&mut self, operation: PlatformOperation, target: &str, detail: String) {
        let guid = self
            .apps
            .iter()
            .find(|app| app.name == target)
            .map(|app| app.guid.clone());
        self.calls.push(PlatformCall {
            operation,
            target: target.to_string(),
            guid,
            detail,
        });
    }

    fn failure(&self, operation: PlatformOperation, target: &str) -> Option<FailureRule> {
        self.failures
            .iter()
            .find(|rule| {
                rule.operation == operation
                    && rule.target.as_deref().map_or(true, |t| t == target)
            })
            .cloned()
    }
}

fn injected(operation: PlatformOperation, target: &str) -> PlatformError {
    PlatformError::CommandFailed(format!("injected {:?} failure for '{}'", operation, target))
}

/// In-memory [`Platform`] implementation
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: Mutex<SpaceState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SpaceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a running application; returns its guid.
    pub fn add_application(&self, name: &str, instances: u32, routes: &[&str]) -> String {
        let mut state = self.lock();
        state.sequence += 1;
        let guid = Uuid::new_v4().to_string();
        let created = state.sequence;
        state.apps.push(SimulatedApp {
            guid: guid.clone(),
            name: name.to_string(),
            instance_count: instances,
            running_instance_count: instances,
            requested_state: if instances > 0 {
                RequestedState::Started
            } else {
                RequestedState::Stopped
            },
            routes: routes.iter().map(|r| r.to_string()).collect(),
            autoscaler: None,
            convergence: Convergence::Immediate,
            pending_polls: 0,
            created,
        });
        guid
    }

    /// Bind an autoscaler to `name` in the given state.
    pub fn bind_autoscaler(&self, name: &str, enabled: bool) {
        if let Some(app) = self.lock().apps.iter_mut().find(|app| app.name == name) {
            app.autoscaler = Some(enabled);
        }
    }

    /// Running count of `name` catches up only after `polls` reads.
    pub fn converge_after_polls(&self, name: &str, polls: u32) {
        if let Some(app) = self.lock().apps.iter_mut().find(|app| app.name == name) {
            app.convergence = Convergence::AfterPolls(polls);
        }
    }

    /// Running count of `name` never follows a resize.
    pub fn never_converge(&self, name: &str) {
        if let Some(app) = self.lock().apps.iter_mut().find(|app| app.name == name) {
            app.convergence = Convergence::Never;
        }
    }

    /// Fail every `operation` against `target` (any target when `None`).
    pub fn fail_on(&self, operation: PlatformOperation, target: Option<&str>) {
        self.lock().failures.push(FailureRule {
            operation,
            target: target.map(str::to_string),
            apply_effect: false,
        });
    }

    /// Fail `operation` against `target` after applying its effect.
    pub fn fail_after_effect(&self, operation: PlatformOperation, target: &str) {
        self.lock().failures.push(FailureRule {
            operation,
            target: Some(target.to_string()),
            apply_effect: true,
        });
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, operation: PlatformOperation) -> Vec<PlatformCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }

    pub fn mutation_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation.is_mutation())
            .count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn application(&self, name: &str) -> Option<ApplicationDescriptor> {
        self.lock()
            .apps
            .iter()
            .find(|app| app.name == name)
            .map(SimulatedApp::descriptor)
    }

    pub fn application_by_guid(&self, guid: &str) -> Option<ApplicationDescriptor> {
        self.lock()
            .apps
            .iter()
            .find(|app| app.guid == guid)
            .map(SimulatedApp::descriptor)
    }

    /// Names in creation order
    pub fn application_names(&self) -> Vec<String> {
        let state = self.lock();
        let mut apps: Vec<&SimulatedApp> = state.apps.iter().collect();
        apps.sort_by_key(|app| app.created);
        apps.into_iter().map(|app| app.name.clone()).collect()
    }

    pub fn guid_of(&self, name: &str) -> Option<String> {
        self.application(name).map(|app| app.guid)
    }

    pub fn autoscaler_state(&self, name: &str) -> Option<bool> {
        self.lock()
            .apps
            .iter()
            .find(|app| app.name == name)
            .and_then(|app| app.autoscaler)
    }
}

fn manifest_instances(manifest: &str) -> u32 {
    serde_yaml::from_str::<serde_yaml::Value>(manifest)
        .ok()
        .and_then(|doc| {
            doc.get("applications")?
                .get(0)?
                .get("instances")?
                .as_u64()
        })
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(1)
}

#[async_trait]
impl Platform for InMemoryPlatform {
    async fn list_previous_releases(
        &self,
        _config: &RequestConfig,
        prefix: &str,
    ) -> PlatformResult<Vec<ApplicationSummary>> {
        let mut state = self.lock();
        state.record(PlatformOperation::ListReleases, prefix, String::new());
        if state.failure(PlatformOperation::ListReleases, prefix).is_some() {
            return Err(injected(PlatformOperation::ListReleases, prefix));
        }

        let mut apps: Vec<&SimulatedApp> = state
            .apps
            .iter()
            .filter(|app| app.name.starts_with(prefix))
            .collect();
        apps.sort_by_key(|app| app.created);
        Ok(apps.into_iter().map(SimulatedApp::summary).collect())
    }

    async fn get_application_by_name(
        &self,
        _config: &RequestConfig,
        name: &str,
    ) -> PlatformResult<ApplicationDescriptor> {
        let mut state = self.lock();
        state.record(PlatformOperation::Get, name, String::new());
        if state.failure(PlatformOperation::Get, name).is_some() {
            return Err(injected(PlatformOperation::Get, name));
        }

        let app = state.app_mut(name)?;
        app.observe();
        Ok(app.descriptor())
    }

    async fn create_application(
        &self,
        _config: &RequestConfig,
        request: &CreateApplicationRequest,
    ) -> PlatformResult<ApplicationDescriptor> {
        let mut state = self.lock();
        let name = request.application_name.as_str();
        state.record(
            PlatformOperation::Create,
            name,
            format!("rolling={}", request.rolling),
        );

        let failure = state.failure(PlatformOperation::Create, name);
        if matches!(&failure, Some(rule) if !rule.apply_effect) {
            return Err(injected(PlatformOperation::Create, name));
        }

        let instances = manifest_instances(&request.manifest);
        let descriptor = match state.position(name) {
            Some(index) if request.rolling => {
                let app = &mut state.apps[index];
                app.scale_to(instances);
                app.descriptor()
            }
            Some(_) => {
                return Err(PlatformError::Rejected(format!(
                    "application '{}' already exists",
                    name
                )))
            }
            None => {
                state.sequence += 1;
                let created = state.sequence;
                let mut app = SimulatedApp {
                    guid: Uuid::new_v4().to_string(),
                    name: name.to_string(),
                    instance_count: 0,
                    running_instance_count: 0,
                    requested_state: RequestedState::Stopped,
                    routes: Vec::new(),
                    autoscaler: None,
                    convergence: Convergence::Immediate,
                    pending_polls: 0,
                    created,
                };
                app.scale_to(instances);
                let descriptor = app.descriptor();
                state.apps.push(app);
                descriptor
            }
        };

        if failure.is_some() {
            return Err(injected(PlatformOperation::Create, name));
        }
        Ok(descriptor)
    }

    async fn resize_application(
        &self,
        _config: &RequestConfig,
        name: &str,
        desired_count: u32,
    ) -> PlatformResult<ApplicationDescriptor> {
        let mut state = self.lock();
        state.record(PlatformOperation::Resize, name, desired_count.to_string());
        if state.failure(PlatformOperation::Resize, name).is_some() {
            return Err(injected(PlatformOperation::Resize, name));
        }

        let app = state.app_mut(name)?;
        app.scale_to(desired_count);
        Ok(app.descriptor())
    }

    async fn delete_application(&self, _config: &RequestConfig, name: &str) -> PlatformResult<()> {
        let mut state = self.lock();
        state.record(PlatformOperation::Delete, name, String::new());
        if state.failure(PlatformOperation::Delete, name).is_some() {
            return Err(injected(PlatformOperation::Delete, name));
        }

        let index = state
            .position(name)
            .ok_or_else(|| PlatformError::NotFound(name.to_string()))?;
        state.apps.remove(index);
        Ok(())
    }

    async fn rename_application(
        &self,
        _config: &RequestConfig,
        request: &RenameRequest,
    ) -> PlatformResult<()> {
        let mut state = self.lock();
        state.record(
            PlatformOperation::Rename,
            &request.name,
            request.new_name.clone(),
        );
        if state.failure(PlatformOperation::Rename, &request.name).is_some() {
            return Err(injected(PlatformOperation::Rename, &request.name));
        }
        if state.position(&request.new_name).is_some() {
            return Err(PlatformError::Rejected(format!(
                "application name '{}' is already taken",
                request.new_name
            )));
        }

        let app = state.app_mut(&request.name)?;
        if app.guid != request.guid {
            return Err(PlatformError::Rejected(format!(
                "application '{}' has guid {}, expected {}",
                request.name, app.guid, request.guid
            )));
        }
        app.name = request.new_name.clone();
        Ok(())
    }

    async fn map_routes(
        &self,
        _config: &RequestConfig,
        name: &str,
        routes: &[String],
    ) -> PlatformResult<()> {
        let mut state = self.lock();
        state.record(PlatformOperation::MapRoutes, name, routes.join(","));
        if state.failure(PlatformOperation::MapRoutes, name).is_some() {
            return Err(injected(PlatformOperation::MapRoutes, name));
        }

        let app = state.app_mut(name)?;
        for route in routes {
            if !app.routes.contains(route) {
                app.routes.push(route.clone());
            }
        }
        Ok(())
    }

    async fn unmap_routes(
        &self,
        _config: &RequestConfig,
        name: &str,
        routes: &[String],
    ) -> PlatformResult<()> {
        let mut state = self.lock();
        state.record(PlatformOperation::UnmapRoutes, name, routes.join(","));
        if state.failure(PlatformOperation::UnmapRoutes, name).is_some() {
            return Err(injected(PlatformOperation::UnmapRoutes, name));
        }

        let app = state.app_mut(name)?;
        app.routes.retain(|route| !routes.contains(route));
        Ok(())
    }

    async fn check_autoscaler_enabled(
        &self,
        _config: &RequestConfig,
        request: &AutoscalerRequest,
    ) -> PlatformResult<bool> {
        let mut state = self.lock();
        let name = request.application_name.as_str();
        state.record(PlatformOperation::CheckAutoscaler, name, String::new());
        if state.failure(PlatformOperation::CheckAutoscaler, name).is_some() {
            return Err(injected(PlatformOperation::CheckAutoscaler, name));
        }

        Ok(state.app_mut(name)?.autoscaler.unwrap_or(false))
    }

    async fn enable_autoscaler(
        &self,
        _config: &RequestConfig,
        request: &AutoscalerRequest,
    ) -> PlatformResult<bool> {
        let mut state = self.lock();
        let name = request.application_name.as_str();
        state.record(PlatformOperation::EnableAutoscaler, name, String::new());
        if state.failure(PlatformOperation::EnableAutoscaler, name).is_some() {
            return Err(injected(PlatformOperation::EnableAutoscaler, name));
        }

        let app = state.app_mut(name)?;
        match app.autoscaler {
            Some(enabled) => {
                app.autoscaler = Some(true);
                Ok(!enabled)
            }
            None => Ok(false),
        }
    }

    async fn disable_autoscaler(
        &self,
        _config: &RequestConfig,
        request: &AutoscalerRequest,
    ) -> PlatformResult<bool> {
        let mut state = self.lock();
        let name = request.application_name.as_str();
        state.record(PlatformOperation::DisableAutoscaler, name, String::new());
        if state.failure(PlatformOperation::DisableAutoscaler, name).is_some() {
            return Err(injected(PlatformOperation::DisableAutoscaler, name));
        }

        let app = state.app_mut(name)?;
        match app.autoscaler {
            Some(enabled) => {
                app.autoscaler = Some(false);
                Ok(enabled)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutover_models::{ArtifactReference, CliVersion, Credentials};
    use std::path::PathBuf;

    fn config() -> RequestConfig {
        RequestConfig {
            endpoint_url: "api.example.com".to_string(),
            organization: "org".to_string(),
            space: "dev".to_string(),
            credentials: Credentials {
                username: "u".to_string(),
                password: "p".to_string(),
            },
            cli_version: CliVersion::V7,
            skip_ssl_validation: false,
            timeout_in_mins: 1,
            working_directory: PathBuf::from("/tmp"),
        }
    }

    #[tokio::test]
    async fn test_rename_requires_matching_guid() {
        let platform = InMemoryPlatform::new();
        platform.add_application("svc", 1, &[]);

        let result = platform
            .rename_application(
                &config(),
                &RenameRequest {
                    guid: "someone-else".to_string(),
                    name: "svc".to_string(),
                    new_name: "svc__INACTIVE".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(PlatformError::Rejected(_))));
        assert!(platform.application("svc").is_some());
    }

    #[tokio::test]
    async fn test_create_reads_manifest_instances() {
        let platform = InMemoryPlatform::new();
        let request = CreateApplicationRequest {
            application_name: "svc__0".to_string(),
            manifest: "applications:\n- name: svc__0\n  instances: 3\n".to_string(),
            manifest_path: PathBuf::from("/tmp/manifest.yml"),
            artifact: ArtifactReference::Image {
                image: "svc:1".to_string(),
            },
            rolling: false,
        };

        let app = platform.create_application(&config(), &request).await.unwrap();
        assert_eq!(app.instance_count, 3);
        assert_eq!(app.requested_state, RequestedState::Started);
    }

    #[tokio::test]
    async fn test_converge_after_polls() {
        let platform = InMemoryPlatform::new();
        platform.add_application("svc", 0, &[]);
        platform.converge_after_polls("svc", 2);

        platform.resize_application(&config(), "svc", 2).await.unwrap();
        let first = platform.get_application_by_name(&config(), "svc").await.unwrap();
        let second = platform.get_application_by_name(&config(), "svc").await.unwrap();

        assert_eq!(first.running_instance_count, 0);
        assert_eq!(second.running_instance_count, 2);
    }

    #[tokio::test]
    async fn test_failure_after_effect_leaves_partial_application() {
        let platform = InMemoryPlatform::new();
        platform.fail_after_effect(PlatformOperation::Create, "svc__0");
        let request = CreateApplicationRequest {
            application_name: "svc__0".to_string(),
            manifest: "applications:\n- name: svc__0\n  instances: 0\n".to_string(),
            manifest_path: PathBuf::from("/tmp/manifest.yml"),
            artifact: ArtifactReference::Image {
                image: "svc:1".to_string(),
            },
            rolling: false,
        };

        assert!(platform.create_application(&config(), &request).await.is_err());
        assert!(platform.application("svc__0").is_some());
    }
}
