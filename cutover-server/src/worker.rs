//! In-process task runner
//!
//! Submitted orchestrations run on their own tokio task. Runs that target the
//! same release prefix are serialized through a per-prefix async mutex; runs
//! for different prefixes proceed concurrently. Only the most recent finished
//! tasks are kept.

use chrono::{DateTime, Utc};
use cutover_models::{TaskState, TaskSummary};
use cutover_orchestrations::context::TaskContext;
use cutover_orchestrations::platform::Platform;
use cutover_orchestrations::progress::{LogEvent, LogSink, RecordingLogSink};
use cutover_orchestrations::registry::TaskRegistry;
use cutover_orchestrations::{TaskError, TaskRequest, TaskResponse};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Finished tasks kept unless configured otherwise
pub const DEFAULT_TASK_RETENTION: usize = 1000;

/// Task as reported by the API
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub summary: TaskSummary,
    pub response: Option<TaskResponse>,
    /// Caller error that stopped the run before any platform call
    pub error: Option<String>,
}

struct TaskRecord {
    detail: TaskDetail,
    log: Arc<RecordingLogSink>,
}

struct Inner {
    registry: TaskRegistry,
    /// Builds the context for one run from its log sink
    context: Box<dyn Fn(Arc<dyn LogSink>) -> TaskContext + Send + Sync>,
    tasks: RwLock<HashMap<Uuid, TaskRecord>>,
    prefix_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    retention: usize,
}

#[derive(Clone)]
pub struct Worker {
    inner: Arc<Inner>,
}

impl Worker {
    pub fn new(
        registry: TaskRegistry,
        platform: Arc<dyn Platform>,
        context: impl Fn(Arc<dyn Platform>, Arc<dyn LogSink>) -> TaskContext + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                context: Box::new(move |log| context(platform.clone(), log)),
                tasks: RwLock::new(HashMap::new()),
                prefix_locks: Mutex::new(HashMap::new()),
                retention: DEFAULT_TASK_RETENTION,
            }),
        }
    }

    /// Keep at most `retention` finished tasks.
    pub fn with_task_retention(mut self, retention: usize) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.retention = retention;
        }
        self
    }

    pub fn orchestrations(&self) -> Vec<&'static str> {
        self.inner.registry.names()
    }

    /// Queue `request` for `orchestration` and return the task id.
    pub async fn submit(&self, orchestration: &str, request: TaskRequest) -> Result<Uuid, TaskError> {
        let handler = self
            .inner
            .registry
            .get(orchestration)
            .ok_or_else(|| TaskError::UnknownOrchestration(orchestration.to_string()))?;
        let name = handler.name();

        let id = Uuid::new_v4();
        let prefix = request.release_name_prefix().to_string();
        let log = Arc::new(RecordingLogSink::new());
        let detail = TaskDetail {
            summary: TaskSummary {
                id,
                orchestration: name.to_string(),
                release_name_prefix: prefix.clone(),
                state: TaskState::Queued,
                created_at: Utc::now(),
                completed_at: None,
            },
            response: None,
            error: None,
        };
        self.inner.tasks.write().await.insert(
            id,
            TaskRecord {
                detail,
                log: log.clone(),
            },
        );
        tracing::info!(task_id = %id, orchestration = name, prefix = %prefix, "Task queued");

        let worker = self.clone();
        tokio::spawn(async move {
            worker.run(id, name, prefix, request, log).await;
        });
        Ok(id)
    }

    async fn run(
        &self,
        id: Uuid,
        orchestration: &'static str,
        prefix: String,
        request: TaskRequest,
        log: Arc<RecordingLogSink>,
    ) {
        let lock = self.prefix_lock(&prefix);
        let guard = lock.lock().await;
        self.update(id, |detail| detail.summary.state = TaskState::Running)
            .await;
        tracing::info!(task_id = %id, orchestration, "Task started");

        let ctx = (self.inner.context)(log as Arc<dyn LogSink>);
        let result = self.inner.registry.execute(&ctx, orchestration, request).await;
        drop(guard);
        drop(lock);
        self.release_prefix_lock(&prefix);

        {
            let mut tasks = self.inner.tasks.write().await;
            if let Some(record) = tasks.get_mut(&id) {
                let detail = &mut record.detail;
                detail.summary.completed_at = Some(Utc::now());
                match result {
                    Ok(response) => {
                        detail.summary.state = if response.is_success() {
                            TaskState::Succeeded
                        } else {
                            TaskState::Failed
                        };
                        detail.response = Some(response);
                    }
                    Err(e) => {
                        detail.summary.state = TaskState::Failed;
                        detail.error = Some(e.to_string());
                    }
                }
            }
            prune(&mut tasks, self.inner.retention);
        }
        tracing::info!(task_id = %id, "Task finished");
    }

    /// Drop the prefix's lock once no task holds or waits on it.
    fn release_prefix_lock(&self, prefix: &str) {
        let mut locks = self
            .inner
            .prefix_locks
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        if locks
            .get(prefix)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(prefix);
        }
    }

    async fn update(&self, id: Uuid, f: impl FnOnce(&mut TaskDetail)) {
        if let Some(record) = self.inner.tasks.write().await.get_mut(&id) {
            f(&mut record.detail);
        }
    }

    /// Every task, newest first
    pub async fn list(&self) -> Vec<TaskSummary> {
        let mut tasks: Vec<TaskSummary> = self
            .inner
            .tasks
            .read()
            .await
            .values()
            .map(|record| record.detail.summary.clone())
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    pub async fn get(&self, id: Uuid) -> Option<TaskDetail> {
        self.inner
            .tasks
            .read()
            .await
            .get(&id)
            .map(|record| record.detail.clone())
    }

    pub async fn logs(&self, id: Uuid) -> Option<Vec<LogEvent>> {
        self.inner
            .tasks
            .read()
            .await
            .get(&id)
            .map(|record| record.log.events())
    }
}

/// Forget the oldest finished tasks beyond `retention`.
fn prune(tasks: &mut HashMap<Uuid, TaskRecord>, retention: usize) {
    let mut finished: Vec<(DateTime<Utc>, Uuid)> = tasks
        .values()
        .filter_map(|record| {
            let summary = &record.detail.summary;
            summary.completed_at.map(|at| (at, summary.id))
        })
        .collect();
    if finished.len() <= retention {
        return;
    }
    finished.sort();
    let excess = finished.len() - retention;
    for (_, id) in finished.into_iter().take(excess) {
        tasks.remove(&id);
    }
    tracing::debug!(pruned = excess, "Pruned finished tasks");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cutover_models::{ArtifactReference, CliVersion, Credentials, InfraConfig};
    use cutover_orchestrations::context::PollingPolicy;
    use cutover_orchestrations::names::orchestrations;
    use cutover_orchestrations::platform::{InMemoryPlatform, PlatformOperation};
    use cutover_orchestrations::registry::create_task_registry;
    use cutover_orchestrations::RollingDeployRequest;
    use std::time::Duration;

    pub(crate) fn infra() -> InfraConfig {
        InfraConfig {
            endpoint_url: "https://api.sys.example.com".to_string(),
            organization: "acme".to_string(),
            space: "prod".to_string(),
            credentials: Credentials {
                username: "deployer".to_string(),
                password: "secret".to_string(),
            },
            cli_version: CliVersion::V7,
            skip_ssl_validation: false,
        }
    }

    pub(crate) fn rolling_deploy(name: &str) -> TaskRequest {
        TaskRequest::RollingDeploy(RollingDeployRequest {
            infra: infra(),
            application_name: name.to_string(),
            manifest: "applications:\n- name: placeholder\n  instances: 1\n".to_string(),
            artifact: ArtifactReference::Package {
                path: std::env::temp_dir(),
            },
            routes: Vec::new(),
            desired_instance_count: None,
            use_app_autoscaler: false,
            timeout_interval_in_min: 1,
        })
    }

    pub(crate) fn worker(platform: Arc<InMemoryPlatform>) -> Worker {
        Worker::new(create_task_registry(), platform, |platform, log| {
            TaskContext::new(platform, log)
                .with_polling(PollingPolicy {
                    interval: Duration::from_millis(10),
                })
                .with_work_root(std::env::temp_dir().join("cutover-server-tests"))
        })
    }

    pub(crate) async fn wait_for(worker: &Worker, id: Uuid) -> TaskDetail {
        for _ in 0..500 {
            if let Some(detail) = worker.get(id).await {
                if detail.summary.completed_at.is_some() {
                    return detail;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} did not finish", id);
    }

    #[tokio::test]
    async fn test_submitted_task_runs_to_completion() {
        let platform = Arc::new(InMemoryPlatform::new());
        let worker = worker(platform.clone());

        let id = worker
            .submit(orchestrations::ROLLING_DEPLOY, rolling_deploy("svc"))
            .await
            .unwrap();
        let detail = wait_for(&worker, id).await;

        assert_eq!(detail.summary.state, TaskState::Succeeded);
        assert_eq!(detail.summary.release_name_prefix, "svc");
        assert!(detail.response.unwrap().is_success());
        assert!(platform.application("svc").is_some());
        assert!(!worker.logs(id).await.unwrap().is_empty());
        assert_eq!(worker.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_orchestration_is_rejected() {
        let worker = worker(Arc::new(InMemoryPlatform::new()));

        let err = worker
            .submit("cutover::orchestration::nope", rolling_deploy("svc"))
            .await
            .unwrap_err();

        assert!(matches!(err, TaskError::UnknownOrchestration(_)));
        assert!(worker.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_variant_fails_the_task_without_platform_calls() {
        let platform = Arc::new(InMemoryPlatform::new());
        let worker = worker(platform.clone());

        let id = worker
            .submit(orchestrations::RESIZE, rolling_deploy("svc"))
            .await
            .unwrap();
        let detail = wait_for(&worker, id).await;

        assert_eq!(detail.summary.state, TaskState::Failed);
        assert!(detail.error.unwrap().contains("Invalid arguments"));
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_platform_failure_is_a_failed_task() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.fail_on(PlatformOperation::Create, None);
        let worker = worker(platform.clone());

        let id = worker
            .submit(orchestrations::ROLLING_DEPLOY, rolling_deploy("svc"))
            .await
            .unwrap();
        let detail = wait_for(&worker, id).await;

        assert_eq!(detail.summary.state, TaskState::Failed);
        assert!(detail.error.is_none());
        assert!(!detail.response.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_finished_tasks_are_pruned_beyond_retention() {
        let worker = worker(Arc::new(InMemoryPlatform::new())).with_task_retention(2);

        let mut ids = Vec::new();
        for name in ["svc-a", "svc-b", "svc-c"] {
            let id = worker
                .submit(orchestrations::ROLLING_DEPLOY, rolling_deploy(name))
                .await
                .unwrap();
            wait_for(&worker, id).await;
            ids.push(id);
        }

        assert_eq!(worker.list().await.len(), 2);
        assert!(worker.get(ids[0]).await.is_none());
        assert!(worker.get(ids[2]).await.is_some());
    }

    #[tokio::test]
    async fn test_prefix_lock_released_after_task() {
        let worker = worker(Arc::new(InMemoryPlatform::new()));

        let id = worker
            .submit(orchestrations::ROLLING_DEPLOY, rolling_deploy("svc"))
            .await
            .unwrap();
        wait_for(&worker, id).await;
        // completion is recorded after the lock is released
        assert!(worker
            .inner
            .prefix_locks
            .lock()
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_same_prefix_shares_a_lock() {
        let worker = worker(Arc::new(InMemoryPlatform::new()));

        let a = worker.prefix_lock("svc");
        let b = worker.prefix_lock("svc");
        let other = worker.prefix_lock("billing");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
        let _held = a.lock().await;
        assert!(b.try_lock().is_err());
        assert!(other.try_lock().is_ok());
    }
}
