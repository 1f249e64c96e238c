//! Steady-state polling after instance-count changes

use cutover_models::{ApplicationDescriptor, RequestConfig};
use std::time::Duration;
use tokio::time::Instant;

use crate::context::TaskContext;
use crate::error::TaskError;
use crate::progress::CommandUnit;

/// Poll `name` until its running instance count equals `desired`.
///
/// The deadline is the request's timeout in minutes. Reaching it is reported
/// as [`TaskError::SteadyStateTimeout`], never as a partial success.
pub async fn wait_for_steady_state(
    ctx: &TaskContext,
    config: &RequestConfig,
    name: &str,
    desired: u32,
    unit: &CommandUnit<'_>,
) -> Result<ApplicationDescriptor, TaskError> {
    let timeout = Duration::from_secs(u64::from(config.timeout_in_mins) * 60);
    let deadline = Instant::now() + timeout;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let app = ctx.platform().get_application_by_name(config, name).await?;
        if app.is_steady_at(desired) {
            unit.info(format!(
                "Application {} reached steady state: {}/{} instance(s) running",
                name, app.running_instance_count, desired
            ));
            return Ok(app);
        }

        let now = Instant::now();
        if now >= deadline {
            unit.error(format!(
                "Timeout: application {} has {} of {} instance(s) running after {} attempt(s)",
                name, app.running_instance_count, desired, attempt
            ));
            return Err(TaskError::SteadyStateTimeout {
                application: name.to_string(),
                desired,
                running: app.running_instance_count,
                timeout_in_mins: config.timeout_in_mins,
            });
        }

        tracing::debug!(
            application = name,
            attempt,
            running = app.running_instance_count,
            desired,
            "Waiting for steady state"
        );
        tokio::time::sleep(ctx.polling.interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{InMemoryPlatform, Platform, PlatformOperation};
    use crate::progress::RecordingLogSink;
    use crate::test_support::request_config;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_converges_before_timeout() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.add_application("svc__1", 0, &[]);
        platform.converge_after_polls("svc__1", 3);
        let sink = Arc::new(RecordingLogSink::new());
        let ctx = TaskContext::new(platform.clone(), sink.clone());
        let config = request_config(1);

        platform.resize_application(&config, "svc__1", 2).await.unwrap();
        let unit = CommandUnit::open(sink.as_ref(), "Upsize");
        let app = wait_for_steady_state(&ctx, &config, "svc__1", 2, &unit)
            .await
            .unwrap();

        assert_eq!(app.running_instance_count, 2);
        assert_eq!(platform.calls_of(PlatformOperation::Get).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_converging_times_out() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.add_application("svc__1", 0, &[]);
        platform.never_converge("svc__1");
        let sink = Arc::new(RecordingLogSink::new());
        let ctx = TaskContext::new(platform.clone(), sink.clone());
        let config = request_config(1);

        platform.resize_application(&config, "svc__1", 2).await.unwrap();
        let unit = CommandUnit::open(sink.as_ref(), "Upsize");
        let err = wait_for_steady_state(&ctx, &config, "svc__1", 2, &unit)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        // one poll every 5s across a one minute window, plus the final check
        assert_eq!(platform.calls_of(PlatformOperation::Get).len(), 13);
    }
}
