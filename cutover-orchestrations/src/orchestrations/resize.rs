//! Resize orchestration
//!
//! Moves capacity from the old application to the new one. Each side is
//! resized in its own command unit and confirmed by steady-state polling
//! before the next step starts.

use async_trait::async_trait;
use cutover_models::{ApplicationInfo, InstanceData, RequestConfig, ResizeStrategy};

use crate::activities::resize::{self as resize_activity, ResizeOutcome};
use crate::activities::{autoscaler, releases, routes};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::names::{command_units, orchestrations};
use crate::progress::CommandUnit;
use crate::registry::TaskHandler;
use crate::types::{ResizeOutput, ResizeRequest, TaskOutput, TaskRequest};

pub struct Resize;

#[async_trait]
impl TaskHandler for Resize {
    fn name(&self) -> &'static str {
        orchestrations::RESIZE
    }

    async fn execute(&self, ctx: &TaskContext, request: TaskRequest) -> Result<TaskOutput, TaskError> {
        match request {
            TaskRequest::Resize(input) => resize(ctx, &input).await.map(TaskOutput::Resize),
            other => Err(super::mismatch(self.name(), &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Upsize,
    Downsize,
}

/// Order of the two resize steps for a strategy
pub(crate) fn steps(strategy: ResizeStrategy) -> [Step; 2] {
    match strategy {
        ResizeStrategy::UpscaleNewFirst => [Step::Upsize, Step::Downsize],
        ResizeStrategy::DownscaleOldFirst => [Step::Downsize, Step::Upsize],
    }
}

async fn resize(ctx: &TaskContext, request: &ResizeRequest) -> Result<ResizeOutput, TaskError> {
    super::require(&request.release_name_prefix, "release_name_prefix")?;
    super::require(&request.new_application.application_guid, "new_application.application_guid")?;
    let (config, _workdir) = ctx
        .request_config(&request.infra, request.timeout_interval_in_min)
        .await?;

    let mut instance_data: Vec<InstanceData> = Vec::new();
    let mut new_application: Option<ApplicationInfo> = None;
    let mut old_application = request.old_application.clone();

    for step in steps(request.resize_strategy) {
        match step {
            Step::Upsize => {
                let unit = CommandUnit::open(ctx.log(), command_units::UPSIZE);
                let result = upsize(ctx, &config, request, &unit).await;
                let result = restore_on_failure(ctx, &config, request, &instance_data, result, &unit).await;
                unit.finish(&result);
                let outcome = result?;
                new_application = Some(ApplicationInfo::from(&outcome.application));
                instance_data.push(outcome.instance_data);
            }
            Step::Downsize => {
                let unit = CommandUnit::open(ctx.log(), command_units::DOWNSIZE);
                let result = downsize(ctx, &config, request, &unit).await;
                let result = restore_on_failure(ctx, &config, request, &instance_data, result, &unit).await;
                unit.finish(&result);
                if let Some(outcome) = result? {
                    old_application = Some(ApplicationInfo::from(&outcome.application));
                    instance_data.push(outcome.instance_data);
                }
            }
        }
    }

    let unit = CommandUnit::open(ctx.log(), command_units::WRAPUP);
    let result = wrapup(ctx, &config, request, &mut instance_data, &unit).await;
    unit.finish(&result);
    result?;

    Ok(ResizeOutput {
        instance_data,
        new_application: new_application.unwrap_or_else(|| request.new_application.clone()),
        old_application,
    })
}

async fn upsize(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &ResizeRequest,
    unit: &CommandUnit<'_>,
) -> Result<ResizeOutcome, TaskError> {
    let app = releases::refresh(ctx, config, &request.release_name_prefix, &request.new_application).await?;
    unit.info(format!(
        "Upsizing new application {} to {} instance(s)",
        app.name, request.upsize_count
    ));
    let first_upsize = app.instance_count == 0 && app.attached_routes.is_empty();

    let mut outcome = resize_activity::resize_application(
        ctx,
        config,
        &app,
        request.upsize_count,
        request.use_app_autoscaler,
        unit,
    )
    .await?;

    if first_upsize && request.upsize_count > 0 {
        let mapped = routes::map_missing(ctx, config, &app.name, &request.routes, unit).await?;
        outcome.application.attached_routes.extend(mapped);
    }
    Ok(outcome)
}

async fn downsize(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &ResizeRequest,
    unit: &CommandUnit<'_>,
) -> Result<Option<ResizeOutcome>, TaskError> {
    let Some(old) = &request.old_application else {
        unit.info("No previous application to downsize");
        return Ok(None);
    };
    if request.blue_green && request.downsize_count == 0 {
        unit.info(format!(
            "{} keeps serving production until the route swap, not downsizing",
            old.application_name
        ));
        return Ok(None);
    }

    let app = releases::refresh(ctx, config, &request.release_name_prefix, old).await?;
    if app.instance_count <= request.downsize_count {
        unit.info(format!(
            "{} already runs {} instance(s), nothing to downsize",
            app.name, app.instance_count
        ));
        return Ok(None);
    }
    if !request.blue_green && request.resize_strategy == ResizeStrategy::DownscaleOldFirst {
        unit.warn("Downsizing the old application before the new one is up may cause downtime");
    }

    unit.info(format!(
        "Downsizing old application {} to {} instance(s)",
        app.name, request.downsize_count
    ));
    let mut outcome = resize_activity::resize_application(
        ctx,
        config,
        &app,
        request.downsize_count,
        request.use_app_autoscaler,
        unit,
    )
    .await?;

    if request.downsize_count == 0 && !request.blue_green {
        routes::unmap_all(ctx, config, &app.name, unit).await?;
        outcome.application.attached_routes.clear();
    }
    Ok(Some(outcome))
}

/// A failed step leaves no output for a rollback to act on, so autoscalers
/// already suspended by an earlier step are re-enabled here.
async fn restore_on_failure<T>(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &ResizeRequest,
    instance_data: &[InstanceData],
    result: Result<T, TaskError>,
    unit: &CommandUnit<'_>,
) -> Result<T, TaskError> {
    let e = match result {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let mut revert_errors = Vec::new();
    for data in instance_data.iter().filter(|d| d.disable_autoscaler_performed) {
        if let Err(re) =
            autoscaler::enable_by_guid(ctx, config, &request.release_name_prefix, &data.guid, unit).await
        {
            revert_errors.push(format!("Failed to re-enable autoscaler for {}: {}", data.name, re));
        }
    }
    Err(e.with_revert_errors(revert_errors))
}

/// Re-enable autoscalers on applications left running.
async fn wrapup(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &ResizeRequest,
    instance_data: &mut [InstanceData],
    unit: &CommandUnit<'_>,
) -> Result<(), TaskError> {
    for data in instance_data.iter_mut() {
        if !data.disable_autoscaler_performed {
            continue;
        }
        if data.desired_count == 0 {
            unit.info(format!(
                "Autoscaler stays disabled for {}, it has no instances",
                data.name
            ));
            continue;
        }
        autoscaler::enable_by_guid(ctx, config, &request.release_name_prefix, &data.guid, unit).await?;
        data.disable_autoscaler_performed = false;
    }
    unit.info("Resize complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Platform, PlatformOperation};
    use crate::registry::create_task_registry;
    use crate::test_support::{harness, infra, request_config, Harness};
    use cutover_models::CommandUnitStatus;

    fn info(h: &Harness, name: &str) -> ApplicationInfo {
        ApplicationInfo::from(&h.platform.application(name).unwrap())
    }

    fn request(h: &Harness, blue_green: bool) -> ResizeRequest {
        ResizeRequest {
            infra: infra(),
            release_name_prefix: "svc".to_string(),
            new_application: info(h, "svc__2"),
            old_application: Some(info(h, "svc__1")),
            upsize_count: 3,
            downsize_count: 0,
            resize_strategy: ResizeStrategy::UpscaleNewFirst,
            use_app_autoscaler: false,
            routes: vec!["svc.example.com".to_string()],
            blue_green,
            timeout_interval_in_min: 1,
        }
    }

    fn seed(h: &Harness) {
        h.platform.add_application("svc__1", 3, &["svc.example.com"]);
        h.platform.add_application("svc__2", 0, &[]);
    }

    async fn run(h: &Harness, request: ResizeRequest) -> Result<ResizeOutput, TaskError> {
        match Resize.execute(&h.ctx, TaskRequest::Resize(request)).await? {
            TaskOutput::Resize(output) => Ok(output),
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_basic_resize_moves_capacity_and_routes() {
        let h = harness();
        seed(&h);
        h.platform.converge_after_polls("svc__2", 3);

        let out = run(&h, request(&h, false)).await.unwrap();

        assert_eq!(out.instance_data.len(), 2);
        assert_eq!(out.instance_data[0].name, "svc__2");
        assert_eq!(out.instance_data[0].previous_count, 0);
        assert_eq!(out.instance_data[0].desired_count, 3);
        assert_eq!(out.instance_data[1].previous_count, 3);
        assert_eq!(out.instance_data[1].desired_count, 0);

        let new = h.platform.application("svc__2").unwrap();
        assert_eq!(new.running_instance_count, 3);
        assert!(new.has_route("svc.example.com"));
        assert!(h.platform.application("svc__1").unwrap().attached_routes.is_empty());
        assert_eq!(
            h.sink.unit_statuses(),
            vec![
                ("Upsize".to_string(), CommandUnitStatus::Success),
                ("Downsize".to_string(), CommandUnitStatus::Success),
                ("Wrapup".to_string(), CommandUnitStatus::Success),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_blue_green_keeps_old_application_running() {
        let h = harness();
        h.platform.add_application("svc__1", 3, &["svc.example.com"]);
        h.platform
            .add_application("svc__2", 0, &["svc-temp.example.com"]);

        let out = run(&h, request(&h, true)).await.unwrap();

        assert_eq!(out.instance_data.len(), 1);
        let resizes = h.platform.calls_of(PlatformOperation::Resize);
        assert_eq!(resizes.len(), 1);
        assert_eq!(resizes[0].target, "svc__2");
        // production routes move only at the swap
        assert!(!h.platform.application("svc__2").unwrap().has_route("svc.example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_downscale_old_first_order() {
        let h = harness();
        seed(&h);
        let mut input = request(&h, false);
        input.resize_strategy = ResizeStrategy::DownscaleOldFirst;
        input.downsize_count = 1;

        run(&h, input).await.unwrap();

        let targets: Vec<String> = h
            .platform
            .calls_of(PlatformOperation::Resize)
            .into_iter()
            .map(|call| call.target)
            .collect();
        assert_eq!(targets, vec!["svc__1", "svc__2"]);
        assert!(h.sink.messages().iter().any(|m| m.contains("downtime")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_state_timeout_is_failure() {
        let h = harness();
        seed(&h);
        h.platform.never_converge("svc__2");

        let response = create_task_registry()
            .execute(&h.ctx, orchestrations::RESIZE, TaskRequest::Resize(request(&h, false)))
            .await
            .unwrap();

        assert!(!response.is_success());
        assert!(response.error_message.unwrap().starts_with("Timed out"));
        // the old application is never touched after the failed upsize
        assert!(h
            .platform
            .calls_of(PlatformOperation::Resize)
            .iter()
            .all(|call| call.target == "svc__2"));
        assert_eq!(h.sink.unit_statuses()[0].1, CommandUnitStatus::Failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoscaler_disabled_and_restored() {
        let h = harness();
        seed(&h);
        h.platform.bind_autoscaler("svc__1", true);
        h.platform.bind_autoscaler("svc__2", true);
        let mut input = request(&h, false);
        input.use_app_autoscaler = true;

        let out = run(&h, input).await.unwrap();

        assert_eq!(h.platform.autoscaler_state("svc__2"), Some(true));
        assert_eq!(h.platform.autoscaler_state("svc__1"), Some(false));
        assert!(!out.instance_data[0].disable_autoscaler_performed);
        assert!(out.instance_data[1].disable_autoscaler_performed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_upsize_reenables_autoscaler() {
        let h = harness();
        seed(&h);
        h.platform.bind_autoscaler("svc__2", true);
        h.platform.never_converge("svc__2");
        let mut input = request(&h, false);
        input.use_app_autoscaler = true;

        let err = run(&h, input).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(h.platform.autoscaler_state("svc__2"), Some(true));
        let toggles: Vec<PlatformOperation> = h
            .platform
            .calls()
            .into_iter()
            .map(|call| call.operation)
            .filter(|op| {
                matches!(
                    op,
                    PlatformOperation::DisableAutoscaler | PlatformOperation::EnableAutoscaler
                )
            })
            .collect();
        assert_eq!(
            toggles,
            vec![
                PlatformOperation::DisableAutoscaler,
                PlatformOperation::EnableAutoscaler
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_downsize_reenables_autoscaler_of_upsized_application() {
        let h = harness();
        seed(&h);
        h.platform.bind_autoscaler("svc__2", true);
        h.platform.fail_on(PlatformOperation::Resize, Some("svc__1"));
        let mut input = request(&h, false);
        input.use_app_autoscaler = true;

        let response = create_task_registry()
            .execute(&h.ctx, orchestrations::RESIZE, TaskRequest::Resize(input))
            .await
            .unwrap();

        assert!(!response.is_success());
        assert!(response.revert_errors.is_empty());
        assert_eq!(h.platform.application("svc__2").unwrap().instance_count, 3);
        assert_eq!(h.platform.autoscaler_state("svc__2"), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_application_is_invalid_infra_state() {
        let h = harness();
        seed(&h);
        let input = request(&h, false);
        let guid = h.platform.guid_of("svc__2").unwrap();
        // remove the new application out of band
        h.platform
            .delete_application(&request_config(1), "svc__2")
            .await
            .unwrap();
        assert!(h.platform.application_by_guid(&guid).is_none());

        let err = run(&h, input).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidInfraState(_)));
    }
}
