//! Route swap orchestration
//!
//! Moves production routes from the active application to the new one and,
//! with non-versioned naming, exchanges their names so that the canonical
//! name always serves production.

use async_trait::async_trait;
use cutover_models::{ApplicationDescriptor, ApplicationInfo, NamingStrategy, RequestConfig};

use crate::activities::{autoscaler, releases, rename, resize, routes};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::names::{command_units, orchestrations};
use crate::naming;
use crate::progress::CommandUnit;
use crate::registry::TaskHandler;
use crate::types::{RenameRecord, SwapRoutesOutput, SwapRoutesRequest, TaskOutput, TaskRequest};

pub struct SwapRoutes;

#[async_trait]
impl TaskHandler for SwapRoutes {
    fn name(&self) -> &'static str {
        orchestrations::SWAP_ROUTES
    }

    async fn execute(&self, ctx: &TaskContext, request: TaskRequest) -> Result<TaskOutput, TaskError> {
        match request {
            TaskRequest::SwapRoutes(input) => swap_routes(ctx, &input).await.map(TaskOutput::SwapRoutes),
            other => Err(super::mismatch(self.name(), &other)),
        }
    }
}

/// Where the swap left things
struct Swapped {
    new: ApplicationDescriptor,
    outgoing: Option<ApplicationDescriptor>,
    renames: Vec<RenameRecord>,
    /// Guid of the outgoing application whose autoscaler was disabled
    autoscaler_disabled: Option<String>,
}

async fn swap_routes(ctx: &TaskContext, request: &SwapRoutesRequest) -> Result<SwapRoutesOutput, TaskError> {
    super::require(&request.release_name_prefix, "release_name_prefix")?;
    super::require(&request.new_application.application_guid, "new_application.application_guid")?;
    if request.final_routes.is_empty() {
        return Err(TaskError::InvalidArguments(
            "final_routes must name at least one route".to_string(),
        ));
    }
    let (config, _workdir) = ctx
        .request_config(&request.infra, request.timeout_interval_in_min)
        .await?;
    let prefix = request.release_name_prefix.as_str();

    let unit = CommandUnit::open(ctx.log(), command_units::SWAP_ROUTES);
    let result = swap(ctx, &config, request, &unit).await;
    unit.finish(&result);
    let swapped = result?;

    let mut downsized = false;
    let mut outgoing = swapped.outgoing.clone();
    if request.downsize_old_application {
        if let Some(old) = &swapped.outgoing {
            let unit = CommandUnit::open(ctx.log(), command_units::DOWNSIZE);
            let result = downsize(ctx, &config, prefix, old, request.idle_instance_count, &unit).await;
            unit.finish(&result);
            outgoing = Some(result?);
            downsized = true;
        }
    }

    let unit = CommandUnit::open(ctx.log(), command_units::WRAPUP);
    let result = wrapup(ctx, &config, request, &swapped, downsized, &unit).await;
    unit.finish(&result);
    result?;

    Ok(SwapRoutesOutput {
        active_application: ApplicationInfo::from(&swapped.new),
        inactive_application: outgoing.as_ref().map(ApplicationInfo::from),
        renames: swapped.renames,
        downsized,
    })
}

async fn swap(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SwapRoutesRequest,
    unit: &CommandUnit<'_>,
) -> Result<Swapped, TaskError> {
    let prefix = request.release_name_prefix.as_str();

    let new = releases::refresh(ctx, config, prefix, &request.new_application).await?;
    let active = releases::refresh_optional(ctx, config, prefix, request.active_application.as_ref()).await?;
    if let Some(inactive) =
        releases::refresh_optional(ctx, config, prefix, request.inactive_application.as_ref()).await?
    {
        tracing::debug!(inactive = %inactive.name, "Previous inactive application left in place");
    }
    if active.is_none() {
        unit.info("No active application, routes are only mapped to the new application");
    }

    // Step 1: Map
    unit.info(format!("Step 1: Mapping production routes to {}", new.name));
    routes::map_missing(ctx, config, &new.name, &request.final_routes, unit).await?;
    if let Some(active) = &active {
        routes::map_missing(ctx, config, &active.name, &request.temp_routes, unit).await?;
    }

    // Step 2: Unmap
    unit.info("Step 2: Unmapping swapped routes");
    routes::unmap_present(ctx, config, &new.name, &request.temp_routes, unit).await?;
    if let Some(active) = &active {
        routes::unmap_present(ctx, config, &active.name, &request.final_routes, unit).await?;
    }

    // Step 3: Outgoing autoscaler
    let mut autoscaler_disabled = None;
    if let (true, Some(active)) = (request.use_app_autoscaler, &active) {
        if autoscaler::disable_if_enabled(ctx, config, &active.name, &active.guid, unit).await? {
            autoscaler_disabled = Some(active.guid.clone());
        }
    }

    // Step 4: Identity exchange
    let mut renames = Vec::new();
    if request.naming_strategy == NamingStrategy::NonVersioned {
        unit.info("Step 4: Exchanging application names");
        let mut steps: Vec<(&str, String)> = Vec::new();
        if let Some(active) = &active {
            steps.push((active.guid.as_str(), naming::interim_name(prefix)));
            steps.push((new.guid.as_str(), prefix.to_string()));
            steps.push((active.guid.as_str(), naming::inactive_name(prefix)));
        } else {
            steps.push((new.guid.as_str(), prefix.to_string()));
        }
        for (guid, target) in steps {
            if let Some(record) = rename::rename_by_guid(ctx, config, prefix, guid, &target, unit).await? {
                renames.push(record);
            }
        }
    }

    let new_info = ApplicationInfo::from(&new);
    let new = releases::refresh(ctx, config, prefix, &new_info).await?;
    let outgoing = match &active {
        Some(active) => Some(releases::refresh(ctx, config, prefix, &ApplicationInfo::from(active)).await?),
        None => None,
    };
    unit.info(format!("{} now serves production", new.name));

    Ok(Swapped {
        new,
        outgoing,
        renames,
        autoscaler_disabled,
    })
}

async fn downsize(
    ctx: &TaskContext,
    config: &RequestConfig,
    prefix: &str,
    old: &ApplicationDescriptor,
    idle_instance_count: u32,
    unit: &CommandUnit<'_>,
) -> Result<ApplicationDescriptor, TaskError> {
    let app = releases::refresh(ctx, config, prefix, &ApplicationInfo::from(old)).await?;
    if app.instance_count <= idle_instance_count {
        unit.info(format!("{} already runs {} instance(s)", app.name, app.instance_count));
        return Ok(app);
    }
    unit.info(format!(
        "Downsizing {} to {} idle instance(s)",
        app.name, idle_instance_count
    ));
    let outcome = resize::resize_application(ctx, config, &app, idle_instance_count, false, unit).await?;
    Ok(outcome.application)
}

async fn wrapup(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SwapRoutesRequest,
    swapped: &Swapped,
    downsized: bool,
    unit: &CommandUnit<'_>,
) -> Result<(), TaskError> {
    let prefix = request.release_name_prefix.as_str();
    if request.use_app_autoscaler {
        autoscaler::enable_by_guid(ctx, config, prefix, &swapped.new.guid, unit).await?;
    }
    if let Some(guid) = &swapped.autoscaler_disabled {
        if downsized {
            unit.info("Autoscaler of the downsized application stays disabled");
        } else {
            autoscaler::enable_by_guid(ctx, config, prefix, guid, unit).await?;
        }
    }
    unit.info("Route swap complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformOperation;
    use crate::test_support::{harness, infra, Harness};
    use cutover_models::CommandUnitStatus;

    fn info(h: &Harness, name: &str) -> ApplicationInfo {
        ApplicationInfo::from(&h.platform.application(name).unwrap())
    }

    /// Space as blue-green setup and resize leave it
    fn seed(h: &Harness) -> (String, String) {
        h.platform.add_application("svc__0", 0, &[]);
        let active = h.platform.add_application("svc", 2, &["svc.example.com"]);
        let new = h
            .platform
            .add_application("svc__INACTIVE", 2, &["svc-temp.example.com"]);
        (active, new)
    }

    fn request(h: &Harness) -> SwapRoutesRequest {
        SwapRoutesRequest {
            infra: infra(),
            release_name_prefix: "svc".to_string(),
            active_application: Some(info(h, "svc")),
            inactive_application: Some(info(h, "svc__0")),
            new_application: info(h, "svc__INACTIVE"),
            final_routes: vec!["svc.example.com".to_string()],
            temp_routes: vec!["svc-temp.example.com".to_string()],
            downsize_old_application: false,
            idle_instance_count: 0,
            use_app_autoscaler: false,
            naming_strategy: NamingStrategy::NonVersioned,
            timeout_interval_in_min: 1,
        }
    }

    async fn run(h: &Harness, request: SwapRoutesRequest) -> Result<SwapRoutesOutput, TaskError> {
        match SwapRoutes.execute(&h.ctx, TaskRequest::SwapRoutes(request)).await? {
            TaskOutput::SwapRoutes(output) => Ok(output),
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_exchanges_routes_and_names() {
        let h = harness();
        let (active, new) = seed(&h);

        let out = run(&h, request(&h)).await.unwrap();

        assert_eq!(h.platform.guid_of("svc"), Some(new.clone()));
        assert_eq!(h.platform.guid_of("svc__INACTIVE"), Some(active.clone()));
        let serving = h.platform.application("svc").unwrap();
        assert_eq!(serving.attached_routes, vec!["svc.example.com".to_string()]);
        let outgoing = h.platform.application("svc__INACTIVE").unwrap();
        assert_eq!(outgoing.attached_routes, vec!["svc-temp.example.com".to_string()]);
        assert_eq!(outgoing.instance_count, 2);

        assert_eq!(out.renames.len(), 3);
        assert_eq!(out.active_application.application_name, "svc");
        assert_eq!(out.active_application.application_guid, new);
        assert_eq!(
            out.inactive_application.unwrap().application_name,
            "svc__INACTIVE"
        );
        assert!(!out.downsized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_versioned_swap_does_not_rename() {
        let h = harness();
        let active = h.platform.add_application("svc__3", 2, &["svc.example.com"]);
        h.platform.add_application("svc__4", 2, &[]);
        let mut input = request_for(&h, "svc__3", "svc__4");
        input.naming_strategy = NamingStrategy::Versioned;

        run(&h, input).await.unwrap();

        assert!(h.platform.calls_of(PlatformOperation::Rename).is_empty());
        assert!(h.platform.application("svc__4").unwrap().has_route("svc.example.com"));
        assert_eq!(h.platform.guid_of("svc__3"), Some(active));
        assert!(!h.platform.application("svc__3").unwrap().has_route("svc.example.com"));
    }

    fn request_for(h: &Harness, active: &str, new: &str) -> SwapRoutesRequest {
        SwapRoutesRequest {
            active_application: Some(info(h, active)),
            inactive_application: None,
            new_application: info(h, new),
            ..request_template()
        }
    }

    fn request_template() -> SwapRoutesRequest {
        SwapRoutesRequest {
            infra: infra(),
            release_name_prefix: "svc".to_string(),
            active_application: None,
            inactive_application: None,
            new_application: ApplicationInfo::default(),
            final_routes: vec!["svc.example.com".to_string()],
            temp_routes: Vec::new(),
            downsize_old_application: false,
            idle_instance_count: 0,
            use_app_autoscaler: false,
            naming_strategy: NamingStrategy::NonVersioned,
            timeout_interval_in_min: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_downsize_old_application_to_idle_count() {
        let h = harness();
        seed(&h);
        let mut input = request(&h);
        input.downsize_old_application = true;
        input.idle_instance_count = 1;

        let out = run(&h, input).await.unwrap();

        assert!(out.downsized);
        assert_eq!(h.platform.application("svc__INACTIVE").unwrap().running_instance_count, 1);
        let units: Vec<String> = h.sink.unit_statuses().into_iter().map(|(u, _)| u).collect();
        assert_eq!(units, vec!["SwapRoutes", "Downsize", "Wrapup"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoscaler_reenabled_by_guid_after_rename() {
        let h = harness();
        let (active, _) = seed(&h);
        h.platform.bind_autoscaler("svc", true);
        let mut input = request(&h);
        input.use_app_autoscaler = true;

        run(&h, input).await.unwrap();

        assert_eq!(h.platform.autoscaler_state("svc__INACTIVE"), Some(true));
        let disables = h.platform.calls_of(PlatformOperation::DisableAutoscaler);
        assert_eq!(disables.len(), 1);
        assert_eq!(disables[0].target, "svc");
        let reenabled: Vec<_> = h
            .platform
            .calls_of(PlatformOperation::EnableAutoscaler)
            .into_iter()
            .filter(|call| call.guid.as_deref() == Some(active.as_str()))
            .collect();
        assert_eq!(reenabled.len(), 1);
        assert_eq!(reenabled[0].target, "svc__INACTIVE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_failure_closes_unit_as_failure() {
        let h = harness();
        seed(&h);
        h.platform.fail_on(PlatformOperation::MapRoutes, Some("svc__INACTIVE"));

        let err = run(&h, request(&h)).await.unwrap_err();

        assert!(matches!(err, TaskError::Platform(_)));
        assert_eq!(
            h.sink.unit_statuses(),
            vec![("SwapRoutes".to_string(), CommandUnitStatus::Failure)]
        );
        assert!(h.platform.calls_of(PlatformOperation::Rename).is_empty());
    }

    #[tokio::test]
    async fn test_final_routes_are_required() {
        let h = harness();
        let mut input = request_template();
        input.new_application.application_guid = "guid".to_string();
        input.final_routes.clear();

        let err = run(&h, input).await.unwrap_err();
        assert!(err.is_invalid_arguments());
        assert!(h.platform.calls().is_empty());
    }
}
