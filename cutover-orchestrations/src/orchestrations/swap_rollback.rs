//! Swap rollback orchestration
//!
//! Undoes a blue-green deployment. Before the route swap only instance
//! counts and routes need restoring. After it the identity exchange is
//! reversed as well, but only once the space is confirmed to hold exactly
//! the expected rollback target; anything else fails without a mutation.

use async_trait::async_trait;
use cutover_models::{
    ApplicationDescriptor, ApplicationInfo, ApplicationSummary, InstanceData, NamingStrategy,
    RequestConfig,
};

use crate::activities::{autoscaler, delete, releases, rename, resize, routes};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::names::{command_units, orchestrations};
use crate::naming;
use crate::progress::CommandUnit;
use crate::registry::TaskHandler;
use crate::resolver::ActiveSelector;
use crate::types::{RenameRecord, RollbackOutput, SwapRollbackRequest, TaskOutput, TaskRequest};

pub struct SwapRollback;

#[async_trait]
impl TaskHandler for SwapRollback {
    fn name(&self) -> &'static str {
        orchestrations::SWAP_ROLLBACK
    }

    async fn execute(&self, ctx: &TaskContext, request: TaskRequest) -> Result<TaskOutput, TaskError> {
        match request {
            TaskRequest::SwapRollback(input) => swap_rollback(ctx, &input)
                .await
                .map(TaskOutput::Rollback),
            other => Err(super::mismatch(self.name(), &other)),
        }
    }
}

/// Progress shared by the phases of one rollback
#[derive(Default)]
struct Rollback {
    restored: Option<ApplicationDescriptor>,
    instance_data: Vec<InstanceData>,
    renames: Vec<RenameRecord>,
    deleted_application: Option<String>,
}

impl Rollback {
    fn output(self) -> RollbackOutput {
        RollbackOutput {
            restored_application: self.restored.as_ref().map(ApplicationInfo::from),
            instance_data: self.instance_data,
            renames: self.renames,
            deleted_application: self.deleted_application,
        }
    }

    fn autoscaler_disabled(&self, guid: &str) -> bool {
        self.instance_data
            .iter()
            .any(|data| data.guid == guid && data.disable_autoscaler_performed)
    }
}

async fn swap_rollback(ctx: &TaskContext, request: &SwapRollbackRequest) -> Result<RollbackOutput, TaskError> {
    super::require(&request.release_name_prefix, "release_name_prefix")?;
    super::require(&request.new_application.application_guid, "new_application.application_guid")?;
    if request.swap_route_occurred && request.final_routes.is_empty() {
        return Err(TaskError::InvalidArguments(
            "final_routes must name at least one route".to_string(),
        ));
    }
    let (config, _workdir) = ctx
        .request_config(&request.infra, request.timeout_interval_in_min)
        .await?;

    let mut state = Rollback::default();
    if request.swap_route_occurred {
        after_swap(ctx, &config, request, &mut state).await?;
    } else {
        before_swap(ctx, &config, request, &mut state).await?;
    }
    Ok(state.output())
}

// ============================================================================
// Before the swap
// ============================================================================

async fn before_swap(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SwapRollbackRequest,
    state: &mut Rollback,
) -> Result<(), TaskError> {
    let prefix = request.release_name_prefix.as_str();

    let unit = CommandUnit::open(ctx.log(), command_units::UPSIZE);
    let result = restore_active(ctx, config, request, state, &unit).await;
    unit.finish(&result);
    result?;

    let unit = CommandUnit::open(ctx.log(), command_units::DOWNSIZE);
    let result = async {
        match releases::refresh_optional(ctx, config, prefix, Some(&request.new_application)).await? {
            Some(new) => downsize_new(ctx, config, request, &new, state, &unit).await,
            None => {
                unit.info("New application no longer exists, nothing to downsize");
                Ok(())
            }
        }
    }
    .await;
    unit.finish(&result);
    result?;

    let unit = CommandUnit::open(ctx.log(), command_units::WRAPUP);
    let result = wrapup(ctx, config, request, state, &unit).await;
    unit.finish(&result);
    result
}

async fn restore_active(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SwapRollbackRequest,
    state: &mut Rollback,
    unit: &CommandUnit<'_>,
) -> Result<(), TaskError> {
    let prefix = request.release_name_prefix.as_str();
    let Some(expected) = &request.active_application else {
        unit.info("No previous active application, nothing to restore");
        return Ok(());
    };
    let Some(active) = releases::refresh_optional(ctx, config, prefix, Some(expected)).await? else {
        unit.warn(format!(
            "Previous active application {} no longer exists",
            expected.application_name
        ));
        return Ok(());
    };

    let restored = upsize_restored(ctx, config, request, expected, active, state, unit).await?;
    state.restored = Some(restored);
    Ok(())
}

// ============================================================================
// After the swap
// ============================================================================

async fn after_swap(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SwapRollbackRequest,
    state: &mut Rollback,
) -> Result<(), TaskError> {
    let unit = CommandUnit::open(ctx.log(), command_units::SWAP_ROLLBACK);
    let result = reverse_swap(ctx, config, request, state, &unit).await;
    unit.finish(&result);
    let new = result?;

    let delete_new = new.as_ref().is_some_and(|app| app.instance_count == 0);

    let unit = CommandUnit::open(ctx.log(), command_units::DOWNSIZE);
    let result = async {
        if let Some(new) = &new {
            downsize_new(ctx, config, request, new, state, &unit).await?;
            if delete_new {
                unit.info(format!("{} never ran any instances, deleting it", new.name));
                state.deleted_application = delete::delete_by_guid(
                    ctx,
                    config,
                    &request.release_name_prefix,
                    &new.guid,
                    &unit,
                )
                .await?;
            }
        }
        Ok::<(), TaskError>(())
    }
    .await;
    unit.finish(&result);
    result?;

    let unit = CommandUnit::open(ctx.log(), command_units::WRAPUP);
    let result = async {
        if state.deleted_application.is_some() {
            restore_previous_inactive_name(ctx, config, request, state, &unit).await?;
        }
        wrapup(ctx, config, request, state, &unit).await
    }
    .await;
    unit.finish(&result);
    result
}

/// Validate the space, restore the rollback target and reverse the route and
/// name exchange. Returns New's descriptor as it was before any change.
async fn reverse_swap(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SwapRollbackRequest,
    state: &mut Rollback,
    unit: &CommandUnit<'_>,
) -> Result<Option<ApplicationDescriptor>, TaskError> {
    let prefix = request.release_name_prefix.as_str();

    // Step 1: Confirm the space matches the swap we are undoing
    unit.info("Step 1: Resolving releases");
    let set = releases::list_releases(
        ctx,
        config,
        prefix,
        &ActiveSelector::Routes(request.final_routes.clone()),
        request.naming_strategy,
        unit,
    )
    .await?;
    let target = rollback_target(request, set.inactive.as_ref(), unit)?;
    let new = match set.find_by_guid(&request.new_application.application_guid) {
        Some(_) => Some(releases::refresh(ctx, config, prefix, &request.new_application).await?),
        None => {
            unit.warn(format!(
                "New application {} no longer exists",
                request.new_application.application_name
            ));
            None
        }
    };

    // Step 2: Bring the rollback target back
    let mut restored = None;
    if let (Some(expected), Some(summary)) = (&request.active_application, target) {
        let current = releases::refresh(ctx, config, prefix, expected).await?;
        let app = if request.upsize_inactive_app {
            unit.info(format!("Step 2: Restoring {}", summary.name));
            upsize_restored(ctx, config, request, expected, current, state, unit).await?
        } else {
            unit.info(format!("Step 2: Skipping upsize of {}", summary.name));
            current
        };
        restored = Some(app);
    } else if request.upsize_inactive_app {
        unit.info("Step 2: No previous active application, nothing to upsize");
    }

    // Step 3: Routes back
    unit.info("Step 3: Restoring production routes");
    if let Some(app) = &restored {
        routes::map_missing(ctx, config, &app.name, &request.final_routes, unit).await?;
        routes::unmap_present(ctx, config, &app.name, &request.temp_routes, unit).await?;
    }
    if let Some(new) = &new {
        let routes: Vec<String> = request
            .final_routes
            .iter()
            .chain(request.temp_routes.iter())
            .cloned()
            .collect();
        routes::unmap_present(ctx, config, &new.name, &routes, unit).await?;
    }

    // Step 4: Names back
    if request.naming_strategy == NamingStrategy::NonVersioned {
        if let Some(app) = &restored {
            unit.info("Step 4: Restoring application names");
            let delete_new = new.as_ref().is_some_and(|n| n.instance_count == 0);
            let mut steps: Vec<(&str, String)> = Vec::new();
            if let Some(new) = &new {
                steps.push((new.guid.as_str(), naming::interim_name(prefix)));
            }
            steps.push((app.guid.as_str(), prefix.to_string()));
            if let (Some(new), false) = (&new, delete_new) {
                steps.push((new.guid.as_str(), naming::inactive_name(prefix)));
            }
            for (guid, target) in steps {
                if let Some(record) = rename::rename_by_guid(ctx, config, prefix, guid, &target, unit).await? {
                    state.renames.push(record);
                }
            }
        }
    }

    if let Some(app) = &restored {
        state.restored = Some(releases::refresh(ctx, config, prefix, &ApplicationInfo::from(app)).await?);
    }
    Ok(new)
}

/// The resolved inactive application, checked against the pre-swap active one
fn rollback_target(
    request: &SwapRollbackRequest,
    inactive: Option<&ApplicationSummary>,
    unit: &CommandUnit<'_>,
) -> Result<Option<ApplicationSummary>, TaskError> {
    match (&request.active_application, inactive) {
        (Some(expected), Some(found)) if found.guid == expected.application_guid => Ok(Some(found.clone())),
        (Some(expected), Some(found)) => Err(TaskError::InvalidInfraState(format!(
            "expected {} (guid {}) to be the inactive application but found {} (guid {})",
            expected.application_name, expected.application_guid, found.name, found.guid
        ))),
        (Some(expected), None) => {
            unit.error(format!(
                "No inactive application found, {} cannot be restored",
                expected.application_name
            ));
            Err(TaskError::InvalidInfraState(format!(
                "expected {} (guid {}) to be the inactive application but none was found",
                expected.application_name, expected.application_guid
            )))
        }
        (None, _) => Ok(None),
    }
}

async fn restore_previous_inactive_name(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SwapRollbackRequest,
    state: &mut Rollback,
    unit: &CommandUnit<'_>,
) -> Result<(), TaskError> {
    let Some(inactive) = &request.inactive_application else {
        return Ok(());
    };
    let Some(old_name) = &inactive.old_name else {
        return Ok(());
    };
    if releases::find_by_guid(ctx, config, &request.release_name_prefix, &inactive.application_guid)
        .await?
        .is_empty()
    {
        unit.warn(format!(
            "Previous inactive application {} no longer exists",
            inactive.application_name
        ));
        return Ok(());
    }

    unit.info(format!("Renaming previous inactive application back to {}", old_name));
    if let Some(record) = rename::rename_by_guid(
        ctx,
        config,
        &request.release_name_prefix,
        &inactive.application_guid,
        old_name,
        unit,
    )
    .await?
    {
        state.renames.push(record);
    }
    Ok(())
}

// ============================================================================
// Shared steps
// ============================================================================

#[allow(clippy::too_many_arguments)]
async fn upsize_restored(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SwapRollbackRequest,
    expected: &ApplicationInfo,
    mut app: ApplicationDescriptor,
    state: &mut Rollback,
    unit: &CommandUnit<'_>,
) -> Result<ApplicationDescriptor, TaskError> {
    if app.instance_count < expected.running_count {
        unit.info(format!(
            "Upsizing {} back to {} instance(s)",
            app.name, expected.running_count
        ));
        let outcome = resize::resize_application(
            ctx,
            config,
            &app,
            expected.running_count,
            request.use_app_autoscaler,
            unit,
        )
        .await?;
        state.instance_data.push(outcome.instance_data);
        app = outcome.application;
    } else {
        unit.info(format!(
            "{} already runs {} instance(s)",
            app.name, app.instance_count
        ));
    }

    let mapped = routes::map_missing(ctx, config, &app.name, &expected.attached_routes, unit).await?;
    app.attached_routes.extend(mapped);
    Ok(app)
}

async fn downsize_new(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SwapRollbackRequest,
    new: &ApplicationDescriptor,
    state: &mut Rollback,
    unit: &CommandUnit<'_>,
) -> Result<(), TaskError> {
    let current = releases::refresh(ctx, config, &request.release_name_prefix, &ApplicationInfo::from(new)).await?;
    if current.instance_count > 0 {
        unit.info(format!("Downsizing {} to 0 instances", current.name));
        let outcome =
            resize::resize_application(ctx, config, &current, 0, request.use_app_autoscaler, unit).await?;
        state.instance_data.push(outcome.instance_data);
    }
    routes::unmap_all(ctx, config, &current.name, unit).await?;
    Ok(())
}

/// Re-enable the restored application's autoscaler, matched by guid.
async fn wrapup(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SwapRollbackRequest,
    state: &Rollback,
    unit: &CommandUnit<'_>,
) -> Result<(), TaskError> {
    if request.use_app_autoscaler {
        if let (Some(expected), Some(restored)) = (&request.active_application, &state.restored) {
            if expected.is_autoscaler_enabled || state.autoscaler_disabled(&restored.guid) {
                autoscaler::enable_by_guid(ctx, config, &request.release_name_prefix, &restored.guid, unit)
                    .await?;
            }
        }
    }
    unit.info("Rollback complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrations::swap_routes::SwapRoutes;
    use crate::platform::PlatformOperation;
    use crate::registry::create_task_registry;
    use crate::test_support::{harness, infra, Harness};
    use crate::types::SwapRoutesRequest;

    fn info(h: &Harness, name: &str) -> ApplicationInfo {
        ApplicationInfo::from(&h.platform.application(name).unwrap())
    }

    struct Deployment {
        active: ApplicationInfo,
        inactive: ApplicationInfo,
        new: ApplicationInfo,
    }

    /// Space as blue-green setup and resize leave it, with snapshots
    fn deploy(h: &Harness) -> Deployment {
        let previous = h.platform.add_application("svc__0", 0, &[]);
        h.platform.add_application("svc", 2, &["svc.example.com"]);
        h.platform
            .add_application("svc__INACTIVE", 2, &["svc-temp.example.com"]);
        let mut inactive = info(h, "svc__0");
        inactive.old_name = Some("svc__INACTIVE".to_string());
        assert_eq!(inactive.application_guid, previous);
        Deployment {
            active: info(h, "svc"),
            inactive,
            new: info(h, "svc__INACTIVE"),
        }
    }

    async fn swap(h: &Harness, d: &Deployment, downsize: bool) {
        let request = SwapRoutesRequest {
            infra: infra(),
            release_name_prefix: "svc".to_string(),
            active_application: Some(d.active.clone()),
            inactive_application: Some(d.inactive.clone()),
            new_application: d.new.clone(),
            final_routes: vec!["svc.example.com".to_string()],
            temp_routes: vec!["svc-temp.example.com".to_string()],
            downsize_old_application: downsize,
            idle_instance_count: 0,
            use_app_autoscaler: false,
            naming_strategy: NamingStrategy::NonVersioned,
            timeout_interval_in_min: 1,
        };
        SwapRoutes
            .execute(&h.ctx, TaskRequest::SwapRoutes(request))
            .await
            .unwrap();
    }

    fn request(d: &Deployment, swap_route_occurred: bool) -> SwapRollbackRequest {
        SwapRollbackRequest {
            infra: infra(),
            release_name_prefix: "svc".to_string(),
            active_application: Some(d.active.clone()),
            inactive_application: Some(d.inactive.clone()),
            new_application: d.new.clone(),
            final_routes: vec!["svc.example.com".to_string()],
            temp_routes: vec!["svc-temp.example.com".to_string()],
            instance_data: Vec::new(),
            swap_route_occurred,
            upsize_inactive_app: true,
            use_app_autoscaler: false,
            naming_strategy: NamingStrategy::NonVersioned,
            timeout_interval_in_min: 1,
        }
    }

    async fn run(h: &Harness, request: SwapRollbackRequest) -> Result<RollbackOutput, TaskError> {
        match SwapRollback
            .execute(&h.ctx, TaskRequest::SwapRollback(request))
            .await?
        {
            TaskOutput::Rollback(output) => Ok(output),
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_then_rollback_restores_names() {
        let h = harness();
        let d = deploy(&h);
        let before: Vec<(String, Option<String>)> = h
            .platform
            .application_names()
            .into_iter()
            .map(|name| (name.clone(), h.platform.guid_of(&name)))
            .collect();

        swap(&h, &d, true).await;
        assert_eq!(h.platform.guid_of("svc"), Some(d.new.application_guid.clone()));

        let out = run(&h, request(&d, true)).await.unwrap();

        let after: Vec<(String, Option<String>)> = h
            .platform
            .application_names()
            .into_iter()
            .map(|name| (name.clone(), h.platform.guid_of(&name)))
            .collect();
        assert_eq!(before, after);

        let restored = h.platform.application("svc").unwrap();
        assert_eq!(restored.running_instance_count, 2);
        assert!(restored.has_route("svc.example.com"));
        let failed = h.platform.application("svc__INACTIVE").unwrap();
        assert_eq!(failed.instance_count, 0);
        assert!(failed.attached_routes.is_empty());
        assert_eq!(
            out.restored_application.unwrap().application_guid,
            d.active.application_guid
        );
        assert!(out.deleted_application.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upsize_disabled_only_downsizes() {
        let h = harness();
        let d = deploy(&h);
        swap(&h, &d, true).await;
        h.platform.clear_calls();
        let mut input = request(&d, true);
        input.upsize_inactive_app = false;

        run(&h, input).await.unwrap();

        let resizes = h.platform.calls_of(PlatformOperation::Resize);
        assert_eq!(resizes.len(), 1);
        assert_eq!(resizes[0].guid.as_deref(), Some(d.new.application_guid.as_str()));
        assert_eq!(resizes[0].detail, "0");
        assert_eq!(h.platform.application("svc").unwrap().instance_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ambiguous_inactive_fails_without_mutation() {
        let h = harness();
        let new = h.platform.add_application("svc", 2, &["svc.example.com"]);
        let old = h.platform.add_application("svc__INACTIVE", 2, &[]);
        h.platform.add_application("svc__inactive", 1, &[]);
        let mut input = request(
            &Deployment {
                active: ApplicationInfo {
                    application_name: "svc".to_string(),
                    application_guid: old,
                    running_count: 2,
                    ..Default::default()
                },
                inactive: ApplicationInfo::default(),
                new: ApplicationInfo {
                    application_name: "svc__INACTIVE".to_string(),
                    application_guid: new,
                    ..Default::default()
                },
            },
            true,
        );
        input.inactive_application = None;

        let response = create_task_registry()
            .execute(&h.ctx, orchestrations::SWAP_ROLLBACK, TaskRequest::SwapRollback(input))
            .await
            .unwrap();

        assert!(!response.is_success());
        assert!(response.error_message.unwrap().contains("Invalid infra state"));
        assert_eq!(h.platform.mutation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_inactive_fails_without_mutation() {
        let h = harness();
        let d = deploy(&h);
        swap(&h, &d, false).await;
        h.platform.clear_calls();
        let mut input = request(&d, true);
        input.active_application = Some(d.inactive.clone());

        let err = run(&h, input).await.unwrap_err();

        assert!(matches!(err, TaskError::InvalidInfraState(_)));
        assert_eq!(h.platform.mutation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_rollback_target_leaves_new_application_serving() {
        let h = harness();
        let new = h.platform.add_application("svc", 2, &["svc.example.com"]);
        let d = Deployment {
            active: ApplicationInfo {
                application_name: "svc".to_string(),
                application_guid: "deleted-guid".to_string(),
                running_count: 2,
                ..Default::default()
            },
            inactive: ApplicationInfo::default(),
            new: ApplicationInfo {
                application_name: "svc__INACTIVE".to_string(),
                application_guid: new,
                ..Default::default()
            },
        };
        let mut input = request(&d, true);
        input.inactive_application = None;

        let response = create_task_registry()
            .execute(&h.ctx, orchestrations::SWAP_ROLLBACK, TaskRequest::SwapRollback(input))
            .await
            .unwrap();

        assert!(!response.is_success());
        assert!(response.error_message.unwrap().contains("Invalid infra state"));
        assert_eq!(h.platform.mutation_count(), 0);
        let serving = h.platform.application("svc").unwrap();
        assert_eq!(serving.instance_count, 2);
        assert!(serving.has_route("svc.example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_new_application_is_deleted() {
        let h = harness();
        let previous = h.platform.add_application("svc__0", 0, &[]);
        let old = h
            .platform
            .add_application("svc__INACTIVE", 2, &["svc-temp.example.com"]);
        let new = h.platform.add_application("svc", 0, &["svc.example.com"]);
        let d = Deployment {
            active: ApplicationInfo {
                application_name: "svc".to_string(),
                application_guid: old.clone(),
                attached_routes: vec!["svc.example.com".to_string()],
                running_count: 2,
                ..Default::default()
            },
            inactive: ApplicationInfo {
                application_name: "svc__0".to_string(),
                application_guid: previous.clone(),
                old_name: Some("svc__INACTIVE".to_string()),
                ..Default::default()
            },
            new: ApplicationInfo {
                application_name: "svc__INACTIVE".to_string(),
                application_guid: new.clone(),
                ..Default::default()
            },
        };

        let out = run(&h, request(&d, true)).await.unwrap();

        assert_eq!(out.deleted_application.as_deref(), Some("svc__interim"));
        assert!(h.platform.application_by_guid(&new).is_none());
        assert_eq!(h.platform.guid_of("svc"), Some(old));
        assert_eq!(h.platform.guid_of("svc__INACTIVE"), Some(previous));
        assert!(h.platform.application("svc").unwrap().has_route("svc.example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_before_swap_only_resizes() {
        let h = harness();
        let d = deploy(&h);
        let config = crate::test_support::request_config(1);
        crate::platform::Platform::resize_application(h.platform.as_ref(), &config, "svc", 1)
            .await
            .unwrap();
        h.platform.clear_calls();

        let out = run(&h, request(&d, false)).await.unwrap();

        assert!(h.platform.calls_of(PlatformOperation::Rename).is_empty());
        assert!(h.platform.calls_of(PlatformOperation::Delete).is_empty());
        assert_eq!(h.platform.application("svc").unwrap().running_instance_count, 2);
        let new = h.platform.application("svc__INACTIVE").unwrap();
        assert_eq!(new.instance_count, 0);
        assert!(new.attached_routes.is_empty());
        assert_eq!(out.instance_data.len(), 2);
        let units: Vec<String> = h.sink.unit_statuses().into_iter().map(|(u, _)| u).collect();
        assert_eq!(units, vec!["Upsize", "Downsize", "Wrapup"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autoscaler_reenabled_last_on_restored_guid() {
        let h = harness();
        let mut d = deploy(&h);
        h.platform.bind_autoscaler("svc", true);
        d.active.is_autoscaler_enabled = true;
        swap(&h, &d, true).await;
        // swap left the outgoing application downsized
        h.platform.bind_autoscaler("svc__INACTIVE", false);
        h.platform.clear_calls();
        let mut input = request(&d, true);
        input.use_app_autoscaler = true;

        run(&h, input).await.unwrap();

        let calls = h.platform.calls();
        let last_mutation = calls
            .iter()
            .rev()
            .find(|call| call.operation.is_mutation())
            .unwrap();
        assert_eq!(last_mutation.operation, PlatformOperation::EnableAutoscaler);
        assert_eq!(
            last_mutation.guid.as_deref(),
            Some(d.active.application_guid.as_str())
        );
        assert_eq!(h.platform.autoscaler_state("svc"), Some(true));
    }
}
