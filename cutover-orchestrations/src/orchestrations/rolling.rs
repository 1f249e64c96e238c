//! Rolling update orchestrations
//!
//! Updates one named application in place. There is no new/active/inactive
//! split: the deploy captures the application's prior state, pushes the new
//! release with the rolling strategy and waits for steady state; the
//! rollback restores what was captured.

use async_trait::async_trait;
use cutover_models::{ApplicationDescriptor, ApplicationInfo, ApplicationSummary, RequestConfig};

use crate::activities::create::{self, NewApplication};
use crate::activities::{autoscaler, resize, routes};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::manifest;
use crate::names::{command_units, orchestrations};
use crate::progress::CommandUnit;
use crate::registry::TaskHandler;
use crate::steady_state::wait_for_steady_state;
use crate::types::{
    RollingDeployOutput, RollingDeployRequest, RollingRollbackOutput, RollingRollbackRequest,
    TaskOutput, TaskRequest,
};

pub struct RollingDeploy;

pub struct RollingRollback;

#[async_trait]
impl TaskHandler for RollingDeploy {
    fn name(&self) -> &'static str {
        orchestrations::ROLLING_DEPLOY
    }

    async fn execute(&self, ctx: &TaskContext, request: TaskRequest) -> Result<TaskOutput, TaskError> {
        match request {
            TaskRequest::RollingDeploy(input) => deploy(ctx, &input).await.map(TaskOutput::RollingDeploy),
            other => Err(super::mismatch(self.name(), &other)),
        }
    }
}

#[async_trait]
impl TaskHandler for RollingRollback {
    fn name(&self) -> &'static str {
        orchestrations::ROLLING_ROLLBACK
    }

    async fn execute(&self, ctx: &TaskContext, request: TaskRequest) -> Result<TaskOutput, TaskError> {
        match request {
            TaskRequest::RollingRollback(input) => {
                rollback(ctx, &input).await.map(TaskOutput::RollingRollback)
            }
            other => Err(super::mismatch(self.name(), &other)),
        }
    }
}

/// The application named exactly `name`, if it exists.
async fn find_application(
    ctx: &TaskContext,
    config: &RequestConfig,
    name: &str,
) -> Result<Option<ApplicationSummary>, TaskError> {
    let mut matches: Vec<ApplicationSummary> = ctx
        .platform()
        .list_previous_releases(config, name)
        .await?
        .into_iter()
        .filter(|app| app.name == name)
        .collect();
    if matches.len() > 1 {
        return Err(TaskError::InvalidInfraState(format!(
            "{} applications are named {}",
            matches.len(),
            name
        )));
    }
    Ok(matches.pop())
}

fn desired_instances(request: &RollingDeployRequest) -> u32 {
    request
        .desired_instance_count
        .or_else(|| manifest::declared_instances(&request.manifest))
        .unwrap_or(1)
}

// ============================================================================
// Deploy
// ============================================================================

async fn deploy(ctx: &TaskContext, request: &RollingDeployRequest) -> Result<RollingDeployOutput, TaskError> {
    super::require(&request.application_name, "application_name")?;
    super::require(&request.manifest, "manifest")?;
    let (config, _workdir) = ctx
        .request_config(&request.infra, request.timeout_interval_in_min)
        .await?;

    let unit = CommandUnit::open(ctx.log(), command_units::DEPLOY);
    let result = deploy_impl(ctx, &config, request, &unit).await;
    unit.finish(&result);
    let (app, prior, autoscaler_disabled) = result?;

    let unit = CommandUnit::open(ctx.log(), command_units::WRAPUP);
    let result = async {
        if autoscaler_disabled {
            autoscaler::enable_by_guid(ctx, &config, &request.application_name, &app.guid, &unit).await?;
        }
        unit.info(format!(
            "Rolling deployment of {} complete: {} instance(s) running",
            app.name, app.running_instance_count
        ));
        Ok::<(), TaskError>(())
    }
    .await;
    unit.finish(&result);
    result?;

    let mut application = ApplicationInfo::from(&app);
    application.is_autoscaler_enabled |= autoscaler_disabled;
    Ok(RollingDeployOutput {
        application,
        first_deployment: prior.is_none(),
        prior_application: prior,
    })
}

async fn deploy_impl(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &RollingDeployRequest,
    unit: &CommandUnit<'_>,
) -> Result<(ApplicationDescriptor, Option<ApplicationInfo>, bool), TaskError> {
    let name = request.application_name.as_str();

    unit.info(format!("Step 1: Looking up application {}", name));
    let prior = match find_application(ctx, config, name).await? {
        Some(summary) => {
            let current = ctx.platform().get_application_by_name(config, &summary.name).await?;
            let mut info = ApplicationInfo::from(&current);
            info.is_autoscaler_enabled = request.use_app_autoscaler
                && autoscaler::is_enabled(ctx, config, &current.name, &current.guid, unit).await;
            unit.info(format!(
                "Found {} with {} instance(s), routes [{}]",
                name,
                info.running_count,
                info.attached_routes.join(", ")
            ));
            Some(info)
        }
        None => {
            unit.info(format!("{} does not exist yet, this is the first deployment", name));
            None
        }
    };

    unit.info("Step 2: Checking artifact");
    create::check_artifact(&request.artifact, unit).await?;

    let autoscaler_disabled = match &prior {
        Some(info) if info.is_autoscaler_enabled => {
            unit.info("Step 3: Suspending autoscaler");
            autoscaler::disable_if_enabled(ctx, config, name, &info.application_guid, unit).await?
        }
        _ => false,
    };

    let desired = desired_instances(request);
    unit.info(format!("Step 4: Pushing {} with {} instance(s)", name, desired));
    let staged = create::stage(
        config,
        &NewApplication {
            name,
            manifest: &request.manifest,
            artifact: &request.artifact,
            instances: Some(desired),
            no_route: false,
            rolling: true,
        },
    )
    .await?;
    create::create_application(ctx, config, &staged, unit).await?;
    routes::map_missing(ctx, config, name, &request.routes, unit).await?;

    unit.info("Step 5: Waiting for steady state");
    let app = wait_for_steady_state(ctx, config, name, desired, unit).await?;
    Ok((app, prior, autoscaler_disabled))
}

// ============================================================================
// Rollback
// ============================================================================

async fn rollback(
    ctx: &TaskContext,
    request: &RollingRollbackRequest,
) -> Result<RollingRollbackOutput, TaskError> {
    super::require(&request.application_name, "application_name")?;
    let (config, _workdir) = ctx
        .request_config(&request.infra, request.timeout_interval_in_min)
        .await?;

    let unit = CommandUnit::open(ctx.log(), command_units::ROLLBACK);
    let result = match &request.prior_application {
        None => remove_first_deployment(ctx, &config, request, &unit).await,
        Some(prior) => restore_prior(ctx, &config, request, prior, &unit)
            .await
            .map(|app| (Some(app), false)),
    };
    unit.finish(&result);
    let (app, deleted) = result?;

    let unit = CommandUnit::open(ctx.log(), command_units::WRAPUP);
    let result = async {
        let restore_autoscaler = request.use_app_autoscaler
            && request
                .prior_application
                .as_ref()
                .is_some_and(|prior| prior.is_autoscaler_enabled);
        if let (true, Some(app)) = (restore_autoscaler, &app) {
            autoscaler::enable_by_guid(ctx, &config, &request.application_name, &app.guid, &unit).await?;
        }
        unit.info(format!("Rollback of {} complete", request.application_name));
        Ok::<(), TaskError>(())
    }
    .await;
    unit.finish(&result);
    result?;

    Ok(RollingRollbackOutput {
        application: app.as_ref().map(ApplicationInfo::from),
        deleted,
    })
}

/// Nothing existed before the deployment, so the application goes.
async fn remove_first_deployment(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &RollingRollbackRequest,
    unit: &CommandUnit<'_>,
) -> Result<(Option<ApplicationDescriptor>, bool), TaskError> {
    let name = request.application_name.as_str();
    unit.info(format!("Step 1: Looking up application {}", name));
    if find_application(ctx, config, name).await?.is_none() {
        unit.info(format!("{} does not exist, nothing to roll back", name));
        return Ok((None, false));
    }

    unit.info(format!("Step 2: Deleting {} created by the first deployment", name));
    ctx.platform().delete_application(config, name).await?;
    Ok((None, true))
}

async fn restore_prior(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &RollingRollbackRequest,
    prior: &ApplicationInfo,
    unit: &CommandUnit<'_>,
) -> Result<ApplicationDescriptor, TaskError> {
    let name = request.application_name.as_str();
    unit.info(format!("Step 1: Looking up application {}", name));
    let current = find_application(ctx, config, name).await?.ok_or_else(|| {
        TaskError::InvalidInfraState(format!("{} no longer exists, cannot restore it", name))
    })?;
    if current.guid != prior.application_guid {
        return Err(TaskError::InvalidInfraState(format!(
            "{} now has guid {}, expected {}",
            name, current.guid, prior.application_guid
        )));
    }

    if request.use_app_autoscaler && prior.is_autoscaler_enabled {
        autoscaler::disable_if_enabled(ctx, config, name, &current.guid, unit).await?;
    }

    if let Some(release) = &request.previous_release {
        unit.info(format!("Step 2: Pushing the previous release of {}", name));
        create::check_artifact(&release.artifact, unit).await?;
        let staged = create::stage(
            config,
            &NewApplication {
                name,
                manifest: &release.manifest,
                artifact: &release.artifact,
                instances: Some(prior.running_count),
                no_route: false,
                rolling: true,
            },
        )
        .await?;
        create::create_application(ctx, config, &staged, unit).await?;
    }

    unit.info(format!("Step 3: Restoring {} instance(s)", prior.running_count));
    let app = ctx.platform().get_application_by_name(config, name).await?;
    let app = if app.instance_count == prior.running_count && app.is_steady_at(prior.running_count) {
        app
    } else {
        resize::resize_application(ctx, config, &app, prior.running_count, false, unit)
            .await?
            .application
    };

    unit.info("Step 4: Restoring routes");
    routes::map_missing(ctx, config, name, &prior.attached_routes, unit).await?;
    let extra: Vec<String> = app
        .attached_routes
        .iter()
        .filter(|route| !prior.attached_routes.contains(route))
        .cloned()
        .collect();
    routes::unmap_present(ctx, config, name, &extra, unit).await?;

    Ok(ctx.platform().get_application_by_name(config, name).await?)
}
