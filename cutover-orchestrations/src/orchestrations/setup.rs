//! Setup orchestrations
//!
//! Basic and blue-green setup both create the next generation of a service
//! at zero instances and without production routes. They differ in how the
//! active application is recognised and which identity slot the new
//! application takes.

use async_trait::async_trait;
use cutover_models::{
    ApplicationDescriptor, ApplicationInfo, ApplicationSummary, CreateApplicationRequest,
    NamingStrategy, RequestConfig,
};
use std::collections::HashSet;

use crate::activities::create::{self, NewApplication};
use crate::activities::{autoscaler, delete, releases, rename, routes};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::names::{command_units, orchestrations};
use crate::naming;
use crate::platform::PlatformError;
use crate::progress::CommandUnit;
use crate::registry::TaskHandler;
use crate::resolver::{ActiveSelector, ReleaseSet};
use crate::types::{RenameRecord, SetupOutput, SetupRequest, TaskOutput, TaskRequest};

pub struct BasicSetup;

pub struct BlueGreenSetup;

#[async_trait]
impl TaskHandler for BasicSetup {
    fn name(&self) -> &'static str {
        orchestrations::BASIC_SETUP
    }

    async fn execute(&self, ctx: &TaskContext, request: TaskRequest) -> Result<TaskOutput, TaskError> {
        match request {
            TaskRequest::BasicSetup(input) => setup(ctx, &input, SetupMode::Basic)
                .await
                .map(TaskOutput::Setup),
            other => Err(super::mismatch(self.name(), &other)),
        }
    }
}

#[async_trait]
impl TaskHandler for BlueGreenSetup {
    fn name(&self) -> &'static str {
        orchestrations::BLUE_GREEN_SETUP
    }

    async fn execute(&self, ctx: &TaskContext, request: TaskRequest) -> Result<TaskOutput, TaskError> {
        match request {
            TaskRequest::BlueGreenSetup(input) => setup(ctx, &input, SetupMode::BlueGreen)
                .await
                .map(TaskOutput::Setup),
            other => Err(super::mismatch(self.name(), &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetupMode {
    Basic,
    BlueGreen,
}

/// Name changes derived from one release listing
#[derive(Debug, Default)]
struct SetupPlan {
    /// Idle interim leftovers, deleted outright
    discard: Vec<ApplicationSummary>,
    /// In execution order
    renames: Vec<PlannedRename>,
    new_name: String,
    revision: u32,
}

#[derive(Debug)]
struct PlannedRename {
    app: ApplicationSummary,
    to: String,
}

fn validate(request: &SetupRequest, mode: SetupMode) -> Result<(), TaskError> {
    super::require(&request.release_name_prefix, "release_name_prefix")?;
    super::require(&request.manifest, "manifest")?;
    if request.release_name_prefix.contains(naming::DELIMITER) {
        return Err(TaskError::InvalidArguments(format!(
            "release_name_prefix must not contain '{}'",
            naming::DELIMITER
        )));
    }
    if mode == SetupMode::BlueGreen && request.routes.is_empty() {
        return Err(TaskError::InvalidArguments(
            "blue-green setup requires at least one production route".to_string(),
        ));
    }
    Ok(())
}

fn plan(
    prefix: &str,
    set: &ReleaseSet,
    mode: SetupMode,
    strategy: NamingStrategy,
) -> Result<SetupPlan, TaskError> {
    let mut plan = SetupPlan::default();
    let mut revision = set.next_revision();

    for interim in &set.interim {
        if interim.instance_count == 0 && interim.urls.is_empty() {
            plan.discard.push(interim.clone());
        } else {
            plan.renames.push(PlannedRename {
                app: interim.clone(),
                to: naming::versioned_name(prefix, revision),
            });
            revision += 1;
        }
    }
    plan.revision = revision;

    plan.new_name = match strategy {
        NamingStrategy::Versioned => naming::versioned_name(prefix, revision),
        NamingStrategy::NonVersioned => {
            if let Some(active) = &set.active {
                if naming::is_inactive_name(prefix, &active.name) {
                    return Err(TaskError::InvalidInfraState(format!(
                        "active application {} occupies the inactive slot",
                        active.name
                    )));
                }
            }
            if let Some(inactive) = set
                .inactive
                .as_ref()
                .filter(|app| naming::is_inactive_name(prefix, &app.name))
            {
                plan.renames.push(PlannedRename {
                    app: inactive.clone(),
                    to: naming::versioned_name(prefix, revision),
                });
            }

            match mode {
                SetupMode::BlueGreen => naming::inactive_name(prefix),
                SetupMode::Basic => {
                    if let Some(active) = set.active.as_ref().filter(|app| app.name == prefix) {
                        plan.renames.push(PlannedRename {
                            app: active.clone(),
                            to: naming::inactive_name(prefix),
                        });
                    }
                    prefix.to_string()
                }
            }
        }
    };

    if let Some(holder) = set.find_by_name(&plan.new_name) {
        let moved = plan.renames.iter().any(|r| r.app.guid == holder.guid)
            || plan.discard.iter().any(|app| app.guid == holder.guid);
        if !moved {
            return Err(TaskError::InvalidInfraState(format!(
                "application name {} is already taken",
                plan.new_name
            )));
        }
    }
    Ok(plan)
}

async fn setup(ctx: &TaskContext, request: &SetupRequest, mode: SetupMode) -> Result<SetupOutput, TaskError> {
    validate(request, mode)?;
    let (config, _workdir) = ctx
        .request_config(&request.infra, request.timeout_interval_in_min)
        .await?;

    let fetch = CommandUnit::open(ctx.log(), command_units::FETCH_FILES);
    let staged = create::check_artifact(&request.artifact, &fetch).await;
    fetch.finish(&staged);
    staged?;

    let unit = CommandUnit::open(ctx.log(), command_units::DEPLOY);
    let result = setup_impl(ctx, &config, request, mode, &unit).await;
    unit.finish(&result);
    result
}

async fn setup_impl(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SetupRequest,
    mode: SetupMode,
    unit: &CommandUnit<'_>,
) -> Result<SetupOutput, TaskError> {
    let prefix = request.release_name_prefix.as_str();

    unit.info("Step 1: Resolving previous releases");
    let selector = match mode {
        SetupMode::BlueGreen => ActiveSelector::Routes(request.routes.clone()),
        SetupMode::Basic => ActiveSelector::LatestRunning,
    };
    let set = releases::list_releases(ctx, config, prefix, &selector, request.naming_strategy, unit).await?;

    // Names and manifest are settled before anything is mutated
    unit.info("Step 2: Planning application names");
    let plan = plan(prefix, &set, mode, request.naming_strategy)?;
    unit.info(format!("New application name: {}", plan.new_name));
    let create_request = create::stage(
        config,
        &NewApplication {
            name: &plan.new_name,
            manifest: &request.manifest,
            artifact: &request.artifact,
            instances: Some(0),
            no_route: true,
            rolling: false,
        },
    )
    .await?;

    // Renames, create and temporary routes are reverted together on failure
    let existing: HashSet<String> = set.members().map(|app| app.guid.clone()).collect();
    let mut journal: Vec<RenameRecord> = Vec::new();
    let created = match apply_plan(ctx, config, request, mode, &plan, &create_request, &mut journal, unit).await {
        Ok(app) => app,
        Err(e) => {
            unit.warn(format!("Setup failed, reverting: {}", e));
            let revert_errors = revert(ctx, config, prefix, &plan.new_name, &existing, &journal, unit).await;
            return Err(e.with_revert_errors(revert_errors));
        }
    };

    let mut active_application = set.active.as_ref().map(|app| snapshot(app, &journal));
    let inactive_application = set.inactive.as_ref().map(|app| snapshot(app, &journal));
    if let Some(active) = active_application.as_mut() {
        if request.use_app_autoscaler {
            active.is_autoscaler_enabled = autoscaler::is_enabled(
                ctx,
                config,
                &active.application_name,
                &active.application_guid,
                unit,
            )
            .await;
        }
    }

    unit.info("Step 6: Deleting older releases");
    let mut keep: HashSet<&str> = HashSet::from([created.guid.as_str()]);
    keep.extend(set.active.iter().chain(set.inactive.iter()).map(|app| app.guid.as_str()));
    let deleted_releases = retain(ctx, config, request, &selector, &keep, unit).await;

    Ok(SetupOutput {
        new_application: ApplicationInfo::from(&created),
        active_application,
        inactive_application,
        renames: journal,
        deleted_releases,
        revision: plan.revision,
        total_previous_instance_count: set.active.as_ref().map_or(0, |app| app.instance_count),
        naming_strategy: request.naming_strategy,
    })
}

#[allow(clippy::too_many_arguments)]
async fn apply_plan(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SetupRequest,
    mode: SetupMode,
    plan: &SetupPlan,
    create_request: &CreateApplicationRequest,
    journal: &mut Vec<RenameRecord>,
    unit: &CommandUnit<'_>,
) -> Result<ApplicationDescriptor, TaskError> {
    let prefix = request.release_name_prefix.as_str();

    for app in &plan.discard {
        unit.info(format!("Deleting idle interim application {}", app.name));
        ctx.platform().delete_application(config, &app.name).await?;
    }

    if !plan.renames.is_empty() {
        unit.info("Step 3: Renaming previous releases");
    }
    for planned in &plan.renames {
        if let Some(record) =
            rename::rename_by_guid(ctx, config, prefix, &planned.app.guid, &planned.to, unit).await?
        {
            journal.push(record);
        }
    }

    unit.info("Step 4: Creating application");
    let taken = ctx
        .platform()
        .list_previous_releases(config, prefix)
        .await?
        .into_iter()
        .any(|app| app.name == plan.new_name);
    if taken {
        return Err(TaskError::InvalidInfraState(format!(
            "application name {} is already taken",
            plan.new_name
        )));
    }
    let created = create::create_application(ctx, config, create_request, unit).await?;

    if mode == SetupMode::BlueGreen && !request.temp_routes.is_empty() {
        unit.info("Step 5: Mapping temporary routes");
        routes::map_missing(ctx, config, &created.name, &request.temp_routes, unit).await?;
    }

    Ok(ctx.platform().get_application_by_name(config, &created.name).await?)
}

/// Undo a partial setup: delete the new application if it exists, then
/// reverse the renames newest first. Failures are collected, never raised.
async fn revert(
    ctx: &TaskContext,
    config: &RequestConfig,
    prefix: &str,
    new_name: &str,
    existing: &HashSet<String>,
    journal: &[RenameRecord],
    unit: &CommandUnit<'_>,
) -> Vec<String> {
    let mut errors = Vec::new();

    match ctx.platform().get_application_by_name(config, new_name).await {
        Ok(app) if !existing.contains(&app.guid) => {
            unit.info(format!("Deleting partially created application {}", app.name));
            if let Err(e) = ctx.platform().delete_application(config, &app.name).await {
                errors.push(format!("Failed to delete {}: {}", app.name, e));
            }
        }
        Ok(_) | Err(PlatformError::NotFound(_)) => {}
        Err(e) => errors.push(format!("Failed to look up {}: {}", new_name, e)),
    }

    for record in journal.iter().rev() {
        if let Err(e) = rename::rename_by_guid(ctx, config, prefix, &record.guid, &record.from, unit).await {
            errors.push(format!("Failed to rename {} back to {}: {}", record.to, record.from, e));
        }
    }

    for error in &errors {
        unit.warn(error);
    }
    errors
}

async fn retain(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &SetupRequest,
    selector: &ActiveSelector,
    keep: &HashSet<&str>,
    unit: &CommandUnit<'_>,
) -> Vec<String> {
    let prefix = request.release_name_prefix.as_str();
    let set = match releases::list_releases(ctx, config, prefix, selector, request.naming_strategy, unit).await {
        Ok(set) => set,
        Err(e) => {
            unit.warn(format!("Skipping deletion of older releases: {}", e));
            return Vec::new();
        }
    };

    let older: Vec<ApplicationSummary> = set
        .older
        .into_iter()
        .filter(|app| !keep.contains(app.guid.as_str()))
        .collect();

    delete::delete_older_releases(ctx, config, &older, request.older_active_version_count_to_keep, unit).await
}

/// Snapshot of a pre-existing release under the name setup left it with
fn snapshot(app: &ApplicationSummary, journal: &[RenameRecord]) -> ApplicationInfo {
    let mut info = ApplicationInfo::from(app);
    if let Some(record) = journal.iter().rev().find(|r| r.guid == app.guid) {
        info.application_name = record.to.clone();
        info.old_name = Some(record.from.clone());
    }
    info
}
