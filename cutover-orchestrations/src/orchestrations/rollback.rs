//! Resize rollback orchestration
//!
//! Restores every application touched by a resize to its previous instance
//! count and, when asked, removes the new application and gives the
//! previous releases back the names setup took from them.

use async_trait::async_trait;
use cutover_models::{ApplicationInfo, InstanceData, RequestConfig, ResizeStrategy};

use crate::activities::{autoscaler, delete, releases, rename, resize, routes};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::names::{command_units, orchestrations};
use crate::progress::CommandUnit;
use crate::registry::TaskHandler;
use crate::types::{RenameRecord, ResizeRollbackRequest, RollbackOutput, TaskOutput, TaskRequest};

pub struct ResizeRollback;

#[async_trait]
impl TaskHandler for ResizeRollback {
    fn name(&self) -> &'static str {
        orchestrations::ROLLBACK
    }

    async fn execute(&self, ctx: &TaskContext, request: TaskRequest) -> Result<TaskOutput, TaskError> {
        match request {
            TaskRequest::Rollback(input) => rollback(ctx, &input).await.map(TaskOutput::Rollback),
            other => Err(super::mismatch(self.name(), &other)),
        }
    }
}

/// Restores in the order the strategy asks for: downsizes first for
/// `DownscaleOldFirst`, upsizes first otherwise.
fn restore_order(instance_data: &[InstanceData], strategy: ResizeStrategy) -> Vec<InstanceData> {
    let mut ordered = instance_data.to_vec();
    ordered.sort_by_key(|data| {
        let upsize = data.previous_count > data.desired_count;
        match strategy {
            ResizeStrategy::DownscaleOldFirst => upsize,
            ResizeStrategy::UpscaleNewFirst => !upsize,
        }
    });
    ordered
}

async fn rollback(ctx: &TaskContext, request: &ResizeRollbackRequest) -> Result<RollbackOutput, TaskError> {
    super::require(&request.release_name_prefix, "release_name_prefix")?;
    super::require(&request.new_application.application_guid, "new_application.application_guid")?;
    let (config, _workdir) = ctx
        .request_config(&request.infra, request.timeout_interval_in_min)
        .await?;

    let unit = CommandUnit::open(ctx.log(), command_units::ROLLBACK);
    let result = restore_counts(ctx, &config, request, &unit).await;
    unit.finish(&result);
    let instance_data = result?;

    let unit = CommandUnit::open(ctx.log(), command_units::WRAPUP);
    let result = wrapup(ctx, &config, request, &instance_data, &unit).await;
    unit.finish(&result);
    let (deleted_application, renames) = result?;

    let restored_application = match &request.active_application {
        Some(active) => releases::refresh_optional(ctx, &config, &request.release_name_prefix, Some(active))
            .await?
            .as_ref()
            .map(ApplicationInfo::from),
        None => None,
    };

    Ok(RollbackOutput {
        restored_application,
        instance_data,
        renames,
        deleted_application,
    })
}

async fn restore_counts(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &ResizeRollbackRequest,
    unit: &CommandUnit<'_>,
) -> Result<Vec<InstanceData>, TaskError> {
    let prefix = request.release_name_prefix.as_str();
    let mut restored = Vec::new();

    for (step, data) in restore_order(&request.instance_data, request.resize_strategy)
        .into_iter()
        .enumerate()
    {
        unit.info(format!(
            "Step {}: Restoring {} to {} instance(s)",
            step + 1,
            data.name,
            data.previous_count
        ));
        let info = ApplicationInfo {
            application_name: data.name.clone(),
            application_guid: data.guid.clone(),
            ..Default::default()
        };
        let Some(app) = releases::refresh_optional(ctx, config, prefix, Some(&info)).await? else {
            unit.warn(format!("{} no longer exists, skipping", data.name));
            continue;
        };

        let mut outcome = if app.instance_count == data.previous_count {
            unit.info(format!("{} already runs {} instance(s)", app.name, app.instance_count));
            InstanceData {
                name: app.name.clone(),
                guid: app.guid.clone(),
                previous_count: app.instance_count,
                desired_count: data.previous_count,
                disable_autoscaler_performed: false,
            }
        } else {
            resize::resize_application(ctx, config, &app, data.previous_count, request.use_app_autoscaler, unit)
                .await?
                .instance_data
        };
        outcome.disable_autoscaler_performed |= data.disable_autoscaler_performed;

        if data.previous_count == 0 {
            routes::unmap_all(ctx, config, &app.name, unit).await?;
        } else if app.instance_count == 0 && app.attached_routes.is_empty() {
            routes::map_missing(ctx, config, &app.name, &request.routes, unit).await?;
        }
        restored.push(outcome);
    }
    Ok(restored)
}

async fn wrapup(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &ResizeRollbackRequest,
    instance_data: &[InstanceData],
    unit: &CommandUnit<'_>,
) -> Result<(Option<String>, Vec<RenameRecord>), TaskError> {
    let prefix = request.release_name_prefix.as_str();

    for data in instance_data {
        if data.disable_autoscaler_performed && data.desired_count > 0 {
            autoscaler::enable_by_guid(ctx, config, prefix, &data.guid, unit).await?;
        }
    }

    let mut renames = Vec::new();
    if !request.delete_new_application {
        unit.info("Rollback complete");
        return Ok((None, renames));
    }

    let new = releases::refresh_optional(ctx, config, prefix, Some(&request.new_application)).await?;
    let deleted = match new {
        Some(app) if app.instance_count > 0 => {
            unit.warn(format!(
                "{} still runs {} instance(s), not deleting it",
                app.name, app.instance_count
            ));
            return Ok((None, renames));
        }
        Some(_) => delete::delete_by_guid(ctx, config, prefix, &request.new_application.application_guid, unit).await?,
        None => {
            unit.info(format!(
                "New application {} is already gone",
                request.new_application.application_name
            ));
            None
        }
    };

    for previous in [&request.active_application, &request.inactive_application]
        .into_iter()
        .flatten()
    {
        let Some(old_name) = &previous.old_name else {
            continue;
        };
        unit.info(format!("Renaming {} back to {}", previous.application_name, old_name));
        if let Some(record) =
            rename::rename_by_guid(ctx, config, prefix, &previous.application_guid, old_name, unit).await?
        {
            renames.push(record);
        }
    }

    unit.info("Rollback complete");
    Ok((deleted, renames))
}
