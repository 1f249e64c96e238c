//! Application deletion and release retention

use cutover_models::{ApplicationSummary, RequestConfig};

use super::{autoscaler, releases};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::progress::CommandUnit;

/// Delete the application carrying `guid`; returns the deleted name.
///
/// Nothing is deleted when the guid matches no application or, on an
/// inconsistent space, more than one.
pub async fn delete_by_guid(
    ctx: &TaskContext,
    config: &RequestConfig,
    prefix: &str,
    guid: &str,
    unit: &CommandUnit<'_>,
) -> Result<Option<String>, TaskError> {
    let matches = releases::find_by_guid(ctx, config, prefix, guid).await?;
    match matches.as_slice() {
        [] => {
            unit.info(format!("No application with guid {} found, nothing to delete", guid));
            Ok(None)
        }
        [app] => {
            unit.info(format!("Deleting application {}", app.name));
            ctx.platform().delete_application(config, &app.name).await?;
            Ok(Some(app.name.clone()))
        }
        _ => {
            let names: Vec<&str> = matches.iter().map(|app| app.name.as_str()).collect();
            unit.warn(format!(
                "Found applications [{}] with guid {}. Kindly delete the invalid app manually",
                names.join(", "),
                guid
            ));
            Ok(None)
        }
    }
}

/// Delete the oldest `older` releases beyond `versions_to_keep`.
///
/// `older` must be ordered oldest first. Releases still holding routes are
/// skipped. Failures are logged as warnings and never propagated; the names
/// actually deleted are returned.
pub async fn delete_older_releases(
    ctx: &TaskContext,
    config: &RequestConfig,
    older: &[ApplicationSummary],
    versions_to_keep: u32,
    unit: &CommandUnit<'_>,
) -> Vec<String> {
    let excess = older.len().saturating_sub(versions_to_keep as usize);
    let mut deleted = Vec::new();

    for app in &older[..excess] {
        if !app.urls.is_empty() {
            unit.warn(format!(
                "Skipping deletion of {}, it still holds routes [{}]",
                app.name,
                app.urls.join(", ")
            ));
            continue;
        }

        unit.info(format!("# Older application being deleted: {}", app.name));
        match delete_release(ctx, config, app, unit).await {
            Ok(()) => deleted.push(app.name.clone()),
            Err(e) => unit.warn(format!("Failed to delete older application {}: {}", app.name, e)),
        }
    }

    if deleted.is_empty() {
        unit.info("# No older applications were eligible for deletion");
    } else {
        unit.info(format!(
            "# Done Deleting older applications. Deleted Total {} applications",
            deleted.len()
        ));
    }
    deleted
}

async fn delete_release(
    ctx: &TaskContext,
    config: &RequestConfig,
    app: &ApplicationSummary,
    unit: &CommandUnit<'_>,
) -> Result<(), TaskError> {
    if app.instance_count > 0 {
        autoscaler::disable_if_enabled(ctx, config, &app.name, &app.guid, unit).await?;
        unit.info(format!("Downsizing {} to 0 before deletion", app.name));
        ctx.platform().resize_application(config, &app.name, 0).await?;
    }
    ctx.platform().delete_application(config, &app.name).await?;
    Ok(())
}
