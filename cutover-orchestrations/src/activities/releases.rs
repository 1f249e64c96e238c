//! Release listing and guid-based re-resolution

use cutover_models::{ApplicationDescriptor, ApplicationInfo, ApplicationSummary, NamingStrategy, RequestConfig};

use crate::context::TaskContext;
use crate::error::TaskError;
use crate::progress::CommandUnit;
use crate::resolver::{self, ActiveSelector, ReleaseSet};

/// List the applications under `prefix` and classify them.
pub async fn list_releases(
    ctx: &TaskContext,
    config: &RequestConfig,
    prefix: &str,
    selector: &ActiveSelector,
    strategy: NamingStrategy,
    unit: &CommandUnit<'_>,
) -> Result<ReleaseSet, TaskError> {
    unit.info(format!("Fetching previous releases for prefix: {}", prefix));
    let releases = ctx.platform().list_previous_releases(config, prefix).await?;
    let set = resolver::resolve(prefix, &releases, selector, strategy)?;

    if set.is_first_deployment() {
        unit.info("No previous releases found, this is the first deployment");
    } else {
        unit.info(format!(
            "Active: {}, Inactive: {}, Older releases: {}",
            set.active.as_ref().map_or("none", |a| a.name.as_str()),
            set.inactive.as_ref().map_or("none", |a| a.name.as_str()),
            set.older.len()
        ));
    }
    Ok(set)
}

/// Applications under `prefix` currently carrying `guid`
pub async fn find_by_guid(
    ctx: &TaskContext,
    config: &RequestConfig,
    prefix: &str,
    guid: &str,
) -> Result<Vec<ApplicationSummary>, TaskError> {
    let releases = ctx.platform().list_previous_releases(config, prefix).await?;
    Ok(releases.into_iter().filter(|app| app.guid == guid).collect())
}

/// Current state of a snapshot, looked up by guid.
///
/// The returned descriptor carries the snapshot's name in `old_name` when
/// the application has been renamed since.
pub async fn refresh(
    ctx: &TaskContext,
    config: &RequestConfig,
    prefix: &str,
    info: &ApplicationInfo,
) -> Result<ApplicationDescriptor, TaskError> {
    let mut matches = find_by_guid(ctx, config, prefix, &info.application_guid).await?;
    if matches.len() > 1 {
        return Err(TaskError::InvalidInfraState(format!(
            "{} applications share guid {}",
            matches.len(),
            info.application_guid
        )));
    }
    let current = matches.pop().ok_or_else(|| {
        TaskError::InvalidInfraState(format!(
            "application {} (guid {}) no longer exists under prefix {}",
            info.application_name, info.application_guid, prefix
        ))
    })?;

    let mut app = ctx
        .platform()
        .get_application_by_name(config, &current.name)
        .await?;
    if app.name != info.application_name {
        app.old_name = Some(info.application_name.clone());
    }
    Ok(app)
}

/// Like [`refresh`], but `None` when the application is gone.
pub async fn refresh_optional(
    ctx: &TaskContext,
    config: &RequestConfig,
    prefix: &str,
    info: Option<&ApplicationInfo>,
) -> Result<Option<ApplicationDescriptor>, TaskError> {
    let Some(info) = info else {
        return Ok(None);
    };
    if find_by_guid(ctx, config, prefix, &info.application_guid).await?.is_empty() {
        return Ok(None);
    }
    refresh(ctx, config, prefix, info).await.map(Some)
}
