//! Guid-anchored renames

use cutover_models::{RenameRequest, RequestConfig};

use super::releases;
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::progress::CommandUnit;
use crate::types::RenameRecord;

/// Rename the application carrying `guid` to `new_name`.
///
/// The current name is read from the platform, never from a cached
/// descriptor. Returns `None` when the application already has `new_name`.
pub async fn rename_by_guid(
    ctx: &TaskContext,
    config: &RequestConfig,
    prefix: &str,
    guid: &str,
    new_name: &str,
    unit: &CommandUnit<'_>,
) -> Result<Option<RenameRecord>, TaskError> {
    let matches = releases::find_by_guid(ctx, config, prefix, guid).await?;
    let current = match matches.as_slice() {
        [app] => app.name.clone(),
        [] => {
            return Err(TaskError::InvalidInfraState(format!(
                "no application with guid {} to rename to {}",
                guid, new_name
            )))
        }
        _ => {
            return Err(TaskError::InvalidInfraState(format!(
                "{} applications share guid {}",
                matches.len(),
                guid
            )))
        }
    };

    if current == new_name {
        tracing::debug!(guid, name = new_name, "Application already has the target name");
        return Ok(None);
    }

    unit.info(format!("Renaming {} to {}", current, new_name));
    ctx.platform()
        .rename_application(
            config,
            &RenameRequest {
                guid: guid.to_string(),
                name: current.clone(),
                new_name: new_name.to_string(),
            },
        )
        .await?;

    Ok(Some(RenameRecord {
        guid: guid.to_string(),
        from: current,
        to: new_name.to_string(),
    }))
}
