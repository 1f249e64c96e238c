//! Autoscaler binding checks and toggles

use cutover_models::{AutoscalerRequest, RequestConfig};

use super::releases;
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::progress::CommandUnit;

fn request(config: &RequestConfig, name: &str, guid: &str, expected_enabled: bool) -> AutoscalerRequest {
    AutoscalerRequest {
        application_name: name.to_string(),
        application_guid: guid.to_string(),
        expected_enabled,
        timeout_in_mins: config.timeout_in_mins,
    }
}

/// Whether the application's autoscaler is enabled.
///
/// A failed check is logged and reported as disabled.
pub async fn is_enabled(
    ctx: &TaskContext,
    config: &RequestConfig,
    name: &str,
    guid: &str,
    unit: &CommandUnit<'_>,
) -> bool {
    match ctx
        .platform()
        .check_autoscaler_enabled(config, &request(config, name, guid, true))
        .await
    {
        Ok(enabled) => enabled,
        Err(e) => {
            unit.warn(format!(
                "Could not check autoscaler for {}, treating it as disabled: {}",
                name, e
            ));
            false
        }
    }
}

/// Disable the autoscaler when it is enabled; returns whether it was disabled.
pub async fn disable_if_enabled(
    ctx: &TaskContext,
    config: &RequestConfig,
    name: &str,
    guid: &str,
    unit: &CommandUnit<'_>,
) -> Result<bool, TaskError> {
    if !is_enabled(ctx, config, name, guid, unit).await {
        return Ok(false);
    }

    unit.info(format!("Disabling autoscaler for {}", name));
    let changed = ctx
        .platform()
        .disable_autoscaler(config, &request(config, name, guid, true))
        .await?;
    Ok(changed)
}

/// Enable the autoscaler on whatever application currently carries `guid`.
///
/// Returns the name it was enabled under, `None` when no application under
/// `prefix` has that guid any more.
pub async fn enable_by_guid(
    ctx: &TaskContext,
    config: &RequestConfig,
    prefix: &str,
    guid: &str,
    unit: &CommandUnit<'_>,
) -> Result<Option<String>, TaskError> {
    let matches = releases::find_by_guid(ctx, config, prefix, guid).await?;
    let [app] = matches.as_slice() else {
        unit.warn(format!(
            "Found {} application(s) with guid {}, autoscaler not enabled",
            matches.len(),
            guid
        ));
        return Ok(None);
    };

    enable(ctx, config, &app.name, guid, unit).await?;
    Ok(Some(app.name.clone()))
}

/// Enable the autoscaler of `name`, which must still carry `guid`.
pub async fn enable(
    ctx: &TaskContext,
    config: &RequestConfig,
    name: &str,
    guid: &str,
    unit: &CommandUnit<'_>,
) -> Result<(), TaskError> {
    unit.info(format!("Enabling autoscaler for {}", name));
    ctx.platform()
        .enable_autoscaler(config, &request(config, name, guid, false))
        .await?;
    Ok(())
}
