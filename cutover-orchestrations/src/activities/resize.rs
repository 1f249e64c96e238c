//! Resize with steady-state confirmation

use cutover_models::{ApplicationDescriptor, InstanceData, RequestConfig};

use super::autoscaler;
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::progress::CommandUnit;
use crate::steady_state::wait_for_steady_state;

#[derive(Debug, Clone)]
pub struct ResizeOutcome {
    /// Descriptor read once the application reached steady state
    pub application: ApplicationDescriptor,
    pub instance_data: InstanceData,
}

/// Resize `app` to `desired` instances and wait for steady state.
///
/// With `use_app_autoscaler` an enabled autoscaler is disabled first; the
/// returned [`InstanceData`] records that so it can be re-enabled later.
/// When the resize fails the autoscaler is re-enabled before returning.
pub async fn resize_application(
    ctx: &TaskContext,
    config: &RequestConfig,
    app: &ApplicationDescriptor,
    desired: u32,
    use_app_autoscaler: bool,
    unit: &CommandUnit<'_>,
) -> Result<ResizeOutcome, TaskError> {
    let disable_autoscaler_performed = if use_app_autoscaler {
        autoscaler::disable_if_enabled(ctx, config, &app.name, &app.guid, unit).await?
    } else {
        false
    };

    unit.info(format!(
        "Resizing {} from {} to {} instance(s)",
        app.name, app.instance_count, desired
    ));
    let result = async {
        ctx.platform()
            .resize_application(config, &app.name, desired)
            .await?;
        wait_for_steady_state(ctx, config, &app.name, desired, unit).await
    }
    .await;

    let mut application = match result {
        Ok(application) => application,
        Err(e) if disable_autoscaler_performed => {
            unit.warn(format!(
                "Resize of {} failed, re-enabling its autoscaler",
                app.name
            ));
            let revert_errors = match autoscaler::enable(ctx, config, &app.name, &app.guid, unit).await {
                Ok(()) => Vec::new(),
                Err(re) => vec![format!("Failed to re-enable autoscaler for {}: {}", app.name, re)],
            };
            return Err(e.with_revert_errors(revert_errors));
        }
        Err(e) => return Err(e),
    };
    application.old_name = app.old_name.clone();

    Ok(ResizeOutcome {
        instance_data: InstanceData {
            name: app.name.clone(),
            guid: app.guid.clone(),
            previous_count: app.instance_count,
            desired_count: desired,
            disable_autoscaler_performed,
        },
        application,
    })
}
