//! Route mapping that only touches the difference with the current state

use cutover_models::RequestConfig;

use crate::context::TaskContext;
use crate::error::TaskError;
use crate::progress::CommandUnit;

/// Map the `routes` that `name` does not already hold; returns those mapped.
pub async fn map_missing(
    ctx: &TaskContext,
    config: &RequestConfig,
    name: &str,
    routes: &[String],
    unit: &CommandUnit<'_>,
) -> Result<Vec<String>, TaskError> {
    if routes.is_empty() {
        return Ok(Vec::new());
    }

    let app = ctx.platform().get_application_by_name(config, name).await?;
    let missing: Vec<String> = routes
        .iter()
        .filter(|route| !app.has_route(route))
        .cloned()
        .collect();
    if missing.is_empty() {
        tracing::debug!(application = name, "Routes already mapped");
        return Ok(missing);
    }

    unit.info(format!("Mapping routes [{}] to {}", missing.join(", "), name));
    ctx.platform().map_routes(config, name, &missing).await?;
    Ok(missing)
}

/// Unmap the `routes` that `name` currently holds; returns those unmapped.
pub async fn unmap_present(
    ctx: &TaskContext,
    config: &RequestConfig,
    name: &str,
    routes: &[String],
    unit: &CommandUnit<'_>,
) -> Result<Vec<String>, TaskError> {
    if routes.is_empty() {
        return Ok(Vec::new());
    }

    let app = ctx.platform().get_application_by_name(config, name).await?;
    let present: Vec<String> = routes
        .iter()
        .filter(|route| app.has_route(route))
        .cloned()
        .collect();
    if present.is_empty() {
        tracing::debug!(application = name, "Routes already unmapped");
        return Ok(present);
    }

    unit.info(format!("Unmapping routes [{}] from {}", present.join(", "), name));
    ctx.platform().unmap_routes(config, name, &present).await?;
    Ok(present)
}

/// Unmap every route `name` holds.
pub async fn unmap_all(
    ctx: &TaskContext,
    config: &RequestConfig,
    name: &str,
    unit: &CommandUnit<'_>,
) -> Result<Vec<String>, TaskError> {
    let app = ctx.platform().get_application_by_name(config, name).await?;
    if app.attached_routes.is_empty() {
        return Ok(Vec::new());
    }

    unit.info(format!(
        "Unmapping routes [{}] from {}",
        app.attached_routes.join(", "),
        name
    ));
    ctx.platform()
        .unmap_routes(config, name, &app.attached_routes)
        .await?;
    Ok(app.attached_routes)
}
