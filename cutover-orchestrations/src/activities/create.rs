//! Manifest staging and application creation

use cutover_models::{ApplicationDescriptor, ArtifactReference, CreateApplicationRequest, RequestConfig};

use crate::context::TaskContext;
use crate::error::TaskError;
use crate::manifest::{self, ManifestOverrides};
use crate::progress::CommandUnit;

const MANIFEST_FILE: &str = "manifest.yml";

/// What to push and how
#[derive(Debug, Clone)]
pub struct NewApplication<'a> {
    pub name: &'a str,
    pub manifest: &'a str,
    pub artifact: &'a ArtifactReference,
    pub instances: Option<u32>,
    pub no_route: bool,
    /// Update an existing application in place
    pub rolling: bool,
}

/// Check that the artifact can be pushed.
pub async fn check_artifact(artifact: &ArtifactReference, unit: &CommandUnit<'_>) -> Result<(), TaskError> {
    match artifact {
        ArtifactReference::Package { path } => {
            let metadata = tokio::fs::metadata(path)
                .await
                .map_err(|e| TaskError::Artifact(format!("{}: {}", path.display(), e)))?;
            unit.info(format!(
                "Package {} found ({} bytes)",
                path.display(),
                metadata.len()
            ));
        }
        ArtifactReference::Image { image } => {
            if image.trim().is_empty() {
                return Err(TaskError::Artifact("empty image reference".to_string()));
            }
            unit.info(format!("Image {}", image));
        }
    }
    Ok(())
}

/// Render the manifest and write it into the invocation's working directory.
pub async fn stage(
    config: &RequestConfig,
    app: &NewApplication<'_>,
) -> Result<CreateApplicationRequest, TaskError> {
    let rendered = manifest::render(
        app.manifest,
        &ManifestOverrides {
            name: app.name,
            instances: app.instances,
            no_route: app.no_route,
        },
    )?;
    let manifest_path = config.working_directory.join(MANIFEST_FILE);
    tokio::fs::write(&manifest_path, &rendered).await?;
    tracing::debug!(path = %manifest_path.display(), "Manifest written");

    Ok(CreateApplicationRequest {
        application_name: app.name.to_string(),
        manifest: rendered,
        manifest_path,
        artifact: app.artifact.clone(),
        rolling: app.rolling,
    })
}

pub async fn create_application(
    ctx: &TaskContext,
    config: &RequestConfig,
    request: &CreateApplicationRequest,
    unit: &CommandUnit<'_>,
) -> Result<ApplicationDescriptor, TaskError> {
    if request.rolling {
        unit.info(format!("Pushing {} with the rolling strategy", request.application_name));
    } else {
        unit.info(format!("Creating application {}", request.application_name));
    }
    let app = ctx.platform().create_application(config, request).await?;
    unit.info(format!("Application {} pushed (guid {})", app.name, app.guid));
    Ok(app)
}
