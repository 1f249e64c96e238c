//! Manifest rendering
//!
//! The manifest arrives already templated. Orchestrations only pin the
//! application name and instance count of its first application and decide
//! whether it is pushed with routes.

use serde_yaml::{Mapping, Value};

use crate::error::TaskError;

const APPLICATIONS: &str = "applications";

/// Overrides applied to the first application of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOverrides<'a> {
    pub name: &'a str,
    pub instances: Option<u32>,
    /// Drop declared routes and push with `no-route`
    pub no_route: bool,
}

pub fn render(manifest: &str, overrides: &ManifestOverrides<'_>) -> Result<String, TaskError> {
    let mut doc: Value = serde_yaml::from_str(manifest)
        .map_err(|e| TaskError::Manifest(format!("invalid YAML: {}", e)))?;

    let app = first_application_mut(&mut doc)?;
    app.insert(Value::from("name"), Value::from(overrides.name));
    if let Some(instances) = overrides.instances {
        app.insert(Value::from("instances"), Value::from(instances));
    }
    if overrides.no_route {
        app.remove("routes");
        app.remove("random-route");
        app.insert(Value::from("no-route"), Value::from(true));
    }

    serde_yaml::to_string(&doc).map_err(|e| TaskError::Manifest(e.to_string()))
}

/// `instances` declared by the first application, if any
pub fn declared_instances(manifest: &str) -> Option<u32> {
    let doc: Value = serde_yaml::from_str(manifest).ok()?;
    let instances = doc.get(APPLICATIONS)?.get(0)?.get("instances")?.as_u64()?;
    u32::try_from(instances).ok()
}

fn first_application_mut(doc: &mut Value) -> Result<&mut Mapping, TaskError> {
    doc.get_mut(APPLICATIONS)
        .and_then(Value::as_sequence_mut)
        .and_then(|apps| apps.first_mut())
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| TaskError::Manifest("manifest declares no applications".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "\
applications:
- name: placeholder
  memory: 512M
  instances: 4
  routes:
  - route: svc.example.com
";

    #[test]
    fn test_render_pins_name_and_instances() {
        let rendered = render(
            MANIFEST,
            &ManifestOverrides {
                name: "svc__INACTIVE",
                instances: Some(0),
                no_route: true,
            },
        )
        .unwrap();

        let doc: Value = serde_yaml::from_str(&rendered).unwrap();
        let app = &doc["applications"][0];
        assert_eq!(app["name"].as_str(), Some("svc__INACTIVE"));
        assert_eq!(app["instances"].as_u64(), Some(0));
        assert_eq!(app["memory"].as_str(), Some("512M"));
        assert_eq!(app["no-route"].as_bool(), Some(true));
        assert!(app.get("routes").is_none());
    }

    #[test]
    fn test_render_keeps_routes_when_asked() {
        let rendered = render(
            MANIFEST,
            &ManifestOverrides {
                name: "svc",
                instances: None,
                no_route: false,
            },
        )
        .unwrap();

        assert_eq!(declared_instances(&rendered), Some(4));
        assert!(rendered.contains("svc.example.com"));
    }

    #[test]
    fn test_manifest_without_applications_is_rejected() {
        let err = render(
            "version: 1\n",
            &ManifestOverrides {
                name: "svc",
                instances: None,
                no_route: false,
            },
        )
        .unwrap_err();

        assert!(matches!(err, TaskError::Manifest(_)));
    }
}
