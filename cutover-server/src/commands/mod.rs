pub mod releases;
pub mod server;
pub mod task;

use anyhow::{Context, Result};
use cutover_orchestrations::names::orchestrations;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Full orchestration name for `name`, which may be the short form
/// ("swap-rollback" for "cutover::orchestration::swap-rollback").
pub fn resolve_orchestration(name: &str) -> Option<&'static str> {
    orchestrations::ALL.iter().copied().find(|full| {
        *full == name || full.rsplit("::").next() == Some(name)
    })
}

/// Read and parse a JSON file.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_orchestration() {
        assert_eq!(resolve_orchestration("resize"), Some(orchestrations::RESIZE));
        assert_eq!(resolve_orchestration("swap-rollback"), Some(orchestrations::SWAP_ROLLBACK));
        assert_eq!(
            resolve_orchestration(orchestrations::ROLLING_DEPLOY),
            Some(orchestrations::ROLLING_DEPLOY)
        );
        assert_eq!(resolve_orchestration("rollout"), None);
    }
}
