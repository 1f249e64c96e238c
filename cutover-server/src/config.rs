use anyhow::{Context, Result};
use cutover_orchestrations::context::{PollingPolicy, TaskContext};
use cutover_orchestrations::platform::{CfCliPlatform, InMemoryPlatform, Platform};
use cutover_orchestrations::progress::LogSink;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which platform implementation orchestrations run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    CfCli,
    /// Simulated space, for dry runs
    Memory,
}

impl FromStr for PlatformKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cf-cli" | "cf" => Ok(PlatformKind::CfCli),
            "memory" => Ok(PlatformKind::Memory),
            other => anyhow::bail!("unknown platform '{}', expected 'cf-cli' or 'memory'", other),
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformKind::CfCli => write!(f, "cf-cli"),
            PlatformKind::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub platform: PlatformKind,
    pub cf_cli_path: PathBuf,
    pub work_dir: PathBuf,
    pub poll_interval: Duration,
    /// Finished tasks the server keeps for inspection
    pub task_retention: usize,
    pub api_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = lookup("HOME").unwrap_or_else(|| ".".to_string());

        Ok(Self {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: lookup("SERVER_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            platform: lookup("CUTOVER_PLATFORM")
                .unwrap_or_else(|| "cf-cli".to_string())
                .parse()
                .context("CUTOVER_PLATFORM is invalid")?,
            cf_cli_path: lookup("CF_CLI_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cf")),
            work_dir: lookup("CUTOVER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&home).join(".cutover").join("work")),
            poll_interval: Duration::from_secs(
                lookup("CUTOVER_POLL_INTERVAL_SECS")
                    .unwrap_or_else(|| "5".to_string())
                    .parse()
                    .context("CUTOVER_POLL_INTERVAL_SECS must be a number of seconds")?,
            ),
            task_retention: lookup("CUTOVER_TASK_RETENTION")
                .unwrap_or_else(|| "1000".to_string())
                .parse()
                .context("CUTOVER_TASK_RETENTION must be a number of tasks")?,
            api_url: lookup("CUTOVER_API_URL").unwrap_or_else(|| "http://localhost:8080".to_string()),
        })
    }

    pub fn create_platform(&self) -> Arc<dyn Platform> {
        match self.platform {
            PlatformKind::CfCli => Arc::new(CfCliPlatform::new(&self.cf_cli_path)),
            PlatformKind::Memory => Arc::new(InMemoryPlatform::new()),
        }
    }

    pub fn task_context(&self, platform: Arc<dyn Platform>, log: Arc<dyn LogSink>) -> TaskContext {
        TaskContext::new(platform, log)
            .with_polling(PollingPolicy {
                interval: self.poll_interval,
            })
            .with_work_root(&self.work_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("HOME", "/home/deployer")])).unwrap();

        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.platform, PlatformKind::CfCli);
        assert_eq!(config.cf_cli_path, PathBuf::from("cf"));
        assert_eq!(config.work_dir, PathBuf::from("/home/deployer/.cutover/work"));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.task_retention, 1000);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SERVER_PORT", "9090"),
            ("CUTOVER_PLATFORM", "memory"),
            ("CUTOVER_POLL_INTERVAL_SECS", "1"),
            ("CUTOVER_TASK_RETENTION", "50"),
        ]))
        .unwrap();

        assert_eq!(config.server_port, 9090);
        assert_eq!(config.platform, PlatformKind::Memory);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.task_retention, 50);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("SERVER_PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("CUTOVER_PLATFORM", "k8s")])).is_err());
    }
}
