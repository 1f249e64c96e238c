//! Platform implementation backed by the `cf` CLI
//!
//! Every invocation gets its own `CF_HOME` (the request's working directory),
//! so concurrent invocations never share a login session. State is read with
//! `cf curl` against the v3 API and changed with the regular CLI commands.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cutover_models::{
    ApplicationDescriptor, ApplicationSummary, ArtifactReference, AutoscalerRequest, CliVersion,
    CreateApplicationRequest, RenameRequest, RequestConfig, RequestedState,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{Platform, PlatformError, PlatformResult};

const PAGE_SIZE: u32 = 5000;

/// Written into `CF_HOME` once the session there is logged in and targeted
const SESSION_MARKER: &str = ".cutover-session";

pub struct CfCliPlatform {
    cli_path: PathBuf,
}

impl CfCliPlatform {
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
        }
    }

    pub fn cli_path(&self) -> &Path {
        &self.cli_path
    }

    async fn run(&self, config: &RequestConfig, args: &[&str]) -> PlatformResult<String> {
        self.run_with_env(config, args, &[]).await
    }

    async fn run_with_env(
        &self,
        config: &RequestConfig,
        args: &[&str],
        envs: &[(&str, &str)],
    ) -> PlatformResult<String> {
        let subcommand = args.first().copied().unwrap_or_default();
        tracing::debug!(command = subcommand, "Running cf CLI");

        let mut command = Command::new(&self.cli_path);
        command
            .args(args)
            .env("CF_HOME", &config.working_directory)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in envs {
            command.env(key, value);
        }

        let limit = Duration::from_secs(u64::from(config.timeout_in_mins.max(1)) * 60);
        let output = tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| {
                PlatformError::CommandFailed(format!(
                    "cf {} did not finish within {} minute(s)",
                    subcommand,
                    config.timeout_in_mins.max(1)
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(PlatformError::CommandFailed(format!(
                "cf {} exited with {}: {}",
                subcommand,
                output.status,
                detail.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn login(&self, config: &RequestConfig) -> PlatformResult<()> {
        let marker = config.working_directory.join(SESSION_MARKER);
        if tokio::fs::try_exists(&marker).await? {
            return Ok(());
        }

        tokio::fs::create_dir_all(&config.working_directory).await?;

        let mut api_args = vec!["api", config.endpoint_url.as_str()];
        if config.skip_ssl_validation {
            api_args.push("--skip-ssl-validation");
        }
        self.run(config, &api_args).await?;

        // credentials stay off the command line
        self.run_with_env(
            config,
            &["auth"],
            &[
                ("CF_USERNAME", config.credentials.username.as_str()),
                ("CF_PASSWORD", config.credentials.password.as_str()),
            ],
        )
        .await?;

        self.run(
            config,
            &["target", "-o", &config.organization, "-s", &config.space],
        )
        .await?;

        tokio::fs::write(&marker, b"").await?;
        tracing::debug!(space = %config.space, "Logged in to platform");
        Ok(())
    }

    async fn curl<T: for<'de> Deserialize<'de>>(
        &self,
        config: &RequestConfig,
        path: &str,
    ) -> PlatformResult<T> {
        let body = self.run(config, &["curl", path]).await?;
        parse_json(&body)
    }

    async fn space_guid(&self, config: &RequestConfig) -> PlatformResult<String> {
        let out = self.run(config, &["space", &config.space, "--guid"]).await?;
        let guid = out.trim();
        if guid.is_empty() {
            return Err(PlatformError::InvalidResponse(format!(
                "no guid reported for space '{}'",
                config.space
            )));
        }
        Ok(guid.to_string())
    }

    async fn find_app(&self, config: &RequestConfig, name: &str) -> PlatformResult<AppResource> {
        let space = self.space_guid(config).await?;
        let page: Page<AppResource> = self
            .curl(
                config,
                &format!("/v3/apps?names={}&space_guids={}", name, space),
            )
            .await?;
        page.resources
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::NotFound(name.to_string()))
    }

    async fn summarize(
        &self,
        config: &RequestConfig,
        app: AppResource,
    ) -> PlatformResult<ApplicationSummary> {
        let process: ProcessResource = self
            .curl(config, &format!("/v3/apps/{}/processes/web", app.guid))
            .await?;
        let stats: Page<ProcessStat> = self
            .curl(config, &format!("/v3/apps/{}/processes/web/stats", app.guid))
            .await?;
        let routes: Page<RouteResource> = self
            .curl(config, &format!("/v3/apps/{}/routes", app.guid))
            .await?;

        Ok(ApplicationSummary {
            requested_state: requested_state(&app.state),
            name: app.name,
            guid: app.guid,
            instance_count: process.instances,
            running_instance_count: running_count(&stats.resources),
            urls: routes.resources.into_iter().map(|r| r.url).collect(),
            created_at: app.created_at,
        })
    }

    async fn describe(
        &self,
        config: &RequestConfig,
        name: &str,
    ) -> PlatformResult<ApplicationDescriptor> {
        let app = self.find_app(config, name).await?;
        let summary = self.summarize(config, app).await?;
        let autoscaler = self.autoscaler_enabled(config, name).await.unwrap_or(false);

        let mut descriptor = ApplicationDescriptor::from(summary);
        descriptor.is_autoscaler_enabled = autoscaler;
        Ok(descriptor)
    }

    async fn autoscaler_enabled(&self, config: &RequestConfig, name: &str) -> PlatformResult<bool> {
        let out = self.run(config, &["autoscaling-apps"]).await?;
        Ok(parse_autoscaling_apps(&out, name).unwrap_or(false))
    }

    async fn route_command(
        &self,
        config: &RequestConfig,
        verb: &str,
        name: &str,
        route: &str,
    ) -> PlatformResult<()> {
        let spec = RouteSpec::parse(route)?;
        let mut args = vec![verb, name, spec.domain.as_str()];
        if let Some(host) = spec.host.as_deref() {
            args.extend(["--hostname", host]);
        }
        if let Some(path) = spec.path.as_deref() {
            args.extend(["--path", path]);
        }
        let port = spec.port.map(|p| p.to_string());
        if let Some(port) = port.as_deref() {
            args.extend(["--port", port]);
        }
        self.run(config, &args).await?;
        Ok(())
    }
}

#[async_trait]
impl Platform for CfCliPlatform {
    async fn list_previous_releases(
        &self,
        config: &RequestConfig,
        prefix: &str,
    ) -> PlatformResult<Vec<ApplicationSummary>> {
        self.login(config).await?;
        let space = self.space_guid(config).await?;
        let page: Page<AppResource> = self
            .curl(
                config,
                &format!(
                    "/v3/apps?space_guids={}&per_page={}&order_by=created_at",
                    space, PAGE_SIZE
                ),
            )
            .await?;

        let mut releases = Vec::new();
        for app in page.resources {
            if app.name.starts_with(prefix) {
                releases.push(self.summarize(config, app).await?);
            }
        }
        Ok(releases)
    }

    async fn get_application_by_name(
        &self,
        config: &RequestConfig,
        name: &str,
    ) -> PlatformResult<ApplicationDescriptor> {
        self.login(config).await?;
        self.describe(config, name).await
    }

    async fn create_application(
        &self,
        config: &RequestConfig,
        request: &CreateApplicationRequest,
    ) -> PlatformResult<ApplicationDescriptor> {
        self.login(config).await?;

        let args = push_args(config.cli_version, request)?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(config, &args).await?;
        self.describe(config, &request.application_name).await
    }

    async fn resize_application(
        &self,
        config: &RequestConfig,
        name: &str,
        desired_count: u32,
    ) -> PlatformResult<ApplicationDescriptor> {
        self.login(config).await?;
        let count = desired_count.to_string();
        self.run(config, &["scale", name, "-i", &count]).await?;

        let app = self.find_app(config, name).await?;
        if desired_count > 0 && requested_state(&app.state) == RequestedState::Stopped {
            self.run(config, &["start", name]).await?;
        }
        self.describe(config, name).await
    }

    async fn delete_application(&self, config: &RequestConfig, name: &str) -> PlatformResult<()> {
        self.login(config).await?;
        self.run(config, &["delete", name, "-f"]).await?;
        Ok(())
    }

    async fn rename_application(
        &self,
        config: &RequestConfig,
        request: &RenameRequest,
    ) -> PlatformResult<()> {
        self.login(config).await?;
        let app = self.find_app(config, &request.name).await?;
        if app.guid != request.guid {
            return Err(PlatformError::Rejected(format!(
                "application '{}' has guid {}, expected {}",
                request.name, app.guid, request.guid
            )));
        }
        self.run(config, &["rename", &request.name, &request.new_name])
            .await?;
        Ok(())
    }

    async fn map_routes(
        &self,
        config: &RequestConfig,
        name: &str,
        routes: &[String],
    ) -> PlatformResult<()> {
        self.login(config).await?;
        for route in routes {
            self.route_command(config, "map-route", name, route).await?;
        }
        Ok(())
    }

    async fn unmap_routes(
        &self,
        config: &RequestConfig,
        name: &str,
        routes: &[String],
    ) -> PlatformResult<()> {
        self.login(config).await?;
        for route in routes {
            self.route_command(config, "unmap-route", name, route).await?;
        }
        Ok(())
    }

    async fn check_autoscaler_enabled(
        &self,
        config: &RequestConfig,
        request: &AutoscalerRequest,
    ) -> PlatformResult<bool> {
        self.login(config).await?;
        self.autoscaler_enabled(config, &request.application_name).await
    }

    async fn enable_autoscaler(
        &self,
        config: &RequestConfig,
        request: &AutoscalerRequest,
    ) -> PlatformResult<bool> {
        self.login(config).await?;
        if self.autoscaler_enabled(config, &request.application_name).await? {
            return Ok(false);
        }
        self.run(config, &["enable-autoscaling", &request.application_name])
            .await?;
        Ok(true)
    }

    async fn disable_autoscaler(
        &self,
        config: &RequestConfig,
        request: &AutoscalerRequest,
    ) -> PlatformResult<bool> {
        self.login(config).await?;
        if !self.autoscaler_enabled(config, &request.application_name).await? {
            return Ok(false);
        }
        self.run(config, &["disable-autoscaling", &request.application_name])
            .await?;
        Ok(true)
    }
}

/// Arguments for `cf push`; rolling pushes need the v7 CLI.
fn push_args(version: CliVersion, request: &CreateApplicationRequest) -> PlatformResult<Vec<String>> {
    let mut args = vec![
        "push".to_string(),
        "-f".to_string(),
        request.manifest_path.to_string_lossy().into_owned(),
    ];
    match &request.artifact {
        ArtifactReference::Package { path } => {
            args.extend(["-p".to_string(), path.to_string_lossy().into_owned()])
        }
        ArtifactReference::Image { image } => {
            args.extend(["--docker-image".to_string(), image.clone()])
        }
    }
    if request.rolling {
        if version == CliVersion::V6 {
            return Err(PlatformError::Rejected(format!(
                "rolling push of '{}' needs cf CLI v7 or later",
                request.application_name
            )));
        }
        args.extend(["--strategy".to_string(), "rolling".to_string()]);
    }
    Ok(args)
}

// ============================================================================
// v3 API payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct Page<T> {
    resources: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AppResource {
    guid: String,
    name: String,
    state: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ProcessResource {
    instances: u32,
}

#[derive(Debug, Deserialize)]
struct ProcessStat {
    state: String,
}

#[derive(Debug, Deserialize)]
struct RouteResource {
    url: String,
}

fn parse_json<T: for<'de> Deserialize<'de>>(body: &str) -> PlatformResult<T> {
    serde_json::from_str(body).map_err(|e| PlatformError::InvalidResponse(e.to_string()))
}

fn requested_state(state: &str) -> RequestedState {
    if state.eq_ignore_ascii_case("STARTED") {
        RequestedState::Started
    } else {
        RequestedState::Stopped
    }
}

fn running_count(stats: &[ProcessStat]) -> u32 {
    let running = stats.iter().filter(|s| s.state == "RUNNING").count();
    u32::try_from(running).unwrap_or(u32::MAX)
}

/// Enabled flag for `name` from `cf autoscaling-apps` table output.
fn parse_autoscaling_apps(output: &str, name: &str) -> Option<bool> {
    output.lines().find_map(|line| {
        let mut columns = line.split_whitespace();
        if columns.next()? != name {
            return None;
        }
        columns.find_map(|column| match column {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        })
    })
}

/// Route string split into CLI arguments
#[derive(Debug, Clone, PartialEq, Eq)]
struct RouteSpec {
    host: Option<String>,
    domain: String,
    path: Option<String>,
    port: Option<u16>,
}

impl RouteSpec {
    /// Parses `host.domain[/path]` or `domain:port`.
    fn parse(route: &str) -> PlatformResult<Self> {
        let invalid = || PlatformError::Rejected(format!("invalid route '{}'", route));

        if let Some((domain, port)) = route.rsplit_once(':') {
            let port = port.parse().map_err(|_| invalid())?;
            return Ok(Self {
                host: None,
                domain: domain.to_string(),
                path: None,
                port: Some(port),
            });
        }

        let (authority, path) = match route.split_once('/') {
            Some((authority, path)) if !path.is_empty() => (authority, Some(format!("/{}", path))),
            Some((authority, _)) => (authority, None),
            None => (route, None),
        };
        let (host, domain) = authority.split_once('.').ok_or_else(invalid)?;
        if host.is_empty() || domain.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            host: Some(host.to_string()),
            domain: domain.to_string(),
            path,
            port: None,
        })
    }
}
