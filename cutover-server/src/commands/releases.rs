use anyhow::{Context, Result};
use cutover_models::{ApplicationSummary, InfraConfig, NamingStrategy, RequestConfig};
use cutover_orchestrations::context::WorkingDirectory;
use cutover_orchestrations::platform::Platform;
use cutover_orchestrations::resolver::{self, ActiveSelector, ReleaseSet};
use std::path::PathBuf;

use crate::config::Config;

pub async fn run(
    config: &Config,
    infra: PathBuf,
    prefix: String,
    routes: Vec<String>,
    versioned: bool,
    output: String,
) -> Result<()> {
    let infra: InfraConfig = super::read_json(&infra).await?;
    let workdir = WorkingDirectory::create(&config.work_dir).await?;
    let request_config = RequestConfig::new(&infra, 1, workdir.path().to_path_buf());

    let platform = config.create_platform();
    let releases = platform
        .list_previous_releases(&request_config, &prefix)
        .await
        .context("Failed to list releases")?;

    let selector = if routes.is_empty() {
        ActiveSelector::LatestRunning
    } else {
        ActiveSelector::Routes(routes)
    };
    let strategy = if versioned {
        NamingStrategy::Versioned
    } else {
        NamingStrategy::NonVersioned
    };
    let set = resolver::resolve(&prefix, &releases, &selector, strategy)?;

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&releases)?);
    } else {
        print_table(&set);
    }
    Ok(())
}

fn print_table(set: &ReleaseSet) {
    println!("{:<30} {:<10} {:<10} {:<40}", "NAME", "ROLE", "INSTANCES", "ROUTES");
    println!("{}", "-".repeat(90));

    let row = |app: &ApplicationSummary, role: &str| {
        println!(
            "{:<30} {:<10} {:<10} {:<40}",
            app.name,
            role,
            format!("{}/{}", app.running_instance_count, app.instance_count),
            app.urls.join(",")
        );
    };
    if let Some(app) = &set.active {
        row(app, "active");
    }
    if let Some(app) = &set.inactive {
        row(app, "inactive");
    }
    for app in &set.older {
        row(app, "older");
    }
    for app in &set.interim {
        row(app, "interim");
    }

    println!();
    if set.is_first_deployment() {
        println!("No releases found under prefix '{}'", set.prefix);
    } else {
        println!("Next revision: {}", set.next_revision());
    }
}
