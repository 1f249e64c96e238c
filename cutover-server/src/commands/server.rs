use anyhow::Result;
use cutover_orchestrations::registry::create_task_registry;

use crate::api::{self, AppState};
use crate::config::Config;
use crate::worker::Worker;

pub async fn run_serve(config: Config, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.server_port);
    tracing::info!("Starting Cutover server");
    tracing::info!("Platform: {}", config.platform);
    tracing::info!("Work directory: {}", config.work_dir.display());

    tokio::fs::create_dir_all(&config.work_dir).await?;

    let platform = config.create_platform();
    let context_config = config.clone();
    let worker = Worker::new(create_task_registry(), platform, move |platform, log| {
        context_config.task_context(platform, log)
    })
    .with_task_retention(config.task_retention);
    let state = AppState { worker };

    let host = config.server_host.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::start_server(&host, port, state).await {
            tracing::error!("API server error: {}", e);
        }
    });

    tracing::info!("✓ Cutover server ready");
    tracing::info!("  API: http://{}:{}", config.server_host, port);
    tracing::info!("  Press Ctrl+C to stop");
    println!("✓ Cutover server listening on http://{}:{}", config.server_host, port);

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    api_handle.abort();

    Ok(())
}

pub fn show_config(config: &Config) -> Result<()> {
    println!("Cutover Configuration");
    println!("{}", "=".repeat(60));
    println!();
    println!("Server:");
    println!("  Host:               {}", config.server_host);
    println!("  Port:               {}", config.server_port);
    println!("  API URL:            {}", config.api_url);
    println!();
    println!("Platform:");
    println!("  Kind:               {}", config.platform);
    println!("  cf CLI:             {}", config.cf_cli_path.display());
    println!("  Work directory:     {}", config.work_dir.display());
    println!("  Poll interval:      {}s", config.poll_interval.as_secs());
    println!("  Task retention:     {}", config.task_retention);
    Ok(())
}
