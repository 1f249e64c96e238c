use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod commands;
mod config;
mod worker;

use cli::{Args, Mode};
use config::Config;

/// Initialize tracing with file output at ~/.cutover/server.log
fn initialize_tracing() -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "info,\
         cutover_server=debug,\
         cutover_orchestrations=debug,\
         tower_http=debug"
            .into()
    });

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let cutover_dir = PathBuf::from(home).join(".cutover");
    std::fs::create_dir_all(&cutover_dir).ok();

    let file_appender = tracing_appender::rolling::never(&cutover_dir, "server.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops file logging
    std::mem::forget(guard);

    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    initialize_tracing()?;
    let config = Config::load()?;

    match args.mode {
        Mode::Serve { port } => commands::server::run_serve(config, port).await,
        Mode::Run {
            orchestration,
            request,
            output,
        } => commands::task::run_local(&config, orchestration, request, output).await,
        Mode::Releases {
            infra,
            prefix,
            route,
            versioned,
            output,
        } => commands::releases::run(&config, infra, prefix, route, versioned, output).await,
        Mode::Submit {
            orchestration,
            request,
        } => commands::task::submit(&config, orchestration, request).await,
        Mode::Tasks { output } => commands::task::list(&config, output).await,
        Mode::Task { id, logs } => commands::task::get(&config, id, logs).await,
        Mode::Config => commands::server::show_config(&config),
    }
}
