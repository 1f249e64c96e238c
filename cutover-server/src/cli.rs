use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cutover - blue-green and rolling deployments for PaaS applications
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Run the API server
    Serve {
        /// API port (default: SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one orchestration in-process and print its response
    Run {
        /// Orchestration name, full ("cutover::orchestration::resize") or short ("resize")
        orchestration: String,

        /// JSON file holding the request
        #[arg(short, long)]
        request: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Show how the applications under a prefix resolve
    Releases {
        /// JSON file holding the infra config
        #[arg(long)]
        infra: PathBuf,

        /// Release name prefix
        #[arg(long)]
        prefix: String,

        /// Production route; the application holding it is active
        #[arg(long)]
        route: Vec<String>,

        /// Resolve with versioned naming
        #[arg(long)]
        versioned: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Submit an orchestration to a running server
    Submit {
        /// Orchestration name, full or short
        orchestration: String,

        /// JSON file holding the request
        #[arg(short, long)]
        request: PathBuf,
    },

    /// List tasks known to a running server
    Tasks {
        /// Output format
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Get one task from a running server
    Task {
        /// Task ID
        id: String,

        /// Show command unit logs
        #[arg(long)]
        logs: bool,
    },

    /// Show current configuration
    Config,
}
