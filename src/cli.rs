use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "fleetdash",
    version,
    about = "Terminal dashboard for managed compute instances."
)]
pub struct CliArgs {
    /// Backend base address (http or https)
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// Path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Write diagnostics to this file (discarded otherwise)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
