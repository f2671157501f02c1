use crate::commands::{run_export, run_report, ExportArgs, ReportArgs};
use crate::server;
use admissions::config::StorageConfig;
use admissions::error::AppError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Admissions Admin",
    about = "Review student applications and publish admissions reports",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Write the confirmed-students spreadsheet and print its path
    Export(ExportArgs),
    /// Print acceptance rates and confirmed-student breakdowns
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[command(flatten)]
    pub(crate) storage: StorageArgs,
}

/// Storage overrides shared by every subcommand.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct StorageArgs {
    /// Override the SQLite database path
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
    /// Override the directory spreadsheet exports are written to
    #[arg(long)]
    pub(crate) exports_dir: Option<PathBuf>,
}

impl StorageArgs {
    pub(crate) fn apply(self, storage: &mut StorageConfig) {
        if let Some(database) = self.database {
            storage.database_path = database;
        }
        if let Some(dir) = self.exports_dir {
            storage.export_dir = dir;
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Export(args) => run_export(args).await,
        Command::Report(args) => run_report(args).await,
    }
}
