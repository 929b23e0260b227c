use crate::demo::{
    run_allowance_batch, run_allowance_compute, run_demo, BatchArgs, ComputeArgs, DemoArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use scholarship_ai::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Scholarship Allowance Review",
    about = "Run and demonstrate the scholarship allowance review service from the command line",
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
    /// Compute allowances without submitting an application
    Allowance {
        #[command(subcommand)]
        command: AllowanceCommand,
    },
    /// Walk a submission through verification, review and the dashboard summary
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum AllowanceCommand {
    /// Compute the allowance for a single academic record
    Compute(ComputeArgs),
    /// Compute allowances for every row of an extracted-facts CSV
    Batch(BatchArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Extracted-facts CSV answering document verification requests
    #[arg(long)]
    pub(crate) verification_csv: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Allowance {
            command: AllowanceCommand::Compute(args),
        } => run_allowance_compute(args),
        Command::Allowance {
            command: AllowanceCommand::Batch(args),
        } => run_allowance_batch(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
