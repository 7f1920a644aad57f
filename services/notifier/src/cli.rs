use crate::commands::{run_audit, run_report, ReportArgs, RunArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use passwatch::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "passwatch",
    about = "Audit directory accounts for expiring passwords and notify their owners",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the audit: classify, write the HTML report, and send notices (default command)
    Run(RunArgs),
    /// Print a plain-text bucket summary without writing files or sending mail
    Report(ReportArgs),
    /// Start the HTTP service
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Run(RunArgs::default()));

    match command {
        // Directory and SMTP clients are blocking; keep them off the async workers.
        Command::Run(args) => blocking(move || run_audit(args)).await,
        Command::Report(args) => blocking(move || run_report(args)).await,
        Command::Serve(args) => server::run(args).await,
    }
}

async fn blocking<F>(job: F) -> Result<(), AppError>
where
    F: FnOnce() -> Result<(), AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| AppError::Runtime(err.to_string()))?
}
