use fetchbin_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Log to the state-dir file; fall back to stderr if it cannot be opened.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable: {:#}", e);
    }

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("fetchbin error: {:#}", err);
        std::process::exit(cli::exit_code(&err));
    }
}
