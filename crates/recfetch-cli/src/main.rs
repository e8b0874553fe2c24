use recfetch_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Fall back to stderr when the state dir is unusable.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    let code = match CliCommand::run_from_args().await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{:#}", err), "command failed");
            eprintln!("recfetch error: {:#}", err);
            1
        }
    };
    std::process::exit(code);
}
