use annuaire::cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::Cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        // already reported by the CLI
        Err(_) => ExitCode::FAILURE,
    }
}
