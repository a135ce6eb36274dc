use archive_replay_cli::{error_chain, run_cli};
use tracing::error;

#[tokio::main]
async fn main() {
    // Run CLI and handle errors
    if let Err(e) = run_cli().await {
        let message = error_chain(&e);
        error!(error = %message, "CLI error");
        eprintln!("Error: {}", message);

        std::process::exit(e.exit_code());
    }
}
