use clap::Parser;

use redub::cli::{self, Cli, ShutdownController};

fn main() {
    redub::logging::init();

    if let Err(e) = ShutdownController::install() {
        tracing::warn!("failed to install Ctrl+C handler: {e}");
    }

    let cli = Cli::parse();
    if let Err(error) = cli::run(cli) {
        if ShutdownController::is_shutting_down() {
            eprintln!("interrupted");
            std::process::exit(ShutdownController::signal_exit_code());
        }
        eprintln!("error [{}]: {error}", error.error_code());
        std::process::exit(1);
    }

    if ShutdownController::is_shutting_down() {
        std::process::exit(ShutdownController::signal_exit_code());
    }
}
