#![forbid(unsafe_code)]

//! dscn: dynamic scenarios archive inspector entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli_app::run(&args) {
        eprintln!("dscn: {e}");
        std::process::exit(e.exit_code());
    }
}
