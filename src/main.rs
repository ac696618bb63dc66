mod cli;
mod decompress;
mod error;

use crate::cli::{Cli, Input};
use crate::decompress::Job;
use clap::Parser;
use decant_config::Config;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::debug!(error = ?err, "Configuration failed to load");
            eprintln!("decant: {}", &*err);
            return ExitCode::FAILURE;
        },
    };
    let job = Job { options: cli.options(&config), to_stdout: cli.to_stdout, keep: cli.keep() };
    tracing::debug!(?job, "Starting");

    let mut failed = false;
    for input in cli.inputs() {
        let (result, label) = match &input {
            Input::Stdin => (job.stdin(), None),
            Input::File(path) => (job.file(path), Some(path.display().to_string())),
        };
        if let Err(err) = result {
            tracing::debug!(error = ?err, retryable = err.is_retryable(), "Input failed");
            match label {
                Some(file) => eprintln!("decant: {file}: {}", &*err),
                None => eprintln!("decant: {}", &*err),
            }
            failed = true;
        }
    }

    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
