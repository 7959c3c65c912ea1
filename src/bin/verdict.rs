use std::{io, process::ExitCode};

use ortho_config::OrthoConfig;
use phrase_verdict::cli::{self, VerdictArgs};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = match VerdictArgs::load() {
        Ok(args) => args,
        Err(error) => {
            eprintln!("verdict: {error}");
            return ExitCode::from(2);
        }
    };
    match cli::run(&args, &mut io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "classification failed");
            eprintln!("verdict: {error}");
            ExitCode::FAILURE
        }
    }
}
