//! CLI entry point: `socks5-proxy <config_file>`.

mod acceptor;
mod config;
mod error;
mod logging;
mod session;

use acceptor::Acceptor;
use config::Config;
use std::{env, process::ExitCode};
use tracing::{error, info, level_filters::LevelFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "socks5-proxy".to_owned());

    let config_path = args.next();
    let extra_args = args.next().is_some();

    let Some(config_path) = config_path.filter(|_| !extra_args) else {
        println!("Usage: {program} <config_file>");
        return ExitCode::FAILURE;
    };

    // Installed before `Config::load` so a missing/malformed config
    // file still has a subscriber to log its "critical" failure into.
    let log_handle = logging::init(LevelFilter::ERROR);

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!(critical = true, error = %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    log_handle.set_filter(config.log_filter().expect("validated during Config::load"));

    let acceptor = match Acceptor::bind(config.port, config.buffer_size).await {
        Ok(acceptor) => acceptor,
        Err(err) => {
            error!(error = %err, port = config.port, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    match acceptor.local_addr() {
        Ok(addr) => info!(address = %addr, "listening"),
        Err(err) => error!(error = %err, "failed to read local address"),
    }

    acceptor.run().await;

    ExitCode::SUCCESS
}
