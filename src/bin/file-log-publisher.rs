use std::process::ExitCode;

use tracing::{error, info};

use file_log_publisher::config::PublisherConfig;
use file_log_publisher::init::{init_logging, LoggingConfig};
use file_log_publisher::publisher::Publisher;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_logging(LoggingConfig::default()) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let config = match PublisherConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        directory = %config.directory.display(),
        endpoint = %config.endpoint,
        interval = ?config.flush_interval,
        "starting file log publisher"
    );

    let publisher = match Publisher::from_config(config) {
        Ok(publisher) => publisher,
        Err(e) => {
            error!(error = %e, "failed to build publisher");
            return ExitCode::FAILURE;
        }
    };

    let handle = publisher.start();
    let stop = handle.shutdown_sender();

    // Stop on Ctrl-C, or exit right away if the loop fails at startup.
    let waiter = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, draining");
                let _ = stop.send(None).await;
            }
            Err(e) => {
                let _ = stop.send(Some(Box::new(e))).await;
            }
        }
    });

    let result = handle.join().await;
    waiter.abort();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "publisher exited with an error");
            ExitCode::FAILURE
        }
    }
}
