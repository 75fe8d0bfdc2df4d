use std::process::ExitCode;

use clap::Parser;
use tokio::select;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;
use upload_server::config::UploadConfig;
use upload_server::server::UploadServer;

#[tokio::main]
async fn main() -> ExitCode {
    let config = UploadConfig::parse();

    let subscriber = FmtSubscriber::builder().with_max_level(config.log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {e}");
    }

    let server = match UploadServer::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "failed to start upload server");
            return ExitCode::FAILURE;
        }
    };

    select! {
        () = server.serve() => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("received ctrl-c, shutting down"),
            Err(e) => error!(cause = %e, "failed to listen for ctrl-c"),
        }
    }

    ExitCode::SUCCESS
}
