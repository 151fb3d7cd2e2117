use std::time::Duration;

use check_relay_client::{watch, ClientError, WatchConfig};
use check_relay_core::reconnect::DEFAULT_RETRIES;
use check_relay_core::telemetry::{self, LogFormat};
use clap::Parser;

/// Follow status updates for one check over the relay WebSocket.
#[derive(Parser)]
#[command(name = "status-watch")]
struct Args {
    /// WebSocket endpoint, e.g. wss://<api>.execute-api.<region>.amazonaws.com/<stage>
    #[arg(long, env = "WS_URL")]
    url: String,
    /// Check to subscribe to
    #[arg(long, env = "CHECK_ID")]
    check_id: String,
    /// Reconnect budget
    #[arg(long, env = "RETRIES", default_value_t = DEFAULT_RETRIES)]
    retries: u32,
    /// Seconds between keepalive pings
    #[arg(long, env = "KEEPALIVE_SECS", default_value_t = 10)]
    keepalive_secs: u64,
    /// Seconds allowed for each connection handshake
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    connect_timeout_secs: u64,
    /// Log at debug level
    #[arg(long, env = "DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init(LogFormat::Pretty, args.debug);

    let config = WatchConfig {
        url: args.url,
        check_id: args.check_id,
        retries: args.retries,
        keepalive: Duration::from_secs(args.keepalive_secs),
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
    };

    let (updates, mut received) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(update) = received.recv().await {
            println!("{update}");
        }
    });

    let result = watch(&config, updates, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;
    let _ = printer.await;

    let code = exit_code(result)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Process exit code for a finished watch. A spent retry budget is a plain
/// non-zero exit; other errors are setup failures reported by `main`.
fn exit_code(result: Result<(), ClientError>) -> anyhow::Result<i32> {
    match result {
        Ok(()) => Ok(0),
        Err(error @ ClientError::RetriesExhausted { .. }) => {
            tracing::error!(component = "status_watch", error = %error, "exiting");
            Ok(1)
        }
        Err(error) => Err(error.into()),
    }
}
