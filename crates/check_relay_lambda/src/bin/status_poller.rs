use std::time::Duration;

use check_relay_core::polling::PollSettings;
use check_relay_core::telemetry::{self, LogFormat};
use check_relay_lambda::adapters::queue::SqsQueue;
use check_relay_lambda::handlers::status::StatusLogHandler;
use check_relay_lambda::poller::run_poller;
use clap::Parser;

/// Consume check status updates from the status queue and log them.
#[derive(Parser)]
#[command(name = "status-poller")]
struct Args {
    /// Status queue URL
    #[arg(long, env = "QUEUE_URL")]
    queue_url: String,
    /// Long-poll wait per receive call, in seconds
    #[arg(long, env = "WAIT_TIME", default_value_t = 1)]
    wait_time: i32,
    /// Maximum messages per receive call
    #[arg(long, env = "MAX_QUEUE_MESSAGES", default_value_t = 10)]
    max_messages: i32,
    /// Seconds between receive calls
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 10)]
    interval_secs: u64,
    /// Log at debug level
    #[arg(long, env = "DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init(LogFormat::Pretty, args.debug);

    let settings = PollSettings {
        wait_time_seconds: args.wait_time,
        max_messages: args.max_messages,
        interval: Duration::from_secs(args.interval_secs),
        concurrency: usize::try_from(args.max_messages).unwrap_or(1),
    }
    .validate()?;
    tracing::info!(component = "status_poller", queue_url = %args.queue_url, ?settings, "starting");

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let queue = SqsQueue::new(aws_sdk_sqs::Client::new(&aws_config), args.queue_url);

    let report = run_poller(&queue, &StatusLogHandler, &settings, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;
    tracing::info!(component = "status_poller", ?report, "stopped");
    Ok(())
}
