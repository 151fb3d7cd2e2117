use std::path::PathBuf;
use std::sync::Arc;

use check_relay_core::polling::PollSettings;
use check_relay_core::telemetry::{self, LogFormat};
use check_relay_lambda::adapters::command::ProcessRunner;
use check_relay_lambda::adapters::notifier::SnsNotifier;
use check_relay_lambda::adapters::object_store::S3ObjectStore;
use check_relay_lambda::adapters::queue::SqsQueue;
use check_relay_lambda::check::{CheckConfig, CheckHandler};
use check_relay_lambda::poller::run_poller;
use clap::Parser;

/// Run visual checks from the work queue, publishing progress to SNS.
#[derive(Parser)]
#[command(name = "check-worker")]
struct Args {
    /// Work queue URL
    #[arg(long, env = "QUEUE_URL")]
    queue_url: String,
    /// Maximum messages per receive call
    #[arg(long, env = "MAX_QUEUE_MESSAGES", default_value_t = 1)]
    max_messages: i32,
    /// Long-poll wait per receive call, in seconds
    #[arg(long, env = "WAIT_TIME", default_value_t = 5)]
    wait_time: i32,
    /// Checks run at the same time
    #[arg(long, env = "WORKERS", default_value_t = 1)]
    workers: usize,
    /// Topic for status updates when a check names none
    #[arg(long, env = "DEFAULT_STATUS_TOPIC_ARN")]
    default_status_topic_arn: Option<String>,
    /// Bucket holding check inputs and reports
    #[arg(long, env = "BUCKET_NAME", default_value = "same-story-api-dev")]
    bucket: String,
    /// Token used to clone private repositories
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
    /// Scratch directory for checkouts
    #[arg(long, env = "TMPDIR", default_value = "/tmp")]
    scratch_dir: PathBuf,
    /// Log at debug level
    #[arg(long, env = "DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init(LogFormat::Pretty, args.debug);

    let mut settings = PollSettings::work_queue();
    settings.wait_time_seconds = args.wait_time;
    settings.max_messages = args.max_messages;
    settings.concurrency = args.workers;
    let settings = settings.validate()?;
    tracing::info!(
        component = "check_worker",
        queue_url = %args.queue_url,
        bucket = %args.bucket,
        ?settings,
        "starting"
    );

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let queue = SqsQueue::new(aws_sdk_sqs::Client::new(&aws_config), args.queue_url);
    let handler = CheckHandler::new(
        CheckConfig {
            scratch_dir: args.scratch_dir,
            github_token: args.github_token,
            default_topic_arn: args.default_status_topic_arn,
        },
        Arc::new(ProcessRunner),
        Arc::new(S3ObjectStore::new(&aws_config, args.bucket)),
        Arc::new(SnsNotifier::new(aws_sdk_sns::Client::new(&aws_config))),
    );

    let report = run_poller(&queue, &handler, &settings, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;
    tracing::info!(component = "check_worker", ?report, "stopped");
    Ok(())
}
