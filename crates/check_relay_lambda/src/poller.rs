//! Timer-driven queue consumer.
//!
//! Each cycle receives up to one batch, hands every message to the handler
//! independently, and acknowledges (deletes) each message whatever the
//! handler returned. Redelivery of messages that were never acknowledged is
//! left to the queue.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use check_relay_core::polling::{PollReport, PollSettings};
use futures::stream::{self, StreamExt};
use tokio::time::{Interval, MissedTickBehavior};

use crate::adapters::queue::{MessageQueue, ReceivedMessage};

const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &ReceivedMessage) -> Result<(), String>;
}

/// One receive-handle-acknowledge round.
pub async fn poll_once(
    queue: &dyn MessageQueue,
    handler: &dyn MessageHandler,
    settings: &PollSettings,
) -> Result<PollReport, String> {
    tracing::debug!(component = "poller", "checking for messages");
    let messages = queue.receive(settings).await?;
    Ok(process_batch(queue, handler, messages, settings.concurrency).await)
}

pub async fn process_batch(
    queue: &dyn MessageQueue,
    handler: &dyn MessageHandler,
    messages: Vec<ReceivedMessage>,
    concurrency: usize,
) -> PollReport {
    stream::iter(messages)
        .map(|message| process_message(queue, handler, message))
        .buffer_unordered(concurrency.max(1))
        .fold(PollReport::default(), |mut total, report| async move {
            total.merge(report);
            total
        })
        .await
}

async fn process_message(
    queue: &dyn MessageQueue,
    handler: &dyn MessageHandler,
    message: ReceivedMessage,
) -> PollReport {
    let mut report = PollReport {
        received: 1,
        ..PollReport::default()
    };

    match handler.handle(&message).await {
        Ok(()) => report.handled += 1,
        Err(error) => {
            report.handler_failures += 1;
            tracing::error!(
                component = "poller",
                message_id = ?message.message_id,
                error = %error,
                "message handling failed"
            );
        }
    }

    match queue.acknowledge(&message.receipt_handle).await {
        Ok(()) => {
            report.acknowledged += 1;
            tracing::info!(
                component = "poller",
                message_id = ?message.message_id,
                "message deleted"
            );
        }
        Err(error) => {
            report.acknowledge_failures += 1;
            tracing::warn!(
                component = "poller",
                message_id = ?message.message_id,
                error = %error,
                "failed to delete message"
            );
        }
    }

    report
}

/// Polls until `shutdown` resolves. Shutdown is observed between cycles and
/// while waiting on the queue; a batch already received is always finished.
pub async fn run_poller<F>(
    queue: &dyn MessageQueue,
    handler: &dyn MessageHandler,
    settings: &PollSettings,
    shutdown: F,
) -> PollReport
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = ticker_for(settings.interval);
    let mut total = PollReport::default();

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = next_tick(&mut ticker) => {}
        }

        let received = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            received = queue.receive(settings) => received,
        };

        match received {
            Ok(messages) => {
                if messages.is_empty() {
                    continue;
                }
                let report = process_batch(queue, handler, messages, settings.concurrency).await;
                tracing::info!(
                    component = "poller",
                    received = report.received,
                    handled = report.handled,
                    handler_failures = report.handler_failures,
                    acknowledged = report.acknowledged,
                    "batch processed"
                );
                total.merge(report);
            }
            Err(error) => {
                tracing::warn!(component = "poller", error = %error, "receive failed");
                if ticker.is_none() {
                    tokio::select! {
                        biased;
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => {}
                    }
                }
            }
        }
    }

    tracing::info!(component = "poller", "done");
    total
}

fn ticker_for(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    if let Some(ticker) = ticker {
        ticker.tick().await;
    }
}
