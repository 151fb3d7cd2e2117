use check_relay_core::contract::ApiGatewayResponse;
use check_relay_core::envelope::{check_id_of, parse_notification, sns_record_messages, EnvelopeError};
use futures::future::join_all;
use serde_json::Value;

use crate::adapters::connection_table::ConnectionTable;
use crate::adapters::gateway::ConnectionGateway;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error("{0}")]
    ConnectionLookup(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub check_id: String,
    pub connections: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// SNS-triggered fanout of status updates to subscribed WebSocket connections.
///
/// Every record's message is forwarded verbatim. Posting failures (stale or
/// gone connections) are logged and counted but never fail the invocation;
/// a malformed record or an unreadable connection table does.
pub async fn handle_publish(
    event: &Value,
    table: &dyn ConnectionTable,
    gateway: &dyn ConnectionGateway,
) -> Result<(ApiGatewayResponse, Vec<FanoutReport>), PublishError> {
    let messages = sns_record_messages(event)?;

    let mut reports = Vec::with_capacity(messages.len());
    for text in messages {
        reports.push(fan_out(&text, table, gateway).await?);
    }

    Ok((ApiGatewayResponse::text(200, "Message notified"), reports))
}

async fn fan_out(
    text: &str,
    table: &dyn ConnectionTable,
    gateway: &dyn ConnectionGateway,
) -> Result<FanoutReport, PublishError> {
    let message = parse_notification(text)?;
    let check_id = check_id_of(&message)?.to_string();
    tracing::info!(
        component = "publish_handler",
        check_id = %check_id,
        message = %message,
        "fanning out status update"
    );

    let connection_ids = table
        .connections_for(&check_id)
        .await
        .map_err(PublishError::ConnectionLookup)?;

    let posts = connection_ids.iter().map(|connection_id| async move {
        let result = gateway.post(connection_id, text.as_bytes()).await;
        match &result {
            Ok(()) => tracing::info!(
                component = "publish_handler",
                connection_id = %connection_id,
                "success sending status update via WebSocket"
            ),
            Err(error) => tracing::warn!(
                component = "publish_handler",
                connection_id = %connection_id,
                error = %error,
                "error sending status update via WebSocket"
            ),
        }
        result.is_ok()
    });
    let outcomes = join_all(posts).await;
    let delivered = outcomes.iter().filter(|ok| **ok).count();

    Ok(FanoutReport {
        check_id,
        connections: connection_ids.len(),
        delivered,
        failed: connection_ids.len() - delivered,
    })
}
