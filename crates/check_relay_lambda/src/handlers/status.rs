use async_trait::async_trait;
use check_relay_core::envelope::{notification_text, parse_notification};

use crate::adapters::queue::ReceivedMessage;
use crate::poller::MessageHandler;

/// Consumer for the status queue: decodes each status update and logs it.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusLogHandler;

#[async_trait]
impl MessageHandler for StatusLogHandler {
    async fn handle(&self, message: &ReceivedMessage) -> Result<(), String> {
        let text = notification_text(&message.body).map_err(|error| error.to_string())?;
        let update = parse_notification(&text).map_err(|error| error.to_string())?;
        tracing::info!(
            component = "status_poller",
            check_id = update.get("check_id").and_then(|id| id.as_str()).unwrap_or(""),
            message = %update,
            "status message"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn received(body: String) -> ReceivedMessage {
        ReceivedMessage {
            message_id: Some("m-1".to_string()),
            body,
            receipt_handle: "rh-1".to_string(),
        }
    }

    #[tokio::test]
    async fn accepts_enveloped_status_update() {
        let body = json!({"Message": "{\"check_id\":\"abc\",\"step\":3}"}).to_string();
        assert!(StatusLogHandler.handle(&received(body)).await.is_ok());
    }

    #[tokio::test]
    async fn fails_on_malformed_message() {
        let body = json!({"Message": "{broken"}).to_string();
        let error = StatusLogHandler
            .handle(&received(body))
            .await
            .expect_err("should fail");
        assert!(error.contains("not valid JSON"));
    }
}
