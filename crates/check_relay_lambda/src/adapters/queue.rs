use async_trait::async_trait;
use check_relay_core::polling::PollSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: Option<String>,
    pub body: String,
    pub receipt_handle: String,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn receive(&self, settings: &PollSettings) -> Result<Vec<ReceivedMessage>, String>;

    async fn acknowledge(&self, receipt_handle: &str) -> Result<(), String>;
}

#[derive(Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self, settings: &PollSettings) -> Result<Vec<ReceivedMessage>, String> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .wait_time_seconds(settings.wait_time_seconds)
            .max_number_of_messages(settings.max_messages)
            .send()
            .await
            .map_err(|error| format!("failed to receive queue messages: {error}"))?;

        let mut messages = Vec::new();
        for message in output.messages() {
            let Some(receipt_handle) = message.receipt_handle() else {
                tracing::warn!(
                    component = "queue",
                    message_id = ?message.message_id(),
                    "skipping message without receipt handle"
                );
                continue;
            };
            messages.push(ReceivedMessage {
                message_id: message.message_id().map(str::to_string),
                body: message.body().unwrap_or_default().to_string(),
                receipt_handle: receipt_handle.to_string(),
            });
        }
        Ok(messages)
    }

    async fn acknowledge(&self, receipt_handle: &str) -> Result<(), String> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| format!("failed to delete queue message: {error}"))
    }
}
