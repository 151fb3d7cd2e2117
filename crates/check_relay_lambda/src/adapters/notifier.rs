use async_trait::async_trait;

#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<(), String>;
}

#[derive(Clone)]
pub struct SnsNotifier {
    client: aws_sdk_sns::Client,
}

impl SnsNotifier {
    pub fn new(client: aws_sdk_sns::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusNotifier for SnsNotifier {
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<(), String> {
        self.client
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| format!("failed to publish to {topic_arn}: {error}"))
    }
}
