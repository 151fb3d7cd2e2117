use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::primitives::Blob;

#[async_trait]
pub trait ConnectionGateway: Send + Sync {
    async fn post(&self, connection_id: &str, data: &[u8]) -> Result<(), String>;
}

/// Posts to WebSocket connections through the gateway management API.
#[derive(Clone)]
pub struct ApiGatewayConnections {
    client: aws_sdk_apigatewaymanagement::Client,
}

impl ApiGatewayConnections {
    /// `callback_url` is the stage's `https://` connection management URL.
    pub fn new(sdk_config: &aws_config::SdkConfig, callback_url: &str) -> Self {
        let config = aws_sdk_apigatewaymanagement::config::Builder::from(sdk_config)
            .endpoint_url(callback_url)
            .build();
        Self {
            client: aws_sdk_apigatewaymanagement::Client::from_conf(config),
        }
    }
}

#[async_trait]
impl ConnectionGateway for ApiGatewayConnections {
    async fn post(&self, connection_id: &str, data: &[u8]) -> Result<(), String> {
        self.client
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(data.to_vec()))
            .send()
            .await
            .map(|_| ())
            .map_err(|error| format!("failed to post to connection {connection_id}: {error}"))
    }
}
