use check_relay_core::contract::ApiGatewayResponse;
use serde_json::Value;

use super::connection_id;

/// `$connect` route. Accepts every connection; subscriptions happen later.
pub fn handle_connect(event: &Value, request_id: &str) -> ApiGatewayResponse {
    tracing::info!(
        component = "connect_handler",
        request_id,
        connection_id = connection_id(event).unwrap_or("<unknown>"),
        event = %event,
        "connection opened"
    );
    ApiGatewayResponse::text(200, "successfully connected")
}
