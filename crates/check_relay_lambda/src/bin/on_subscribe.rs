use chrono::Utc;
use check_relay_core::contract::ApiGatewayResponse;
use check_relay_core::telemetry::{self, LogFormat};
use check_relay_lambda::adapters::connection_table::DynamoConnectionTable;
use check_relay_lambda::handlers::subscribe::handle_subscribe;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

async fn handle_request(
    event: LambdaEvent<Value>,
    table: &DynamoConnectionTable,
) -> Result<ApiGatewayResponse, Error> {
    tracing::debug!(
        component = "subscribe_handler",
        request_id = %event.context.request_id,
        event = %event.payload,
        "received event"
    );
    Ok(handle_subscribe(&event.payload, Utc::now().timestamp(), table).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init_from_env(LogFormat::Json);

    let table_name =
        std::env::var("TABLE_NAME").map_err(|_| Error::from("TABLE_NAME must be configured"))?;
    tracing::info!(component = "subscribe_handler", table_name = %table_name, "starting");

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let table = DynamoConnectionTable::new(aws_sdk_dynamodb::Client::new(&aws_config), table_name);

    lambda_runtime::run(service_fn(|event| handle_request(event, &table))).await
}
