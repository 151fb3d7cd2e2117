use check_relay_core::contract::ApiGatewayResponse;
use check_relay_core::telemetry::{self, LogFormat};
use check_relay_lambda::handlers::connect::handle_connect;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

async fn handle_request(event: LambdaEvent<Value>) -> Result<ApiGatewayResponse, Error> {
    Ok(handle_connect(&event.payload, &event.context.request_id))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init_from_env(LogFormat::Json);
    lambda_runtime::run(service_fn(handle_request)).await
}
