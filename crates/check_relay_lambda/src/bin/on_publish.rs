use check_relay_core::contract::ApiGatewayResponse;
use check_relay_core::envelope::is_sns_event;
use check_relay_core::telemetry::{self, LogFormat};
use check_relay_lambda::adapters::connection_table::DynamoConnectionTable;
use check_relay_lambda::adapters::gateway::ApiGatewayConnections;
use check_relay_lambda::handlers::publish::handle_publish;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

struct RuntimeDependencies {
    table: DynamoConnectionTable,
    gateway: ApiGatewayConnections,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<ApiGatewayResponse, Error> {
    if !is_sns_event(&event.payload) {
        tracing::warn!(
            component = "publish_handler",
            request_id = %event.context.request_id,
            "event is not an SNS notification"
        );
    }

    let (response, reports) = handle_publish(&event.payload, &deps.table, &deps.gateway).await?;
    for report in reports {
        tracing::info!(
            component = "publish_handler",
            check_id = %report.check_id,
            connections = report.connections,
            delivered = report.delivered,
            failed = report.failed,
            "status update fanned out"
        );
    }
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init_from_env(LogFormat::Json);

    let table_name =
        std::env::var("TABLE_NAME").map_err(|_| Error::from("TABLE_NAME must be configured"))?;
    let callback_url = std::env::var("CALL_BACK_URL")
        .map_err(|_| Error::from("CALL_BACK_URL must be configured"))?;
    tracing::info!(
        component = "publish_handler",
        table_name = %table_name,
        callback_url = %callback_url,
        "starting"
    );

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        table: DynamoConnectionTable::new(aws_sdk_dynamodb::Client::new(&aws_config), table_name),
        gateway: ApiGatewayConnections::new(&aws_config, &callback_url),
    };

    lambda_runtime::run(service_fn(|event| handle_request(event, &deps))).await
}
