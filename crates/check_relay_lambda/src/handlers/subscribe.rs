use check_relay_core::contract::{ApiGatewayResponse, ConnectionRecord};
use serde_json::Value;

use super::{connection_id, request_body};
use crate::adapters::connection_table::ConnectionTable;

/// `subscribe` route: ties the calling connection to a check id.
pub async fn handle_subscribe(
    event: &Value,
    now_epoch_secs: i64,
    table: &dyn ConnectionTable,
) -> ApiGatewayResponse {
    let Some(connection_id) = connection_id(event) else {
        return validation_error("requestContext.connectionId is required");
    };

    let body = match request_body(event) {
        Ok(value) => value,
        Err(message) => return validation_error(&message),
    };

    let Some(check_id) = body
        .get("check_id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
    else {
        return validation_error("check_id must be a non-empty string");
    };

    tracing::info!(
        component = "subscribe_handler",
        connection_id,
        check_id,
        "subscribing connection"
    );

    let record = ConnectionRecord::new(connection_id, check_id, now_epoch_secs);
    if let Err(error) = table.put(&record).await {
        tracing::error!(
            component = "subscribe_handler",
            connection_id,
            check_id,
            error = %error,
            "failed to store subscription"
        );
        return ApiGatewayResponse::json_error(500, "storage_failed", &error);
    }

    ApiGatewayResponse::text(200, format!("subscribed for: {connection_id}"))
}

fn validation_error(message: &str) -> ApiGatewayResponse {
    ApiGatewayResponse::json_error(400, "validation_error", message)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct CapturingTable {
        records: Mutex<Vec<ConnectionRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl ConnectionTable for CapturingTable {
        async fn put(&self, record: &ConnectionRecord) -> Result<(), String> {
            if self.fail {
                return Err("table unavailable".to_string());
            }
            self.records
                .lock()
                .expect("poisoned mutex")
                .push(record.clone());
            Ok(())
        }

        async fn connections_for(&self, _check_id: &str) -> Result<Vec<String>, String> {
            Ok(Vec::new())
        }
    }

    fn subscribe_event(body: Value) -> Value {
        json!({
            "requestContext": {"connectionId": "conn-1=", "routeKey": "subscribe"},
            "body": body,
        })
    }

    #[tokio::test]
    async fn stores_record_with_thirty_minute_ttl() {
        let table = CapturingTable::default();
        let response = handle_subscribe(
            &subscribe_event(json!("{\"message\":\"subscribe\",\"check_id\":\"check-9\"}")),
            1_000,
            &table,
        )
        .await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "subscribed for: conn-1=");
        let records = table.records.lock().expect("poisoned mutex").clone();
        assert_eq!(
            records,
            vec![ConnectionRecord {
                connection_id: "conn-1=".to_string(),
                check_id: "check-9".to_string(),
                ttl: 2_800,
            }]
        );
    }

    #[tokio::test]
    async fn rejects_missing_check_id_without_writing() {
        let table = CapturingTable::default();
        let response =
            handle_subscribe(&subscribe_event(json!({"message": "subscribe"})), 0, &table).await;

        assert_eq!(response.status_code, 400);
        assert!(table.records.lock().expect("poisoned mutex").is_empty());
    }

    #[tokio::test]
    async fn stores_check_id_exactly_as_sent() {
        let table = CapturingTable::default();
        let response =
            handle_subscribe(&subscribe_event(json!({"check_id": " check-9 "})), 0, &table).await;

        assert_eq!(response.status_code, 200);
        let records = table.records.lock().expect("poisoned mutex").clone();
        assert_eq!(records[0].check_id, " check-9 ");
    }

    #[tokio::test]
    async fn rejects_blank_check_id() {
        let table = CapturingTable::default();
        let response =
            handle_subscribe(&subscribe_event(json!({"check_id": "  "})), 0, &table).await;

        assert_eq!(response.status_code, 400);
        assert!(table.records.lock().expect("poisoned mutex").is_empty());
    }

    #[tokio::test]
    async fn rejects_event_without_connection_id() {
        let table = CapturingTable::default();
        let response = handle_subscribe(&json!({"body": {"check_id": "x"}}), 0, &table).await;
        assert_eq!(response.status_code, 400);
    }

    #[tokio::test]
    async fn reports_storage_failure() {
        let table = CapturingTable {
            fail: true,
            ..CapturingTable::default()
        };
        let response =
            handle_subscribe(&subscribe_event(json!({"check_id": "x"})), 0, &table).await;

        assert_eq!(response.status_code, 500);
        let body: Value = serde_json::from_str(&response.body).expect("json body");
        assert_eq!(body["error"], "storage_failed");
    }
}
