mod support;

use check_relay_core::envelope::EnvelopeError;
use check_relay_lambda::handlers::publish::{handle_publish, PublishError};
use check_relay_lambda::handlers::subscribe::handle_subscribe;
use serde_json::{json, Value};
use support::aws::{MemoryTable, RecordingGateway};

fn sns_event(messages: &[&str]) -> Value {
    let records: Vec<Value> = messages
        .iter()
        .map(|message| {
            json!({
                "EventSource": "aws:sns",
                "Sns": {"Message": message},
            })
        })
        .collect();
    json!({ "Records": records })
}

const STATUS: &str = r#"{"check_id":"chk-1","step":2,"step_count":8,"message":"Syncing GitHub repo"}"#;

#[tokio::test]
async fn status_is_posted_verbatim_to_every_subscribed_connection() {
    let table = MemoryTable::with_connections("chk-1", &["conn-a", "conn-b"]);
    let gateway = RecordingGateway::default();

    let (response, reports) = handle_publish(&sns_event(&[STATUS]), &table, &gateway)
        .await
        .expect("fanout succeeds");

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "Message notified");
    assert_eq!(
        gateway.posts(),
        vec![
            ("conn-a".to_string(), STATUS.to_string()),
            ("conn-b".to_string(), STATUS.to_string()),
        ]
    );
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].delivered, 2);
}

#[tokio::test]
async fn connections_for_other_checks_receive_nothing() {
    let table = MemoryTable::with_connections("chk-2", &["conn-other"]);
    let gateway = RecordingGateway::default();

    let (response, reports) = handle_publish(&sns_event(&[STATUS]), &table, &gateway)
        .await
        .expect("fanout succeeds");

    assert_eq!(response.status_code, 200);
    assert!(gateway.posts().is_empty());
    assert_eq!(reports[0].connections, 0);
}

#[tokio::test]
async fn gone_connections_are_counted_without_failing_the_invocation() {
    let table = MemoryTable::with_connections("chk-1", &["conn-a", "conn-gone"]);
    let gateway = RecordingGateway::with_gone(&["conn-gone"]);

    let (response, reports) = handle_publish(&sns_event(&[STATUS]), &table, &gateway)
        .await
        .expect("fanout succeeds");

    assert_eq!(response.status_code, 200);
    assert_eq!(reports[0].connections, 2);
    assert_eq!(reports[0].delivered, 1);
    assert_eq!(reports[0].failed, 1);
}

#[tokio::test]
async fn every_record_in_the_event_is_fanned_out() {
    let table = MemoryTable::with_connections("chk-1", &["conn-a"]);
    let second = r#"{"check_id":"chk-1","step":3}"#;
    let gateway = RecordingGateway::default();

    let (_, reports) = handle_publish(&sns_event(&[STATUS, second]), &table, &gateway)
        .await
        .expect("fanout succeeds");

    assert_eq!(reports.len(), 2);
    assert_eq!(gateway.posts().len(), 2);
}

#[tokio::test]
async fn malformed_status_fails_the_invocation() {
    let table = MemoryTable::with_connections("chk-1", &["conn-a"]);
    let gateway = RecordingGateway::default();

    let error = handle_publish(&sns_event(&["{not json"]), &table, &gateway)
        .await
        .expect_err("malformed message");
    assert!(matches!(
        error,
        PublishError::Envelope(EnvelopeError::InvalidMessage(_))
    ));

    let error = handle_publish(&sns_event(&[r#"{"step":1}"#]), &table, &gateway)
        .await
        .expect_err("missing check id");
    assert!(matches!(
        error,
        PublishError::Envelope(EnvelopeError::MissingCheckId)
    ));

    let error = handle_publish(&json!({"Records": []}), &table, &gateway)
        .await
        .expect_err("no records");
    assert!(matches!(error, PublishError::Envelope(EnvelopeError::MissingRecords)));
    assert!(gateway.posts().is_empty());
}

#[tokio::test]
async fn unreadable_connection_table_fails_the_invocation() {
    let table = MemoryTable::unavailable();
    let gateway = RecordingGateway::default();

    let error = handle_publish(&sns_event(&[STATUS]), &table, &gateway)
        .await
        .expect_err("lookup fails");

    assert!(matches!(error, PublishError::ConnectionLookup(_)));
}

#[tokio::test]
async fn subscription_then_publish_reaches_the_subscriber() {
    let table = MemoryTable::default();
    let gateway = RecordingGateway::default();
    let subscribe = json!({
        "requestContext": {"connectionId": "conn-live", "routeKey": "subscribe"},
        "body": r#"{"message":"subscribe","check_id":"chk-1"}"#,
    });

    let response = handle_subscribe(&subscribe, 1_700_000_000, &table).await;
    assert_eq!(response.status_code, 200);
    assert_eq!(table.records()[0].ttl, 1_700_000_000 + 1800);

    handle_publish(&sns_event(&[STATUS]), &table, &gateway)
        .await
        .expect("fanout succeeds");
    assert_eq!(gateway.posts(), vec![("conn-live".to_string(), STATUS.to_string())]);
}
