//! Decoding of SNS notifications as they arrive through SQS bodies and SNS
//! Lambda events.

use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("queue message body is not valid JSON: {0}")]
    InvalidBody(String),
    #[error("notification message is not valid JSON: {0}")]
    InvalidMessage(String),
    #[error("SNS event must include a non-empty Records array")]
    MissingRecords,
    #[error("SNS record {0} has no Sns.Message string")]
    MissingRecordMessage(usize),
    #[error("notification message has no check_id string")]
    MissingCheckId,
}

/// Extracts the notification text from an SQS message body.
///
/// SNS-to-SQS subscriptions wrap the published text in an envelope whose
/// `Message` field holds it. Raw message delivery skips the envelope, in
/// which case the body is the message.
pub fn notification_text(body: &str) -> Result<String, EnvelopeError> {
    let value: Value =
        serde_json::from_str(body).map_err(|error| EnvelopeError::InvalidBody(error.to_string()))?;

    match value.get("Message").and_then(Value::as_str) {
        Some(message) => Ok(message.to_string()),
        None => Ok(body.to_string()),
    }
}

/// Parses notification text as JSON, leaving non-object payloads intact.
pub fn parse_notification(text: &str) -> Result<Value, EnvelopeError> {
    serde_json::from_str(text).map_err(|error| EnvelopeError::InvalidMessage(error.to_string()))
}

pub fn decode_notification<T: DeserializeOwned>(body: &str) -> Result<T, EnvelopeError> {
    let text = notification_text(body)?;
    serde_json::from_str(&text).map_err(|error| EnvelopeError::InvalidMessage(error.to_string()))
}

pub fn is_sns_event(event: &Value) -> bool {
    event
        .get("Records")
        .and_then(Value::as_array)
        .map(|records| {
            !records.is_empty()
                && records.iter().all(|record| {
                    record
                        .get("EventSource")
                        .and_then(Value::as_str)
                        .map(|source| source == "aws:sns")
                        .unwrap_or(false)
                })
        })
        .unwrap_or(false)
}

/// Returns the raw `Sns.Message` text of every record in an SNS Lambda event.
pub fn sns_record_messages(event: &Value) -> Result<Vec<String>, EnvelopeError> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .filter(|records| !records.is_empty())
        .ok_or(EnvelopeError::MissingRecords)?;

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .get("Sns")
                .and_then(|sns| sns.get("Message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(EnvelopeError::MissingRecordMessage(index))
        })
        .collect()
}

pub fn check_id_of(message: &Value) -> Result<&str, EnvelopeError> {
    message
        .get("check_id")
        .and_then(Value::as_str)
        .ok_or(EnvelopeError::MissingCheckId)
}
