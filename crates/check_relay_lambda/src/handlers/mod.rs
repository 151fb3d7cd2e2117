pub mod connect;
pub mod publish;
pub mod status;
pub mod subscribe;

use serde_json::{json, Value};

/// Returns the API Gateway request body as JSON, whether it arrived as a
/// string, an object, or not at all.
pub(crate) fn request_body(event: &Value) -> Result<Value, String> {
    let Some(object) = event.as_object() else {
        return Err("Request payload must be a JSON object".to_string());
    };

    match object.get("body") {
        None | Some(Value::Null) => Ok(json!({})),
        Some(Value::Object(_)) => Ok(object["body"].clone()),
        Some(Value::String(text)) => {
            serde_json::from_str(text).map_err(|error| format!("Malformed JSON body: {error}"))
        }
        Some(_) => Err("Request body must be a JSON object".to_string()),
    }
}

pub(crate) fn connection_id(event: &Value) -> Option<&str> {
    event
        .get("requestContext")
        .and_then(|context| context.get("connectionId"))
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
}
