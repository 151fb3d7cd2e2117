use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

pub const SUBSCRIBE_MESSAGE: &str = "subscribe";
pub const PING_MESSAGE: &str = "ping";
pub const CONNECTION_TTL_SECS: i64 = 60 * 30;

pub const DEFAULT_VIEWPORT_WIDTH: u32 = 800;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 600;
pub const DEFAULT_SERVER_TIMEOUT_MS: u64 = 50_000;
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 10_000;

/// Progress messages published while a check runs, in order.
pub const CHECK_STATUS_MESSAGES: [&str; 8] = [
    "job started",
    "downloaded Figma check frame",
    "checked out code",
    "installed packages",
    "captured screenshots",
    "completed visual comparisons",
    "completed numeric comparisons",
    "uploaded screenshots",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub message: String,
    pub check_id: String,
}

impl SubscribeRequest {
    pub fn new(check_id: impl Into<String>) -> Self {
        Self {
            message: SUBSCRIBE_MESSAGE.to_string(),
            check_id: check_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeepalivePing {
    pub message: String,
}

impl Default for KeepalivePing {
    fn default() -> Self {
        Self {
            message: PING_MESSAGE.to_string(),
        }
    }
}

/// Row stored in the connection table for every subscribed WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionRecord {
    #[serde(rename = "connectionId")]
    pub connection_id: String,
    #[serde(rename = "checkId")]
    pub check_id: String,
    pub ttl: i64,
}

impl ConnectionRecord {
    pub fn new(
        connection_id: impl Into<String>,
        check_id: impl Into<String>,
        now_epoch_secs: i64,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            check_id: check_id.into(),
            ttl: connection_ttl(now_epoch_secs),
        }
    }
}

pub fn connection_ttl(now_epoch_secs: i64) -> i64 {
    now_epoch_secs.saturating_add(CONNECTION_TTL_SECS)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub check_id: String,
    pub step: usize,
    pub step_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl StatusUpdate {
    pub fn progress(check_id: impl Into<String>, step: usize) -> Self {
        Self {
            check_id: check_id.into(),
            step,
            step_count: CHECK_STATUS_MESSAGES.len(),
            message: CHECK_STATUS_MESSAGES.get(step).map(|text| text.to_string()),
            error: None,
        }
    }

    pub fn failure(check_id: impl Into<String>, step: usize, error: Value) -> Self {
        Self {
            check_id: check_id.into(),
            step,
            step_count: CHECK_STATUS_MESSAGES.len(),
            message: None,
            error: Some(error),
        }
    }
}

/// Reasons a check request cannot be run. Ids and names become directory
/// names and object key segments, so they must stay inside their prefix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckSpecError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("{field} must be a single path segment, got '{value}'")]
    NotASegment { field: &'static str, value: String },
    #[error("path must be relative without '.' or '..' segments, got '{0}'")]
    UnsafePath(String),
}

/// Work item describing one visual check.
///
/// Numeric fields arrive either as JSON numbers or as strings. Fields the
/// worker does not interpret are kept in `extra` and echoed into the results
/// document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckSpec {
    pub check_id: String,
    pub repository: String,
    pub story: String,
    pub component: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(
        default,
        deserialize_with = "number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub width: Option<u32>,
    #[serde(
        default,
        deserialize_with = "number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<u32>,
    #[serde(
        default,
        deserialize_with = "number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub server_timeout: Option<u64>,
    #[serde(
        default,
        deserialize_with = "number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub capture_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sns_topic_arn: Option<String>,
    #[serde(default, skip_serializing)]
    pub github_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CheckSpec {
    pub fn validate(&self) -> Result<(), CheckSpecError> {
        single_segment("check_id", &self.check_id)?;
        single_segment("story", &self.story)?;
        single_segment("component", &self.component)?;

        if self.path.trim().is_empty() {
            return Err(CheckSpecError::Empty("path"));
        }
        let escapes = self.path.starts_with('/')
            || self.path.contains('\\')
            || self
                .path
                .split('/')
                .any(|segment| segment == "." || segment == "..");
        if escapes {
            return Err(CheckSpecError::UnsafePath(self.path.clone()));
        }
        Ok(())
    }

    pub fn viewport(&self) -> String {
        format!(
            "{}x{}",
            self.width.unwrap_or(DEFAULT_VIEWPORT_WIDTH),
            self.height.unwrap_or(DEFAULT_VIEWPORT_HEIGHT)
        )
    }

    pub fn server_timeout_ms(&self) -> u64 {
        self.server_timeout.unwrap_or(DEFAULT_SERVER_TIMEOUT_MS)
    }

    pub fn capture_timeout_ms(&self) -> u64 {
        self.capture_timeout.unwrap_or(DEFAULT_CAPTURE_TIMEOUT_MS)
    }

    /// Object map of the check request as echoed into `results.json`.
    pub fn to_result_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn single_segment(field: &'static str, value: &str) -> Result<(), CheckSpecError> {
    if value.trim().is_empty() {
        return Err(CheckSpecError::Empty(field));
    }
    if value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(CheckSpecError::NotASegment {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn number_or_string<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr + TryFrom<u64>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(value)) => T::try_from(value)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("{value} is out of range"))),
        Some(Raw::Text(text)) => text
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("'{text}' is not a whole number"))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

impl ApiGatewayResponse {
    pub fn text(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            headers: json!({"Content-Type": "text/plain"}),
            body: body.into(),
        }
    }

    pub fn json_error(status_code: u16, error: &str, message: &str) -> Self {
        Self {
            status_code,
            headers: json!({"Content-Type": "application/json"}),
            body: json!({
                "error": error,
                "message": message,
            })
            .to_string(),
        }
    }
}
