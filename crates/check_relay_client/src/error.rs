use check_relay_core::reconnect::InvalidTransition;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("giving up after {attempts} connection attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    State(#[from] InvalidTransition),
}
