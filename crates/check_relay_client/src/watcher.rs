//! Reconnecting status subscription.
//!
//! Each session opens the socket, sends one subscribe frame, then pings on a
//! fixed period until the socket closes. The ping timer belongs to the
//! session, so it is gone before the next connection attempt starts.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use check_relay_core::contract::{KeepalivePing, SubscribeRequest};
use check_relay_core::reconnect::{
    ConnectionState, ReconnectMachine, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_RETRIES,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::ClientError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub url: String,
    pub check_id: String,
    pub retries: u32,
    pub keepalive: Duration,
    /// Upper bound on the TCP connect plus WebSocket handshake.
    pub connect_timeout: Duration,
}

impl WatchConfig {
    pub fn new(url: impl Into<String>, check_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            check_id: check_id.into(),
            retries: DEFAULT_RETRIES,
            keepalive: DEFAULT_KEEPALIVE_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.keepalive.is_zero() {
            return Err(ClientError::ZeroDuration("keepalive interval"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ClientError::ZeroDuration("connect timeout"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Closed,
    Shutdown,
}

/// Frames sent by every session, encoded once.
struct Outbound {
    subscribe: String,
    ping: String,
}

impl Outbound {
    fn new(check_id: &str) -> Result<Self, ClientError> {
        let subscribe = serde_json::to_string(&SubscribeRequest::new(check_id))
            .map_err(|source| ClientError::Encode {
                what: "subscribe request",
                source,
            })?;
        let ping = serde_json::to_string(&KeepalivePing::default()).map_err(|source| {
            ClientError::Encode {
                what: "keepalive ping",
                source,
            }
        })?;
        Ok(Self { subscribe, ping })
    }
}

/// Watches status updates for one check, forwarding each parsed message to
/// `updates`. Returns `Ok` when `shutdown` resolves and
/// `Err(RetriesExhausted)` once the retry budget is spent. A handshake that
/// does not finish within `connect_timeout` counts as a failed attempt.
pub async fn watch<F>(
    config: &WatchConfig,
    updates: UnboundedSender<Value>,
    shutdown: F,
) -> Result<(), ClientError>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    let outbound = Outbound::new(&config.check_id)?;
    let mut machine = ReconnectMachine::new(config.retries);
    tokio::pin!(shutdown);

    loop {
        tracing::info!(
            component = "status_watch",
            url = %config.url,
            attempt = machine.attempts(),
            retries_left = machine.retries_left(),
            "connecting"
        );

        let connected = tokio::select! {
            biased;
            _ = &mut shutdown => return Ok(()),
            connected = tokio::time::timeout(
                config.connect_timeout,
                connect_async(config.url.as_str()),
            ) => connected,
        };

        match connected {
            Ok(Ok((socket, _response))) => {
                machine.opened()?;
                tracing::info!(component = "status_watch", "connected");
                let end = serve(
                    socket,
                    &outbound,
                    config.keepalive,
                    &updates,
                    shutdown.as_mut(),
                )
                .await;
                if end == SessionEnd::Shutdown {
                    return Ok(());
                }
                tracing::info!(component = "status_watch", "disconnected");
            }
            Ok(Err(error)) => {
                tracing::warn!(component = "status_watch", error = %error, "connection failed");
            }
            Err(_) => {
                tracing::warn!(
                    component = "status_watch",
                    timeout = ?config.connect_timeout,
                    "connection timed out"
                );
            }
        }

        machine.closed()?;
        if machine.retry()? == ConnectionState::GivingUp {
            tracing::error!(
                component = "status_watch",
                attempts = machine.attempts(),
                "giving up"
            );
            return Err(ClientError::RetriesExhausted {
                attempts: machine.attempts(),
            });
        }
    }
}

async fn serve<F>(
    socket: Socket,
    outbound: &Outbound,
    period: Duration,
    updates: &UnboundedSender<Value>,
    mut shutdown: Pin<&mut F>,
) -> SessionEnd
where
    F: Future<Output = ()>,
{
    let (mut write, mut read) = socket.split();

    if let Err(error) = write.send(Message::Text(outbound.subscribe.clone().into())).await {
        tracing::warn!(component = "status_watch", error = %error, "failed to subscribe");
        return SessionEnd::Closed;
    }
    tracing::debug!(component = "status_watch", "subscribe sent");

    let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => forward(&text, updates),
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(component = "status_watch", ?frame, "server closed connection");
                    return SessionEnd::Closed;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    tracing::warn!(component = "status_watch", error = %error, "read failed");
                    return SessionEnd::Closed;
                }
                None => return SessionEnd::Closed,
            },
            _ = keepalive.tick() => {
                if let Err(error) = write.send(Message::Text(outbound.ping.clone().into())).await {
                    tracing::warn!(component = "status_watch", error = %error, "keepalive failed");
                    return SessionEnd::Closed;
                }
                tracing::debug!(component = "status_watch", "ping");
            }
        }
    }
}

/// A malformed payload is dropped without touching the connection.
fn forward(text: &str, updates: &UnboundedSender<Value>) {
    match serde_json::from_str::<Value>(text) {
        Ok(message) => {
            tracing::info!(component = "status_watch", message = %message, "status update");
            let _ = updates.send(message);
        }
        Err(error) => tracing::warn!(
            component = "status_watch",
            error = %error,
            payload = text,
            "ignoring malformed message"
        ),
    }
}
