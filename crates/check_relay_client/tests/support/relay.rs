use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;

/// What the relay does with one accepted connection.
#[derive(Debug, Clone)]
pub enum Session {
    /// Waits for the subscribe frame, pushes `updates`, then closes.
    PushThenClose(Vec<String>),
    /// Records frames until the client goes away.
    HoldOpen,
}

/// Text frame received by the relay, tagged with the connection index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub connection: usize,
    pub text: String,
}

/// Loopback relay accepting one connection per scripted session. Once every
/// session is accepted the listener is dropped, so later attempts are refused.
pub async fn spawn_relay(sessions: Vec<Session>) -> (String, UnboundedReceiver<Frame>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind relay");
    let url = format!("ws://{}", listener.local_addr().expect("local addr"));
    let (frames, received) = unbounded_channel();

    tokio::spawn(async move {
        for (connection, session) in sessions.into_iter().enumerate() {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let frames = frames.clone();
            tokio::spawn(async move {
                if let Ok(socket) = tokio_tungstenite::accept_async(stream).await {
                    run_session(socket, connection, session, frames).await;
                }
            });
        }
    });

    (url, received)
}

/// Accepts TCP connections and never answers the WebSocket handshake.
pub async fn spawn_silent_relay() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind relay");
    let url = format!("ws://{}", listener.local_addr().expect("local addr"));

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    url
}

/// Address nothing is listening on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    drop(listener);
    format!("ws://{address}")
}

async fn run_session(
    socket: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    connection: usize,
    session: Session,
    frames: UnboundedSender<Frame>,
) {
    let (mut write, mut read) = socket.split();
    let record = |message: Message| {
        if let Message::Text(text) = message {
            let _ = frames.send(Frame {
                connection,
                text: text.to_string(),
            });
        }
    };

    if let Session::PushThenClose(updates) = session {
        match read.next().await {
            Some(Ok(message)) => record(message),
            _ => return,
        }
        for update in updates {
            if write.send(Message::Text(update.into())).await.is_err() {
                return;
            }
        }
        let _ = write.send(Message::Close(None)).await;
    }

    while let Some(Ok(message)) = read.next().await {
        record(message);
    }
}

pub async fn next_frame(frames: &mut UnboundedReceiver<Frame>) -> Frame {
    tokio::time::timeout(std::time::Duration::from_secs(5), frames.recv())
        .await
        .expect("frame within timeout")
        .expect("relay still running")
}
