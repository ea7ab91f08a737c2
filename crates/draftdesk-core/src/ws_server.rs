// WebSocket server for draft-room clients.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Identifies one accepted connection for its whole lifetime.
pub type ConnId = u64;

/// Events emitted by the WebSocket server to the session hub.
#[derive(Debug)]
pub enum WsEvent {
    /// A client finished the handshake. Text queued on `outbox` is written
    /// back to it in order.
    Connected {
        conn_id: ConnId,
        addr: String,
        outbox: mpsc::UnboundedSender<String>,
    },
    /// A text frame arrived (raw JSON string).
    Message { conn_id: ConnId, text: String },
    /// The client went away.
    Disconnected { conn_id: ConnId },
}

pub async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind((host, port)).await?;
    info!("WebSocket server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept connections forever, serving each on its own task.
///
/// Returns when the hub side of `tx` is dropped or the listener fails.
pub async fn run(listener: TcpListener, tx: mpsc::Sender<WsEvent>) -> anyhow::Result<()> {
    let next_id = Arc::new(AtomicU64::new(1));

    loop {
        let (stream, addr) = listener.accept().await?;
        if tx.is_closed() {
            break;
        }
        let conn_id = next_id.fetch_add(1, Ordering::Relaxed);
        info!("Accepted TCP connection {} from {}", conn_id, addr);

        let tx = tx.clone();
        tokio::spawn(async move {
            serve_connection(stream, conn_id, addr.to_string(), tx).await;
        });
    }

    Ok(())
}

async fn serve_connection(
    stream: TcpStream,
    conn_id: ConnId,
    addr: String,
    tx: mpsc::Sender<WsEvent>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let (mut write, read) = ws_stream.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<String>();

    let connected = WsEvent::Connected {
        conn_id,
        addr: addr.clone(),
        outbox,
    };
    if tx.send(connected).await.is_err() {
        return;
    }

    let writer_addr = addr.clone();
    let writer = tokio::spawn(async move {
        while let Some(text) = outbox_rx.recv().await {
            if let Err(e) = write.send(Message::Text(text.into())).await {
                debug!("Write to {} failed: {}", writer_addr, e);
                break;
            }
        }
        let _ = write.close().await;
    });

    if process_message_stream(read, &tx, conn_id, &addr).await.is_ok() {
        let _ = tx.send(WsEvent::Disconnected { conn_id }).await;
    }
    writer.abort();
}

/// Forward text frames from any [`Stream`] of WebSocket messages through
/// `tx`. Stops at a close frame or a transport error. Returns `Err(())` if
/// the channel is closed.
pub async fn process_message_stream<St>(
    mut stream: St,
    tx: &mpsc::Sender<WsEvent>,
    conn_id: ConnId,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let event = WsEvent::Message {
                    conn_id,
                    text: text.to_string(),
                };
                if tx.send(event).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} sent close frame", addr);
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {}: {}", addr, e);
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tokio_tungstenite::tungstenite::Error as WsError;

    fn mock_stream(
        messages: Vec<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(messages)
    }

    fn text_of(event: WsEvent) -> (ConnId, String) {
        match event {
            WsEvent::Message { conn_id, text } => (conn_id, text),
            other => panic!("expected a message event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_messages_forwarded_in_order() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Text("first".into())),
            Ok(Message::Text("second".into())),
        ];

        process_message_stream(mock_stream(messages), &tx, 7, "test")
            .await
            .unwrap();

        assert_eq!(text_of(rx.recv().await.unwrap()), (7, "first".to_string()));
        assert_eq!(text_of(rx.recv().await.unwrap()), (7, "second".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_frame_stops_processing() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Text("before_close".into())),
            Ok(Message::Close(None)),
            Ok(Message::Text("after_close".into())),
        ];

        process_message_stream(mock_stream(messages), &tx, 1, "test")
            .await
            .unwrap();

        assert_eq!(text_of(rx.recv().await.unwrap()).1, "before_close");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn error_stops_processing() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Err(WsError::ConnectionClosed),
            Ok(Message::Text("after_error".into())),
        ];

        process_message_stream(mock_stream(messages), &tx, 1, "test")
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn binary_and_ping_frames_are_ignored() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Binary(vec![1, 2, 3].into())),
            Ok(Message::Ping(vec![].into())),
            Ok(Message::Text(r#"{"type":"join","code":"AB12CD"}"#.into())),
        ];

        process_message_stream(mock_stream(messages), &tx, 3, "test")
            .await
            .unwrap();

        assert_eq!(
            text_of(rx.recv().await.unwrap()).1,
            r#"{"type":"join","code":"AB12CD"}"#
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn returns_err_when_channel_closed() {
        let (tx, rx) = mpsc::channel(64);
        drop(rx);

        let messages = vec![Ok(Message::Text("orphan".into()))];
        let result = process_message_stream(mock_stream(messages), &tx, 1, "test").await;
        assert!(result.is_err());
    }
}
