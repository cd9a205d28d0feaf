//! Async session driver: one task per connection on the IO thread

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async_tls_with_config;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::connection::{ConnectionObserver, MessageRecord};
use super::tls;

/// Commands handed off from the registry to a connection task.
#[derive(Debug)]
pub(crate) enum ConnCommand {
    Send(String),
    Close { code: u16, reason: String },
}

/// Connect and run one websocket session, reporting every lifecycle event to
/// the observer. Runs to completion on the IO thread; the registry only
/// aborts it when the shutdown grace period elapses.
pub(crate) async fn drive<O: ConnectionObserver>(
    uri: String,
    observer: O,
    mut commands: mpsc::UnboundedReceiver<ConnCommand>,
) {
    let connector = tls::build_connector();
    let (stream, response) =
        match connect_async_tls_with_config(uri.as_str(), None, false, connector).await {
            Ok(connected) => connected,
            Err(e) => {
                warn!(%uri, error = %e, "websocket handshake failed");
                observer.on_fail(&e.to_string());
                return;
            }
        };

    let server = response
        .headers()
        .get("server")
        .and_then(|value| value.to_str().ok());
    info!(%uri, server = server.unwrap_or("unknown"), "websocket connection open");
    observer.on_open(server);

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    observer.on_message(MessageRecord::received(text.as_str()));
                }
                Some(Ok(Message::Binary(data))) => {
                    // Diagnostic slot: store binary frames hex-encoded.
                    observer.on_message(MessageRecord::received(hex::encode(&data)));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match &frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_owned()),
                        None => (None, String::new()),
                    };
                    debug!(%uri, ?code, %reason, "websocket closed by peer");
                    observer.on_close(code, &reason);
                    break;
                }
                // Ping/pong are answered by the protocol layer.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%uri, error = %e, "websocket stream error");
                    observer.on_close(None, &e.to_string());
                    break;
                }
                None => {
                    observer.on_close(None, "connection closed");
                    break;
                }
            },
            command = commands.recv() => match command {
                Some(ConnCommand::Send(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        warn!(%uri, error = %e, "failed to send message");
                        observer.on_close(None, &e.to_string());
                        break;
                    }
                }
                Some(ConnCommand::Close { code, reason }) => {
                    debug!(%uri, code, "close requested");
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    if write.send(Message::Close(Some(frame))).await.is_err() {
                        observer.on_close(None, "close handshake aborted");
                        break;
                    }
                    // Keep draining until the peer echoes the close.
                }
                // The registry is gone; the task ends with the runtime.
                None => break,
            },
        }
    }
}
