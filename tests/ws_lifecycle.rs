//! End-to-end connection lifecycle tests against a local websocket server

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use tradecost::ws::{ConnectionStatus, EndpointConfig, WsEndpoint, WsError};

const BOOK_FRAME: &str = r#"{"asks":[[100,1]],"bids":[[99,1]]}"#;

fn endpoint() -> WsEndpoint {
    WsEndpoint::with_config(EndpointConfig {
        shutdown_grace: Duration::from_millis(500),
    })
}

async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn with_server_header(_req: &Request, mut resp: Response) -> Result<Response, ErrorResponse> {
    resp.headers_mut()
        .insert("Server", "nginx".parse().unwrap());
    Ok(resp)
}

/// Accept one websocket connection, push `frames`, report every received text
/// on `received`, and keep driving the stream so close handshakes complete.
async fn serve_once(
    listener: TcpListener,
    frames: Vec<String>,
    received: Option<mpsc::UnboundedSender<String>>,
) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_hdr_async(stream, with_server_header).await.unwrap();

    for frame in frames {
        ws.send(Message::Text(frame.into())).await.unwrap();
    }

    while let Some(Ok(message)) = ws.next().await {
        if let (Message::Text(text), Some(sink)) = (&message, &received) {
            let _ = sink.send(text.as_str().to_owned());
        }
    }
}

async fn local_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let uri = format!("ws://{}/feed", listener.local_addr().unwrap());
    (listener, uri)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handshake_opens_and_latest_message_wins() {
    let (listener, uri) = local_listener().await;
    tokio::spawn(serve_once(
        listener,
        vec![
            r#"{"asks":[[101,1]],"bids":[[98,1]]}"#.to_owned(),
            r#"{"asks":[[102,1]],"bids":[[97,1]]}"#.to_owned(),
            BOOK_FRAME.to_owned(),
        ],
        None,
    ));

    let mut endpoint = endpoint();
    let id = endpoint.connect(&uri).unwrap();

    // Absent before any frame has arrived.
    assert!(endpoint.get_latest_message(id).is_none());

    assert!(
        wait_for(
            || endpoint.get_metadata(id).unwrap().status == ConnectionStatus::Open,
            Duration::from_secs(5),
        )
        .await
    );

    let meta = endpoint.get_metadata(id).unwrap();
    assert_eq!(meta.server.as_deref(), Some("nginx"));
    assert_eq!(meta.uri, uri);

    // Frames arrive in order; only the newest is retained.
    assert!(
        wait_for(
            || endpoint
                .get_latest_message(id)
                .is_some_and(|m| m.payload == BOOK_FRAME),
            Duration::from_secs(5),
        )
        .await
    );

    // Pull, not consume: polling again returns the same record.
    let first = endpoint.get_latest_message(id).unwrap();
    let second = endpoint.get_latest_message(id).unwrap();
    assert_eq!(first, second);
    assert!(first.to_string().starts_with("RECV: "));

    endpoint.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connections_are_independent_and_ids_increase() {
    let (listener_a, uri_a) = local_listener().await;
    let (listener_b, uri_b) = local_listener().await;
    tokio::spawn(serve_once(listener_a, vec![BOOK_FRAME.to_owned()], None));
    tokio::spawn(serve_once(listener_b, Vec::new(), None));

    let mut endpoint = endpoint();
    let first = endpoint.connect(&uri_a).unwrap();
    let second = endpoint.connect(&uri_b).unwrap();
    assert!(first < second);

    assert!(
        wait_for(
            || endpoint.get_latest_message(first).is_some(),
            Duration::from_secs(5),
        )
        .await
    );
    // The second connection has its own empty mailbox.
    assert!(endpoint.get_latest_message(second).is_none());

    endpoint.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pending_handshake_reports_connecting() {
    // Bound but never accepted: the TCP connect lands in the backlog and the
    // websocket upgrade never completes.
    let (_listener, uri) = local_listener().await;

    let mut endpoint = endpoint();
    let id = endpoint.connect(&uri).unwrap();

    assert_eq!(
        endpoint.get_metadata(id).unwrap().status,
        ConnectionStatus::Connecting
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        endpoint.get_metadata(id).unwrap().status,
        ConnectionStatus::Connecting
    );

    endpoint.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handshake_failure_is_terminal() {
    // Grab a free port, then close it again so the connect is refused.
    let (listener, uri) = local_listener().await;
    drop(listener);

    let mut endpoint = endpoint();
    let id = endpoint.connect(&uri).unwrap();

    assert!(
        wait_for(
            || endpoint.get_metadata(id).unwrap().status == ConnectionStatus::Failed,
            Duration::from_secs(5),
        )
        .await
    );
    let meta = endpoint.get_metadata(id).unwrap();
    assert!(meta.error_reason.is_some());

    // No later event leaves Failed.
    endpoint.close(id, 1000, "too late");
    assert!(matches!(
        endpoint.send(id, "hello"),
        Err(WsError::NotOpen { .. })
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        endpoint.get_metadata(id).unwrap().status,
        ConnectionStatus::Failed
    );

    endpoint.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_reaches_the_server() {
    let (listener, uri) = local_listener().await;
    let (received_tx, mut received_rx) = mpsc::unbounded_channel();
    tokio::spawn(serve_once(listener, Vec::new(), Some(received_tx)));

    let mut endpoint = endpoint();
    let id = endpoint.connect(&uri).unwrap();
    assert!(
        wait_for(
            || endpoint.get_metadata(id).unwrap().status == ConnectionStatus::Open,
            Duration::from_secs(5),
        )
        .await
    );

    endpoint.send(id, "subscribe").unwrap();
    endpoint.send(id, "ping").unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), received_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), received_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!((first.as_str(), second.as_str()), ("subscribe", "ping"));

    endpoint.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn local_close_records_remote_echo() {
    let (listener, uri) = local_listener().await;
    tokio::spawn(serve_once(listener, Vec::new(), None));

    let mut endpoint = endpoint();
    let id = endpoint.connect(&uri).unwrap();
    assert!(
        wait_for(
            || endpoint.get_metadata(id).unwrap().status == ConnectionStatus::Open,
            Duration::from_secs(5),
        )
        .await
    );

    endpoint.close(id, 1000, "done");
    assert!(
        wait_for(
            || endpoint.get_metadata(id).unwrap().status == ConnectionStatus::Closed,
            Duration::from_secs(5),
        )
        .await
    );
    // The record survives the close; close echoes carry the code back.
    let meta = endpoint.get_metadata(id).unwrap();
    assert!(meta.error_reason.unwrap_or_default().contains("1000"));

    endpoint.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_closes_open_and_abandons_connecting() {
    let (listener, open_uri) = local_listener().await;
    tokio::spawn(serve_once(listener, Vec::new(), None));

    // Second connection never completes its handshake.
    let (_stuck_listener, stuck_uri) = local_listener().await;

    let mut endpoint = endpoint();
    let open_id = endpoint.connect(&open_uri).unwrap();
    let stuck_id = endpoint.connect(&stuck_uri).unwrap();

    assert!(
        wait_for(
            || endpoint.get_metadata(open_id).unwrap().status == ConnectionStatus::Open,
            Duration::from_secs(5),
        )
        .await
    );

    // Blocks until the IO thread has exited, bounded by the grace period.
    endpoint.shutdown();

    assert_eq!(
        endpoint.get_metadata(open_id).unwrap().status,
        ConnectionStatus::Closed
    );
    assert_eq!(
        endpoint.get_metadata(stuck_id).unwrap().status,
        ConnectionStatus::Connecting
    );
    assert!(matches!(
        endpoint.connect(&open_uri),
        Err(WsError::EventLoopStopped)
    ));
}
