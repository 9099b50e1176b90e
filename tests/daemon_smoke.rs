//! End-to-end smoke test: start `companiond` against a scratch watched
//! root, complete the Hello/Welcome handshake, and round-trip a query.

use std::time::Duration;

use assert_cmd::Command;
use companion_wire::{decode_server_message, encode_client_message, ClientMessage, Query, QueryResult, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

fn free_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind an ephemeral port");
    listener.local_addr().expect("read local_addr").to_string()
}

async fn connect_with_retry(url: &str) -> WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>> {
    for _ in 0..50 {
        if let Ok((socket, _)) = tokio_tungstenite::connect_async(url).await {
            return socket;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("companiond never accepted a connection at {url}");
}

async fn next_message(socket: &mut WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>) -> ServerMessage {
    loop {
        let frame = socket.next().await.expect("connection closed unexpectedly").expect("websocket error");
        if let Message::Text(text) = frame {
            return decode_server_message(&text).expect("decode server message");
        }
    }
}

#[tokio::test]
async fn daemon_completes_handshake_and_answers_list_sessions() {
    let watched_root = tempfile::tempdir().expect("tempdir");
    let addr = free_addr();

    let mut child = Command::cargo_bin("companiond")
        .expect("companiond binary should build")
        .env("COMPANION_WATCH_ROOT", watched_root.path())
        .env("COMPANION_BIND_ADDR", &addr)
        .env_remove("COMPANION_AUTH_TOKEN")
        .spawn()
        .expect("spawn companiond");

    let url = format!("ws://{addr}");
    let mut socket = connect_with_retry(&url).await;

    let hello = encode_client_message(&ClientMessage::Hello { token: None }).expect("encode hello");
    socket.send(Message::Text(hello.into())).await.expect("send hello");

    let welcome = next_message(&mut socket).await;
    assert!(matches!(welcome, ServerMessage::Welcome { .. }), "expected Welcome, got {welcome:?}");

    let query = encode_client_message(&ClientMessage::Query { id: 1, query: Query::ListSessions }).expect("encode query");
    socket.send(Message::Text(query.into())).await.expect("send query");

    match next_message(&mut socket).await {
        ServerMessage::QueryResult { id, result: QueryResult::Sessions { sessions } } => {
            assert_eq!(id, 1);
            assert!(sessions.is_empty(), "a fresh watched root should have no tracked sessions");
        }
        other => panic!("unexpected reply: {other:?}"),
    }

    let _ = child.kill();
    let _ = child.wait();
}

#[tokio::test]
async fn daemon_rejects_connections_with_the_wrong_token() {
    let watched_root = tempfile::tempdir().expect("tempdir");
    let addr = free_addr();

    let mut child = Command::cargo_bin("companiond")
        .expect("companiond binary should build")
        .env("COMPANION_WATCH_ROOT", watched_root.path())
        .env("COMPANION_BIND_ADDR", &addr)
        .env("COMPANION_AUTH_TOKEN", "correct-token")
        .spawn()
        .expect("spawn companiond");

    let url = format!("ws://{addr}");
    let mut socket = connect_with_retry(&url).await;

    let hello = encode_client_message(&ClientMessage::Hello { token: Some("wrong-token".into()) }).expect("encode hello");
    socket.send(Message::Text(hello.into())).await.expect("send hello");

    let reply = next_message(&mut socket).await;
    assert!(matches!(reply, ServerMessage::Error { .. }), "expected Error, got {reply:?}");

    let _ = child.kill();
    let _ = child.wait();
}
