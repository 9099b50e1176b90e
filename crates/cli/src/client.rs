// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A minimal one-shot WebSocket client: connect, send `Hello`, send one
//! request, print the matching reply, disconnect.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use companion_wire::{decode_server_message, encode_client_message, ClientMessage, QueryResult, ServerMessage};

use crate::exit_error::ExitError;

pub struct DaemonClient {
    socket: tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
}

impl DaemonClient {
    /// Connects to `addr` and completes the `Hello`/`Welcome` handshake.
    pub async fn connect(addr: &str, token: Option<String>) -> Result<Self, ExitError> {
        let url = format!("ws://{addr}");
        let (mut socket, _) =
            tokio_tungstenite::connect_async(&url).await.map_err(|source| {
                ExitError::new(1, format!("could not reach companiond at {url}: {source}"))
            })?;

        let hello = encode_client_message(&ClientMessage::Hello { token })?;
        socket.send(Message::Text(hello.into())).await?;

        match Self::recv_server_message(&mut socket).await? {
            Some(ServerMessage::Welcome { .. }) => {}
            Some(ServerMessage::Error { message }) => return Err(ExitError::new(1, message)),
            _ => return Err(ExitError::new(1, "companiond did not send a Welcome message")),
        }

        Ok(Self { socket })
    }

    /// Sends `message` and, for requests that expect a reply, waits for it.
    pub async fn send(&mut self, message: ClientMessage) -> Result<Option<ServerMessage>, ExitError> {
        let wants_reply = matches!(message, ClientMessage::Query { .. });
        let text = encode_client_message(&message)?;
        self.socket.send(Message::Text(text.into())).await?;

        if !wants_reply {
            return Ok(None);
        }
        Self::recv_server_message(&mut self.socket).await
    }

    /// Sends a query with request id `0` and returns its `QueryResult`.
    pub async fn query(&mut self, query: companion_wire::Query) -> Result<QueryResult, ExitError> {
        match self.send(ClientMessage::Query { id: 0, query }).await? {
            Some(ServerMessage::QueryResult { result, .. }) => Ok(result),
            Some(ServerMessage::Error { message }) => Err(ExitError::new(1, message)),
            _ => Err(ExitError::new(1, "companiond did not reply to the query")),
        }
    }

    /// Reads and prints WireEvents one per line until interrupted, used by
    /// `subscribe` to tail a session live.
    pub async fn stream_events(&mut self) -> Result<(), ExitError> {
        loop {
            match Self::recv_server_message(&mut self.socket).await? {
                Some(ServerMessage::Event(event)) => {
                    println!("{}", serde_json::to_string(&event).unwrap_or_default());
                }
                Some(ServerMessage::Error { message }) => return Err(ExitError::new(1, message)),
                None => return Ok(()),
                _ => {}
            }
        }
    }

    async fn recv_server_message(
        socket: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    ) -> Result<Option<ServerMessage>, ExitError> {
        loop {
            let Some(frame) = socket.next().await else { return Ok(None) };
            let frame = frame?;
            let Message::Text(text) = frame else { continue };
            return Ok(Some(decode_server_message(&text)?));
        }
    }
}
