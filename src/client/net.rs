//! Client side of the socket
//!
//! The client never touches the socket directly. Encoded frames go out on a
//! channel and decoded frames come back on another, so any WebSocket
//! implementation can sit on the far side of [`SocketEnds`].

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Mirrors the browser's `WebSocket.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Connecting,
    Open,
    Closed,
}

/// The transport's half of the channels
#[derive(Debug)]
pub struct SocketEnds {
    /// Text frames to write to the socket
    pub outgoing: mpsc::UnboundedReceiver<String>,
    /// Text frames read from the socket
    pub incoming: mpsc::UnboundedSender<String>,
}

#[derive(Debug)]
pub struct NetworkClient {
    state: SocketState,
    outgoing: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<String>,
}

impl NetworkClient {
    pub fn new() -> (Self, SocketEnds) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let client = Self {
            state: SocketState::Connecting,
            outgoing: out_tx,
            incoming: in_rx,
        };
        (
            client,
            SocketEnds {
                outgoing: out_rx,
                incoming: in_tx,
            },
        )
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn set_state(&mut self, state: SocketState) {
        self.state = state;
    }

    pub fn is_open(&self) -> bool {
        self.state == SocketState::Open
    }

    /// Queue a message. Anything sent while the socket is not open is
    /// dropped; there is no buffering and no reconnect.
    pub fn send(&self, msg: &ClientMsg) -> bool {
        if !self.is_open() {
            debug!(command = msg.command(), state = ?self.state, "Socket not open, dropping message");
            return false;
        }
        match msg.encode() {
            Ok(text) => self.outgoing.send(text).is_ok(),
            Err(e) => {
                warn!(command = msg.command(), error = %e, "Failed to encode message");
                false
            }
        }
    }

    /// Drain every frame received since the last call. Frames that do not
    /// decode are logged and skipped.
    pub fn poll(&mut self) -> Vec<ServerMsg> {
        let mut messages = Vec::new();
        while let Ok(text) = self.incoming.try_recv() {
            match ServerMsg::decode(&text) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!(error = %e, "Failed to parse server message"),
            }
        }
        messages
    }
}
