//! Server-side game state: rooms, combat and power-ups

pub mod combat;
pub mod lobby;
pub mod power_up;
pub mod room;

pub use lobby::{spawn_lobby, Lobby, LobbyHandle, LobbyInput, LobbySettings, LobbyStats, LobbyTask};
pub use room::{PlayerState, Room};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Server-assigned handle for one socket
pub type ConnectionId = Uuid;

/// Outgoing messages for one socket, drained by its writer task
pub type Outbox = mpsc::Sender<ServerMsg>;

/// Messages a socket may have queued before further ones are dropped
pub const OUTBOX_CAPACITY: usize = 256;
