//! A room: every connection playing the same map URL
//!
//! All fan-out goes through the room so that events never cross map
//! boundaries.

use std::collections::HashMap;
use std::time::Instant;

use glam::Vec3;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

use crate::ws::protocol::{PlayerId, PlayerRecord, ServerMsg};

use super::combat::MAX_HEALTH;
use super::power_up::PowerUpField;
use super::{ConnectionId, Outbox};

/// Authoritative per-player state held by the server
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: Option<String>,
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub health: f32,
    /// Set while dead, cleared on respawn
    pub died_at: Option<Instant>,
}

impl PlayerState {
    pub fn new(id: PlayerId, name: Option<String>) -> Self {
        Self {
            id,
            name,
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            health: MAX_HEALTH,
            died_at: None,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.died_at.is_some()
    }

    pub fn record(&self) -> PlayerRecord {
        PlayerRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            position: self.position.into(),
            yaw: self.yaw,
            pitch: self.pitch,
            health: self.health,
        }
    }
}

#[derive(Debug)]
pub struct RoomMember {
    pub player: PlayerState,
    outbox: Outbox,
}

impl RoomMember {
    pub fn new(player: PlayerState, outbox: Outbox) -> Self {
        Self { player, outbox }
    }

    /// Fire-and-forget. A closed connection, or one whose writer has fallen
    /// a full outbox behind, just drops the message.
    pub fn send(&self, msg: ServerMsg) {
        match self.outbox.try_send(msg) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                debug!(player_id = %self.player.id, "Outbox full, dropping message");
            }
        }
    }
}

#[derive(Debug)]
pub struct Room {
    pub map_url: String,
    members: HashMap<ConnectionId, RoomMember>,
    pub power_ups: PowerUpField,
}

impl Room {
    pub fn new(map_url: String, power_ups: PowerUpField) -> Self {
        Self {
            map_url,
            members: HashMap::new(),
            power_ups,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, conn: &ConnectionId) -> Option<&RoomMember> {
        self.members.get(conn)
    }

    pub fn member_mut(&mut self, conn: &ConnectionId) -> Option<&mut RoomMember> {
        self.members.get_mut(conn)
    }

    /// Connection currently playing as `player_id`
    pub fn find_player(&self, player_id: &str) -> Option<ConnectionId> {
        self.members
            .iter()
            .find(|(_, m)| m.player.id == player_id)
            .map(|(conn, _)| *conn)
    }

    /// Admit a player: existing members learn about the newcomer, the
    /// newcomer learns about everyone already here and every active power-up
    pub fn join(&mut self, conn: ConnectionId, member: RoomMember) {
        let record = member.player.record();
        for existing in self.members.values() {
            existing.send(ServerMsg::AddPlayer(record.clone()));
            member.send(ServerMsg::AddPlayer(existing.player.record()));
        }
        for msg in self.power_ups.active_msgs() {
            member.send(msg);
        }

        info!(
            map_url = %self.map_url,
            player_id = %member.player.id,
            player_count = self.members.len() + 1,
            "Player joined room"
        );
        self.members.insert(conn, member);
    }

    /// Remove a member and tell everyone else
    pub fn leave(&mut self, conn: &ConnectionId) -> Option<RoomMember> {
        let member = self.members.remove(conn)?;
        self.broadcast(ServerMsg::RemovePlayer {
            id: member.player.id.clone(),
        });

        info!(
            map_url = %self.map_url,
            player_id = %member.player.id,
            player_count = self.members.len(),
            "Player left room"
        );
        Some(member)
    }

    pub fn send_to(&self, conn: &ConnectionId, msg: ServerMsg) {
        if let Some(member) = self.members.get(conn) {
            member.send(msg);
        }
    }

    pub fn broadcast(&self, msg: ServerMsg) {
        for member in self.members.values() {
            member.send(msg.clone());
        }
    }

    pub fn broadcast_except(&self, except: &ConnectionId, msg: ServerMsg) {
        for (conn, member) in &self.members {
            if conn != except {
                member.send(msg.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::OUTBOX_CAPACITY;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn member(id: &str) -> (RoomMember, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        (RoomMember::new(PlayerState::new(id.to_string(), None), tx), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_join_introduces_both_sides() {
        let mut room = Room::new("/maps/a.smf".into(), PowerUpField::default());
        let (a, mut a_rx) = member("a");
        let (b, mut b_rx) = member("b");
        let (conn_a, conn_b) = (Uuid::new_v4(), Uuid::new_v4());

        room.join(conn_a, a);
        assert!(drain(&mut a_rx).is_empty());

        room.join(conn_b, b);
        let to_a = drain(&mut a_rx);
        let to_b = drain(&mut b_rx);
        assert!(matches!(&to_a[..], [ServerMsg::AddPlayer(r)] if r.id == "b"));
        assert!(matches!(&to_b[..], [ServerMsg::AddPlayer(r)] if r.id == "a"));
        assert_eq!(room.find_player("b"), Some(conn_b));
    }

    #[test]
    fn test_leave_broadcasts_removal() {
        let mut room = Room::new("/maps/a.smf".into(), PowerUpField::default());
        let (a, mut a_rx) = member("a");
        let (b, _b_rx) = member("b");
        let (conn_a, conn_b) = (Uuid::new_v4(), Uuid::new_v4());
        room.join(conn_a, a);
        room.join(conn_b, b);
        drain(&mut a_rx);

        assert!(room.leave(&conn_b).is_some());
        assert!(room.leave(&conn_b).is_none());
        assert_eq!(drain(&mut a_rx), vec![ServerMsg::RemovePlayer { id: "b".into() }]);
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn test_send_to_closed_member_is_ignored() {
        let mut room = Room::new("/maps/a.smf".into(), PowerUpField::default());
        let (a, a_rx) = member("a");
        let conn = Uuid::new_v4();
        room.join(conn, a);
        drop(a_rx);
        room.send_to(&conn, ServerMsg::UpdateHealth { health: 50.0 });
        room.broadcast(ServerMsg::UpdateHealth { health: 50.0 });
    }

    #[test]
    fn test_full_outbox_drops_instead_of_growing() {
        let (tx, mut rx) = mpsc::channel(2);
        let member = RoomMember::new(PlayerState::new("slow".into(), None), tx);

        for health in [90.0, 80.0, 70.0, 60.0] {
            member.send(ServerMsg::UpdateHealth { health });
        }
        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMsg::UpdateHealth { health: 90.0 },
                ServerMsg::UpdateHealth { health: 80.0 },
            ]
        );

        // Once the writer catches up delivery resumes
        member.send(ServerMsg::UpdateHealth { health: 50.0 });
        assert_eq!(drain(&mut rx), vec![ServerMsg::UpdateHealth { health: 50.0 }]);
    }
}
