//! Local copies of server-owned state: other players and active power-ups
//!
//! Remote players are positioned straight from relayed updates; nothing here
//! re-runs movement for them.

use std::collections::BTreeMap;

use glam::Vec3;
use tracing::{debug, info};

use crate::map::SpawnPoint;
use crate::physics::Aabb;
use crate::ws::protocol::{PlayerId, PlayerRecord, PlayerUpdate, PowerUpKind, ServerMsg};

use super::effects::POWER_UP_RADIUS;
use super::projectile::hitbox;
use super::HEAD_HEIGHT;

/// Where the local player spawns when the map declares no spawn points
pub const FALLBACK_SPAWN: SpawnPoint = SpawnPoint {
    position: Vec3::new(1.0, 1.0, 0.0),
    yaw: 0.0,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RemotePlayer {
    pub id: PlayerId,
    pub name: Option<String>,
    /// Foot position
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub scoped: bool,
    /// Hidden between death and respawn
    pub visible: bool,
}

impl RemotePlayer {
    fn from_record(record: &PlayerRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            position: record.position.into(),
            yaw: record.yaw,
            pitch: record.pitch,
            scoped: false,
            visible: record.health > 0.0,
        }
    }

    fn apply(&mut self, update: &PlayerUpdate) {
        if let Some(position) = update.position {
            self.position = position.into();
        }
        if let Some(yaw) = update.yaw {
            self.yaw = yaw;
        }
        if let Some(pitch) = update.pitch {
            self.pitch = pitch;
        }
        if let Some(scoped) = update.scoped {
            self.scoped = scoped;
        }
    }

    pub fn head_position(&self) -> Vec3 {
        self.position + Vec3::Z * HEAD_HEIGHT
    }

    pub fn hitbox(&self) -> Aabb {
        hitbox(self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemotePowerUp {
    pub position: Vec3,
    pub kind: PowerUpKind,
}

impl RemotePowerUp {
    pub fn pickup_box(&self) -> Aabb {
        Aabb::from_center_half_extents(self.position, Vec3::splat(POWER_UP_RADIUS))
    }
}

/// Server messages that concern the local player
#[derive(Debug, Clone, PartialEq)]
pub enum LocalEvent {
    Health(f32),
    Died { killer: PlayerId },
    Respawned,
    PickedUp(PowerUpKind),
}

#[derive(Debug, Clone, Default)]
pub struct Replicas {
    players: BTreeMap<PlayerId, RemotePlayer>,
    power_ups: BTreeMap<String, RemotePowerUp>,
}

impl Replicas {
    pub fn player(&self, id: &str) -> Option<&RemotePlayer> {
        self.players.get(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.players.values()
    }

    pub fn visible_players(&self) -> impl Iterator<Item = &RemotePlayer> + Clone {
        self.players.values().filter(|p| p.visible)
    }

    pub fn power_up(&self, id: &str) -> Option<&RemotePowerUp> {
        self.power_ups.get(id)
    }

    pub fn power_ups(&self) -> impl Iterator<Item = (&str, &RemotePowerUp)> {
        self.power_ups.iter().map(|(id, p)| (id.as_str(), p))
    }

    /// Apply one server message. `local_id` is this client's own player id;
    /// messages about it come back as [`LocalEvent`]s instead of touching
    /// the replica table. Unknown ids are ignored.
    pub fn apply(&mut self, local_id: &str, msg: &ServerMsg) -> Option<LocalEvent> {
        match msg {
            ServerMsg::AddPlayer(record) => {
                if record.id == local_id {
                    return None;
                }
                match self.players.get_mut(&record.id) {
                    Some(existing) => {
                        existing.position = record.position.into();
                        existing.yaw = record.yaw;
                        existing.pitch = record.pitch;
                    }
                    None => {
                        info!(player_id = %record.id, "Player joined");
                        self.players.insert(record.id.clone(), RemotePlayer::from_record(record));
                    }
                }
                None
            }
            ServerMsg::UpdatePlayer(update) => {
                if let Some(player) = self.players.get_mut(&update.id) {
                    player.apply(update);
                }
                None
            }
            ServerMsg::RemovePlayer { id } => {
                if self.players.remove(id).is_some() {
                    info!(player_id = %id, "Player left");
                }
                None
            }
            ServerMsg::UpdateHealth { health } => Some(LocalEvent::Health(*health)),
            ServerMsg::Death { player_id, source } => {
                if player_id == local_id {
                    return Some(LocalEvent::Died {
                        killer: source.id.clone(),
                    });
                }
                if let Some(player) = self.players.get_mut(player_id) {
                    player.visible = false;
                }
                None
            }
            ServerMsg::Respawn { player_id } => {
                if player_id == local_id {
                    return Some(LocalEvent::Respawned);
                }
                if let Some(player) = self.players.get_mut(player_id) {
                    player.visible = true;
                }
                None
            }
            ServerMsg::SpawnPowerUp { position, id, kind } => {
                self.power_ups.insert(
                    id.clone(),
                    RemotePowerUp {
                        position: (*position).into(),
                        kind: *kind,
                    },
                );
                None
            }
            ServerMsg::RemovePowerUp { id } => {
                self.power_ups.remove(id);
                None
            }
            ServerMsg::PickupPowerUp { id, kind } => {
                debug!(power_up_id = %id, kind = %kind, "Picked up power-up");
                self.power_ups.remove(id);
                Some(LocalEvent::PickedUp(*kind))
            }
            ServerMsg::CreateProjectile(_) | ServerMsg::RemoveProjectile { .. } => None,
        }
    }

    /// Spawn point farthest (summed distance) from every visible player
    pub fn best_spawn(&self, spawns: &[SpawnPoint]) -> SpawnPoint {
        best_spawn(spawns, self.visible_players().map(|p| p.position))
    }
}

/// Pick the spawn point with the largest summed distance to `others`.
/// Ties go to the earliest declared point.
pub fn best_spawn(spawns: &[SpawnPoint], others: impl Iterator<Item = Vec3> + Clone) -> SpawnPoint {
    let score = |spawn: &SpawnPoint| -> f32 { others.clone().map(|p| p.distance(spawn.position)).sum() };

    spawns
        .iter()
        .fold(None::<(SpawnPoint, f32)>, |best, spawn| {
            let s = score(spawn);
            match best {
                Some((_, b)) if b >= s => best,
                _ => Some((*spawn, s)),
            }
        })
        .map(|(spawn, _)| spawn)
        .unwrap_or(FALLBACK_SPAWN)
}
