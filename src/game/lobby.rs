//! Lobby: owns every connection and room
//!
//! [`Lobby`] is the synchronous state machine. [`LobbyTask`] runs it on a
//! single task: inputs from all sockets arrive on one channel and are handled
//! one at a time, interleaved with the power-up tick, so room state needs no
//! locks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::map::MapSource;
use crate::ws::protocol::{ClientMsg, DeathSource, PlayerId, PlayerUpdate, ServerMsg};

use super::combat::{resolve_hit, HitOutcome, MAX_HEALTH};
use super::power_up::PowerUpField;
use super::room::{PlayerState, Room, RoomMember};
use super::{ConnectionId, Outbox};

/// Timing knobs for rooms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbySettings {
    pub respawn_delay: Duration,
    pub power_up_tick: Duration,
    pub power_up_initial_delay: Duration,
    pub power_up_cooldown: Duration,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            respawn_delay: Duration::from_millis(2000),
            power_up_tick: Duration::from_millis(500),
            power_up_initial_delay: Duration::from_millis(5000),
            power_up_cooldown: Duration::from_millis(15000),
        }
    }
}

impl From<&Config> for LobbySettings {
    fn from(config: &Config) -> Self {
        Self {
            respawn_delay: config.respawn_delay,
            power_up_tick: config.power_up_tick,
            power_up_initial_delay: config.power_up_initial_delay,
            power_up_cooldown: config.power_up_cooldown,
        }
    }
}

/// Room occupancy, readable from outside the lobby task
#[derive(Debug, Default)]
pub struct LobbyStats {
    rooms: DashMap<String, usize>,
}

impl LobbyStats {
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn player_count(&self) -> usize {
        self.rooms.iter().map(|r| *r.value()).sum()
    }

    fn record(&self, room: &Room) {
        self.rooms.insert(room.map_url.clone(), room.len());
    }

    fn forget(&self, map_url: &str) {
        self.rooms.remove(map_url);
    }
}

/// A death waiting for its respawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRespawn {
    pub map_url: String,
    pub player_id: PlayerId,
    pub due: Instant,
}

#[derive(Debug)]
struct Connection {
    outbox: Outbox,
    /// `None` until `connect`
    room: Option<String>,
}

pub struct Lobby {
    settings: LobbySettings,
    maps: Arc<dyn MapSource>,
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<String, Room>,
    rng: ChaCha8Rng,
    stats: Arc<LobbyStats>,
}

impl Lobby {
    pub fn new(settings: LobbySettings, maps: Arc<dyn MapSource>, seed: u64) -> Self {
        Self {
            settings,
            maps,
            connections: HashMap::new(),
            rooms: HashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            stats: Arc::new(LobbyStats::default()),
        }
    }

    pub fn settings(&self) -> &LobbySettings {
        &self.settings
    }

    pub fn stats(&self) -> Arc<LobbyStats> {
        self.stats.clone()
    }

    pub fn room(&self, map_url: &str) -> Option<&Room> {
        self.rooms.get(map_url)
    }

    /// Register a freshly upgraded socket
    pub fn open(&mut self, conn: ConnectionId, outbox: Outbox) {
        debug!(conn_id = %conn, "Connection opened");
        self.connections.insert(conn, Connection { outbox, room: None });
    }

    /// Drop a connection and remove its player from the room. Safe to call
    /// more than once.
    pub fn close(&mut self, conn: ConnectionId) {
        let Some(connection) = self.connections.remove(&conn) else {
            return;
        };
        debug!(conn_id = %conn, "Connection closed");

        let Some(map_url) = connection.room else {
            return;
        };
        if let Some(room) = self.rooms.get_mut(&map_url) {
            room.leave(&conn);
            if room.is_empty() {
                self.rooms.remove(&map_url);
                self.stats.forget(&map_url);
                info!(map_url = %map_url, "Room closed");
            } else {
                self.stats.record(room);
            }
        }
    }

    /// Apply one client message. A kill returns the respawn to schedule.
    pub fn handle(&mut self, conn: ConnectionId, msg: ClientMsg, now: Instant) -> Option<PendingRespawn> {
        let msg = match msg {
            ClientMsg::Connect {
                player_id,
                map_url,
                name,
            } => {
                self.connect(conn, player_id, map_url, name, now);
                return None;
            }
            ClientMsg::Leave {} => {
                self.close(conn);
                return None;
            }
            other => other,
        };

        let Some(map_url) = self.connections.get(&conn).and_then(|c| c.room.as_deref()) else {
            debug!(conn_id = %conn, command = msg.command(), "Message before connect, ignoring");
            return None;
        };
        let room = self.rooms.get_mut(map_url)?;

        match msg {
            ClientMsg::UpdatePosition { position } => {
                let member = room.member_mut(&conn)?;
                member.player.position = position.into();
                let update = PlayerUpdate {
                    id: member.player.id.clone(),
                    position: Some(position),
                    ..Default::default()
                };
                room.broadcast_except(&conn, ServerMsg::UpdatePlayer(update));
            }
            ClientMsg::UpdateOrientation { yaw, pitch, scoped } => {
                let member = room.member_mut(&conn)?;
                member.player.yaw = yaw;
                member.player.pitch = pitch;
                let update = PlayerUpdate {
                    id: member.player.id.clone(),
                    yaw: Some(yaw),
                    pitch: Some(pitch),
                    scoped,
                    ..Default::default()
                };
                room.broadcast_except(&conn, ServerMsg::UpdatePlayer(update));
            }
            ClientMsg::CreateProjectile(spawn) => {
                room.broadcast_except(&conn, ServerMsg::CreateProjectile(spawn));
            }
            ClientMsg::RemoveProjectile { id } => {
                room.broadcast_except(&conn, ServerMsg::RemoveProjectile { id });
            }
            ClientMsg::PlayerHit { id, damage } => {
                return player_hit(room, conn, &id, damage, now, self.settings.respawn_delay);
            }
            ClientMsg::CollectPowerUp { id } => match room.power_ups.collect(&id, now) {
                Some(kind) => {
                    debug!(map_url = %room.map_url, power_up_id = %id, %kind, "Power-up collected");
                    room.broadcast(ServerMsg::RemovePowerUp { id: id.clone() });
                    room.send_to(&conn, ServerMsg::PickupPowerUp { id, kind });
                }
                None => debug!(power_up_id = %id, "Stale power-up collection ignored"),
            },
            ClientMsg::Connect { .. } | ClientMsg::Leave {} => {}
        }

        None
    }

    /// Bring a dead player back. Ignored unless the player is still in the
    /// room, still dead, and the respawn delay has fully elapsed.
    pub fn respawn(&mut self, map_url: &str, player_id: &str, now: Instant) -> bool {
        let delay = self.settings.respawn_delay;
        let Some(room) = self.rooms.get_mut(map_url) else {
            return false;
        };
        let Some(member) = room.find_player(player_id).and_then(|conn| room.member_mut(&conn)) else {
            return false;
        };

        match member.player.died_at {
            Some(died_at) if died_at + delay <= now => {}
            _ => return false,
        }

        member.player.health = MAX_HEALTH;
        member.player.died_at = None;
        member.send(ServerMsg::UpdateHealth { health: MAX_HEALTH });
        room.broadcast(ServerMsg::Respawn {
            player_id: player_id.to_string(),
        });

        info!(map_url = %map_url, player_id = %player_id, "Player respawned");
        true
    }

    /// Advance power-up schedules in every room
    pub fn tick(&mut self, now: Instant) {
        for room in self.rooms.values_mut() {
            for msg in room.power_ups.tick(now, &mut self.rng) {
                room.broadcast(msg);
            }
        }
    }

    fn connect(
        &mut self,
        conn: ConnectionId,
        player_id: PlayerId,
        map_url: String,
        name: Option<String>,
        now: Instant,
    ) {
        let outbox = match self.connections.get(&conn) {
            Some(Connection { room: Some(current), .. }) => {
                warn!(conn_id = %conn, room = %current, "Already in a room, ignoring connect");
                return;
            }
            Some(connection) => connection.outbox.clone(),
            None => {
                warn!(conn_id = %conn, "Connect from unknown connection");
                return;
            }
        };

        if !self.rooms.contains_key(&map_url) {
            let room = self.create_room(&map_url, now);
            self.rooms.insert(map_url.clone(), room);
        }
        let Some(room) = self.rooms.get_mut(&map_url) else {
            return;
        };

        if room.find_player(&player_id).is_some() {
            warn!(conn_id = %conn, player_id = %player_id, map_url = %map_url, "Player id already in room");
            return;
        }

        room.join(conn, RoomMember::new(PlayerState::new(player_id, name), outbox));
        self.stats.record(room);
        if let Some(connection) = self.connections.get_mut(&conn) {
            connection.room = Some(map_url);
        }
    }

    fn create_room(&self, map_url: &str, now: Instant) -> Room {
        let power_ups = match self.maps.load(map_url) {
            Ok(map) => {
                info!(map_url = %map_url, power_ups = map.power_ups.len(), "Room created");
                PowerUpField::new(
                    &map.power_ups,
                    now,
                    self.settings.power_up_initial_delay,
                    self.settings.power_up_cooldown,
                )
            }
            Err(e) => {
                warn!(map_url = %map_url, error = %e, "Map unavailable, room runs without power-ups");
                PowerUpField::default()
            }
        };
        Room::new(map_url.to_string(), power_ups)
    }
}

fn player_hit(
    room: &mut Room,
    shooter: ConnectionId,
    target_id: &str,
    damage: f32,
    now: Instant,
    respawn_delay: Duration,
) -> Option<PendingRespawn> {
    let shooter_id = room.member(&shooter)?.player.id.clone();
    let Some(target_conn) = room.find_player(target_id) else {
        debug!(target = %target_id, "Hit on unknown player ignored");
        return None;
    };
    let target = room.member_mut(&target_conn)?;

    match resolve_hit(target_conn == shooter, target.player.health, damage) {
        Err(reason) => {
            debug!(shooter = %shooter_id, target = %target_id, ?reason, "Hit rejected");
            None
        }
        Ok(HitOutcome::Damaged { health }) => {
            target.player.health = health;
            target.send(ServerMsg::UpdateHealth { health });
            None
        }
        Ok(HitOutcome::Killed) => {
            target.player.health = 0.0;
            target.player.died_at = Some(now);
            target.send(ServerMsg::UpdateHealth { health: 0.0 });
            room.broadcast(ServerMsg::Death {
                player_id: target_id.to_string(),
                source: DeathSource { id: shooter_id.clone() },
            });

            info!(map_url = %room.map_url, victim = %target_id, killer = %shooter_id, "Player killed");
            Some(PendingRespawn {
                map_url: room.map_url.clone(),
                player_id: target_id.to_string(),
                due: now + respawn_delay,
            })
        }
    }
}

/// Everything the lobby task consumes
#[derive(Debug)]
pub enum LobbyInput {
    Open { conn: ConnectionId, outbox: Outbox },
    Message { conn: ConnectionId, msg: ClientMsg },
    Close { conn: ConnectionId },
    Respawn { map_url: String, player_id: PlayerId },
}

/// Cloneable handle used by socket sessions
#[derive(Clone)]
pub struct LobbyHandle {
    input_tx: mpsc::Sender<LobbyInput>,
    stats: Arc<LobbyStats>,
}

impl LobbyHandle {
    /// Returns false once the lobby task is gone
    pub async fn send(&self, input: LobbyInput) -> bool {
        self.input_tx.send(input).await.is_ok()
    }

    pub fn stats(&self) -> &LobbyStats {
        &self.stats
    }
}

/// The lobby event loop
pub struct LobbyTask {
    lobby: Lobby,
    input_rx: mpsc::Receiver<LobbyInput>,
    timer_tx: mpsc::WeakSender<LobbyInput>,
}

impl LobbyTask {
    pub fn new(lobby: Lobby) -> (Self, LobbyHandle) {
        let (input_tx, input_rx) = mpsc::channel(1024);
        let handle = LobbyHandle {
            input_tx: input_tx.clone(),
            stats: lobby.stats(),
        };
        let task = Self {
            lobby,
            input_rx,
            timer_tx: input_tx.downgrade(),
        };
        (task, handle)
    }

    /// Runs until every handle has been dropped
    pub async fn run(mut self) {
        info!("Lobby started");

        let mut tick = interval(self.lobby.settings().power_up_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                input = self.input_rx.recv() => match input {
                    Some(input) => self.process(input),
                    None => break,
                },
                _ = tick.tick() => self.lobby.tick(Instant::now()),
            }
        }

        info!("Lobby stopped");
    }

    fn process(&mut self, input: LobbyInput) {
        let now = Instant::now();
        match input {
            LobbyInput::Open { conn, outbox } => self.lobby.open(conn, outbox),
            LobbyInput::Message { conn, msg } => {
                if let Some(pending) = self.lobby.handle(conn, msg, now) {
                    self.schedule_respawn(pending);
                }
            }
            LobbyInput::Close { conn } => self.lobby.close(conn),
            LobbyInput::Respawn { map_url, player_id } => {
                self.lobby.respawn(&map_url, &player_id, now);
            }
        }
    }

    fn schedule_respawn(&self, pending: PendingRespawn) {
        let Some(tx) = self.timer_tx.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep_until(tokio::time::Instant::from_std(pending.due)).await;
            let _ = tx
                .send(LobbyInput::Respawn {
                    map_url: pending.map_url,
                    player_id: pending.player_id,
                })
                .await;
        });
    }
}

/// Start the lobby task
pub fn spawn_lobby(settings: LobbySettings, maps: Arc<dyn MapSource>) -> (LobbyHandle, JoinHandle<()>) {
    let (task, handle) = LobbyTask::new(Lobby::new(settings, maps, rand::random()));
    (handle, tokio::spawn(task.run()))
}
