//! Per-frame client loop
//!
//! One [`LocalSimulation::frame`] call per rendered frame: apply whatever the
//! server sent, turn input into movement through the resolver, fire, sweep
//! projectiles and report the results back over the [`NetworkClient`].

use std::collections::HashSet;
use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::game::combat::MAX_HEALTH;
use crate::map::{GameMap, SpawnPoint};
use crate::physics::{CollisionWorld, InputIntent, KinematicState, MovementConfig, Resolver};
use crate::ws::protocol::{ClientMsg, PlayerId, ServerMsg};

use super::effects::ActiveEffects;
use super::net::NetworkClient;
use super::projectile::{HitTarget, Projectile, ProjectileEvent, ProjectileSet};
use super::replica::{LocalEvent, Replicas};
use super::weapon::WeaponInstance;

/// Radians of look per pixel of mouse travel
pub const MOUSE_SENSITIVITY: f32 = 1.0 / 1000.0;

/// Longest frame the clock and projectiles advance by (a stalled tab)
const MAX_FRAME_DT: f32 = 1.0;

/// Raw input sampled for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    pub scoped: bool,
    pub jump: bool,
    /// Trigger held
    pub fire: bool,
    /// Switch to the next weapon this frame
    pub cycle_weapon: bool,
    /// Mouse travel in pixels since the last frame
    pub mouse_dx: f32,
    pub mouse_dy: f32,
    /// Seconds since the last frame
    pub dt: f32,
}

#[derive(Debug)]
pub struct LocalSimulation {
    player_id: PlayerId,
    map_url: String,
    name: Option<String>,
    net: NetworkClient,
    world: CollisionWorld,
    spawn_points: Vec<SpawnPoint>,
    resolver: Resolver,
    state: KinematicState,
    yaw: f32,
    pitch: f32,
    scoped: bool,
    health: f32,
    weapon: WeaponInstance,
    effects: ActiveEffects,
    projectiles: ProjectileSet,
    replicas: Replicas,
    /// Power-ups already asked for; one request per id
    requested: HashSet<String>,
    last_position: Option<Vec3>,
    last_orientation: Option<(f32, f32, bool)>,
    clock: Duration,
    rng: ChaCha8Rng,
}

impl LocalSimulation {
    pub fn new(player_id: impl Into<PlayerId>, map_url: impl Into<String>, map: &GameMap, net: NetworkClient, seed: u64) -> Self {
        let mut sim = Self {
            player_id: player_id.into(),
            map_url: map_url.into(),
            name: None,
            net,
            world: map.collision_world(),
            spawn_points: map.spawn_points.clone(),
            resolver: Resolver::new(MovementConfig::default()),
            state: KinematicState::default(),
            yaw: 0.0,
            pitch: 0.0,
            scoped: false,
            health: MAX_HEALTH,
            weapon: WeaponInstance::default(),
            effects: ActiveEffects::default(),
            projectiles: ProjectileSet::default(),
            replicas: Replicas::default(),
            requested: HashSet::new(),
            last_position: None,
            last_orientation: None,
            clock: Duration::ZERO,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        sim.spawn();
        sim
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn position(&self) -> Vec3 {
        self.state.position
    }

    pub fn state(&self) -> &KinematicState {
        &self.state
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    pub fn weapon(&self) -> &WeaponInstance {
        &self.weapon
    }

    pub fn effects(&self) -> &ActiveEffects {
        &self.effects
    }

    pub fn projectiles(&self) -> &ProjectileSet {
        &self.projectiles
    }

    pub fn replicas(&self) -> &Replicas {
        &self.replicas
    }

    pub fn world(&self) -> &CollisionWorld {
        &self.world
    }

    pub fn net(&self) -> &NetworkClient {
        &self.net
    }

    /// The transport reports open/closed through this
    pub fn net_mut(&mut self) -> &mut NetworkClient {
        &mut self.net
    }

    /// Send `connect`. Call once the socket reports open.
    pub fn connect(&mut self) -> bool {
        info!(player_id = %self.player_id, map_url = %self.map_url, "Joining room");
        let sent = self.net.send(&ClientMsg::Connect {
            player_id: self.player_id.clone(),
            map_url: self.map_url.clone(),
            name: self.name.clone(),
        });
        if sent {
            self.send_position();
        }
        sent
    }

    pub fn leave(&mut self) -> bool {
        self.net.send(&ClientMsg::Leave {})
    }

    /// Advance one frame
    pub fn frame(&mut self, input: &FrameInput) {
        let dt = if input.dt.is_finite() {
            input.dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };
        self.clock += Duration::from_secs_f32(dt);

        for msg in self.net.poll() {
            self.apply(msg);
        }

        self.look(input);

        if !self.is_dead() {
            self.step(input, dt);
            self.fire(input);
        }

        self.update_projectiles(dt);
        self.collect_power_ups();
        self.effects.expire(self.clock);
    }

    fn apply(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::CreateProjectile(spawn) => self.projectiles.add(Projectile::remote(&spawn)),
            ServerMsg::RemoveProjectile { id } => self.projectiles.remove(&id),
            other => match self.replicas.apply(&self.player_id, &other) {
                Some(LocalEvent::Health(health)) => self.health = health.clamp(0.0, MAX_HEALTH),
                Some(LocalEvent::Died { killer }) => {
                    info!(killer = %killer, "Killed");
                    self.health = 0.0;
                    self.state.velocity = Vec3::ZERO;
                    self.effects.clear();
                }
                Some(LocalEvent::Respawned) => self.respawn(),
                Some(LocalEvent::PickedUp(kind)) => self.effects.apply(kind, self.clock),
                None => {}
            },
        }
        // Forget requests for power-ups that are gone
        let replicas = &self.replicas;
        self.requested.retain(|id| replicas.power_up(id).is_some());
    }

    fn look(&mut self, input: &FrameInput) {
        if input.mouse_dx.is_finite() {
            self.yaw -= input.mouse_dx * MOUSE_SENSITIVITY;
        }
        if input.mouse_dy.is_finite() {
            self.pitch = (self.pitch - input.mouse_dy * MOUSE_SENSITIVITY).clamp(-FRAC_PI_2, FRAC_PI_2);
        }
        self.scoped = input.scoped;

        let orientation = (self.yaw, self.pitch, self.scoped);
        if self.last_orientation != Some(orientation) && self.net.send(&ClientMsg::UpdateOrientation {
            yaw: self.yaw,
            pitch: self.pitch,
            scoped: Some(self.scoped),
        }) {
            self.last_orientation = Some(orientation);
        }
    }

    fn step(&mut self, input: &FrameInput, dt: f32) {
        if input.cycle_weapon {
            self.weapon.cycle();
            debug!(weapon = self.weapon.spec().name, "Switched weapon");
        }

        let intent = InputIntent {
            forward: input.forward,
            backward: input.backward,
            left: input.left,
            right: input.right,
            sprint: input.sprint,
            scoped: input.scoped,
            jump: input.jump,
            yaw: self.yaw,
        };
        let modifiers = self.effects.modifiers(self.clock);
        self.state = self.resolver.resolve(&self.state, &intent, &modifiers, &self.world, dt);

        if self.last_position != Some(self.state.position) {
            self.send_position();
        }
    }

    fn fire(&mut self, input: &FrameInput) {
        if !input.fire {
            return;
        }
        let shots = self
            .weapon
            .try_fire(self.clock, self.state.position, self.yaw, self.pitch, &mut self.rng);
        for spawn in shots {
            self.projectiles.add(Projectile::local(&spawn));
            self.net.send(&ClientMsg::CreateProjectile(spawn));
        }
    }

    fn update_projectiles(&mut self, dt: f32) {
        let targets: Vec<HitTarget<'_>> = self
            .replicas
            .visible_players()
            .map(|p| HitTarget {
                id: &p.id,
                hitbox: p.hitbox(),
            })
            .collect();
        let events = self.projectiles.update(dt, &self.world.colliders, &targets);

        for event in events {
            let msg = match event {
                ProjectileEvent::PlayerHit { target, damage } => ClientMsg::PlayerHit { id: target, damage },
                ProjectileEvent::Removed { id } => ClientMsg::RemoveProjectile { id },
            };
            self.net.send(&msg);
        }
    }

    fn collect_power_ups(&mut self) {
        if self.is_dead() {
            return;
        }
        let body = self.resolver.body_box(self.state.position);
        let legs = self.resolver.legs_box(self.state.position, self.state.position.z, body.min.z);
        let touching: Vec<String> = self
            .replicas
            .power_ups()
            .filter(|(id, p)| {
                let pickup = p.pickup_box();
                !self.requested.contains(*id) && (pickup.intersects(&body) || pickup.intersects(&legs))
            })
            .map(|(id, _)| id.to_string())
            .collect();

        for id in touching {
            debug!(power_up_id = %id, "Requesting power-up");
            if self.net.send(&ClientMsg::CollectPowerUp { id: id.clone() }) {
                self.requested.insert(id);
            }
        }
    }

    fn spawn(&mut self) {
        let spawn = self.replicas.best_spawn(&self.spawn_points);
        self.state = KinematicState {
            position: spawn.position,
            velocity: Vec3::ZERO,
            grounded: false,
        };
        self.yaw = spawn.yaw;
        self.pitch = 0.0;
    }

    fn respawn(&mut self) {
        self.spawn();
        self.health = MAX_HEALTH;
        info!(position = ?self.state.position, "Respawned");
        self.send_position();
    }

    fn send_position(&mut self) {
        if self.net.send(&ClientMsg::UpdatePosition {
            position: self.state.position.into(),
        }) {
            self.last_position = Some(self.state.position);
        }
    }
}
