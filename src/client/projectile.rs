//! Short-lived projectiles
//!
//! Local projectiles are swept against the map and other players every frame
//! and report hits to the server. Remote ones are only replayed until the
//! server relays their removal or they time out.

use std::collections::HashSet;

use glam::Vec3;
use tracing::debug;

use crate::physics::{geometry::Aabb, raycast, Collider, Ray};
use crate::ws::protocol::{PlayerId, ProjectileOptions, ProjectileSpawn};

use super::HEAD_HEIGHT;

/// Projectiles are dropped after this long no matter what
pub const MAX_PROJECTILE_LIFETIME: f32 = 1.0;

/// Edge length of the cube players are hit on
pub const HITBOX_SIZE: f32 = 0.8;

/// Sweep rays skip this much at the start so a projectile never hits the
/// surface it just stopped on
const SWEEP_NEAR: f32 = 0.01;

/// Sweep rays reach slightly past the travelled distance
const SWEEP_OVERSHOOT: f32 = 1.01;

/// Hit volume of a player standing at `foot`
pub fn hitbox(foot: Vec3) -> Aabb {
    Aabb::from_center_half_extents(foot + Vec3::Z * HEAD_HEIGHT, Vec3::splat(HITBOX_SIZE / 2.0))
}

/// Another player a local projectile can hit
#[derive(Debug, Clone, Copy)]
pub struct HitTarget<'a> {
    pub id: &'a str,
    pub hitbox: Aabb,
}

/// What a local projectile asks the network layer to report
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectileEvent {
    /// `playerHit`
    PlayerHit { target: PlayerId, damage: f32 },
    /// `removeProjectile`
    Removed { id: String },
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: String,
    pub options: ProjectileOptions,
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
    /// Tip of the projectile after the last update
    pub tip: Vec3,
    /// Seconds alive
    pub lifetime: f32,
    /// Only the shooter's client checks collisions
    pub local: bool,
    pub should_remove: bool,
    credited: HashSet<PlayerId>,
}

impl Projectile {
    fn from_spawn(spawn: &ProjectileSpawn, local: bool) -> Self {
        let origin: Vec3 = spawn.origin.into();
        Self {
            id: spawn.id.clone(),
            options: spawn.projectile_options,
            origin,
            direction: Vec3::from(spawn.direction).normalize_or_zero(),
            tip: origin,
            lifetime: 0.0,
            local,
            should_remove: false,
            credited: HashSet::new(),
        }
    }

    pub fn local(spawn: &ProjectileSpawn) -> Self {
        Self::from_spawn(spawn, true)
    }

    pub fn remote(spawn: &ProjectileSpawn) -> Self {
        Self::from_spawn(spawn, false)
    }

    /// Advance by `dt` seconds. A local projectile that hits something is
    /// marked for removal and reports the removal, plus one `playerHit` if it
    /// struck a player it has not already been credited for.
    pub fn update(&mut self, dt: f32, colliders: &[Collider], targets: &[HitTarget<'_>]) -> Vec<ProjectileEvent> {
        if self.should_remove {
            return Vec::new();
        }

        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.lifetime += dt;
        if self.lifetime >= MAX_PROJECTILE_LIFETIME {
            self.should_remove = true;
        }

        let travel = self.options.speed.max(0.0) * dt;
        if !self.local {
            self.tip += self.direction * travel;
            return Vec::new();
        }

        let ray = Ray::new(self.tip, self.direction, SWEEP_NEAR, travel * SWEEP_OVERSHOOT);
        let wall = raycast(&ray, colliders);
        let player = targets
            .iter()
            .filter_map(|t| t.hitbox.raycast(&ray).map(|hit| (t.id, hit)))
            .min_by(|a, b| a.1.distance.total_cmp(&b.1.distance));

        let (point, target) = match (wall, player) {
            (Some(w), Some((id, p))) if p.distance < w.distance => (p.point, Some(id)),
            (Some(w), _) => (w.point, None),
            (None, Some((id, p))) => (p.point, Some(id)),
            (None, None) => {
                self.tip += self.direction * travel;
                return Vec::new();
            }
        };

        self.tip = point;
        self.should_remove = true;

        let mut events = Vec::with_capacity(2);
        if let Some(id) = target {
            if self.credited.insert(id.to_string()) {
                debug!(projectile_id = %self.id, target = %id, "Projectile hit player");
                events.push(ProjectileEvent::PlayerHit {
                    target: id.to_string(),
                    damage: self.options.damage,
                });
            }
        }
        events.push(ProjectileEvent::Removed { id: self.id.clone() });
        events
    }
}

/// Every projectile alive on this client
#[derive(Debug, Clone, Default)]
pub struct ProjectileSet {
    projectiles: Vec<Projectile>,
}

impl ProjectileSet {
    pub fn add(&mut self, projectile: Projectile) {
        self.projectiles.push(projectile);
    }

    /// Drop a projectile by id; unknown ids are ignored
    pub fn remove(&mut self, id: &str) {
        self.projectiles.retain(|p| p.id != id);
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.iter()
    }

    /// Sweep everything, then drop whatever finished
    pub fn update(&mut self, dt: f32, colliders: &[Collider], targets: &[HitTarget<'_>]) -> Vec<ProjectileEvent> {
        let events = self
            .projectiles
            .iter_mut()
            .flat_map(|p| p.update(dt, colliders, targets))
            .collect();
        self.projectiles.retain(|p| !p.should_remove);
        events
    }
}
