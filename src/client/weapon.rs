//! Weapons: fire rate gating and spread

use std::time::Duration;

use glam::Vec3;
use rand::Rng;
use uuid::Builder;

use crate::ws::protocol::{ProjectileOptions, ProjectileSpawn};

use super::{orientation_vector, HEAD_HEIGHT};

/// Shots leave slightly below the eye
const MUZZLE_DROP: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponSpec {
    pub id: &'static str,
    pub name: &'static str,
    /// Shots per second
    pub rate_of_fire: f32,
    /// Maximum deviation in radians, applied to yaw and pitch separately
    pub inaccuracy: f32,
    pub projectiles_per_shot: u32,
    pub projectile: ProjectileOptions,
}

impl WeaponSpec {
    pub fn time_between_shots(&self) -> Duration {
        Duration::from_nanos((1e9 / f64::from(self.rate_of_fire)).round() as u64)
    }
}

pub const ASSAULT_RIFLE: WeaponSpec = WeaponSpec {
    id: "assault_rifle",
    name: "ASSAULT RIFLE",
    rate_of_fire: 5.0,
    inaccuracy: 0.015,
    projectiles_per_shot: 1,
    projectile: ProjectileOptions {
        speed: 100.0,
        damage: 10.0,
    },
};

pub const SHOTGUN: WeaponSpec = WeaponSpec {
    id: "shotgun",
    name: "SHOTGUN",
    rate_of_fire: 1.0,
    inaccuracy: 0.15,
    projectiles_per_shot: 6,
    projectile: ProjectileOptions {
        speed: 75.0,
        damage: 10.0,
    },
};

pub const SNIPER: WeaponSpec = WeaponSpec {
    id: "sniper",
    name: "SNIPER",
    rate_of_fire: 0.75,
    inaccuracy: 0.002,
    projectiles_per_shot: 1,
    projectile: ProjectileOptions {
        speed: 200.0,
        damage: 80.0,
    },
};

pub const SMG: WeaponSpec = WeaponSpec {
    id: "smg",
    name: "SMG",
    rate_of_fire: 10.0,
    inaccuracy: 0.12,
    projectiles_per_shot: 1,
    projectile: ProjectileOptions {
        speed: 75.0,
        damage: 8.0,
    },
};

/// Cycling order
pub const WEAPONS: [WeaponSpec; 4] = [ASSAULT_RIFLE, SHOTGUN, SNIPER, SMG];

/// The weapon a player is holding plus its fire timer
#[derive(Debug, Clone)]
pub struct WeaponInstance {
    index: usize,
    last_shot: Option<Duration>,
}

impl Default for WeaponInstance {
    /// Players start with the SMG
    fn default() -> Self {
        Self {
            index: WEAPONS.len() - 1,
            last_shot: None,
        }
    }
}

impl WeaponInstance {
    pub fn spec(&self) -> &'static WeaponSpec {
        &WEAPONS[self.index]
    }

    pub fn cycle(&mut self) {
        self.index = (self.index + 1) % WEAPONS.len();
    }

    /// Fire from a player standing at `foot` looking along `yaw`/`pitch`.
    /// Returns nothing while the weapon is still cooling down.
    pub fn try_fire<R: Rng>(
        &mut self,
        now: Duration,
        foot: Vec3,
        yaw: f32,
        pitch: f32,
        rng: &mut R,
    ) -> Vec<ProjectileSpawn> {
        let spec = self.spec();
        if let Some(last) = self.last_shot {
            if now.saturating_sub(last) < spec.time_between_shots() {
                return Vec::new();
            }
        }
        self.last_shot = Some(now);

        let origin = foot + Vec3::Z * (HEAD_HEIGHT - MUZZLE_DROP);
        (0..spec.projectiles_per_shot)
            .map(|_| {
                let yaw_error = rng.gen_range(-1.0f32..=1.0) * spec.inaccuracy;
                let pitch_error = rng.gen_range(-1.0f32..=1.0) * spec.inaccuracy;
                let direction = orientation_vector(yaw + yaw_error, pitch + pitch_error);

                ProjectileSpawn {
                    id: Builder::from_random_bytes(rng.gen()).into_uuid().to_string(),
                    origin: origin.into(),
                    direction: direction.into(),
                    projectile_options: spec.projectile,
                    weapon_id: Some(spec.id.to_string()),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_fire_rate_gating() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut weapon = WeaponInstance::default();
        assert_eq!(weapon.spec().name, "SMG");

        let t0 = Duration::from_secs(1);
        assert_eq!(weapon.try_fire(t0, Vec3::ZERO, 0.0, 0.0, &mut rng).len(), 1);
        assert!(weapon
            .try_fire(t0 + Duration::from_millis(50), Vec3::ZERO, 0.0, 0.0, &mut rng)
            .is_empty());
        assert_eq!(
            weapon
                .try_fire(t0 + Duration::from_millis(100), Vec3::ZERO, 0.0, 0.0, &mut rng)
                .len(),
            1
        );
    }

    #[test]
    fn test_shotgun_pellets_spread_within_cone() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut weapon = WeaponInstance::default();
        weapon.cycle();
        weapon.cycle();
        assert_eq!(weapon.spec().name, "SHOTGUN");

        let foot = Vec3::new(3.0, 4.0, 0.0);
        let pellets = weapon.try_fire(Duration::ZERO, foot, 0.0, 0.0, &mut rng);
        assert_eq!(pellets.len(), 6);

        let mut ids: Vec<&str> = pellets.iter().map(|p| p.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 6);

        for pellet in &pellets {
            let origin: Vec3 = pellet.origin.into();
            assert!((origin - Vec3::new(3.0, 4.0, 1.45)).length() < 1e-5);

            let dir: Vec3 = pellet.direction.into();
            assert!((dir.length() - 1.0).abs() < 1e-5);
            // Worst case both axes deviate by the full inaccuracy
            assert!(dir.angle_between(Vec3::Y) <= SHOTGUN.inaccuracy * 1.5);
            assert_eq!(pellet.projectile_options.damage, 10.0);
            assert_eq!(pellet.weapon_id.as_deref(), Some("shotgun"));
        }
    }

    #[test]
    fn test_cycle_wraps() {
        let mut weapon = WeaponInstance::default();
        weapon.cycle();
        assert_eq!(weapon.spec().name, "ASSAULT RIFLE");
        for _ in 0..WEAPONS.len() {
            weapon.cycle();
        }
        assert_eq!(weapon.spec().name, "ASSAULT RIFLE");
    }
}
