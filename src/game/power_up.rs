//! Per-room power-up scheduling
//!
//! Each map slot is either waiting for its next appearance or active with a
//! network-visible id. Collecting an active power-up puts the slot back to
//! waiting for one cooldown.

use std::time::{Duration, Instant};

use glam::Vec3;
use rand::Rng;
use tracing::debug;
use uuid::Builder;

use crate::map::PowerUpSpawn;
use crate::ws::protocol::{PowerUpKind, ServerMsg};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Scheduled { appear_at: Instant },
    Active { id: String },
}

#[derive(Debug, Clone)]
pub struct PowerUpSlot {
    pub position: Vec3,
    pub kind: PowerUpKind,
    pub state: SlotState,
}

impl PowerUpSlot {
    fn spawn_msg(&self) -> Option<ServerMsg> {
        match &self.state {
            SlotState::Active { id } => Some(ServerMsg::SpawnPowerUp {
                position: self.position.into(),
                id: id.clone(),
                kind: self.kind,
            }),
            SlotState::Scheduled { .. } => None,
        }
    }
}

/// All power-up slots of one room
#[derive(Debug, Clone, Default)]
pub struct PowerUpField {
    slots: Vec<PowerUpSlot>,
    cooldown: Duration,
}

impl PowerUpField {
    pub fn new(spawns: &[PowerUpSpawn], now: Instant, initial_delay: Duration, cooldown: Duration) -> Self {
        let slots = spawns
            .iter()
            .map(|spawn| PowerUpSlot {
                position: spawn.position,
                kind: spawn.kind,
                state: SlotState::Scheduled {
                    appear_at: now + initial_delay,
                },
            })
            .collect();
        Self { slots, cooldown }
    }

    pub fn slots(&self) -> &[PowerUpSlot] {
        &self.slots
    }

    /// Activate every slot that is due. Returns the `spawnPowerUp` messages
    /// to broadcast.
    pub fn tick<R: Rng>(&mut self, now: Instant, rng: &mut R) -> Vec<ServerMsg> {
        let mut spawned = Vec::new();
        for slot in &mut self.slots {
            if let SlotState::Scheduled { appear_at } = slot.state {
                if appear_at <= now {
                    let id = Builder::from_random_bytes(rng.gen()).into_uuid().to_string();
                    debug!(power_up_id = %id, kind = %slot.kind, "Power-up appeared");
                    slot.state = SlotState::Active { id };
                    spawned.extend(slot.spawn_msg());
                }
            }
        }
        spawned
    }

    /// Collect the active power-up `id`. Stale and unknown ids return `None`.
    pub fn collect(&mut self, id: &str, now: Instant) -> Option<PowerUpKind> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| matches!(&slot.state, SlotState::Active { id: active } if active == id))?;

        slot.state = SlotState::Scheduled {
            appear_at: now + self.cooldown,
        };
        Some(slot.kind)
    }

    /// `spawnPowerUp` for every currently active power-up, for new room members
    pub fn active_msgs(&self) -> impl Iterator<Item = ServerMsg> + '_ {
        self.slots.iter().filter_map(PowerUpSlot::spawn_msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn field(now: Instant) -> PowerUpField {
        let spawns = [
            PowerUpSpawn {
                position: Vec3::new(1.0, 2.0, 0.5),
                kind: PowerUpKind::Speed,
            },
            PowerUpSpawn {
                position: Vec3::new(5.0, 5.0, 0.5),
                kind: PowerUpKind::Gravity,
            },
        ];
        PowerUpField::new(&spawns, now, Duration::from_secs(5), Duration::from_secs(15))
    }

    fn active_id(field: &PowerUpField, idx: usize) -> String {
        match &field.slots()[idx].state {
            SlotState::Active { id } => id.clone(),
            other => panic!("slot {} not active: {:?}", idx, other),
        }
    }

    #[test]
    fn test_slots_appear_after_initial_delay() {
        let start = Instant::now();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut field = field(start);

        assert!(field.tick(start + Duration::from_secs(4), &mut rng).is_empty());
        let spawned = field.tick(start + Duration::from_secs(5), &mut rng);
        assert_eq!(spawned.len(), 2);
        assert_eq!(field.active_msgs().count(), 2);

        // Already active slots do not spawn again
        assert!(field.tick(start + Duration::from_secs(6), &mut rng).is_empty());
    }

    #[test]
    fn test_collect_once_then_cooldown() {
        let start = Instant::now();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut field = field(start);
        let t = start + Duration::from_secs(5);
        field.tick(t, &mut rng);

        let id = active_id(&field, 0);
        assert_eq!(field.collect(&id, t), Some(PowerUpKind::Speed));
        assert_eq!(field.collect(&id, t), None);
        assert_eq!(field.collect("nope", t), None);
        assert_eq!(
            field.slots()[0].state,
            SlotState::Scheduled {
                appear_at: t + Duration::from_secs(15)
            }
        );

        assert!(field.tick(t + Duration::from_secs(14), &mut rng).is_empty());
        let respawned = field.tick(t + Duration::from_secs(15), &mut rng);
        assert_eq!(respawned.len(), 1);
        assert_ne!(active_id(&field, 0), id);
    }
}
