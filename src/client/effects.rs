//! Timed power-up effects on the local player

use std::collections::HashMap;
use std::time::Duration;

use crate::physics::Modifiers;
use crate::ws::protocol::PowerUpKind;

/// How long a collected power-up lasts
pub const EFFECT_DURATION: Duration = Duration::from_secs(10);

/// Half extent of the pickup cube around a power-up
pub const POWER_UP_RADIUS: f32 = 0.4;

const SPEED_FACTOR: f32 = 1.5;
const JUMP_FACTOR: f32 = 1.5;
const GRAVITY_FACTOR: f32 = 0.5;

/// Effects currently running, keyed by kind. Picking up a kind that is
/// already active restarts its timer.
#[derive(Debug, Clone, Default)]
pub struct ActiveEffects {
    expires_at: HashMap<PowerUpKind, Duration>,
}

impl ActiveEffects {
    pub fn apply(&mut self, kind: PowerUpKind, now: Duration) {
        self.expires_at.insert(kind, now + EFFECT_DURATION);
    }

    pub fn is_active(&self, kind: PowerUpKind, now: Duration) -> bool {
        self.expires_at.get(&kind).is_some_and(|until| now < *until)
    }

    /// Drop expired effects
    pub fn expire(&mut self, now: Duration) {
        self.expires_at.retain(|_, until| now < *until);
    }

    pub fn clear(&mut self) {
        self.expires_at.clear();
    }

    pub fn modifiers(&self, now: Duration) -> Modifiers {
        let mut modifiers = Modifiers::default();
        if self.is_active(PowerUpKind::Speed, now) {
            modifiers.speed_factor = SPEED_FACTOR;
        }
        if self.is_active(PowerUpKind::Jump, now) {
            modifiers.jump_factor = JUMP_FACTOR;
        }
        if self.is_active(PowerUpKind::Gravity, now) {
            modifiers.gravity_factor = GRAVITY_FACTOR;
        }
        modifiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_lifetime() {
        let mut effects = ActiveEffects::default();
        let t0 = Duration::from_secs(3);
        effects.apply(PowerUpKind::Gravity, t0);

        let mid = effects.modifiers(t0 + Duration::from_secs(5));
        assert_eq!(mid.gravity_factor, GRAVITY_FACTOR);
        assert_eq!(mid.speed_factor, 1.0);

        effects.expire(t0 + EFFECT_DURATION);
        assert_eq!(effects.modifiers(t0 + EFFECT_DURATION), Modifiers::default());
    }

    #[test]
    fn test_reapply_restarts_timer() {
        let mut effects = ActiveEffects::default();
        effects.apply(PowerUpKind::Speed, Duration::from_secs(0));
        effects.apply(PowerUpKind::Speed, Duration::from_secs(8));
        assert!(effects.is_active(PowerUpKind::Speed, Duration::from_secs(15)));
        assert!(!effects.is_active(PowerUpKind::Speed, Duration::from_secs(18)));
    }
}
