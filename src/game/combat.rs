//! Damage rules for relayed hits

/// Health a player spawns and respawns with
pub const MAX_HEALTH: f32 = 100.0;

/// Result of an accepted hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitOutcome {
    /// Target survived with the new health
    Damaged { health: f32 },
    /// Target's health reached zero
    Killed,
}

/// Why a hit report was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitRejection {
    /// Shooter and target are the same connection
    SelfHit,
    /// Non-finite damage, or less than half a point
    InvalidDamage,
    /// Target is already dead and waiting to respawn
    TargetDead,
}

/// Apply damage to health, returns (new_health, is_dead)
pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
    let new_health = (current_health - damage).clamp(0.0, MAX_HEALTH);
    (new_health, new_health <= 0.0)
}

/// Decide what a `playerHit` does to its target. Health only moves in
/// whole points, so damage is rounded first.
pub fn resolve_hit(is_self: bool, target_health: f32, damage: f32) -> Result<HitOutcome, HitRejection> {
    if is_self {
        return Err(HitRejection::SelfHit);
    }
    let damage = damage.round();
    if !(damage.is_finite() && damage > 0.0) {
        return Err(HitRejection::InvalidDamage);
    }
    if target_health <= 0.0 {
        return Err(HitRejection::TargetDead);
    }

    match apply_damage(target_health, damage) {
        (_, true) => Ok(HitOutcome::Killed),
        (health, false) => Ok(HitOutcome::Damaged { health }),
    }
}
