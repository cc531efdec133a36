//! Browser-side game logic without rendering: the local simulation loop,
//! replicas of other players and the projectile/power-up lifecycle

pub mod effects;
pub mod net;
pub mod projectile;
pub mod replica;
pub mod sim;
pub mod weapon;

pub use net::{NetworkClient, SocketEnds, SocketState};
pub use sim::{FrameInput, LocalSimulation};

use glam::Vec3;

/// Eye height above the foot position
pub const HEAD_HEIGHT: f32 = 1.65;

/// Unit look vector. Yaw 0 and pitch 0 look down +y; pitch tilts towards +z.
pub fn orientation_vector(yaw: f32, pitch: f32) -> Vec3 {
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    let (sin_pitch, cos_pitch) = pitch.sin_cos();
    Vec3::new(-cos_pitch * sin_yaw, cos_pitch * cos_yaw, sin_pitch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_orientation_vector() {
        assert!((orientation_vector(0.0, 0.0) - Vec3::Y).length() < 1e-6);
        assert!((orientation_vector(FRAC_PI_2, 0.0) + Vec3::X).length() < 1e-6);
        assert!((orientation_vector(1.0, FRAC_PI_2) - Vec3::Z).length() < 1e-6);
        assert!((orientation_vector(0.3, -0.7).length() - 1.0).abs() < 1e-6);
    }
}
