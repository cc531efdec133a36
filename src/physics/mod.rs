//! Deterministic movement core shared by every client

pub mod collider;
pub mod geometry;
pub mod resolver;

pub use collider::{raycast, Collider, ColliderKind, RampOrientation};
pub use geometry::{Aabb, Face, Ray, RayHit};
pub use resolver::{
    CollisionWorld, InputIntent, KinematicState, Modifiers, MovementConfig, Resolver, WorldBounds,
};
