//! Map model, SMF parsing and map file lookup

pub mod smf;
pub mod source;

use glam::{Vec2, Vec3};
use serde_json::Value;
use thiserror::Error;

use crate::physics::{Collider, ColliderKind, CollisionWorld, RampOrientation, WorldBounds};
use crate::ws::protocol::PowerUpKind;

pub use smf::{parse, parse_metadata};
pub use source::{list_maps, map_file_name, DirMapSource, MapListing, MapSource};

/// Free-form `key: value` header entries
pub type Metadata = serde_json::Map<String, Value>;

/// `--key value` options attached to an object line
pub type Options = serde_json::Map<String, Value>;

const DEFAULT_WALL_HEIGHT: f32 = 4.0;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("map file does not start with a '#! <version>' header")]
    MissingHeader,

    #[error("unsupported map version: {0}")]
    UnsupportedVersion(String),

    #[error("line {line}: {directive} is missing a field")]
    MissingField { line: usize, directive: &'static str },

    #[error("line {line}: invalid value '{token}'")]
    InvalidValue { line: usize, token: String },

    #[error("invalid map url: {0}")]
    InvalidUrl(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: Vec3,
    /// Radians
    pub yaw: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapObject {
    /// Full-height wall standing on the floor; height comes from metadata
    Wall {
        position: Vec2,
        size: Vec2,
        options: Options,
    },
    Box {
        position: Vec3,
        size: Vec3,
        options: Options,
    },
    Ramp {
        position: Vec3,
        size: Vec3,
        orientation: RampOrientation,
        options: Options,
    },
}

/// A power-up slot declared by the map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerUpSpawn {
    pub position: Vec3,
    pub kind: PowerUpKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameMap {
    pub metadata: Metadata,
    pub spawn_points: Vec<SpawnPoint>,
    pub objects: Vec<MapObject>,
    pub power_ups: Vec<PowerUpSpawn>,
}

impl GameMap {
    pub fn name(&self) -> Option<&str> {
        self.metadata.get("name").and_then(Value::as_str)
    }

    pub fn wall_height(&self) -> f32 {
        self.metadata
            .get("wallHeight")
            .and_then(Value::as_f64)
            .map(|h| h as f32)
            .filter(|h| h.is_finite() && *h > 0.0)
            .unwrap_or(DEFAULT_WALL_HEIGHT)
    }

    /// Horizontal extent of all walls; `-1..1` when the map has none
    pub fn bounds(&self) -> WorldBounds {
        let mut walls = self.objects.iter().filter_map(|o| match o {
            MapObject::Wall { position, size, .. } => Some((*position, *position + *size)),
            _ => None,
        });

        let Some((first_min, first_max)) = walls.next() else {
            return WorldBounds {
                min: Vec2::splat(-1.0),
                max: Vec2::splat(1.0),
            };
        };

        let (min, max) = walls.fold((first_min.min(first_max), first_min.max(first_max)), |(lo, hi), (a, b)| {
            (lo.min(a).min(b), hi.max(a).max(b))
        });
        WorldBounds { min, max }
    }

    pub fn colliders(&self) -> Vec<Collider> {
        let wall_height = self.wall_height();
        let bounds = self.bounds();

        let mut colliders: Vec<Collider> = self
            .objects
            .iter()
            .map(|object| match object {
                MapObject::Wall { position, size, .. } => ColliderKind::Box {
                    min: position.extend(0.0),
                    max: (*position + *size).extend(wall_height),
                },
                MapObject::Box { position, size, .. } => ColliderKind::Box {
                    min: *position,
                    max: *position + *size,
                },
                MapObject::Ramp {
                    position,
                    size,
                    orientation,
                    ..
                } => ColliderKind::Ramp {
                    origin: *position,
                    size: *size,
                    orientation: *orientation,
                },
            })
            .map(ColliderKind::build)
            .collect();

        colliders.push(
            ColliderKind::Floor {
                min: bounds.min,
                max: bounds.max,
            }
            .build(),
        );
        colliders
    }

    pub fn collision_world(&self) -> CollisionWorld {
        CollisionWorld::new(self.colliders(), Some(self.bounds()))
    }
}
