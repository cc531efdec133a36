//! Player movement and collision resolution
//!
//! One call to [`Resolver::resolve`] advances a player by one tick. The pass
//! order matters: vertical support first, then horizontal push-out against
//! plane buckets, then a swept ray as a tunneling safety net, then bounds.

use glam::{Vec2, Vec3};

use super::collider::{raycast, Collider};
use super::geometry::{Aabb, Face, Ray};

/// Minimum `|normal.z|` for a face to count as floor, slope or ceiling
pub const WALKABLE_NORMAL_Z: f32 = 0.5;

/// Normals within this angle share a plane bucket (0.1°)
const BUCKET_ANGLE_COS: f32 = 0.999_998_5;

/// Plane offsets within this distance share a plane bucket
const BUCKET_OFFSET_TOLERANCE: f32 = 0.01;

/// Grid rays sit slightly inside the footprint so they miss exact edges
const FOOTPRINT_INSET: f32 = 0.98;

/// How far below the foot a support surface is looked for while airborne
const SUPPORT_MARGIN: f32 = 0.01;

/// Movement tunables
#[derive(Debug, Clone, Copy)]
pub struct MovementConfig {
    /// Half width of the player footprint
    pub radius: f32,
    /// Foot to head
    pub height: f32,
    /// Ledges up to this height are walked onto
    pub step_height: f32,
    /// Downward acceleration (units/s²)
    pub gravity: f32,
    pub walk_speed: f32,
    pub sprint_speed: f32,
    /// Speed multiplier while scoped in
    pub scoped_factor: f32,
    pub jump_speed: f32,
    /// Longest tick the resolver will integrate
    pub max_dt: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            radius: 0.2,
            height: 1.8,
            step_height: 0.3,
            gravity: 20.0,
            walk_speed: 3.0,
            sprint_speed: 6.0,
            scoped_factor: 0.5,
            jump_speed: 8.0,
            max_dt: 1.0 / 30.0,
        }
    }
}

/// Externally settable multipliers (power-up effects)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modifiers {
    pub speed_factor: f32,
    pub jump_factor: f32,
    pub gravity_factor: f32,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            speed_factor: 1.0,
            jump_factor: 1.0,
            gravity_factor: 1.0,
        }
    }
}

/// Player intent for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputIntent {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    pub scoped: bool,
    pub jump: bool,
    /// Facing, radians about +z. Yaw 0 looks down +y.
    pub yaw: f32,
}

/// Kinematic state carried between ticks
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KinematicState {
    /// Foot position
    pub position: Vec3,
    pub velocity: Vec3,
    pub grounded: bool,
}

/// Horizontal extents of the playable area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min: Vec2,
    pub max: Vec2,
}

/// Everything the resolver collides against
#[derive(Debug, Clone, Default)]
pub struct CollisionWorld {
    pub colliders: Vec<Collider>,
    pub bounds: Option<WorldBounds>,
}

impl CollisionWorld {
    pub fn new(colliders: Vec<Collider>, bounds: Option<WorldBounds>) -> Self {
        Self { colliders, bounds }
    }

    fn overlapping<'a>(&'a self, aabb: &'a Aabb) -> impl Iterator<Item = &'a Collider> + 'a {
        self.colliders.iter().filter(move |c| c.aabb.intersects(aabb))
    }
}

/// Collision-resolving movement integrator
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    pub config: MovementConfig,
}

impl Resolver {
    pub fn new(config: MovementConfig) -> Self {
        Self { config }
    }

    /// Advance `state` by `dt` seconds. Never fails: bad input degrades into
    /// clamps on the result.
    pub fn resolve(
        &self,
        state: &KinematicState,
        intent: &InputIntent,
        modifiers: &Modifiers,
        world: &CollisionWorld,
        dt: f32,
    ) -> KinematicState {
        let cfg = &self.config;
        let dt = clamp_dt(dt, cfg.max_dt);
        let previous = if state.position.is_finite() {
            state.position
        } else {
            Vec3::ZERO
        };

        let mut velocity = if state.velocity.is_finite() {
            state.velocity
        } else {
            Vec3::ZERO
        };
        let wish = wish_direction(intent) * self.speed(intent, modifiers);
        velocity.x = wish.x;
        velocity.y = wish.y;

        if state.grounded && intent.jump {
            velocity.z = cfg.jump_speed * modifiers.jump_factor;
        }

        velocity.z -= cfg.gravity * modifiers.gravity_factor * dt;
        let mut position = previous + velocity * dt;

        let mut grounded = self.vertical_pass(&mut position, &mut velocity, previous, state.grounded, world);

        let motion = position - previous;
        self.push_out_of_walls(&mut position, Vec3::new(motion.x, motion.y, 0.0), world);
        self.tunneling_guard(&mut position, previous, world);

        if let Some(bounds) = world.bounds {
            clamp_to_bounds(&mut position, &bounds, cfg.radius);
        }

        if position.z < 0.0 {
            position.z = 0.0;
            velocity.z = velocity.z.max(0.0);
            grounded = true;
        }

        if !position.is_finite() || !velocity.is_finite() {
            return KinematicState {
                position: previous,
                velocity: Vec3::ZERO,
                grounded: state.grounded,
            };
        }

        KinematicState {
            position,
            velocity,
            grounded,
        }
    }

    fn speed(&self, intent: &InputIntent, modifiers: &Modifiers) -> f32 {
        let cfg = &self.config;
        let base = if intent.sprint {
            cfg.sprint_speed
        } else {
            cfg.walk_speed
        };
        let scoped = if intent.scoped { cfg.scoped_factor } else { 1.0 };
        base * scoped * modifiers.speed_factor
    }

    /// Box around the legs, spanning the tick's vertical travel
    pub fn legs_box(&self, position: Vec3, bottom: f32, top: f32) -> Aabb {
        let r = self.config.radius;
        Aabb::new(
            Vec3::new(position.x - r, position.y - r, bottom),
            Vec3::new(position.x + r, position.y + r, top),
        )
    }

    /// Box from step height up to the head
    pub fn body_box(&self, position: Vec3) -> Aabb {
        let r = self.config.radius;
        Aabb::new(
            Vec3::new(position.x - r, position.y - r, position.z + self.config.step_height),
            Vec3::new(position.x + r, position.y + r, position.z + self.config.height),
        )
    }

    fn footprint_offsets(&self) -> impl Iterator<Item = Vec2> {
        let r = self.config.radius * FOOTPRINT_INSET;
        [-r, 0.0, r]
            .into_iter()
            .flat_map(move |dx| [-r, 0.0, r].into_iter().map(move |dy| Vec2::new(dx, dy)))
    }

    /// Ground and ceiling. Returns whether the player ends up supported.
    fn vertical_pass(
        &self,
        position: &mut Vec3,
        velocity: &mut Vec3,
        previous: Vec3,
        was_grounded: bool,
        world: &CollisionWorld,
    ) -> bool {
        let cfg = &self.config;
        let low = previous.z.min(position.z);
        let high = previous.z.max(position.z);

        if velocity.z > 0.0 {
            let body = self.legs_box(*position, low + cfg.step_height, high + cfg.height);
            let candidates: Vec<&Collider> = world.overlapping(&body).collect();
            let origin_z = low + cfg.step_height;
            let reach = position.z + cfg.height - origin_z + SUPPORT_MARGIN;

            let ceiling = self
                .footprint_offsets()
                .filter_map(|o| {
                    let origin = Vec3::new(position.x + o.x, position.y + o.y, origin_z);
                    raycast(&Ray::new(origin, Vec3::Z, 0.0, reach), candidates.iter().copied())
                })
                .map(|hit| hit.point.z)
                .fold(f32::INFINITY, f32::min);

            if ceiling.is_finite() && position.z + cfg.height > ceiling {
                position.z = ceiling - cfg.height;
                velocity.z = 0.0;
            }
            return false;
        }

        let snap_below = if was_grounded {
            cfg.step_height
        } else {
            SUPPORT_MARGIN
        };
        let origin_z = high + cfg.step_height;
        let bottom = position.z - snap_below;
        let legs = self.legs_box(*position, bottom, origin_z);
        let candidates: Vec<&Collider> = world.overlapping(&legs).collect();
        if candidates.is_empty() {
            return false;
        }

        let reach = origin_z - bottom;
        let support = self
            .footprint_offsets()
            .filter_map(|o| {
                let origin = Vec3::new(position.x + o.x, position.y + o.y, origin_z);
                raycast(&Ray::new(origin, -Vec3::Z, 0.0, reach), candidates.iter().copied())
            })
            .map(|hit| hit.point.z)
            .fold(f32::NEG_INFINITY, f32::max);

        if support.is_finite() {
            position.z = support;
            velocity.z = 0.0;
            true
        } else {
            false
        }
    }

    /// Greedy largest-conflicting-plane push-out
    fn push_out_of_walls(&self, position: &mut Vec3, motion: Vec3, world: &CollisionWorld) {
        let body = self.body_box(*position);
        let faces = world
            .overlapping(&body)
            .flat_map(|c| c.faces.iter())
            .filter(|f| !f.is_mostly_vertical(WALKABLE_NORMAL_Z) && f.intersects_aabb(&body));

        let mut buckets = bucket_by_plane(faces);
        let direction = motion.normalize_or_zero();

        for _ in 0..buckets.len() {
            let body = self.body_box(*position);

            let mut best: Option<(usize, usize, f32)> = None;
            for (idx, bucket) in buckets.iter().enumerate() {
                let hits = bucket.intersecting(&body);
                if hits == 0 {
                    continue;
                }
                let facing = bucket.normal.dot(direction);
                let better = match best {
                    None => true,
                    Some((_, best_hits, best_facing)) => {
                        hits > best_hits || (hits == best_hits && facing < best_facing)
                    }
                };
                if better {
                    best = Some((idx, hits, facing));
                }
            }

            let Some((idx, _, _)) = best else {
                break;
            };
            let bucket = buckets.swap_remove(idx);
            *position = self.push_out_of_plane(*position, bucket.normal, bucket.offset);
        }
    }

    /// Place the body box so it just touches the plane from the front side
    fn push_out_of_plane(&self, position: Vec3, normal: Vec3, offset: f32) -> Vec3 {
        let body = self.body_box(position);
        let center = body.center();
        let half = body.half_extents();
        let extent = half.x * normal.x.abs() + half.y * normal.y.abs() + half.z * normal.z.abs();
        let distance = normal.dot(center) - offset;
        position + normal * (extent - distance)
    }

    fn tunneling_guard(&self, position: &mut Vec3, previous: Vec3, world: &CollisionWorld) {
        let lift = Vec3::Z * (self.config.step_height + SUPPORT_MARGIN);
        let from = previous + lift;
        let travel = *position - previous;
        let horizontal = Vec3::new(travel.x, travel.y, 0.0);
        let distance = horizontal.length();
        if distance < 1e-6 {
            return;
        }

        let ray = Ray::new(from, horizontal, 0.0, distance);
        let Some(hit) = raycast(&ray, world.colliders.iter()) else {
            return;
        };
        if hit.normal.z.abs() >= WALKABLE_NORMAL_Z {
            return;
        }

        let r = self.config.radius;
        let extent = r * (hit.normal.x.abs() + hit.normal.y.abs());
        let pushed = hit.point + hit.normal * extent;
        position.x = pushed.x;
        position.y = pushed.y;
    }
}

fn clamp_dt(dt: f32, max_dt: f32) -> f32 {
    if dt.is_finite() && dt > 0.0 {
        dt.min(max_dt)
    } else {
        0.0
    }
}

/// Unit horizontal direction from the movement keys, rotated by yaw
fn wish_direction(intent: &InputIntent) -> Vec3 {
    let mut local = Vec2::ZERO;
    if intent.forward {
        local.y += 1.0;
    }
    if intent.backward {
        local.y -= 1.0;
    }
    if intent.left {
        local.x -= 1.0;
    }
    if intent.right {
        local.x += 1.0;
    }
    let local = local.normalize_or_zero();
    let (sin, cos) = intent.yaw.sin_cos();
    Vec3::new(local.x * cos - local.y * sin, local.x * sin + local.y * cos, 0.0)
}

fn clamp_to_bounds(position: &mut Vec3, bounds: &WorldBounds, radius: f32) {
    let lo = bounds.min + Vec2::splat(radius);
    let hi = bounds.max - Vec2::splat(radius);
    if lo.x <= hi.x {
        position.x = position.x.clamp(lo.x, hi.x);
    }
    if lo.y <= hi.y {
        position.y = position.y.clamp(lo.y, hi.y);
    }
}

/// Coplanar group of wall triangles
#[derive(Debug, Clone)]
struct PlaneBucket<'a> {
    normal: Vec3,
    offset: f32,
    faces: Vec<&'a Face>,
}

impl PlaneBucket<'_> {
    fn intersecting(&self, body: &Aabb) -> usize {
        self.faces.iter().filter(|f| f.intersects_aabb(body)).count()
    }
}

fn bucket_by_plane<'a>(faces: impl Iterator<Item = &'a Face>) -> Vec<PlaneBucket<'a>> {
    let mut buckets: Vec<PlaneBucket<'a>> = Vec::new();
    for face in faces {
        let existing = buckets.iter_mut().find(|b| {
            b.normal.dot(face.normal) >= BUCKET_ANGLE_COS
                && (b.offset - face.offset).abs() <= BUCKET_OFFSET_TOLERANCE
        });
        match existing {
            Some(bucket) => bucket.faces.push(face),
            None => buckets.push(PlaneBucket {
                normal: face.normal,
                offset: face.offset,
                faces: vec![face],
            }),
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collider::{ColliderKind, RampOrientation};

    const DT: f32 = 1.0 / 60.0;

    fn floor(extent: f32) -> Collider {
        ColliderKind::Floor {
            min: Vec2::splat(-extent),
            max: Vec2::splat(extent),
        }
        .build()
    }

    fn boxed(min: Vec3, max: Vec3) -> Collider {
        ColliderKind::Box { min, max }.build()
    }

    fn world(mut colliders: Vec<Collider>) -> CollisionWorld {
        colliders.push(floor(50.0));
        CollisionWorld::new(colliders, None)
    }

    fn standing_at(position: Vec3) -> KinematicState {
        KinematicState {
            position,
            velocity: Vec3::ZERO,
            grounded: true,
        }
    }

    fn assert_no_wall_overlap(resolver: &Resolver, world: &CollisionWorld, position: Vec3) {
        let body = resolver.body_box(position);
        for collider in &world.colliders {
            for face in &collider.faces {
                if face.is_mostly_vertical(WALKABLE_NORMAL_Z) {
                    continue;
                }
                assert!(
                    !face.intersects_aabb(&body),
                    "body at {:?} overlaps face with normal {:?}",
                    position,
                    face.normal
                );
            }
        }
    }

    #[test]
    fn test_rest_on_flat_ground() {
        let resolver = Resolver::default();
        let world = world(vec![]);
        let mut state = standing_at(Vec3::new(1.0, 1.0, 0.0));

        for _ in 0..120 {
            state = resolver.resolve(&state, &InputIntent::default(), &Modifiers::default(), &world, DT);
            assert!(state.grounded);
            assert!(state.position.z.abs() < 1e-5);
            assert_eq!(state.velocity.z, 0.0);
        }
        assert_eq!(state.position.x, 1.0);
        assert_eq!(state.position.y, 1.0);
    }

    #[test]
    fn test_walk_into_box_stops_one_radius_from_face() {
        let resolver = Resolver::default();
        let world = world(vec![boxed(Vec3::new(2.0, -2.0, 0.0), Vec3::new(4.0, 2.0, 2.0))]);
        let mut state = standing_at(Vec3::new(0.0, 0.0, 0.0));
        // Yaw -90° turns "forward" towards +x
        let intent = InputIntent {
            forward: true,
            yaw: -std::f32::consts::FRAC_PI_2,
            ..Default::default()
        };

        for _ in 0..120 {
            state = resolver.resolve(&state, &intent, &Modifiers::default(), &world, DT);
            assert_no_wall_overlap(&resolver, &world, state.position);
        }

        let expected = 2.0 - resolver.config.radius;
        assert!(
            (state.position.x - expected).abs() < 1e-3,
            "x = {}, expected {}",
            state.position.x,
            expected
        );
        assert!(state.position.y.abs() < 1e-3);
        assert!(state.grounded);
    }

    #[test]
    fn test_no_interpenetration_around_boxes() {
        let resolver = Resolver::default();
        let world = world(vec![
            boxed(Vec3::new(2.0, -1.0, 0.0), Vec3::new(3.0, 1.0, 3.0)),
            boxed(Vec3::new(-3.0, 2.0, 0.0), Vec3::new(-1.0, 2.5, 3.0)),
        ]);
        let mut state = standing_at(Vec3::ZERO);

        for tick in 0..600 {
            let intent = InputIntent {
                forward: true,
                sprint: tick % 3 == 0,
                right: tick % 5 == 0,
                yaw: tick as f32 * 0.037,
                ..Default::default()
            };
            state = resolver.resolve(&state, &intent, &Modifiers::default(), &world, DT);
            assert_no_wall_overlap(&resolver, &world, state.position);
        }
    }

    #[test]
    fn test_steps_onto_low_ledge() {
        let resolver = Resolver::default();
        let world = world(vec![boxed(Vec3::new(1.0, -2.0, 0.0), Vec3::new(5.0, 2.0, 0.2))]);
        let mut state = standing_at(Vec3::new(0.0, 0.0, 0.0));
        let intent = InputIntent {
            forward: true,
            yaw: -std::f32::consts::FRAC_PI_2,
            ..Default::default()
        };

        for _ in 0..40 {
            state = resolver.resolve(&state, &intent, &Modifiers::default(), &world, DT);
        }

        assert!(state.position.x > 1.5);
        assert!((state.position.z - 0.2).abs() < 1e-4);
        assert!(state.grounded);
    }

    #[test]
    fn test_walks_up_ramp() {
        let resolver = Resolver::default();
        let ramp = ColliderKind::Ramp {
            origin: Vec3::new(1.0, -2.0, 0.0),
            size: Vec3::new(4.0, 4.0, 1.0),
            orientation: RampOrientation::PosX,
        }
        .build();
        let world = world(vec![ramp]);
        let mut state = standing_at(Vec3::ZERO);
        let intent = InputIntent {
            forward: true,
            yaw: -std::f32::consts::FRAC_PI_2,
            ..Default::default()
        };

        let mut highest: f32 = 0.0;
        for _ in 0..70 {
            state = resolver.resolve(&state, &intent, &Modifiers::default(), &world, DT);
            highest = highest.max(state.position.z);
        }

        // 70 ticks at 3 u/s covers 3.5 units: 2.5 of them on the slope
        assert!(highest > 0.5, "never climbed, peak z = {}", highest);
        assert!(state.position.x > 3.0);
    }

    #[test]
    fn test_jump_and_land() {
        let resolver = Resolver::default();
        let world = world(vec![]);
        let mut state = standing_at(Vec3::ZERO);
        let jump = InputIntent {
            jump: true,
            ..Default::default()
        };

        state = resolver.resolve(&state, &jump, &Modifiers::default(), &world, DT);
        assert!(!state.grounded);
        assert!(state.velocity.z > 0.0);
        assert!(state.position.z > 0.0);

        // Holding jump mid-air does nothing; eventually we land
        let mut landed = false;
        for _ in 0..120 {
            state = resolver.resolve(&state, &jump, &Modifiers::default(), &world, DT);
            if state.grounded {
                landed = true;
                break;
            }
        }
        assert!(landed);
        assert!(state.position.z.abs() < 1e-5);
    }

    #[test]
    fn test_ceiling_stops_jump() {
        let resolver = Resolver::default();
        let world = world(vec![boxed(Vec3::new(-2.0, -2.0, 2.2), Vec3::new(2.0, 2.0, 3.0))]);
        let mut state = standing_at(Vec3::ZERO);
        let jump = InputIntent {
            jump: true,
            ..Default::default()
        };

        for _ in 0..30 {
            state = resolver.resolve(&state, &jump, &Modifiers::default(), &world, DT);
            assert!(state.position.z + resolver.config.height <= 2.2 + 1e-4);
        }
    }

    #[test]
    fn test_large_dt_is_clamped() {
        let resolver = Resolver::default();
        let world = world(vec![]);
        let state = standing_at(Vec3::ZERO);
        let intent = InputIntent {
            forward: true,
            ..Default::default()
        };

        let next = resolver.resolve(&state, &intent, &Modifiers::default(), &world, 5.0);
        let max_step = resolver.config.walk_speed * resolver.config.max_dt;
        assert!((next.position.y - max_step).abs() < 1e-5);
    }

    #[test]
    fn test_tunneling_guard_stops_thin_wall() {
        let resolver = Resolver::default();
        let wall = boxed(Vec3::new(0.5, -5.0, 0.0), Vec3::new(0.52, 5.0, 3.0));
        let world = world(vec![wall]);
        let state = KinematicState {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            grounded: true,
        };
        let intent = InputIntent {
            forward: true,
            sprint: true,
            yaw: -std::f32::consts::FRAC_PI_2,
            ..Default::default()
        };
        let modifiers = Modifiers {
            speed_factor: 10.0,
            ..Default::default()
        };

        // 60 u/s for 1/30 s crosses the whole wall in one tick
        let next = resolver.resolve(&state, &intent, &modifiers, &world, 1.0 / 30.0);
        assert!(next.position.x <= 0.5 - resolver.config.radius + 1e-4, "x = {}", next.position.x);
    }

    #[test]
    fn test_degenerate_input_does_not_panic() {
        let resolver = Resolver::default();
        let world = world(vec![
            boxed(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)),
            boxed(Vec3::new(0.5, 0.5, 0.0), Vec3::new(0.5, 0.5, 0.0)),
            boxed(Vec3::new(0.1, 0.0, 0.0), Vec3::new(1.0, 1.0, 2.0)),
            boxed(Vec3::new(0.1, 0.0, 0.0), Vec3::new(1.0, 1.0, 2.0)),
        ]);
        let state = KinematicState {
            position: Vec3::new(0.2, 0.5, 0.0),
            velocity: Vec3::new(f32::NAN, 0.0, 0.0),
            grounded: false,
        };

        let next = resolver.resolve(&state, &InputIntent::default(), &Modifiers::default(), &world, f32::NAN);
        assert!(next.position.is_finite());
        assert!(next.velocity.is_finite());
    }

    #[test]
    fn test_bounds_clamp() {
        let resolver = Resolver::default();
        let world = CollisionWorld::new(
            vec![floor(50.0)],
            Some(WorldBounds {
                min: Vec2::new(-1.0, -1.0),
                max: Vec2::new(1.0, 1.0),
            }),
        );
        let state = standing_at(Vec3::new(5.0, -5.0, 0.0));
        let next = resolver.resolve(&state, &InputIntent::default(), &Modifiers::default(), &world, DT);
        assert!((next.position.x - (1.0 - resolver.config.radius)).abs() < 1e-6);
        assert!((next.position.y - (-1.0 + resolver.config.radius)).abs() < 1e-6);
    }

    #[test]
    fn test_buckets_merge_coplanar_triangles() {
        let collider = boxed(Vec3::ZERO, Vec3::ONE);
        let buckets = bucket_by_plane(collider.faces.iter());
        assert_eq!(buckets.len(), 6);
        assert!(buckets.iter().all(|b| b.faces.len() == 2));
    }
}
