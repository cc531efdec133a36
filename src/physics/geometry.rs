//! Geometry primitives: bounding boxes, rays and triangle faces
//!
//! Everything here is allocation-free and never panics on degenerate input.

use glam::Vec3;

/// Separation tolerance for triangle/box overlap. Shapes that only touch
/// within this distance are treated as not intersecting.
pub const CONTACT_EPSILON: f32 = 1e-4;

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        Self::new(center - half, center + half)
    }

    /// Smallest box enclosing all points (an empty iterator gives a zero box)
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::new(Vec3::ZERO, Vec3::ZERO);
        };
        iter.fold(Self::new(first, first), |acc, p| Self {
            min: acc.min.min(p),
            max: acc.max.max(p),
        })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Inclusive overlap test (touching boxes intersect)
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn expand(&self, amount: f32) -> Self {
        Self::new(self.min - Vec3::splat(amount), self.max + Vec3::splat(amount))
    }

    /// Slab test. Returns the entry distance and the outward normal of the
    /// entered face, or `None` when the ray starts inside or misses.
    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let dir = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if dir.abs() < 1e-8 {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let (mut t0, mut t1) = ((lo - origin) * inv, (hi - origin) * inv);
            let mut face = Vec3::ZERO;
            face[axis] = -dir.signum();
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            if t0 > t_enter {
                t_enter = t0;
                normal = face;
            }
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }

        if t_enter < ray.near || t_enter > ray.far {
            return None;
        }

        Some(RayHit {
            point: ray.at(t_enter),
            distance: t_enter,
            normal,
        })
    }
}

/// A ray segment `origin + direction * t` for `t` in `[near, far]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Ray {
    /// Build a ray; a zero direction yields an empty segment that hits nothing.
    pub fn new(origin: Vec3, direction: Vec3, near: f32, far: f32) -> Self {
        let direction = direction.normalize_or_zero();
        let far = if direction == Vec3::ZERO { -1.0 } else { far };
        Self {
            origin,
            direction,
            near,
            far,
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Nearest intersection of a ray query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub distance: f32,
    /// Outward surface normal at the hit
    pub normal: Vec3,
}

/// A triangle with a precomputed unit normal and plane offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    pub normal: Vec3,
    /// Plane offset: `normal.dot(p) == offset` for points on the face
    pub offset: f32,
}

impl Face {
    /// Counter-clockwise winding gives the outward normal. Zero-area
    /// triangles return `None`.
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        let cross = (b - a).cross(c - a);
        if !cross.is_finite() || cross.length_squared() < 1e-12 {
            return None;
        }
        let normal = cross.normalize();
        Some(Self {
            a,
            b,
            c,
            normal,
            offset: normal.dot(a),
        })
    }

    pub fn flipped(&self) -> Self {
        Self {
            a: self.a,
            b: self.c,
            c: self.b,
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    pub fn centroid(&self) -> Vec3 {
        (self.a + self.b + self.c) / 3.0
    }

    /// Floors, slopes and ceilings: faces whose normal is mostly vertical
    pub fn is_mostly_vertical(&self, min_normal_z: f32) -> bool {
        self.normal.z.abs() >= min_normal_z
    }

    /// Möller–Trumbore, front faces only
    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        if self.normal.dot(ray.direction) >= 0.0 {
            return None;
        }

        let edge1 = self.b - self.a;
        let edge2 = self.c - self.a;
        let p = ray.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < 1e-10 {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = ray.origin - self.a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = ray.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(q) * inv_det;
        if t < ray.near || t > ray.far {
            return None;
        }

        Some(RayHit {
            point: ray.at(t),
            distance: t,
            normal: self.normal,
        })
    }

    /// Separating-axis test against a box. Contact within
    /// [`CONTACT_EPSILON`] does not count as intersection.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let center = aabb.center();
        let half = aabb.half_extents();
        let verts = [self.a - center, self.b - center, self.c - center];
        let edges = [verts[1] - verts[0], verts[2] - verts[1], verts[0] - verts[2]];

        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            if separated_on(axis, &verts, half) {
                return false;
            }
        }

        if separated_on(self.normal, &verts, half) {
            return false;
        }

        for box_axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            for edge in edges {
                if separated_on(box_axis.cross(edge), &verts, half) {
                    return false;
                }
            }
        }

        true
    }
}

fn separated_on(axis: Vec3, verts: &[Vec3; 3], half: Vec3) -> bool {
    let len_sq = axis.length_squared();
    if len_sq < 1e-12 {
        return false;
    }
    let axis = axis / len_sq.sqrt();

    let p0 = verts[0].dot(axis);
    let p1 = verts[1].dot(axis);
    let p2 = verts[2].dot(axis);
    let min = p0.min(p1).min(p2);
    let max = p0.max(p1).max(p2);
    let radius = half.x * axis.x.abs() + half.y * axis.y.abs() + half.z * axis.z.abs();

    min >= radius - CONTACT_EPSILON || max <= -radius + CONTACT_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_face() -> Face {
        Face::new(
            Vec3::new(-10.0, -10.0, 0.0),
            Vec3::new(10.0, -10.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        )
        .unwrap()
    }

    #[test]
    fn test_degenerate_face_rejected() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert!(Face::new(p, p, Vec3::ZERO).is_none());
        assert!(Face::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0).is_none());
    }

    #[test]
    fn test_face_raycast_front_and_back() {
        let face = floor_face();
        assert_eq!(face.normal, Vec3::Z);

        let down = Ray::new(Vec3::new(0.0, 0.0, 2.0), -Vec3::Z, 0.0, 10.0);
        let hit = face.raycast(&down).unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-5);
        assert!(hit.point.z.abs() < 1e-5);

        // Back faces are culled
        let up = Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::Z, 0.0, 10.0);
        assert!(face.raycast(&up).is_none());

        // Out of range
        let short = Ray::new(Vec3::new(0.0, 0.0, 2.0), -Vec3::Z, 0.0, 1.0);
        assert!(face.raycast(&short).is_none());
    }

    #[test]
    fn test_face_box_overlap() {
        let face = floor_face();
        let crossing = Aabb::new(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5));
        assert!(face.intersects_aabb(&crossing));

        let above = Aabb::new(Vec3::new(-0.5, -0.5, 0.1), Vec3::new(0.5, 0.5, 1.0));
        assert!(!face.intersects_aabb(&above));

        // Resting exactly on the plane is contact, not intersection
        let resting = Aabb::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::new(0.5, 0.5, 1.0));
        assert!(!face.intersects_aabb(&resting));
    }

    #[test]
    fn test_face_box_overlap_outside_triangle_edge() {
        let face = floor_face();
        // Straddles the plane but lies beyond the hypotenuse corner
        let beside = Aabb::new(Vec3::new(8.0, 8.0, -0.5), Vec3::new(9.0, 9.0, 0.5));
        assert!(!face.intersects_aabb(&beside));
    }

    #[test]
    fn test_aabb_raycast() {
        let aabb = Aabb::new(Vec3::new(9.0, -1.0, 0.0), Vec3::new(11.0, 1.0, 2.0));
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::X, 0.0, 100.0);
        let hit = aabb.raycast(&ray).unwrap();
        assert!((hit.distance - 9.0).abs() < 1e-5);
        assert_eq!(hit.normal, -Vec3::X);

        let away = Ray::new(Vec3::new(0.0, 0.0, 1.0), -Vec3::X, 0.0, 100.0);
        assert!(aabb.raycast(&away).is_none());
    }

    #[test]
    fn test_zero_direction_ray_hits_nothing() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::ZERO, 0.0, 100.0);
        assert!(aabb.raycast(&ray).is_none());
        assert!(floor_face().raycast(&ray).is_none());
    }
}
