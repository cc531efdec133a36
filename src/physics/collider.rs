//! Static colliders
//!
//! Every collider kind is normalized into the same `{aabb, faces}` form when
//! the map loads. Movement and projectile code only ever look at that form.

use std::fmt;
use std::str::FromStr;

use glam::{Vec2, Vec3};

use super::geometry::{Aabb, Face, Ray, RayHit};

/// Direction a ramp rises towards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampOrientation {
    PosX,
    NegX,
    PosY,
    NegY,
}

impl FromStr for RampOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+x" => Ok(Self::PosX),
            "-x" => Ok(Self::NegX),
            "+y" => Ok(Self::PosY),
            "-y" => Ok(Self::NegY),
            other => Err(format!("unknown ramp orientation '{}'", other)),
        }
    }
}

impl fmt::Display for RampOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PosX => "+x",
            Self::NegX => "-x",
            Self::PosY => "+y",
            Self::NegY => "-y",
        };
        f.write_str(s)
    }
}

/// Collider shapes a map can declare
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderKind {
    /// Solid box spanning `min..max`
    Box { min: Vec3, max: Vec3 },
    /// Wedge inside the box `origin..origin+size`, rising towards `orientation`
    Ramp {
        origin: Vec3,
        size: Vec3,
        orientation: RampOrientation,
    },
    /// Upward facing ground quad at `z = 0`
    Floor { min: Vec2, max: Vec2 },
}

impl ColliderKind {
    /// Normalize into bounding box + outward facing triangles
    pub fn build(self) -> Collider {
        let faces = match self {
            ColliderKind::Box { min, max } => box_faces(min, max),
            ColliderKind::Ramp {
                origin,
                size,
                orientation,
            } => ramp_faces(origin, size, orientation),
            ColliderKind::Floor { min, max } => {
                let a = Vec3::new(min.x, min.y, 0.0);
                let b = Vec3::new(max.x, min.y, 0.0);
                let c = Vec3::new(max.x, max.y, 0.0);
                let d = Vec3::new(min.x, max.y, 0.0);
                [Face::new(a, b, c), Face::new(a, c, d)]
                    .into_iter()
                    .flatten()
                    .collect()
            }
        };

        let aabb = Aabb::from_points(faces.iter().flat_map(|f| [f.a, f.b, f.c]));
        Collider {
            kind: self,
            aabb,
            faces,
        }
    }
}

/// A normalized static collider
#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    pub kind: ColliderKind,
    pub aabb: Aabb,
    pub faces: Vec<Face>,
}

impl Collider {
    /// Nearest front-face hit on this collider
    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        if !self.aabb.expand(1e-3).intersects(&ray_bounds(ray)) {
            return None;
        }
        nearest(self.faces.iter().filter_map(|f| f.raycast(ray)))
    }
}

/// Geometry query: nearest hit of `ray` against a collider set
pub fn raycast<'a>(ray: &Ray, colliders: impl IntoIterator<Item = &'a Collider>) -> Option<RayHit> {
    nearest(colliders.into_iter().filter_map(|c| c.raycast(ray)))
}

pub(crate) fn nearest(hits: impl Iterator<Item = RayHit>) -> Option<RayHit> {
    hits.fold(None, |best: Option<RayHit>, hit| match best {
        Some(b) if b.distance <= hit.distance => Some(b),
        _ => Some(hit),
    })
}

fn ray_bounds(ray: &Ray) -> Aabb {
    if ray.far < ray.near {
        return Aabb::new(ray.origin, ray.origin);
    }
    Aabb::new(ray.at(ray.near), ray.at(ray.far))
}

/// Two triangles per quad, winding fixed so the normal points away from `inside`
fn quad(corners: [Vec3; 4], inside: Vec3, out: &mut Vec<Face>) {
    let [a, b, c, d] = corners;
    for face in [Face::new(a, b, c), Face::new(a, c, d)].into_iter().flatten() {
        out.push(orient_outward(face, inside));
    }
}

fn triangle(corners: [Vec3; 3], inside: Vec3, out: &mut Vec<Face>) {
    let [a, b, c] = corners;
    if let Some(face) = Face::new(a, b, c) {
        out.push(orient_outward(face, inside));
    }
}

fn orient_outward(face: Face, inside: Vec3) -> Face {
    if face.normal.dot(face.centroid() - inside) < 0.0 {
        face.flipped()
    } else {
        face
    }
}

fn box_faces(min: Vec3, max: Vec3) -> Vec<Face> {
    let corner = |x: bool, y: bool, z: bool| {
        Vec3::new(
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        )
    };
    let inside = (min + max) * 0.5;
    let mut faces = Vec::with_capacity(12);

    for hi in [false, true] {
        quad(
            [corner(hi, false, false), corner(hi, true, false), corner(hi, true, true), corner(hi, false, true)],
            inside,
            &mut faces,
        );
        quad(
            [corner(false, hi, false), corner(true, hi, false), corner(true, hi, true), corner(false, hi, true)],
            inside,
            &mut faces,
        );
        quad(
            [corner(false, false, hi), corner(true, false, hi), corner(true, true, hi), corner(false, true, hi)],
            inside,
            &mut faces,
        );
    }

    faces
}

fn ramp_faces(origin: Vec3, size: Vec3, orientation: RampOrientation) -> Vec<Face> {
    // (u, v, w): u runs up the ramp, v across it, w is height
    let point = |u: f32, v: f32, w: f32| {
        let (fx, fy) = match orientation {
            RampOrientation::PosX => (u, v),
            RampOrientation::NegX => (1.0 - u, v),
            RampOrientation::PosY => (v, u),
            RampOrientation::NegY => (v, 1.0 - u),
        };
        origin + Vec3::new(fx * size.x, fy * size.y, w * size.z)
    };

    let low0 = point(0.0, 0.0, 0.0);
    let low1 = point(0.0, 1.0, 0.0);
    let foot0 = point(1.0, 0.0, 0.0);
    let foot1 = point(1.0, 1.0, 0.0);
    let top0 = point(1.0, 0.0, 1.0);
    let top1 = point(1.0, 1.0, 1.0);
    let inside = (low0 + low1 + foot0 + foot1 + top0 + top1) / 6.0;

    let mut faces = Vec::with_capacity(8);
    quad([low0, foot0, foot1, low1], inside, &mut faces);
    quad([foot0, foot1, top1, top0], inside, &mut faces);
    quad([low0, low1, top1, top0], inside, &mut faces);
    triangle([low0, foot0, top0], inside, &mut faces);
    triangle([low1, foot1, top1], inside, &mut faces);
    faces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_faces_point_outward() {
        let collider = ColliderKind::Box {
            min: Vec3::ZERO,
            max: Vec3::new(2.0, 3.0, 4.0),
        }
        .build();

        assert_eq!(collider.faces.len(), 12);
        assert_eq!(collider.aabb.min, Vec3::ZERO);
        assert_eq!(collider.aabb.max, Vec3::new(2.0, 3.0, 4.0));

        let center = collider.aabb.center();
        for face in &collider.faces {
            assert!(face.normal.dot(face.centroid() - center) > 0.0);
        }
    }

    #[test]
    fn test_ramp_slope_faces_up_the_ramp() {
        let collider = ColliderKind::Ramp {
            origin: Vec3::ZERO,
            size: Vec3::new(4.0, 2.0, 1.0),
            orientation: RampOrientation::PosX,
        }
        .build();

        assert_eq!(collider.faces.len(), 8);
        let slope = collider
            .faces
            .iter()
            .find(|f| f.normal.z > 0.5)
            .expect("ramp has a walkable slope");
        // Rising towards +x means the slope leans back towards -x
        assert!(slope.normal.x < 0.0);

        // Straight down onto the slope, halfway up
        let ray = Ray::new(Vec3::new(2.0, 1.0, 5.0), -Vec3::Z, 0.0, 10.0);
        let hit = collider.raycast(&ray).unwrap();
        assert!((hit.point.z - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_ramp_orientation_parse() {
        assert_eq!("-y".parse::<RampOrientation>(), Ok(RampOrientation::NegY));
        assert!("up".parse::<RampOrientation>().is_err());
        assert_eq!(RampOrientation::PosX.to_string(), "+x");
    }

    #[test]
    fn test_flat_box_drops_degenerate_faces() {
        let collider = ColliderKind::Box {
            min: Vec3::ZERO,
            max: Vec3::new(1.0, 1.0, 0.0),
        }
        .build();
        // Only the top and bottom quads have area
        assert_eq!(collider.faces.len(), 4);
    }

    #[test]
    fn test_raycast_picks_nearest_collider() {
        let near = ColliderKind::Box {
            min: Vec3::new(5.0, -1.0, 0.0),
            max: Vec3::new(6.0, 1.0, 2.0),
        }
        .build();
        let far = ColliderKind::Box {
            min: Vec3::new(9.0, -1.0, 0.0),
            max: Vec3::new(10.0, 1.0, 2.0),
        }
        .build();

        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::X, 0.0, 50.0);
        let hit = raycast(&ray, [&far, &near]).unwrap();
        assert!((hit.distance - 5.0).abs() < 1e-5);
        assert!((hit.normal + Vec3::X).length() < 1e-6);
    }
}
