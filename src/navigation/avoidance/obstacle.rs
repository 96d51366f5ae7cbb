use std::f32::consts::SQRT_2;

use bevy::prelude::*;
use smallvec::SmallVec;

use super::arcs::CircleArc;
use crate::navigation::math::{angle_of, NavBox, Segment};

/// Cone of forbidden velocities, in the agent's local velocity frame.
///
/// The cone is the open wedge at `apex` between `rays[0]` and `rays[1]`,
/// `rays[1]` being counter-clockwise of `rays[0]`. Boundary velocities are
/// allowed.
#[derive(Clone, Debug, PartialEq)]
pub struct Obstacle {
    pub apex: Vec2,
    pub rays: [Vec2; 2],
    /// Gap between the two bodies, zero when they overlap.
    pub distance: f32,
    /// Each ray clipped to the velocity box, absent when the ray misses it.
    pub segments: [Option<Segment>; 2],
}

impl Obstacle {
    /// `None` when the rays are not usable directions or enclose nothing.
    pub fn new(apex: Vec2, rays: [Vec2; 2], distance: f32, velocity_box: &NavBox) -> Option<Self> {
        let ray0 = rays[0].try_normalize()?;
        let ray1 = rays[1].try_normalize()?;
        if ray0.perp_dot(ray1).abs() <= f32::EPSILON && ray0.dot(ray1) > 0.0 {
            return None;
        }

        let reach = apex.length() + 2.0 * SQRT_2 * velocity_box.max.max_element().abs();
        let clip = |ray: Vec2| velocity_box.clip_segment(&Segment::new(apex, apex + ray * reach));

        Some(Self {
            apex,
            rays: [ray0, ray1],
            distance,
            segments: [clip(ray0), clip(ray1)],
        })
    }

    /// Whether `velocity` lies strictly inside the cone.
    pub fn forbids(&self, velocity: Vec2) -> bool {
        let rel = velocity - self.apex;
        self.rays[0].perp_dot(rel) > 0.0 && self.rays[1].perp_dot(rel) < 0.0
    }

    pub fn is_static(&self, tolerance: f32) -> bool {
        self.apex.length() <= tolerance
    }

    /// Arcs of the circle of `radius` around the origin inside the cone.
    ///
    /// The circle is cut at every point where a ray crosses it, and each
    /// piece between consecutive cuts is tested at its middle.
    pub fn blocked_arcs(&self, radius: f32) -> SmallVec<[CircleArc; 2]> {
        let mut cuts: SmallVec<[f32; 4]> = SmallVec::new();
        for ray in self.rays {
            let b = self.apex.dot(ray);
            let c = self.apex.length_squared() - radius * radius;
            let discriminant = b * b - c;
            if discriminant < 0.0 {
                continue;
            }
            let root = discriminant.sqrt();
            for t in [-b - root, -b + root] {
                if t >= 0.0 {
                    cuts.push(angle_of(self.apex + ray * t));
                }
            }
        }

        let mut blocked = SmallVec::new();
        if cuts.is_empty() {
            if self.forbids(Vec2::new(radius, 0.0)) {
                blocked.push(CircleArc::FULL);
            }
            return blocked;
        }

        cuts.sort_by(f32::total_cmp);
        cuts.dedup_by(|a, b| (*a - *b).abs() <= 1e-6);
        for (i, &from) in cuts.iter().enumerate() {
            let to = cuts[(i + 1) % cuts.len()];
            let arc = if cuts.len() == 1 {
                CircleArc::new(from, std::f32::consts::TAU)
            } else {
                CircleArc::between(from, to)
            };
            if arc.sweep <= 0.0 {
                continue;
            }
            if self.forbids(CircleArc::direction_at(arc.mid()) * radius) {
                blocked.push(arc);
            }
        }
        blocked
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_4;

    use super::*;

    fn velocity_box(max_speed: f32) -> NavBox {
        NavBox::from_center_half_size(Vec2::ZERO, Vec2::splat(max_speed))
    }

    fn quarter_cone(apex: Vec2) -> Obstacle {
        let rays = [Vec2::from_angle(-FRAC_PI_4), Vec2::from_angle(FRAC_PI_4)];
        Obstacle::new(apex, rays, 1.0, &velocity_box(1.0)).expect("valid cone")
    }

    #[test]
    fn test_forbids_is_open_wedge() {
        let cone = quarter_cone(Vec2::ZERO);
        assert!(cone.forbids(Vec2::new(0.5, 0.0)));
        assert!(cone.forbids(Vec2::new(0.5, 0.4)));
        assert!(!cone.forbids(Vec2::new(0.5, 0.5)));
        assert!(!cone.forbids(Vec2::new(-0.5, 0.0)));
        assert!(!cone.forbids(Vec2::ZERO));
    }

    #[test]
    fn test_same_direction_rays_are_rejected() {
        let boxed = velocity_box(1.0);
        assert!(Obstacle::new(Vec2::ZERO, [Vec2::X, Vec2::X * 2.0], 0.0, &boxed).is_none());
        assert!(Obstacle::new(Vec2::ZERO, [Vec2::ZERO, Vec2::X], 0.0, &boxed).is_none());
        // Opposite rays make a half-plane, which is fine
        assert!(Obstacle::new(Vec2::ZERO, [Vec2::NEG_Y, Vec2::Y], 0.0, &boxed).is_some());
    }

    #[test]
    fn test_segments_are_clipped_to_box() {
        let cone = quarter_cone(Vec2::ZERO);
        let upper = cone.segments[1].expect("ray leaves the box");
        assert!(upper.start.length() < 1e-6);
        assert!((upper.end - Vec2::new(1.0, 1.0)).length() < 1e-5);

        let far = quarter_cone(Vec2::new(5.0, 0.0));
        assert!(far.segments[0].is_none() && far.segments[1].is_none());
    }

    #[test]
    fn test_blocked_arc_of_static_cone() {
        let cone = quarter_cone(Vec2::ZERO);
        let arcs = cone.blocked_arcs(1.0);
        assert_eq!(arcs.len(), 1);
        assert!((arcs[0].sweep - 2.0 * FRAC_PI_4).abs() < 1e-5);
        assert!(arcs[0].contains(0.0, 0.0));
    }

    #[test]
    fn test_cone_swallowing_the_circle() {
        // Apex behind the agent, wide open forward: the whole circle is inside
        let cone = quarter_cone(Vec2::new(-10.0, 0.0));
        let arcs = cone.blocked_arcs(1.0);
        assert_eq!(arcs.as_slice(), &[CircleArc::FULL]);

        // Apex far ahead: the circle is untouched
        let cone = quarter_cone(Vec2::new(10.0, 0.0));
        assert!(cone.blocked_arcs(1.0).is_empty());
    }
}
