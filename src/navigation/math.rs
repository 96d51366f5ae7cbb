//! 2D geometry helpers shared by the navmesh and the velocity-obstacle solver.
//!
//! Everything here works on Bevy's `Vec2` in the XY plane. The navmesh and the
//! avoidance solver both reason about "local" frames aligned to a direction,
//! cones described by a mid direction plus a cosine limit, and axis-aligned
//! boxes that can touch along a shared border.

use bevy::math::{DVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Tolerance used when no configured tolerance is at hand.
pub const ZERO_TOLERANCE: f32 = 1e-5;

/// Perpendicular of `v`, rotated a quarter turn counter-clockwise: `(-y, x)`.
#[inline]
pub fn perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Sidedness of `point` relative to the oriented line `from -> to`.
///
/// Positive when the point lies to the left, negative to the right, zero on the line.
#[inline]
pub fn is_left(from: Vec2, to: Vec2, point: Vec2) -> f32 {
    (to - from).perp_dot(point - from)
}

/// Express `v` in the frame whose X axis is `basis` (assumed unit length).
#[inline]
pub fn get_local(basis: Vec2, v: Vec2) -> Vec2 {
    Vec2::new(basis.dot(v), basis.perp_dot(v))
}

/// Inverse of [`get_local`].
#[inline]
pub fn from_local(basis: Vec2, local: Vec2) -> Vec2 {
    basis * local.x + perp(basis) * local.y
}

/// Normalize, returning zero for vectors too short to carry a direction.
#[inline]
pub fn safe_normalize(v: Vec2) -> Vec2 {
    v.try_normalize().unwrap_or(Vec2::ZERO)
}

/// Angle of `v` in `[0, TAU)`.
#[inline]
pub fn angle_of(v: Vec2) -> f32 {
    v.y.atan2(v.x).rem_euclid(std::f32::consts::TAU)
}

/// Bisector of the counter-clockwise wedge going from `from` to `to`.
///
/// Handles reflex wedges (the bisector is flipped), straight wedges (the
/// bisector is the left perpendicular of `from`) and the full wedge left by a
/// single dangling edge (`from == to`, the bisector points backwards).
pub fn cone_mid_direction(from: DVec2, to: DVec2) -> DVec2 {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    let cross = from.perp_dot(to);
    let sum = from + to;

    if cross.abs() <= 1e-12 {
        if from.dot(to) > 0.0 {
            return -from;
        }
        return DVec2::new(-from.y, from.x);
    }

    let mid = sum.normalize_or_zero();
    if cross < 0.0 {
        -mid
    } else {
        mid
    }
}

/// A line segment between two points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Vec2,
    pub end: Vec2,
}

impl Segment {
    pub const fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    pub fn midpoint(&self) -> Vec2 {
        (self.start + self.end) * 0.5
    }

    pub fn direction(&self) -> Vec2 {
        self.end - self.start
    }

    pub fn length(&self) -> f32 {
        self.direction().length()
    }

    pub fn is_degenerate(&self, tolerance: f32) -> bool {
        self.direction().length_squared() <= tolerance * tolerance
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.end, self.start)
    }

    /// Distance from `point` to the closest point of the segment.
    /// Intersection with another segment, if they cross at a single point.
    pub fn intersection(&self, other: &Segment) -> Option<Vec2> {
        let r = self.direction();
        let s = other.direction();
        let denom = r.perp_dot(s);
        if denom.abs() <= f32::EPSILON {
            return None;
        }
        let qp = other.start - self.start;
        let t = qp.perp_dot(s) / denom;
        let u = qp.perp_dot(r) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            Some(self.start + r * t)
        } else {
            None
        }
    }
}

/// Axis-aligned box used for walkable cells and velocity-space bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavBox {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for NavBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl NavBox {
    /// Inverted box that any absorbed point turns into a valid one.
    pub const EMPTY: NavBox = NavBox {
        min: Vec2::splat(f32::MAX),
        max: Vec2::splat(f32::MIN),
    };

    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Box from its origin corner and size, like level data usually stores them.
    pub fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self::new(origin, origin + size)
    }

    pub fn from_center_half_size(center: Vec2, half_size: Vec2) -> Self {
        Self::new(center - half_size, center + half_size)
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn half_size(&self) -> Vec2 {
        self.size() * 0.5
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Finite with strictly positive extent on both axes.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.size().is_finite()
            && self.min.x < self.max.x
            && self.min.y < self.max.y
    }

    pub fn contains(&self, point: Vec2, tolerance: f32) -> bool {
        point.x >= self.min.x - tolerance
            && point.x <= self.max.x + tolerance
            && point.y >= self.min.y - tolerance
            && point.y <= self.max.y + tolerance
    }

    pub fn expanded(&self, amount: f32) -> Self {
        Self::new(self.min - Vec2::splat(amount), self.max + Vec2::splat(amount))
    }

    pub fn absorb(&mut self, point: Vec2) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn clamp_point(&self, point: Vec2) -> Vec2 {
        point.clamp(self.min, self.max)
    }

    /// Shared border between two boxes that touch along an edge.
    ///
    /// A vertical shared edge is looked for first (the boxes overlap on Y and
    /// one's left side meets the other's right side), then a horizontal one.
    /// Overlaps shorter than `tolerance` do not count, so boxes meeting at a
    /// single corner produce nothing. The returned segment runs from the low
    /// end of the overlap to the high end.
    pub fn touch(&self, other: &NavBox, tolerance: f32) -> Option<Segment> {
        if other.max.y - self.min.y >= tolerance && self.max.y - other.min.y >= tolerance {
            let low = self.min.y.max(other.min.y);
            let high = self.max.y.min(other.max.y);

            if (self.min.x - other.max.x).abs() <= tolerance {
                return Some(Segment::new(Vec2::new(self.min.x, low), Vec2::new(self.min.x, high)));
            }
            if (self.max.x - other.min.x).abs() <= tolerance {
                return Some(Segment::new(Vec2::new(self.max.x, low), Vec2::new(self.max.x, high)));
            }
        }

        if other.max.x - self.min.x >= tolerance && self.max.x - other.min.x >= tolerance {
            let low = self.min.x.max(other.min.x);
            let high = self.max.x.min(other.max.x);

            if (self.min.y - other.max.y).abs() <= tolerance {
                return Some(Segment::new(Vec2::new(low, self.min.y), Vec2::new(high, self.min.y)));
            }
            if (self.max.y - other.min.y).abs() <= tolerance {
                return Some(Segment::new(Vec2::new(low, self.max.y), Vec2::new(high, self.max.y)));
            }
        }

        None
    }

    /// Part of `segment` inside the box (Liang-Barsky clipping).
    pub fn clip_segment(&self, segment: &Segment) -> Option<Segment> {
        let dir = segment.direction();
        let mut t_enter = 0.0_f32;
        let mut t_exit = 1.0_f32;

        let checks = [
            (-dir.x, segment.start.x - self.min.x),
            (dir.x, self.max.x - segment.start.x),
            (-dir.y, segment.start.y - self.min.y),
            (dir.y, self.max.y - segment.start.y),
        ];

        for (p, q) in checks {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let t = q / p;
            if p < 0.0 {
                t_enter = t_enter.max(t);
            } else {
                t_exit = t_exit.min(t);
            }
            if t_enter > t_exit {
                return None;
            }
        }

        Some(Segment::new(
            segment.start + dir * t_enter,
            segment.start + dir * t_exit,
        ))
    }

    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f32, y: f32) -> NavBox {
        NavBox::from_origin_size(Vec2::new(x, y), Vec2::splat(10.0))
    }

    #[test]
    fn test_touch_vertical_edge() {
        let left = unit_box(0.0, 0.0);
        let right = unit_box(10.0, 0.0);

        let seg = left.touch(&right, ZERO_TOLERANCE).expect("boxes share x = 10");
        assert_eq!(seg.start, Vec2::new(10.0, 0.0));
        assert_eq!(seg.end, Vec2::new(10.0, 10.0));

        let seg = right.touch(&left, ZERO_TOLERANCE).expect("touch is symmetric");
        assert_eq!(seg.start, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_touch_partial_horizontal_edge() {
        let bottom = unit_box(0.0, 0.0);
        let top = NavBox::from_origin_size(Vec2::new(5.0, 10.0), Vec2::new(20.0, 5.0));

        let seg = bottom.touch(&top, ZERO_TOLERANCE).expect("boxes share y = 10");
        assert_eq!(seg, Segment::new(Vec2::new(5.0, 10.0), Vec2::new(10.0, 10.0)));
    }

    #[test]
    fn test_touch_corner_only_is_none() {
        let a = unit_box(0.0, 0.0);
        let b = unit_box(10.0, 10.0);
        assert!(a.touch(&b, ZERO_TOLERANCE).is_none());
    }

    #[test]
    fn test_touch_separated_is_none() {
        let a = unit_box(0.0, 0.0);
        let b = unit_box(11.0, 0.0);
        assert!(a.touch(&b, ZERO_TOLERANCE).is_none());
    }

    #[test]
    fn test_local_frame_round_trip() {
        let basis = Vec2::new(0.6, 0.8);
        let v = Vec2::new(-3.0, 7.5);
        let local = get_local(basis, v);
        let back = from_local(basis, local);
        assert!((back - v).length() < 1e-5);
        assert!((get_local(basis, basis) - Vec2::X).length() < 1e-6);
    }

    #[test]
    fn test_is_left_sign() {
        assert!(is_left(Vec2::ZERO, Vec2::X, Vec2::Y) > 0.0);
        assert!(is_left(Vec2::ZERO, Vec2::X, -Vec2::Y) < 0.0);
        assert_eq!(is_left(Vec2::ZERO, Vec2::X, Vec2::new(3.0, 0.0)), 0.0);
    }

    #[test]
    fn test_cone_mid_direction_cases() {
        let mid = cone_mid_direction(DVec2::X, DVec2::Y);
        assert!((mid - DVec2::new(1.0, 1.0).normalize()).length() < 1e-9);

        // Reflex wedge from +Y round to +X
        let mid = cone_mid_direction(DVec2::Y, DVec2::X);
        assert!((mid - DVec2::new(-1.0, -1.0).normalize()).length() < 1e-9);

        let mid = cone_mid_direction(DVec2::X, -DVec2::X);
        assert!((mid - DVec2::Y).length() < 1e-9);

        let mid = cone_mid_direction(DVec2::X, DVec2::X);
        assert!((mid + DVec2::X).length() < 1e-9);
    }

    #[test]
    fn test_clip_segment() {
        let b = NavBox::new(Vec2::splat(-1.0), Vec2::splat(1.0));
        let clipped = b
            .clip_segment(&Segment::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)))
            .expect("crosses the box");
        assert!((clipped.start - Vec2::new(-1.0, 0.0)).length() < 1e-6);
        assert!((clipped.end - Vec2::new(1.0, 0.0)).length() < 1e-6);

        assert!(b
            .clip_segment(&Segment::new(Vec2::new(2.0, 2.0), Vec2::new(5.0, 2.0)))
            .is_none());
    }
}
