use std::f32::consts::TAU;

use bevy::prelude::*;
use smallvec::SmallVec;

/// A counter-clockwise stretch of the max-speed circle.
///
/// `start` is in `[0, TAU)`; `start + sweep` may run past `TAU`, in which
/// case the arc wraps through angle zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircleArc {
    pub start: f32,
    pub sweep: f32,
}

impl CircleArc {
    pub const FULL: CircleArc = CircleArc {
        start: 0.0,
        sweep: TAU,
    };

    pub fn new(start: f32, sweep: f32) -> Self {
        Self {
            start: start.rem_euclid(TAU),
            sweep: sweep.clamp(0.0, TAU),
        }
    }

    /// Arc running counter-clockwise from `from` to `to`.
    pub fn between(from: f32, to: f32) -> Self {
        Self::new(from, (to - from).rem_euclid(TAU))
    }

    pub fn end(&self) -> f32 {
        self.start + self.sweep
    }

    pub fn mid(&self) -> f32 {
        (self.start + self.sweep * 0.5).rem_euclid(TAU)
    }

    pub fn is_full(&self, tolerance: f32) -> bool {
        self.sweep >= TAU - tolerance
    }

    pub fn contains(&self, angle: f32, tolerance: f32) -> bool {
        let offset = (angle - self.start).rem_euclid(TAU);
        offset <= self.sweep + tolerance || offset >= TAU - tolerance
    }

    /// Unit vector at `angle`.
    pub fn direction_at(angle: f32) -> Vec2 {
        Vec2::from_angle(angle)
    }

    /// The arc as at most two intervals inside `[0, TAU]`.
    fn linear_pieces(&self) -> SmallVec<[(f32, f32); 2]> {
        let mut pieces = SmallVec::new();
        let end = self.end();
        if end <= TAU {
            pieces.push((self.start, end));
        } else {
            pieces.push((self.start, TAU));
            pieces.push((0.0, end - TAU));
        }
        pieces
    }
}

/// Union of disjoint arcs, stored as sorted intervals of `[0, TAU]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ArcSet {
    intervals: SmallVec<[(f32, f32); 4]>,
}

impl Default for ArcSet {
    fn default() -> Self {
        Self::full()
    }
}

impl ArcSet {
    pub fn full() -> Self {
        let mut intervals = SmallVec::new();
        intervals.push((0.0, TAU));
        Self { intervals }
    }

    pub fn reset(&mut self) {
        self.intervals.clear();
        self.intervals.push((0.0, TAU));
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Remove `arc`, dropping leftovers narrower than `tolerance`.
    pub fn subtract(&mut self, arc: &CircleArc, tolerance: f32) {
        for (low, high) in arc.linear_pieces() {
            let mut kept: SmallVec<[(f32, f32); 4]> = SmallVec::new();
            for &(start, end) in &self.intervals {
                if high <= start || low >= end {
                    kept.push((start, end));
                    continue;
                }
                if low - start > tolerance {
                    kept.push((start, low));
                }
                if end - high > tolerance {
                    kept.push((high, end));
                }
            }
            self.intervals = kept;
        }
    }

    pub fn contains(&self, angle: f32, tolerance: f32) -> bool {
        let angle = angle.rem_euclid(TAU);
        self.intervals.iter().any(|&(start, end)| {
            (angle >= start - tolerance && angle <= end + tolerance)
                || (end >= TAU - tolerance && angle <= tolerance)
                || (start <= tolerance && angle >= TAU - tolerance)
        })
    }

    /// The set as arcs, joining the pieces on both sides of angle zero.
    pub fn arcs(&self) -> SmallVec<[CircleArc; 4]> {
        let mut arcs: SmallVec<[CircleArc; 4]> = self
            .intervals
            .iter()
            .map(|&(start, end)| CircleArc::new(start, end - start))
            .collect();

        let wraps = arcs.len() > 1
            && self.intervals[0].0 <= 0.0
            && self.intervals[self.intervals.len() - 1].1 >= TAU;
        if wraps {
            let first = arcs.remove(0);
            if let Some(last) = arcs.last_mut() {
                last.sweep += first.sweep;
            }
        }
        arcs
    }
}
