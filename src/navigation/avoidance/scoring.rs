use bevy::prelude::*;

/// Directions candidates are scored against, in the local frame where +X is
/// the desired direction.
pub const CANONICAL_DIRS: [Vec2; 4] = [Vec2::X, Vec2::Y, Vec2::NEG_Y, Vec2::NEG_X];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredVelocity {
    /// Unit direction in the local frame.
    pub dir: Vec2,
    /// Speed as a fraction of the max speed.
    pub speed: f32,
    pub score: f32,
}

impl ScoredVelocity {
    const NONE: ScoredVelocity = ScoredVelocity {
        dir: Vec2::ZERO,
        speed: 0.0,
        score: f32::MIN,
    };

    pub fn velocity(&self) -> Vec2 {
        self.dir * self.speed.min(1.0)
    }
}

/// Running best candidate per canonical direction.
#[derive(Clone, Debug)]
pub struct BestVelocity {
    dir_mult: f32,
    active_axes: usize,
    tolerance: f32,
    prev_dir: Vec2,
    slots: [ScoredVelocity; 4],
}

impl BestVelocity {
    /// `active_axes` is clamped to `1..=4`. `prev_dir` (local frame) only
    /// breaks ties between equal scores.
    pub fn new(dir_mult: f32, active_axes: usize, tolerance: f32, prev_dir: Vec2) -> Self {
        Self {
            dir_mult,
            active_axes: active_axes.clamp(1, CANONICAL_DIRS.len()),
            tolerance,
            prev_dir,
            slots: [ScoredVelocity::NONE; 4],
        }
    }

    /// `f32::MIN` unless the speed is in `(0, 1]`, tolerance included.
    pub fn score(&self, axis: Vec2, dir: Vec2, speed: f32) -> f32 {
        if speed > self.tolerance && speed < 1.0 + self.tolerance {
            dir.dot(axis) * self.dir_mult + speed
        } else {
            f32::MIN
        }
    }

    pub fn update(&mut self, dir: Vec2, speed: f32) {
        for axis in 0..self.active_axes {
            let score = self.score(CANONICAL_DIRS[axis], dir, speed);
            let current = self.slots[axis];
            let better = score > current.score + self.tolerance
                || (score > current.score - self.tolerance
                    && score > f32::MIN
                    && dir.dot(self.prev_dir) > current.dir.dot(self.prev_dir));
            if better {
                self.slots[axis] = ScoredVelocity { dir, speed, score };
            }
        }
    }

    /// Offer a local-frame velocity measured in units where the max speed is `max_speed`.
    pub fn offer_point(&mut self, point: Vec2, max_speed: f32) {
        let length = point.length();
        if length <= f32::EPSILON || max_speed <= 0.0 {
            return;
        }
        self.update(point / length, length / max_speed);
    }

    /// Highest scoring candidate across the active axes.
    pub fn best(&self) -> Option<ScoredVelocity> {
        self.slots[..self.active_axes]
            .iter()
            .copied()
            .filter(|slot| slot.score > f32::MIN)
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }

    /// Best candidate if it scores above `threshold`.
    pub fn accepted(&self, threshold: f32) -> Option<ScoredVelocity> {
        self.best().filter(|best| best.score > threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_outside_unit_range_is_invalid() {
        let best = BestVelocity::new(0.5, 1, 1e-4, Vec2::X);
        assert_eq!(best.score(Vec2::X, Vec2::X, 0.0), f32::MIN);
        assert_eq!(best.score(Vec2::X, Vec2::X, 1.5), f32::MIN);
        assert!((best.score(Vec2::X, Vec2::X, 1.0) - 1.5).abs() < 1e-6);
        assert!((best.score(Vec2::X, Vec2::Y, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_keeps_highest_score() {
        let mut best = BestVelocity::new(0.5, 1, 1e-4, Vec2::X);
        best.update(Vec2::Y, 1.0);
        best.update(Vec2::new(0.6, 0.8), 0.9);
        best.update(Vec2::NEG_X, 1.0);

        let chosen = best.best().expect("valid candidates");
        assert_eq!(chosen.dir, Vec2::new(0.6, 0.8));
        assert!((chosen.score - 1.2).abs() < 1e-5);
    }

    #[test]
    fn test_previous_direction_breaks_ties() {
        let mut best = BestVelocity::new(0.5, 1, 1e-4, Vec2::NEG_Y);
        best.update(Vec2::Y, 1.0);
        best.update(Vec2::NEG_Y, 1.0);
        assert_eq!(best.best().map(|b| b.dir), Some(Vec2::NEG_Y));

        let mut best = BestVelocity::new(0.5, 1, 1e-4, Vec2::Y);
        best.update(Vec2::Y, 1.0);
        best.update(Vec2::NEG_Y, 1.0);
        assert_eq!(best.best().map(|b| b.dir), Some(Vec2::Y));
    }

    #[test]
    fn test_extra_axes_widen_the_choice() {
        let mut one_axis = BestVelocity::new(0.5, 1, 1e-4, Vec2::X);
        let mut four_axes = BestVelocity::new(0.5, 4, 1e-4, Vec2::X);
        for best in [&mut one_axis, &mut four_axes] {
            best.update(Vec2::NEG_X, 1.0);
        }
        // Straight back scores 0.5 on +X but 1.5 on -X
        assert!((one_axis.best().map(|b| b.score).unwrap_or_default() - 0.5).abs() < 1e-6);
        assert!((four_axes.best().map(|b| b.score).unwrap_or_default() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_rejects_backwards_crawl() {
        let mut best = BestVelocity::new(0.5, 1, 1e-4, Vec2::X);
        best.update(Vec2::NEG_X, 0.25);
        assert!(best.best().is_some());
        assert!(best.accepted(0.0).is_none());
        assert!(BestVelocity::new(0.5, 1, 1e-4, Vec2::X).best().is_none());
    }
}
