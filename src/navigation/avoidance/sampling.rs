use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::navigation::config::AvoidanceSettings;

/// Candidate velocities for the sampled solver: a Poisson-disk point set
/// strictly inside the unit disk.
///
/// Built once by its owner and lent to every solver instance; the
/// [`AvoidanceSamples`](crate::navigation::AvoidanceSamples) resource is the
/// usual owner.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SamplePattern {
    points: Vec<Vec2>,
    spacing: f32,
}

impl SamplePattern {
    pub fn from_settings(settings: &AvoidanceSettings) -> Self {
        Self::poisson_disk(settings.sample_spacing, settings.sample_attempts, settings.sample_seed)
    }

    /// Bridson sampling: keep an active list, and around each active point
    /// try `attempts` candidates in the `[spacing, 2 * spacing]` annulus.
    /// A point retires once all its attempts fail.
    pub fn poisson_disk(spacing: f32, attempts: u32, seed: u64) -> Self {
        if spacing.is_nan() || spacing <= 0.0 || attempts == 0 {
            warn!(
                "[AVOIDANCE] Empty sample pattern (spacing {}, attempts {})",
                spacing, attempts
            );
            return Self {
                points: Vec::new(),
                spacing,
            };
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let cell_size = spacing / std::f32::consts::SQRT_2;
        let cells_per_side = (2.0 / cell_size).ceil() as usize + 1;
        let mut grid: Vec<Option<u32>> = vec![None; cells_per_side * cells_per_side];
        let cell_of = |p: Vec2| {
            let x = ((p.x + 1.0) / cell_size) as usize;
            let y = ((p.y + 1.0) / cell_size) as usize;
            (x.min(cells_per_side - 1), y.min(cells_per_side - 1))
        };

        let mut points: Vec<Vec2> = Vec::new();
        let mut active: Vec<usize> = Vec::new();

        let first = loop {
            let p = Vec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0));
            if p.length_squared() < 1.0 {
                break p;
            }
        };
        let (cx, cy) = cell_of(first);
        grid[cy * cells_per_side + cx] = Some(0);
        points.push(first);
        active.push(0);

        while !active.is_empty() {
            let slot = rng.random_range(0..active.len());
            let center = points[active[slot]];
            let mut placed = false;

            for _ in 0..attempts {
                let angle = rng.random_range(0.0..std::f32::consts::TAU);
                let distance = rng.random_range(spacing..2.0 * spacing);
                let candidate = center + Vec2::from_angle(angle) * distance;
                if candidate.length_squared() >= 1.0 {
                    continue;
                }

                let (cx, cy) = cell_of(candidate);
                let too_close = (cy.saturating_sub(2)..=(cy + 2).min(cells_per_side - 1)).any(|y| {
                    (cx.saturating_sub(2)..=(cx + 2).min(cells_per_side - 1)).any(|x| {
                        grid[y * cells_per_side + x]
                            .is_some_and(|other| points[other as usize].distance_squared(candidate) < spacing * spacing)
                    })
                });
                if too_close {
                    continue;
                }

                grid[cy * cells_per_side + cx] = Some(points.len() as u32);
                active.push(points.len());
                points.push(candidate);
                placed = true;
                break;
            }

            if !placed {
                active.swap_remove(slot);
            }
        }

        debug!(
            "[AVOIDANCE] Poisson sample pattern: {} points at spacing {}",
            points.len(),
            spacing
        );
        Self { points, spacing }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
