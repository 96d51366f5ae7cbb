//! Velocity-obstacle steering for one agent at a time.
//!
//! Every neighbour (moving disc or static wall segment) forbids a cone of
//! velocities, expressed in a local frame whose +X axis is the agent's
//! desired direction. The solver looks for the allowed velocity of at most
//! `max_speed` that best follows the desired direction.
//!
//! A solve runs in three stages:
//! 1. Cheap answers: no obstacles, the desired velocity already allowed,
//!    or the whole max-speed disc inside a single cone.
//! 2. Candidate search, either on the exact arrangement of the cone
//!    boundaries ([`AvoidanceSolver::Exact`]) or over a fixed Poisson-disk
//!    sample set ([`AvoidanceSolver::Sampled`]).
//! 3. Fallback on the arcs of the max-speed circle no cone covers.

use bevy::prelude::*;
use kestrel_macros::profile;
use smallvec::SmallVec;

use super::config::{AvoidanceSettings, AvoidanceSolver};
use super::debug::{DebugDrawer, BLOCKED_COLOR, FREE_COLOR, VELOCITY_COLOR};
use super::math::{angle_of, from_local, get_local, is_left, perp, safe_normalize, NavBox, Segment};
use super::rational::MAX_COORDINATE;

mod arcs;
mod exact;
mod half_edge;
mod obstacle;
mod sampling;
mod scoring;
#[cfg(test)]
mod tests;

pub use arcs::{ArcSet, CircleArc};
pub use obstacle::Obstacle;
pub use sampling::SamplePattern;
pub use scoring::{BestVelocity, ScoredVelocity, CANONICAL_DIRS};

use exact::{score_arrangement, ExactScratch, VelocityGrid};

/// Per-agent velocity-obstacle solver.
///
/// Call [`start`](Self::start), register neighbours, then
/// [`find_best_velocity`](Self::find_best_velocity). Scratch buffers are kept
/// between agents, so one instance can serve a whole crowd in turn.
pub struct VelocityObstacle<'a> {
    samples: &'a SamplePattern,
    settings: AvoidanceSettings,

    actor: Option<Entity>,
    origin: Vec2,
    radius: f32,
    desired: Vec2,
    max_speed: f32,
    pure_avoidance: bool,
    velocity_box: NavBox,

    obstacles: Vec<Obstacle>,
    obstacles_box: NavBox,
    /// Arcs of the max-speed circle outside every cone.
    free_arcs: ArcSet,
    /// Same, for cones whose apex is the zero velocity.
    static_free: ArcSet,
    circle_cut: bool,
    whole_circle_cut: bool,

    exact: ExactScratch,
    last_velocity: Option<Vec2>,
}

impl<'a> VelocityObstacle<'a> {
    pub fn new(samples: &'a SamplePattern, settings: &AvoidanceSettings) -> Self {
        Self {
            samples,
            settings: settings.clone(),
            actor: None,
            origin: Vec2::ZERO,
            radius: 0.0,
            desired: Vec2::X,
            max_speed: 0.0,
            pure_avoidance: true,
            velocity_box: NavBox::EMPTY,
            obstacles: Vec::new(),
            obstacles_box: NavBox::EMPTY,
            free_arcs: ArcSet::full(),
            static_free: ArcSet::full(),
            circle_cut: false,
            whole_circle_cut: false,
            exact: ExactScratch::default(),
            last_velocity: None,
        }
    }

    /// Reset for a new agent.
    ///
    /// A zero `desired_dir` switches to pure avoidance: the agent only moves
    /// if standing still is forbidden, and then as fast as possible.
    pub fn start(&mut self, actor: Option<Entity>, origin: Vec2, radius: f32, desired_dir: Vec2, max_speed: f32) {
        let desired = safe_normalize(desired_dir);
        self.pure_avoidance = desired == Vec2::ZERO;
        self.desired = if self.pure_avoidance { Vec2::X } else { desired };

        self.actor = actor;
        self.origin = origin;
        self.radius = radius;
        self.max_speed = max_speed.max(0.0);
        self.velocity_box = NavBox::from_center_half_size(Vec2::ZERO, Vec2::splat(self.max_speed));

        self.obstacles.clear();
        self.obstacles_box = NavBox::EMPTY;
        self.free_arcs.reset();
        self.static_free.reset();
        self.circle_cut = false;
        self.whole_circle_cut = false;
        self.exact.clear();
        self.last_velocity = None;
    }

    pub fn actor(&self) -> Option<Entity> {
        self.actor
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Desired direction in world space, +X in pure avoidance.
    pub fn desired_dir(&self) -> Vec2 {
        self.desired
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    pub fn is_pure_avoidance(&self) -> bool {
        self.pure_avoidance
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Uncovered arcs of the max-speed circle, in the local frame.
    pub fn free_arcs(&self) -> SmallVec<[CircleArc; 4]> {
        self.free_arcs.arcs()
    }

    /// No point of the max-speed circle is reachable.
    pub fn is_circle_cut(&self) -> bool {
        self.circle_cut
    }

    /// No velocity other than zero is reachable.
    pub fn is_whole_circle_cut(&self) -> bool {
        self.whole_circle_cut
    }

    /// Register a cone in world space: `apex` is the velocity it is anchored
    /// at and `rays` its clockwise then counter-clockwise boundary.
    ///
    /// Cones whose rays point the same way enclose nothing and are skipped.
    pub fn add_obstacle(&mut self, apex: Vec2, rays: [Vec2; 2], distance: f32) {
        let local_apex = get_local(self.desired, apex);
        let local_rays = [get_local(self.desired, rays[0]), get_local(self.desired, rays[1])];
        let Some(obstacle) = Obstacle::new(local_apex, local_rays, distance, &self.velocity_box) else {
            trace!("[AVOIDANCE] Skipping degenerate cone for {:?}", self.actor);
            return;
        };

        let tolerance = self.settings.arc_tolerance;
        let is_static = obstacle.is_static(self.settings.tolerance);
        for arc in obstacle.blocked_arcs(self.max_speed) {
            if arc.is_full(tolerance) {
                self.whole_circle_cut = true;
            }
            self.free_arcs.subtract(&arc, tolerance);
            if is_static {
                self.static_free.subtract(&arc, tolerance);
            }
        }
        if is_static && self.static_free.is_empty() {
            self.whole_circle_cut = true;
        }
        self.circle_cut = self.free_arcs.is_empty();

        self.obstacles_box.absorb(obstacle.apex);
        for segment in obstacle.segments.iter().flatten() {
            self.obstacles_box.absorb(segment.start);
            self.obstacles_box.absorb(segment.end);
        }
        self.obstacles.push(obstacle);
    }

    /// A disc at `position` moving at `velocity`.
    pub fn add_point(&mut self, position: Vec2, radius: f32, velocity: Vec2) {
        let total_radius = radius + self.radius;
        if total_radius <= 0.0 {
            return;
        }
        let rel = position - self.origin;
        let distance = rel.length();
        if distance <= self.settings.tolerance {
            return;
        }

        let normal = rel / distance;
        let vertical = (total_radius / distance).min(1.0);
        let horizontal = (1.0 - vertical * vertical).max(0.0).sqrt();
        let rays = [
            normal * horizontal - perp(normal) * vertical,
            normal * horizontal + perp(normal) * vertical,
        ];
        self.add_obstacle(velocity, rays, (distance - total_radius).max(0.0));
    }

    /// A static wall, lengthened by `radius` at both ends.
    pub fn add_segment(&mut self, segment: Segment, radius: f32) {
        let (mut a, mut b) = (segment.start, segment.end);
        if is_left(self.origin, a, b) < 0.0 {
            std::mem::swap(&mut a, &mut b);
        }
        let along = safe_normalize(b - a);
        if along == Vec2::ZERO {
            self.add_point(a, radius, Vec2::ZERO);
            return;
        }

        let to_a = a - along * radius - self.origin;
        let to_b = b + along * radius - self.origin;
        let normal = perp(along);

        let straddles = is_left(Vec2::ZERO, normal, to_a) * is_left(Vec2::ZERO, normal, to_b) < 0.0;
        let distance = if straddles {
            to_a.dot(normal).abs()
        } else {
            to_a.length().min(to_b.length())
        };
        self.add_obstacle(Vec2::ZERO, [to_a, to_b], distance);
    }

    fn forbidden(&self, local_velocity: Vec2) -> bool {
        self.obstacles.iter().any(|o| o.forbids(local_velocity))
    }

    fn to_world(&self, chosen: ScoredVelocity) -> Vec2 {
        from_local(self.desired, chosen.velocity()) * self.max_speed
    }

    /// Best allowed velocity, in world space. `prev_dir` (world space) breaks
    /// ties between equally good candidates.
    #[profile]
    pub fn find_best_velocity(&mut self, prev_dir: Vec2) -> Vec2 {
        let velocity = self.solve(prev_dir);
        self.last_velocity = Some(velocity);
        velocity
    }

    fn solve(&mut self, prev_dir: Vec2) -> Vec2 {
        if self.max_speed <= self.settings.tolerance || self.whole_circle_cut {
            return Vec2::ZERO;
        }
        if self.obstacles.is_empty() {
            return if self.pure_avoidance {
                Vec2::ZERO
            } else {
                self.desired * self.max_speed
            };
        }
        if self.pure_avoidance {
            if !self.forbidden(Vec2::ZERO) {
                return Vec2::ZERO;
            }
        } else if !self.forbidden(Vec2::new(self.max_speed, 0.0)) {
            return self.desired * self.max_speed;
        }

        let dir_mult = if self.pure_avoidance {
            0.0
        } else {
            self.settings.direction_weight
        };
        let mut best = BestVelocity::new(
            dir_mult,
            self.settings.scored_axes,
            self.settings.tolerance,
            safe_normalize(get_local(self.desired, prev_dir)),
        );

        match self.settings.solver {
            AvoidanceSolver::Sampled => {
                for &sample in self.samples.points() {
                    let candidate = sample * self.max_speed;
                    if !self.forbidden(candidate) {
                        best.offer_point(candidate, self.max_speed);
                    }
                }
            }
            AvoidanceSolver::Exact => {
                let grid = VelocityGrid {
                    max_speed: self.max_speed,
                    resolution: self.settings.grid_resolution.clamp(1, MAX_COORDINATE as i32),
                };
                if let Err(e) = score_arrangement(&mut self.exact, &self.obstacles, &self.obstacles_box, grid, &mut best) {
                    warn!("[AVOIDANCE] Arrangement failed for {:?}, stopping: {}", self.actor, e);
                    return Vec2::ZERO;
                }
            }
        }

        let threshold = self.settings.acceptance_threshold;
        if let Some(chosen) = best.accepted(threshold) {
            return self.to_world(chosen);
        }

        if !self.circle_cut {
            // Free within tolerance is not free: every point on the circle is re-checked
            let mut angles: SmallVec<[f32; 12]> = SmallVec::new();
            if self.free_arcs.contains(0.0, self.settings.arc_tolerance) {
                angles.push(0.0);
            }
            for arc in self.free_arcs.arcs() {
                angles.extend([arc.start, arc.mid(), arc.end()]);
            }
            for angle in angles {
                let dir = CircleArc::direction_at(angle);
                if !self.forbidden(dir * self.max_speed) {
                    best.update(dir, 1.0);
                }
            }
            if let Some(chosen) = best.accepted(threshold) {
                return self.to_world(chosen);
            }
        }

        debug!(
            "[AVOIDANCE] No acceptable velocity for {:?} among {} obstacles",
            self.actor,
            self.obstacles.len()
        );
        Vec2::ZERO
    }

    /// Cone boundaries, uncovered arcs and the last chosen velocity, drawn
    /// around the agent in velocity units.
    pub fn draw_debug<D: DebugDrawer + ?Sized>(&self, drawer: &mut D) {
        let to_world = |local: Vec2| self.origin + from_local(self.desired, local);

        for obstacle in &self.obstacles {
            for segment in obstacle.segments.iter().flatten() {
                drawer.line(to_world(segment.start), to_world(segment.end), BLOCKED_COLOR);
            }
        }

        if !self.circle_cut {
            let base = angle_of(self.desired);
            for arc in self.free_arcs.arcs() {
                drawer.arc(self.origin, self.max_speed, base + arc.start, arc.sweep, FREE_COLOR);
            }
        }

        if let Some(velocity) = self.last_velocity {
            drawer.line(self.origin, self.origin + velocity, VELOCITY_COLOR);
        }
    }
}
