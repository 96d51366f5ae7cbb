use std::f32::consts::TAU;

use bevy::prelude::*;

use super::math::NavBox;

/// Height at which 2D debug shapes are lifted above the ground plane.
pub const DEBUG_DRAW_HEIGHT: f32 = 1.0;

pub const WALL_COLOR: Color = Color::srgb(1.0, 0.2, 0.2);
pub const PORTAL_COLOR: Color = Color::srgb(0.2, 0.6, 1.0);
pub const FACE_COLOR: Color = Color::srgba(0.6, 0.6, 0.6, 0.5);
pub const PATH_COLOR: Color = Color::srgb(0.0, 1.0, 0.0);
pub const FREE_COLOR: Color = Color::srgb(0.0, 1.0, 0.0);
pub const BLOCKED_COLOR: Color = Color::srgb(1.0, 0.0, 0.0);
pub const VELOCITY_COLOR: Color = Color::srgb(0.0, 0.0, 1.0);

/// Sink for debug geometry. Drawing never affects navigation results.
pub trait DebugDrawer {
    fn line(&mut self, start: Vec2, end: Vec2, color: Color);

    fn rect(&mut self, bounds: &NavBox, color: Color) {
        let corners = bounds.corners();
        for i in 0..4 {
            self.line(corners[i], corners[(i + 1) % 4], color);
        }
    }

    /// Counter-clockwise arc of `sweep` radians starting at `start_angle`.
    fn arc(&mut self, center: Vec2, radius: f32, start_angle: f32, sweep: f32, color: Color) {
        let steps = ((sweep / TAU * 48.0).ceil() as usize).max(2);
        let mut previous = center + Vec2::from_angle(start_angle) * radius;
        for step in 1..=steps {
            let angle = start_angle + sweep * step as f32 / steps as f32;
            let point = center + Vec2::from_angle(angle) * radius;
            self.line(previous, point, color);
            previous = point;
        }
    }
}

/// Draws on the XZ ground plane, 2D `y` mapping to world `z`.
impl DebugDrawer for Gizmos<'_, '_> {
    fn line(&mut self, start: Vec2, end: Vec2, color: Color) {
        (**self).line(
            Vec3::new(start.x, DEBUG_DRAW_HEIGHT, start.y),
            Vec3::new(end.x, DEBUG_DRAW_HEIGHT, end.y),
            color,
        );
    }
}

/// Collects lines for inspection instead of drawing them.
#[derive(Clone, Debug, Default)]
pub struct RecordingDrawer {
    pub lines: Vec<(Vec2, Vec2, Color)>,
}

impl RecordingDrawer {
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn count_with(&self, color: Color) -> usize {
        self.lines.iter().filter(|(_, _, c)| *c == color).count()
    }
}

impl DebugDrawer for RecordingDrawer {
    fn line(&mut self, start: Vec2, end: Vec2, color: Color) {
        self.lines.push((start, end, color));
    }
}
