use bevy::prelude::*;
use smallvec::SmallVec;

use super::{Face, Portal, Side};
use crate::navigation::math::{NavBox, Segment};

/// Fill in `walls`, `has_side` and `walled` for one face.
///
/// Each side is treated as a 1D interval. The stretches covered by the
/// face's portals on that side are subtracted from it, and what remains
/// becomes walls, oriented counter-clockwise around the face.
pub(super) fn compute_walls(face: &mut Face, portals: &[Portal], tolerance: f32) {
    face.walls.clear();
    face.has_side = [false; 4];
    face.walled = [false; 4];

    let bounds = face.bounds;
    let mut openings: SmallVec<[(f32, f32); 4]> = SmallVec::new();

    for side in Side::ALL {
        // Interval along the side, measured on the axis the side runs along
        let along = 1 - side.axis();
        let span = (bounds.min[along], bounds.max[along]);

        openings.clear();
        for portal_id in &face.portals {
            let Some(portal) = portals.get(portal_id.index()) else {
                continue;
            };
            if Side::of_segment(&bounds, &portal.segment, tolerance) != Some(side) {
                continue;
            }
            let a = portal.segment.start[along];
            let b = portal.segment.end[along];
            openings.push((a.min(b), a.max(b)));
        }

        face.has_side[side.as_index()] = !openings.is_empty();

        for (low, high) in subtract_intervals(span, &mut openings, tolerance) {
            let wall = side_segment(&bounds, side, low, high);
            face.walls.push(wall);
            face.walled[side.as_index()] = true;
        }
    }
}

/// Parts of `span` not covered by `cuts`, shorter pieces than `tolerance` dropped.
fn subtract_intervals(
    span: (f32, f32),
    cuts: &mut [(f32, f32)],
    tolerance: f32,
) -> SmallVec<[(f32, f32); 4]> {
    cuts.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut remaining = SmallVec::new();
    let mut cursor = span.0;
    for &(low, high) in cuts.iter() {
        if low - cursor > tolerance {
            remaining.push((cursor, low.min(span.1)));
        }
        cursor = cursor.max(high);
        if cursor >= span.1 {
            break;
        }
    }
    if span.1 - cursor > tolerance {
        remaining.push((cursor, span.1));
    }
    remaining
}

fn side_segment(bounds: &NavBox, side: Side, low: f32, high: f32) -> Segment {
    let (a, b) = match side {
        Side::Left => (Vec2::new(bounds.min.x, low), Vec2::new(bounds.min.x, high)),
        Side::Right => (Vec2::new(bounds.max.x, low), Vec2::new(bounds.max.x, high)),
        Side::Bottom => (Vec2::new(low, bounds.min.y), Vec2::new(high, bounds.min.y)),
        Side::Top => (Vec2::new(low, bounds.max.y), Vec2::new(high, bounds.max.y)),
    };
    let segment = Segment::new(a, b);
    if segment.direction().dot(side.treadmill_dir()) < 0.0 {
        segment.reversed()
    } else {
        segment
    }
}
