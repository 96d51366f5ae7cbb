use bevy::math::{DVec2, IVec2};
use bevy::prelude::*;

use super::half_edge::HalfEdgeMesh;
use super::obstacle::Obstacle;
use super::scoring::BestVelocity;
use crate::navigation::intersector::{ArrangementEdge, IntSegment, IntersectError, Intersector};
use crate::navigation::math::{cone_mid_direction, NavBox, Segment};

/// Fraction of the way towards a free face's sample point a rejected
/// candidate is moved before it is tried again.
const CANDIDATE_PULL: f64 = 1e-3;

/// Scratch buffers of the exact solver, kept between solves.
#[derive(Default)]
pub(super) struct ExactScratch {
    intersector: Intersector,
    input: Vec<IntSegment>,
    arrangement: Vec<ArrangementEdge>,
    pub(super) mesh: HalfEdgeMesh,
    /// Per mesh face: no obstacle forbids its sample point.
    pub(super) free_faces: Vec<bool>,
    pub(super) outer_face: Option<u32>,
}

impl ExactScratch {
    pub fn clear(&mut self) {
        self.input.clear();
        self.arrangement.clear();
        self.mesh.clear();
        self.free_faces.clear();
        self.outer_face = None;
    }
}

/// Lattice the cone boundaries are snapped to before the sweep.
#[derive(Clone, Copy, Debug)]
pub(super) struct VelocityGrid {
    pub max_speed: f32,
    pub resolution: i32,
}

impl VelocityGrid {
    fn quantize(&self, point: Vec2) -> IVec2 {
        let scaled = (point / self.max_speed * self.resolution as f32).round();
        let limit = self.resolution as f32;
        IVec2::new(
            scaled.x.clamp(-limit, limit) as i32,
            scaled.y.clamp(-limit, limit) as i32,
        )
    }

    fn scale(&self) -> f64 {
        self.max_speed as f64 / self.resolution as f64
    }

    fn frame(&self) -> [IntSegment; 4] {
        let r = self.resolution;
        [
            IntSegment::new(IVec2::new(-r, -r), IVec2::new(-r, r)),
            IntSegment::new(IVec2::new(-r, r), IVec2::new(r, r)),
            IntSegment::new(IVec2::new(r, r), IVec2::new(r, -r)),
            IntSegment::new(IVec2::new(r, -r), IVec2::new(-r, -r)),
        ]
    }
}

/// Feed `best` with velocities on the border between free and blocked
/// regions of the obstacle arrangement.
///
/// Every bounded face of the arrangement is classified by one interior
/// sample. Edges of free faces that face a blocked one are candidate
/// carriers: their midpoint, their ends, where they cross the desired
/// direction and where they cross the max-speed circle.
pub(super) fn score_arrangement(
    scratch: &mut ExactScratch,
    obstacles: &[Obstacle],
    obstacles_box: &NavBox,
    grid: VelocityGrid,
    best: &mut BestVelocity,
) -> Result<(), IntersectError> {
    scratch.clear();

    for obstacle in obstacles {
        for segment in obstacle.segments.iter().flatten() {
            let start = grid.quantize(obstacles_box.clamp_point(segment.start));
            let end = grid.quantize(obstacles_box.clamp_point(segment.end));
            scratch.input.push(IntSegment::new(start, end));
        }
    }
    scratch.input.extend(grid.frame());

    scratch
        .intersector
        .intersect_segments(&scratch.input, &mut scratch.arrangement)?;

    let scale = grid.scale();
    for (_, piece) in &scratch.arrangement {
        scratch.mesh.insert_edge(piece.start, piece.end, scale);
    }
    scratch.mesh.link();
    scratch.mesh.trace_faces();

    let mesh = &scratch.mesh;
    let outer = mesh.outer_face();
    scratch.outer_face = outer;

    scratch.free_faces = (0..mesh.face_count())
        .map(|face| {
            if Some(face as u32) == outer {
                return false;
            }
            match face_sample(mesh, face) {
                Some(sample) => !obstacles.iter().any(|o| o.forbids(sample.as_vec2())),
                None => false,
            }
        })
        .collect();

    let max_speed = grid.max_speed as f64;
    let desired = Segment::new(Vec2::ZERO, Vec2::new(grid.max_speed, 0.0));
    let mut candidates = 0;

    let mut rejected = 0;

    for face in 0..mesh.face_count() {
        if !scratch.free_faces[face] {
            continue;
        }
        let Some(inside) = face_sample(mesh, face) else {
            continue;
        };

        // Snapping can push a border point into a cone, so every candidate
        // is checked again and pulled into the face if it landed inside one
        let mut offer = |point: DVec2| {
            let allowed = [point, point + (inside - point) * CANDIDATE_PULL]
                .into_iter()
                .map(|p| p.as_vec2())
                .find(|p| !obstacles.iter().any(|o| o.forbids(*p)));
            match allowed {
                Some(p) => best.offer_point(p, grid.max_speed),
                None => rejected += 1,
            }
        };

        for &edge in mesh.face_cycle(face) {
            let across = mesh.face_of[mesh.edges[edge as usize].sibling as usize];
            if Some(across) == outer || scratch.free_faces[across as usize] {
                continue;
            }

            let a = mesh.src_pos(edge);
            let b = mesh.dst_pos(edge);
            offer((a + b) * 0.5);
            offer(a);
            offer(b);
            if let Some(hit) = desired.intersection(&Segment::new(a.as_vec2(), b.as_vec2())) {
                offer(hit.as_dvec2());
            }
            for hit in circle_crossings(a, b, max_speed) {
                offer(hit);
            }
            candidates += 1;
        }
    }

    trace!(
        "[AVOIDANCE] Arrangement: {} input segments, {} faces, {} candidate edges, {} points rejected",
        scratch.input.len(),
        mesh.face_count(),
        candidates,
        rejected
    );
    Ok(())
}

/// A point inside `face`, next to the end of its first edge.
///
/// The point sits on the bisector of the face's corner there, half way to
/// the closest edge not touching the corner.
fn face_sample(mesh: &HalfEdgeMesh, face: usize) -> Option<DVec2> {
    let &first = mesh.face_cycle(face).first()?;
    let edge = mesh.edges[first as usize];
    let next = mesh.edges[edge.next as usize];

    let clearance = mesh.clearance(edge.dst);
    if !clearance.is_finite() || clearance <= f64::EPSILON {
        return None;
    }
    let bisector = cone_mid_direction(next.dir, -edge.dir);
    Some(mesh.vertices[edge.dst as usize] + bisector * clearance * 0.5)
}

/// Points of segment `a -b` at distance `radius` from the origin.
fn circle_crossings(a: DVec2, b: DVec2, radius: f64) -> impl Iterator<Item = DVec2> {
    let d = b - a;
    let qa = d.length_squared();
    let qb = a.dot(d);
    let qc = a.length_squared() - radius * radius;
    let discriminant = qb * qb - qa * qc;

    let roots = if qa <= f64::EPSILON || discriminant < 0.0 {
        [None, None]
    } else {
        let root = discriminant.sqrt();
        [Some((-qb - root) / qa), Some((-qb + root) / qa)]
    };
    roots
        .into_iter()
        .flatten()
        .filter(|t| (0.0..=1.0).contains(t))
        .map(move |t| a + d * t)
}
