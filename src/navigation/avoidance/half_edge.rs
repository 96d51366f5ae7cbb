use bevy::math::DVec2;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::navigation::rational::RationalPoint;

const NO_FACE: u32 = u32::MAX;

/// Directed half of an arrangement edge. Its face lies to the left.
#[derive(Clone, Copy, Debug)]
pub(super) struct HalfEdge {
    pub src: u32,
    pub dst: u32,
    pub sibling: u32,
    pub next: u32,
    /// Unit direction from `src` to `dst`.
    pub dir: DVec2,
}

/// Planar subdivision rebuilt from an arrangement on every solve.
///
/// Vertices are keyed by their exact position so pieces meeting at a
/// crossing share one vertex. Geometric duplicates (collinear inputs
/// reported once per input segment) are inserted once.
#[derive(Default)]
pub(super) struct HalfEdgeMesh {
    pub vertices: Vec<DVec2>,
    keys: Vec<RationalPoint>,
    lookup: FxHashMap<RationalPoint, u32>,
    outgoing: Vec<SmallVec<[u32; 4]>>,
    pub edges: Vec<HalfEdge>,
    inserted: FxHashSet<(u32, u32)>,
    /// Face of each half-edge, filled by [`Self::trace_faces`].
    pub face_of: Vec<u32>,
    /// Edge cycles of every face, sliced by `face_ranges`.
    pub face_edges: Vec<u32>,
    pub face_ranges: Vec<(u32, u32)>,
}

impl HalfEdgeMesh {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.keys.clear();
        self.lookup.clear();
        self.outgoing.clear();
        self.edges.clear();
        self.inserted.clear();
        self.face_of.clear();
        self.face_edges.clear();
        self.face_ranges.clear();
    }

    fn vertex(&mut self, point: RationalPoint, scale: f64) -> u32 {
        if let Some(&id) = self.lookup.get(&point) {
            return id;
        }
        let id = self.vertices.len() as u32;
        self.vertices.push(point.to_dvec2() * scale);
        self.keys.push(point);
        self.lookup.insert(point, id);
        self.outgoing.push(SmallVec::new());
        id
    }

    /// Insert the edge `a -b` as a sibling pair. Positions are scaled by
    /// `scale`. Returns `false` for degenerate or already present edges.
    pub fn insert_edge(&mut self, a: RationalPoint, b: RationalPoint, scale: f64) -> bool {
        if a == b {
            return false;
        }
        let src = self.vertex(a, scale);
        let dst = self.vertex(b, scale);
        if !self.inserted.insert((src.min(dst), src.max(dst))) {
            return false;
        }

        let dir = (self.vertices[dst as usize] - self.vertices[src as usize]).normalize_or_zero();
        let forward = self.edges.len() as u32;
        self.edges.push(HalfEdge {
            src,
            dst,
            sibling: forward + 1,
            next: forward + 1,
            dir,
        });
        self.edges.push(HalfEdge {
            src: dst,
            dst: src,
            sibling: forward,
            next: forward,
            dir: -dir,
        });
        self.outgoing[src as usize].push(forward);
        self.outgoing[dst as usize].push(forward + 1);
        true
    }

    /// Order each vertex's outgoing edges counter-clockwise and link every
    /// half-edge to the one following it around its face: the outgoing edge
    /// just clockwise of its sibling at its destination.
    pub fn link(&mut self) {
        let edges = &self.edges;
        for out in &mut self.outgoing {
            out.sort_by(|&a, &b| {
                let da = edges[a as usize].dir;
                let db = edges[b as usize].dir;
                da.y.atan2(da.x).total_cmp(&db.y.atan2(db.x))
            });
        }

        for vertex in 0..self.outgoing.len() {
            let out = &self.outgoing[vertex];
            let count = out.len();
            for (slot, &edge) in out.iter().enumerate() {
                let clockwise = out[(slot + count - 1) % count];
                let incoming = self.edges[edge as usize].sibling;
                self.edges[incoming as usize].next = clockwise;
            }
        }
    }

    /// Group half-edges into face cycles.
    pub fn trace_faces(&mut self) {
        self.face_of.clear();
        self.face_of.resize(self.edges.len(), NO_FACE);
        self.face_edges.clear();
        self.face_ranges.clear();

        for first in 0..self.edges.len() {
            if self.face_of[first] != NO_FACE {
                continue;
            }
            let face = self.face_ranges.len() as u32;
            let start = self.face_edges.len() as u32;
            let mut edge = first;
            let mut guard = self.edges.len();
            while self.face_of[edge] == NO_FACE && guard > 0 {
                self.face_of[edge] = face;
                self.face_edges.push(edge as u32);
                edge = self.edges[edge].next as usize;
                guard -= 1;
            }
            self.face_ranges.push((start, self.face_edges.len() as u32));
        }
    }

    pub fn face_count(&self) -> usize {
        self.face_ranges.len()
    }

    pub fn face_cycle(&self, face: usize) -> &[u32] {
        let (start, end) = self.face_ranges[face];
        &self.face_edges[start as usize..end as usize]
    }

    /// Face outside everything: left of the steepest edge leaving the
    /// lowest vertex, the wedge there opening towards -X.
    pub fn outer_face(&self) -> Option<u32> {
        let (lowest, _) = self.keys.iter().enumerate().min_by(|a, b| a.1.cmp(b.1))?;
        let edge = *self.outgoing[lowest].last()?;
        self.face_of.get(edge as usize).copied()
    }

    pub fn src_pos(&self, edge: u32) -> DVec2 {
        self.vertices[self.edges[edge as usize].src as usize]
    }

    pub fn dst_pos(&self, edge: u32) -> DVec2 {
        self.vertices[self.edges[edge as usize].dst as usize]
    }

    /// Distance from `vertex` to the closest edge not touching it.
    pub fn clearance(&self, vertex: u32) -> f64 {
        let point = self.vertices[vertex as usize];
        self.edges
            .iter()
            .step_by(2)
            .filter(|edge| edge.src != vertex && edge.dst != vertex)
            .map(|edge| {
                point_segment_distance(point, self.vertices[edge.src as usize], self.vertices[edge.dst as usize])
            })
            .fold(f64::INFINITY, f64::min)
    }
}

pub(super) fn point_segment_distance(point: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f64::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}
