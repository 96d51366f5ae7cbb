//! Walkable-space graph built from axis-aligned boxes.
//!
//! Each input box becomes a [`Face`]. Boxes sharing a border segment are
//! joined by a [`Portal`]. Portals are the vertices of the search graph:
//! two portals are linked when they bound the same face, weighted by the
//! distance between their midpoints. Faces reachable from one another form
//! a [`NavComponent`], and queries never cross components.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use super::config::NavMeshSettings;
use super::debug::{DebugDrawer, FACE_COLOR, PORTAL_COLOR, WALL_COLOR};
use super::math::{NavBox, Segment};

mod box_index;
mod build;
mod pathfinding;
mod walls;

pub use pathfinding::{NavPath, PathStep, SearchControl};

pub(crate) use box_index::BoxIndex;

// ============================================================================
// Identifiers
// ============================================================================

/// Index of a face inside its component.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub u32);

/// Index of a portal inside its component.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortalId(pub u32);

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u32);

impl FaceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl PortalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ComponentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Side of a face box.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Left = 0,
    Bottom = 1,
    Right = 2,
    Top = 3,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Left, Side::Bottom, Side::Right, Side::Top];

    pub fn as_index(self) -> usize {
        self as usize
    }

    /// Axis the side's normal runs along: 0 for X, 1 for Y.
    pub fn axis(self) -> usize {
        self.as_index() % 2
    }

    pub fn outward(self) -> Vec2 {
        match self {
            Side::Left => Vec2::NEG_X,
            Side::Bottom => Vec2::NEG_Y,
            Side::Right => Vec2::X,
            Side::Top => Vec2::Y,
        }
    }

    /// Counter-clockwise direction along the side, seen from inside the face.
    ///
    /// Walls are stored with this orientation and wall-following agents
    /// slide this way.
    pub fn treadmill_dir(self) -> Vec2 {
        match self {
            Side::Left => Vec2::NEG_Y,
            Side::Bottom => Vec2::X,
            Side::Right => Vec2::Y,
            Side::Top => Vec2::NEG_X,
        }
    }

    /// Side of `bounds` on which an axis-aligned `segment` lies.
    pub fn of_segment(bounds: &NavBox, segment: &Segment, tolerance: f32) -> Option<Side> {
        let vertical = (segment.start.x - segment.end.x).abs() <= tolerance;
        let horizontal = (segment.start.y - segment.end.y).abs() <= tolerance;

        if vertical && !horizontal {
            if (segment.start.x - bounds.min.x).abs() <= tolerance {
                return Some(Side::Left);
            }
            if (segment.start.x - bounds.max.x).abs() <= tolerance {
                return Some(Side::Right);
            }
        } else if horizontal && !vertical {
            if (segment.start.y - bounds.min.y).abs() <= tolerance {
                return Some(Side::Bottom);
            }
            if (segment.start.y - bounds.max.y).abs() <= tolerance {
                return Some(Side::Top);
            }
        }
        None
    }
}

// ============================================================================
// Mesh data
// ============================================================================

/// A walkable box.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Face {
    pub bounds: NavBox,
    /// Portals on the border of this face.
    pub portals: SmallVec<[PortalId; 4]>,
    /// Border stretches not covered by any portal, counter-clockwise.
    pub walls: SmallVec<[Segment; 4]>,
    /// Per [`Side`]: at least one portal opens on that side.
    pub has_side: [bool; 4],
    /// Per [`Side`]: at least one wall remains on that side.
    pub walled: [bool; 4],
    /// Index of the box this face was built from.
    pub source_index: usize,
}

impl Face {
    pub fn center(&self) -> Vec2 {
        self.bounds.center()
    }

    /// Slide direction for wall-following steering at `point`.
    ///
    /// The box is split by its diagonals into four triangles. The triangle
    /// holding the point picks a side; if that side has a wall, the slide
    /// runs along it. Otherwise the adjacent side on the point's half is
    /// tried, and finally the perpendicular of the offset from the center.
    pub fn treadmill_dir(&self, point: Vec2) -> Vec2 {
        use super::math::{is_left, perp, safe_normalize};

        let rel = point - self.bounds.center();
        let half = self.bounds.half_size();
        let other_corner = Vec2::new(half.x, -half.y);

        let above_main = is_left(-half, half, rel) > 0.0;
        let above_anti = is_left(-other_corner, other_corner, rel) > 0.0;
        let quadrant = match (above_main, above_anti) {
            (true, true) => Side::Top,
            (true, false) => Side::Left,
            (false, true) => Side::Right,
            (false, false) => Side::Bottom,
        };

        if self.walled[quadrant.as_index()] {
            return quadrant.treadmill_dir();
        }

        let fallback = match quadrant.axis() {
            0 if rel.y > 0.0 => Side::Top,
            0 => Side::Bottom,
            _ if rel.x > 0.0 => Side::Right,
            _ => Side::Left,
        };
        if self.walled[fallback.as_index()] {
            return fallback.treadmill_dir();
        }

        safe_normalize(perp(rel))
    }
}

/// Link from one portal to another across a shared face.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PortalLink {
    pub target: PortalId,
    pub weight: f32,
}

/// Border segment shared by two faces.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Portal {
    /// The two faces, lower source box index first.
    pub faces: [FaceId; 2],
    pub segment: Segment,
    links_start: u32,
    links_end: u32,
}

impl Portal {
    pub fn midpoint(&self) -> Vec2 {
        self.segment.midpoint()
    }

    pub fn touches(&self, face: FaceId) -> bool {
        self.faces[0] == face || self.faces[1] == face
    }

    /// The face across the portal from `face`.
    pub fn other_face(&self, face: FaceId) -> Option<FaceId> {
        if self.faces[0] == face {
            Some(self.faces[1])
        } else if self.faces[1] == face {
            Some(self.faces[0])
        } else {
            None
        }
    }

    /// Face shared with `other`, first face of `self` preferred.
    pub fn common_face(&self, other: &Portal) -> Option<FaceId> {
        if other.touches(self.faces[0]) {
            Some(self.faces[0])
        } else if other.touches(self.faces[1]) {
            Some(self.faces[1])
        } else {
            None
        }
    }
}

/// A connected island of faces and portals.
#[derive(Clone, Debug)]
pub struct NavComponent {
    pub(crate) faces: Vec<Face>,
    pub(crate) portals: Vec<Portal>,
    /// Portal adjacency, sliced per portal by `links_start..links_end`.
    pub(crate) links: Vec<PortalLink>,
    pub(crate) face_index: BoxIndex,
}

impl NavComponent {
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn portals(&self) -> &[Portal] {
        &self.portals
    }

    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id.index())
    }

    pub fn portal(&self, id: PortalId) -> Option<&Portal> {
        self.portals.get(id.index())
    }

    pub fn links(&self, id: PortalId) -> &[PortalLink] {
        match self.portals.get(id.index()) {
            Some(portal) => &self.links[portal.links_start as usize..portal.links_end as usize],
            None => &[],
        }
    }

    /// Face containing `point`, if any.
    pub fn face_at(&self, point: Vec2) -> Option<FaceId> {
        self.face_index
            .query_point(point)
            .find(|&index| self.faces[index].bounds.contains(point, 0.0))
            .map(|index| FaceId(index as u32))
    }

    pub fn stats(&self) -> ComponentStats {
        ComponentStats {
            faces: self.faces.len(),
            portals: self.portals.len(),
            walls: self.faces.iter().map(|face| face.walls.len()).sum(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ComponentStats {
    pub faces: usize,
    pub portals: usize,
    pub walls: usize,
}

/// Where a point landed in the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FoundFace {
    pub component: ComponentId,
    pub face: FaceId,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NavMeshError {
    #[error("no walkable boxes to build from")]
    EmptyInput,
    #[error("box {index} is degenerate or not finite: {bounds:?}")]
    InvalidBox { index: usize, bounds: NavBox },
}

/// The navigation mesh: a forest of components. Immutable once built.
#[derive(Resource, Clone, Debug, Default)]
pub struct NavMesh {
    pub(crate) components: Vec<NavComponent>,
    pub(crate) settings: NavMeshSettings,
}

impl NavMesh {
    pub fn components(&self) -> &[NavComponent] {
        &self.components
    }

    pub fn component(&self, id: ComponentId) -> Option<&NavComponent> {
        self.components.get(id.index())
    }

    pub fn settings(&self) -> &NavMeshSettings {
        &self.settings
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn face(&self, found: FoundFace) -> Option<&Face> {
        self.component(found.component)?.face(found.face)
    }

    pub fn stats(&self) -> Vec<ComponentStats> {
        self.components.iter().map(NavComponent::stats).collect()
    }

    /// Face containing `point`, searching components in order.
    pub fn find_face(&self, point: Vec2) -> Option<FoundFace> {
        self.components
            .iter()
            .enumerate()
            .find_map(|(index, component)| {
                component.face_at(point).map(|face| FoundFace {
                    component: ComponentId(index as u32),
                    face,
                })
            })
    }

    /// Wall-following slide direction at `point`, see [`Face::treadmill_dir`].
    pub fn get_treadmill_dir(&self, point: Vec2) -> Option<Vec2> {
        let found = self.find_face(point)?;
        Some(self.face(found)?.treadmill_dir(point))
    }

    /// Face boxes, walls and portals.
    pub fn draw_debug<D: DebugDrawer + ?Sized>(&self, drawer: &mut D) {
        for component in &self.components {
            for face in &component.faces {
                drawer.rect(&face.bounds, FACE_COLOR);
                for wall in &face.walls {
                    drawer.line(wall.start, wall.end, WALL_COLOR);
                }
            }
            for portal in &component.portals {
                drawer.line(portal.segment.start, portal.segment.end, PORTAL_COLOR);
            }
        }
    }
}
