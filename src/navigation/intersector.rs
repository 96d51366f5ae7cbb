//! Exact planar arrangement of integer segments.
//!
//! A Bentley-Ottmann sweep moves a vertical line left to right over the
//! input. Events (segment starts, ends and crossings) are ordered by `(x, y)`
//! with exact [`Rational`] coordinates, and the segments currently cut by the
//! sweep line are kept sorted by their Y at the sweep X. Only neighbours in
//! that order are ever tested for crossings.
//!
//! The output lists, for every input segment, the pieces it is split into by
//! every crossing, every endpoint lying on it and every overlap boundary with
//! a collinear segment. Pieces keep the orientation of their input segment.

use bevy::math::IVec2;
use thiserror::Error;

use super::rational::{RationalPoint, MAX_COORDINATE};

mod sweep;
#[cfg(test)]
mod tests;

pub use sweep::{ActiveSegment, Intersector};

/// An input segment on the integer lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntSegment {
    pub start: IVec2,
    pub end: IVec2,
}

impl IntSegment {
    pub const fn new(start: IVec2, end: IVec2) -> Self {
        Self { start, end }
    }

    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }

    pub(crate) fn in_range(&self) -> bool {
        let fits = |v: i32| (v as i64).abs() <= MAX_COORDINATE;
        fits(self.start.x) && fits(self.start.y) && fits(self.end.x) && fits(self.end.y)
    }
}

/// A piece of an input segment between two consecutive arrangement vertices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubSegment {
    pub start: RationalPoint,
    pub end: RationalPoint,
}

/// Piece of the arrangement tagged with the index of the input segment it came from.
pub type ArrangementEdge = (usize, SubSegment);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntersectError {
    #[error("segment {index} has a coordinate outside +/-{limit}")]
    CoordinateOutOfRange { index: usize, limit: i64 },
    #[error("segment {index} ends at {point:?} but is not on the sweep line")]
    MissingActiveSegment { index: usize, point: RationalPoint },
    #[error("segments through {point:?} are not adjacent on the sweep line")]
    NonContiguousSweepRange { point: RationalPoint },
}

/// Split `segments` into their exact arrangement.
///
/// Convenience wrapper around a throwaway [`Intersector`]; systems calling this
/// every frame should keep an `Intersector` around to reuse its buffers.
pub fn intersect_segments(segments: &[IntSegment]) -> Result<Vec<ArrangementEdge>, IntersectError> {
    let mut intersector = Intersector::default();
    let mut output = Vec::new();
    intersector.intersect_segments(segments, &mut output)?;
    Ok(output)
}
