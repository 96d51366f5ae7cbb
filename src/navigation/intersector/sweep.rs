use std::cmp::Ordering;
use std::collections::BTreeMap;

use bevy::prelude::*;
use kestrel_macros::profile;
use smallvec::SmallVec;

use super::{ArrangementEdge, IntSegment, IntersectError, SubSegment};
use crate::navigation::rational::{Rational, RationalPoint, MAX_COORDINATE};

type LatticePoint = (i64, i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventKind {
    Start,
    End,
    Intersection,
}

/// Everything happening at one sweep point. Events landing on the same
/// point are merged so the queue never holds duplicates.
#[derive(Debug, Default)]
struct Event {
    starts: SmallVec<[usize; 2]>,
    ends: SmallVec<[usize; 2]>,
    crossings: SmallVec<[usize; 4]>,
}

impl Event {
    fn push(&mut self, kind: EventKind, segment: usize) {
        fn push_unique<A: smallvec::Array<Item = usize>>(list: &mut SmallVec<A>, segment: usize) {
            if !list.contains(&segment) {
                list.push(segment);
            }
        }
        match kind {
            EventKind::Start => push_unique(&mut self.starts, segment),
            EventKind::End => push_unique(&mut self.ends, segment),
            EventKind::Intersection => push_unique(&mut self.crossings, segment),
        }
    }
}

/// How two segments meet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SegmentRelation {
    Disjoint,
    Crossing(RationalPoint),
    /// Collinear with an overlap of positive length.
    Confound,
}

/// An input segment with its endpoints in sweep order.
#[derive(Clone, Copy, Debug)]
struct OrderedSeg {
    start: LatticePoint,
    end: LatticePoint,
    /// Input ran from `end` to `start`.
    reversed: bool,
    /// `dy / dx`, `None` for vertical segments.
    slope: Option<Rational>,
}

impl OrderedSeg {
    fn from_input(segment: &IntSegment) -> Self {
        let a = (segment.start.x as i64, segment.start.y as i64);
        let b = (segment.end.x as i64, segment.end.y as i64);
        let (start, end, reversed) = if a <= b { (a, b, false) } else { (b, a, true) };

        let dx = end.0 - start.0;
        let dy = end.1 - start.1;
        let slope = (dx != 0).then(|| Rational::new(dy as i128, dx as i128));

        Self {
            start,
            end,
            reversed,
            slope,
        }
    }

    fn start_point(&self) -> RationalPoint {
        RationalPoint::from_int(self.start.0, self.start.1)
    }

    fn end_point(&self) -> RationalPoint {
        RationalPoint::from_int(self.end.0, self.end.1)
    }

    fn delta(&self) -> (i128, i128) {
        (
            (self.end.0 - self.start.0) as i128,
            (self.end.1 - self.start.1) as i128,
        )
    }

    /// Y of the supporting line at `x`. Only meaningful for non-vertical segments.
    fn y_at(&self, x: Rational) -> Rational {
        let (dx, dy) = self.delta();
        let (sx, sy) = (self.start.0 as i128, self.start.1 as i128);
        Rational::new(
            sy * dx * x.denom() + (x.numer() - sx * x.denom()) * dy,
            dx * x.denom(),
        )
    }

    /// Whether the segment lies strictly below `point` on the sweep line through it.
    fn is_below(&self, point: &RationalPoint) -> bool {
        match self.slope {
            Some(_) => self.y_at(point.x) < point.y,
            None => Rational::from_int(self.end.1) < point.y,
        }
    }

    fn contains(&self, point: &RationalPoint) -> bool {
        if *point < self.start_point() || *point > self.end_point() {
            return false;
        }
        let (dx, dy) = self.delta();
        let rel_x = point.x - Rational::from_int(self.start.0);
        let rel_y = point.y - Rational::from_int(self.start.1);
        rel_y * Rational::new(dx, 1) == rel_x * Rational::new(dy, 1)
    }

    /// Order of two segments leaving a common point, bottom to top just right of it.
    fn cmp_slope(&self, other: &OrderedSeg) -> Ordering {
        match (self.slope, other.slope) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    fn relation(&self, other: &OrderedSeg) -> SegmentRelation {
        let (rx, ry) = self.delta();
        let (sx, sy) = other.delta();
        let qpx = (other.start.0 - self.start.0) as i128;
        let qpy = (other.start.1 - self.start.1) as i128;

        let denom = rx * sy - ry * sx;
        if denom == 0 {
            if qpx * ry - qpy * rx != 0 {
                return SegmentRelation::Disjoint;
            }
            let overlaps = self.start.max(other.start) < self.end.min(other.end);
            return if overlaps {
                SegmentRelation::Confound
            } else {
                SegmentRelation::Disjoint
            };
        }

        let mut t = qpx * sy - qpy * sx;
        let mut u = qpx * ry - qpy * rx;
        let mut d = denom;
        if d < 0 {
            d = -d;
            t = -t;
            u = -u;
        }
        if t < 0 || t > d || u < 0 || u > d {
            return SegmentRelation::Disjoint;
        }

        let x = Rational::new(self.start.0 as i128 * d + rx * t, d);
        let y = Rational::new(self.start.1 as i128 * d + ry * t, d);
        SegmentRelation::Crossing(RationalPoint::new(x, y))
    }
}

/// A segment currently cut by the sweep line.
///
/// Collinear segments sharing a stretch are folded into one entry: the
/// segment ending first carries the stretch and the others ride along,
/// receiving copies of every piece until the carrier ends.
#[derive(Clone, Debug)]
pub struct ActiveSegment {
    segment: usize,
    last_point: RationalPoint,
    riders: SmallVec<[usize; 2]>,
}

impl ActiveSegment {
    /// Index of the input segment carried by this entry.
    pub fn origin(&self) -> usize {
        self.segment
    }

    /// Last arrangement vertex reported on this segment.
    pub fn last_point(&self) -> RationalPoint {
        self.last_point
    }

    /// Collinear input segments sharing this entry's current stretch.
    pub fn riders(&self) -> &[usize] {
        &self.riders
    }
}

/// Reusable sweep-line state.
///
/// Buffers are cleared at the start of every call, so one instance can serve
/// many queries. Not meant to be shared between threads.
#[derive(Default)]
pub struct Intersector {
    segments: Vec<OrderedSeg>,
    queue: BTreeMap<RationalPoint, Event>,
    active: Vec<ActiveSegment>,
    resume: Vec<usize>,
}

impl Intersector {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.segments.clear();
        self.queue.clear();
        self.active.clear();
        self.resume.clear();
    }

    /// Append the arrangement of `input` to `output`.
    pub fn intersect_segments(
        &mut self,
        input: &[IntSegment],
        output: &mut Vec<ArrangementEdge>,
    ) -> Result<(), IntersectError> {
        self.intersect_segments_filtered(input, output, |_, _, _, _| true)
    }

    /// Like [`Self::intersect_segments`], with a veto on reported pieces.
    ///
    /// The filter receives the sweep line, the slot of the entry being split,
    /// the input index the piece belongs to and the piece itself. Returning
    /// `false` drops the piece from the output without affecting the sweep.
    #[profile(2)]
    pub fn intersect_segments_filtered<F>(
        &mut self,
        input: &[IntSegment],
        output: &mut Vec<ArrangementEdge>,
        mut filter: F,
    ) -> Result<(), IntersectError>
    where
        F: FnMut(&[ActiveSegment], usize, usize, &SubSegment) -> bool,
    {
        self.reset();

        for (index, segment) in input.iter().enumerate() {
            if !segment.in_range() {
                return Err(IntersectError::CoordinateOutOfRange {
                    index,
                    limit: MAX_COORDINATE,
                });
            }
            let ordered = OrderedSeg::from_input(segment);
            if !segment.is_degenerate() {
                self.queue
                    .entry(ordered.start_point())
                    .or_default()
                    .push(EventKind::Start, index);
                self.queue
                    .entry(ordered.end_point())
                    .or_default()
                    .push(EventKind::End, index);
            }
            self.segments.push(ordered);
        }

        while let Some((point, event)) = self.queue.pop_first() {
            self.handle_event(point, event, output, &mut filter)?;
        }

        if !self.active.is_empty() {
            error!(
                "[INTERSECT] {} segments still on the sweep line after the last event",
                self.active.len()
            );
            self.active.clear();
        }

        Ok(())
    }

    fn handle_event<F>(
        &mut self,
        point: RationalPoint,
        event: Event,
        output: &mut Vec<ArrangementEdge>,
        filter: &mut F,
    ) -> Result<(), IntersectError>
    where
        F: FnMut(&[ActiveSegment], usize, usize, &SubSegment) -> bool,
    {
        let through = self.locate(&point)?;

        for &index in &event.ends {
            let present = through.is_some_and(|(lo, hi)| {
                self.active[lo..=hi]
                    .iter()
                    .any(|active| active.segment == index || active.riders.contains(&index))
            });
            if !present {
                return Err(IntersectError::MissingActiveSegment { index, point });
            }
        }

        if event.crossings.len() > 2 {
            trace!(
                "[INTERSECT] {} segments cross at {:?}",
                event.crossings.len(),
                point
            );
        }

        self.resume.clear();
        let position = match through {
            Some((lo, hi)) => {
                for slot in lo..=hi {
                    self.emit(slot, point, output, filter);
                }
                let removed: SmallVec<[ActiveSegment; 4]> = self.active.drain(lo..=hi).collect();
                for active in removed {
                    for index in std::iter::once(active.segment).chain(active.riders) {
                        if self.segments[index].end_point() != point {
                            self.resume.push(index);
                        }
                    }
                }
                lo
            }
            None => {
                let segments = &self.segments;
                self.active
                    .partition_point(|active| segments[active.segment].is_below(&point))
            }
        };

        for &index in &event.starts {
            if !self.resume.contains(&index) {
                self.resume.push(index);
            }
        }

        let block = self.confound_segments(point);
        let inserted = block.len();
        self.active.splice(position..position, block);

        if inserted == 0 {
            if position > 0 && position < self.active.len() {
                self.check_neighbours(position - 1, position, &point);
            }
        } else {
            if position > 0 {
                self.check_neighbours(position - 1, position, &point);
            }
            let last = position + inserted - 1;
            if last + 1 < self.active.len() {
                self.check_neighbours(last, last + 1, &point);
            }
        }

        Ok(())
    }

    /// Slots of the sweep line passing through `point`.
    ///
    /// Entries strictly below the point come first, so the run starts at the
    /// partition point and only the entries that contain the point are walked.
    fn locate(&self, point: &RationalPoint) -> Result<Option<(usize, usize)>, IntersectError> {
        let segments = &self.segments;
        let lo = self
            .active
            .partition_point(|active| segments[active.segment].is_below(point));

        let through = |slot: usize| {
            self.active
                .get(slot)
                .is_some_and(|active| segments[active.segment].contains(point))
        };

        let mut end = lo;
        while through(end) {
            end += 1;
        }

        // A run broken by a single foreign entry means the order is corrupt
        if through(end + 1) {
            return Err(IntersectError::NonContiguousSweepRange { point: *point });
        }

        Ok((end > lo).then(|| (lo, end - 1)))
    }

    /// Report the piece from the slot's last vertex up to `point`.
    fn emit<F>(
        &mut self,
        slot: usize,
        point: RationalPoint,
        output: &mut Vec<ArrangementEdge>,
        filter: &mut F,
    ) where
        F: FnMut(&[ActiveSegment], usize, usize, &SubSegment) -> bool,
    {
        let active = &self.active[slot];
        if active.last_point == point {
            return;
        }
        for index in std::iter::once(active.segment).chain(active.riders.iter().copied()) {
            let piece = if self.segments[index].reversed {
                SubSegment {
                    start: point,
                    end: active.last_point,
                }
            } else {
                SubSegment {
                    start: active.last_point,
                    end: point,
                }
            };
            if filter(&self.active, slot, index, &piece) {
                output.push((index, piece));
            }
        }
        self.active[slot].last_point = point;
    }

    /// Order the segments leaving `point` as they appear just right of it and
    /// fold collinear ones together.
    ///
    /// Within a collinear group the segment ending first becomes the carrier.
    /// Longer ones ride along and come back through `resume` as truncated
    /// starts at the carrier's end.
    fn confound_segments(&mut self, point: RationalPoint) -> SmallVec<[ActiveSegment; 4]> {
        let mut resume = std::mem::take(&mut self.resume);
        let segments = &self.segments;

        resume.sort_by(|&a, &b| {
            segments[a]
                .cmp_slope(&segments[b])
                .then_with(|| segments[a].end.cmp(&segments[b].end))
                .then(a.cmp(&b))
        });

        let mut block: SmallVec<[ActiveSegment; 4]> = SmallVec::new();
        for &index in &resume {
            if let Some(carrier) = block.last_mut() {
                if segments[carrier.segment].cmp_slope(&segments[index]) == Ordering::Equal {
                    carrier.riders.push(index);
                    continue;
                }
            }
            block.push(ActiveSegment {
                segment: index,
                last_point: point,
                riders: SmallVec::new(),
            });
        }

        if block.len() < resume.len() {
            trace!(
                "[INTERSECT] folded {} collinear segments at {:?}",
                resume.len() - block.len(),
                point
            );
        }

        resume.clear();
        self.resume = resume;
        block
    }

    fn check_neighbours(&mut self, lower: usize, upper: usize, point: &RationalPoint) {
        let lower_index = self.active[lower].segment;
        let upper_index = self.active[upper].segment;
        let relation = self.segments[lower_index].relation(&self.segments[upper_index]);

        match relation {
            SegmentRelation::Crossing(at) if at > *point => {
                let event = self.queue.entry(at).or_default();
                event.push(EventKind::Intersection, lower_index);
                event.push(EventKind::Intersection, upper_index);
            }
            SegmentRelation::Confound => {
                warn!(
                    "[INTERSECT] collinear neighbours {} and {} were not folded at {:?}",
                    lower_index, upper_index, point
                );
            }
            _ => {}
        }
    }
}
