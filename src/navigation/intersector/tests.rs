use super::*;
use crate::navigation::rational::{Rational, RationalPoint};
use bevy::math::IVec2;

fn seg(x1: i32, y1: i32, x2: i32, y2: i32) -> IntSegment {
    IntSegment::new(IVec2::new(x1, y1), IVec2::new(x2, y2))
}

fn pt(x: i64, y: i64) -> RationalPoint {
    RationalPoint::from_int(x, y)
}

fn pieces_of(edges: &[ArrangementEdge], origin: usize) -> Vec<SubSegment> {
    let mut pieces: Vec<SubSegment> = edges
        .iter()
        .filter(|(index, _)| *index == origin)
        .map(|(_, piece)| *piece)
        .collect();
    pieces.sort_by(|a, b| a.start.min(a.end).cmp(&b.start.min(b.end)));
    pieces
}

fn cross(ax: Rational, ay: Rational, bx: Rational, by: Rational) -> Rational {
    ax * by - ay * bx
}

fn on_segment(input: &IntSegment, p: &RationalPoint) -> bool {
    let sx = Rational::from_int(input.start.x as i64);
    let sy = Rational::from_int(input.start.y as i64);
    let dx = Rational::from_int((input.end.x - input.start.x) as i64);
    let dy = Rational::from_int((input.end.y - input.start.y) as i64);
    if cross(dx, dy, p.x - sx, p.y - sy) != Rational::ZERO {
        return false;
    }
    let a = pt(input.start.x as i64, input.start.y as i64);
    let b = pt(input.end.x as i64, input.end.y as i64);
    *p >= a.min(b) && *p <= a.max(b)
}

/// Pieces of one input segment must chain from one end to the other,
/// following the input orientation.
fn assert_reconstructs(input: &IntSegment, origin: usize, edges: &[ArrangementEdge]) {
    let mut pieces: Vec<SubSegment> = edges
        .iter()
        .filter(|(index, _)| *index == origin)
        .map(|(_, piece)| *piece)
        .collect();

    if input.is_degenerate() {
        assert!(pieces.is_empty(), "degenerate segment {origin} produced pieces");
        return;
    }

    let start = pt(input.start.x as i64, input.start.y as i64);
    let end = pt(input.end.x as i64, input.end.y as i64);
    let ascending = start < end;
    pieces.sort_by(|a, b| if ascending { a.start.cmp(&b.start) } else { b.start.cmp(&a.start) });

    assert!(!pieces.is_empty(), "segment {origin} {input:?} lost");
    let mut cursor = start;
    for piece in &pieces {
        assert_eq!(piece.start, cursor, "gap or overlap on segment {origin} {input:?}: {pieces:?}");
        assert_ne!(piece.start, piece.end, "empty piece on segment {origin}");
        assert!(on_segment(input, &piece.start) && on_segment(input, &piece.end));
        cursor = piece.end;
    }
    assert_eq!(cursor, end, "segment {origin} {input:?} not fully covered: {pieces:?}");
}

/// No two pieces may cross or touch away from their shared endpoints.
fn assert_planar(edges: &[ArrangementEdge]) {
    let zero = Rational::ZERO;
    for (i, (_, a)) in edges.iter().enumerate() {
        for (_, b) in edges.iter().skip(i + 1) {
            let rx = a.end.x - a.start.x;
            let ry = a.end.y - a.start.y;
            let sx = b.end.x - b.start.x;
            let sy = b.end.y - b.start.y;
            let mut denom = cross(rx, ry, sx, sy);
            if denom == zero {
                continue;
            }
            let qx = b.start.x - a.start.x;
            let qy = b.start.y - a.start.y;
            let mut t = cross(qx, qy, sx, sy);
            let mut u = cross(qx, qy, rx, ry);
            if denom < zero {
                denom = -denom;
                t = -t;
                u = -u;
            }
            let t_inside = t > zero && t < denom;
            let u_inside = u > zero && u < denom;
            let t_closed = t >= zero && t <= denom;
            let u_closed = u >= zero && u <= denom;
            assert!(
                !((t_inside && u_closed) || (u_inside && t_closed)),
                "pieces {a:?} and {b:?} meet away from their endpoints"
            );
        }
    }
}

#[test]
fn test_two_crossing_segments() {
    let input = [seg(0, 0, 10, 10), seg(0, 10, 10, 0)];
    let edges = intersect_segments(&input).expect("sweep succeeds");

    assert_eq!(edges.len(), 4);
    let first = pieces_of(&edges, 0);
    assert_eq!(first[0], SubSegment { start: pt(0, 0), end: pt(5, 5) });
    assert_eq!(first[1], SubSegment { start: pt(5, 5), end: pt(10, 10) });
    assert_reconstructs(&input[1], 1, &edges);
}

#[test]
fn test_rational_crossing_point() {
    let input = [seg(0, 0, 3, 1), seg(0, 1, 3, 0)];
    let edges = intersect_segments(&input).expect("sweep succeeds");

    let expected = RationalPoint::new(Rational::new(3, 2), Rational::new(1, 2));
    let first = pieces_of(&edges, 0);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].end, expected);
    assert_planar(&edges);
}

#[test]
fn test_t_junction_splits_the_crossed_segment() {
    let input = [seg(0, 0, 10, 0), seg(5, 0, 5, 5)];
    let edges = intersect_segments(&input).expect("sweep succeeds");

    assert_eq!(pieces_of(&edges, 0).len(), 2);
    assert_eq!(pieces_of(&edges, 1).len(), 1);
    assert_reconstructs(&input[0], 0, &edges);
    assert_reconstructs(&input[1], 1, &edges);
}

#[test]
fn test_vertical_crossing_horizontal() {
    let input = [seg(5, -5, 5, 5), seg(0, 0, 10, 0)];
    let edges = intersect_segments(&input).expect("sweep succeeds");

    assert_eq!(edges.len(), 4);
    for (origin, input_seg) in input.iter().enumerate() {
        assert_reconstructs(input_seg, origin, &edges);
    }
    assert_planar(&edges);
}

#[test]
fn test_collinear_overlap_is_split_at_overlap_bounds() {
    let input = [seg(0, 0, 10, 0), seg(5, 0, 15, 0)];
    let edges = intersect_segments(&input).expect("sweep succeeds");

    let first = pieces_of(&edges, 0);
    let second = pieces_of(&edges, 1);
    assert_eq!(first, vec![
        SubSegment { start: pt(0, 0), end: pt(5, 0) },
        SubSegment { start: pt(5, 0), end: pt(10, 0) },
    ]);
    assert_eq!(second, vec![
        SubSegment { start: pt(5, 0), end: pt(10, 0) },
        SubSegment { start: pt(10, 0), end: pt(15, 0) },
    ]);
}

#[test]
fn test_contained_collinear_segment() {
    let input = [seg(0, 0, 10, 10), seg(2, 2, 4, 4), seg(0, 4, 4, 0)];
    let edges = intersect_segments(&input).expect("sweep succeeds");

    for (origin, input_seg) in input.iter().enumerate() {
        assert_reconstructs(input_seg, origin, &edges);
    }
    assert_eq!(pieces_of(&edges, 0).len(), 3);
    assert_eq!(pieces_of(&edges, 1).len(), 1);
    assert_eq!(pieces_of(&edges, 2).len(), 2);
}

#[test]
fn test_vertical_collinear_overlap() {
    let input = [seg(0, 0, 0, 10), seg(0, 10, 0, 4), seg(-3, 6, 3, 6)];
    let edges = intersect_segments(&input).expect("sweep succeeds");

    for (origin, input_seg) in input.iter().enumerate() {
        assert_reconstructs(input_seg, origin, &edges);
    }
    assert_planar(&edges);
}

#[test]
fn test_reversed_input_keeps_orientation() {
    let input = [seg(10, 0, 0, 0), seg(5, -5, 5, 5)];
    let edges = intersect_segments(&input).expect("sweep succeeds");

    for (_, piece) in edges.iter().filter(|(index, _)| *index == 0) {
        assert!(piece.start > piece.end, "piece {piece:?} lost the input orientation");
    }
    assert_reconstructs(&input[0], 0, &edges);
}

#[test]
fn test_degenerate_segment_is_skipped() {
    let input = [seg(3, 3, 3, 3), seg(0, 0, 6, 6)];
    let edges = intersect_segments(&input).expect("sweep succeeds");
    assert!(pieces_of(&edges, 0).is_empty());
    assert_eq!(pieces_of(&edges, 1).len(), 1);
}

#[test]
fn test_many_segments_through_one_point() {
    let input = [
        seg(-4, 0, 4, 0),
        seg(0, -4, 0, 4),
        seg(-4, -4, 4, 4),
        seg(-4, 4, 4, -4),
        seg(-4, -2, 4, 2),
    ];
    let edges = intersect_segments(&input).expect("sweep succeeds");

    assert_eq!(edges.len(), 10);
    for (origin, input_seg) in input.iter().enumerate() {
        assert_reconstructs(input_seg, origin, &edges);
    }
    assert_planar(&edges);
}

#[test]
fn test_dense_parallel_segments() {
    // Many long horizontals stay on the sweep line while short verticals
    // each cut exactly one of them, and one long vertical cuts them all
    let count = 40;
    let mut input = Vec::new();
    for j in 0..count {
        input.push(seg(0, 2 * j, 200, 2 * j));
    }
    for j in 0..count {
        let x = 5 + 4 * j;
        input.push(seg(x, 2 * j - 1, x, 2 * j + 1));
    }
    input.push(seg(199, -1, 199, 2 * count));

    let mut intersector = Intersector::new();
    let mut edges = Vec::new();
    intersector
        .intersect_segments(&input, &mut edges)
        .expect("sweep succeeds");

    let count = count as usize;
    for j in 0..count {
        assert_eq!(pieces_of(&edges, j).len(), 3, "horizontal {j}");
        assert_eq!(pieces_of(&edges, count + j).len(), 2, "short vertical {j}");
    }
    assert_eq!(pieces_of(&edges, 2 * count).len(), count + 1);
    assert_eq!(edges.len(), 3 * count + 2 * count + count + 1);

    for (origin, input_seg) in input.iter().enumerate() {
        assert_reconstructs(input_seg, origin, &edges);
    }
    assert_planar(&edges);
}

#[test]
fn test_coordinate_out_of_range() {
    let input = [seg(0, 0, 1, 1), seg(0, 0, 100_000, 0)];
    let result = intersect_segments(&input);
    assert!(matches!(
        result,
        Err(IntersectError::CoordinateOutOfRange { index: 1, .. })
    ));
}

#[test]
fn test_filter_can_veto_pieces() {
    let input = [seg(0, 0, 10, 10), seg(0, 10, 10, 0)];
    let mut intersector = Intersector::new();
    let mut edges = Vec::new();
    intersector
        .intersect_segments_filtered(&input, &mut edges, |active, slot, origin, _| {
            assert!(slot < active.len());
            origin == 1
        })
        .expect("sweep succeeds");

    assert_eq!(edges.len(), 2);
    assert!(edges.iter().all(|(origin, _)| *origin == 1));
}

#[test]
fn test_intersector_is_reusable() {
    let mut intersector = Intersector::new();
    let mut edges = Vec::new();
    intersector
        .intersect_segments(&[seg(0, 0, 10, 10), seg(0, 10, 10, 0)], &mut edges)
        .expect("first sweep");
    edges.clear();
    intersector
        .intersect_segments(&[seg(0, 0, 4, 0)], &mut edges)
        .expect("second sweep");
    assert_eq!(edges, vec![(0, SubSegment { start: pt(0, 0), end: pt(4, 0) })]);
}

#[test]
fn test_random_soups_form_an_arrangement() {
    // Small lattice so collinear overlaps, shared endpoints and
    // vertical segments show up often.
    let mut rng = fastrand::Rng::with_seed(0x5EED);
    let mut intersector = Intersector::new();

    for _ in 0..200 {
        let count = rng.usize(2..9);
        let input: Vec<IntSegment> = (0..count)
            .map(|_| seg(rng.i32(0..7), rng.i32(0..7), rng.i32(0..7), rng.i32(0..7)))
            .collect();

        let mut edges = Vec::new();
        intersector
            .intersect_segments(&input, &mut edges)
            .unwrap_or_else(|err| panic!("sweep failed on {input:?}: {err}"));

        for (origin, input_seg) in input.iter().enumerate() {
            assert_reconstructs(input_seg, origin, &edges);
        }

        // Pieces from the same collinear overlap are allowed to coincide,
        // anything else must be planar.
        assert_planar(&edges);
    }
}
