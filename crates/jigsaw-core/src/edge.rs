//! Four-sided edge decomposition for regular (grid) pieces.

use crate::image::Rgb;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Side of a regular piece, clockwise from the top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSide {
    Top,
    Right,
    Bottom,
    Left,
}

impl EdgeSide {
    pub const ALL: [EdgeSide; 4] = [
        EdgeSide::Top,
        EdgeSide::Right,
        EdgeSide::Bottom,
        EdgeSide::Left,
    ];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            EdgeSide::Top => 0,
            EdgeSide::Right => 1,
            EdgeSide::Bottom => 2,
            EdgeSide::Left => 3,
        }
    }

    pub fn opposite(self) -> EdgeSide {
        match self {
            EdgeSide::Top => EdgeSide::Bottom,
            EdgeSide::Right => EdgeSide::Left,
            EdgeSide::Bottom => EdgeSide::Top,
            EdgeSide::Left => EdgeSide::Right,
        }
    }

    /// Outward unit normal in image coordinates (y down).
    pub fn outward(self) -> Vector2<f32> {
        match self {
            EdgeSide::Top => Vector2::new(0.0, -1.0),
            EdgeSide::Right => Vector2::new(1.0, 0.0),
            EdgeSide::Bottom => Vector2::new(0.0, 1.0),
            EdgeSide::Left => Vector2::new(-1.0, 0.0),
        }
    }
}

/// Coarse shape class of an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Flat,
    Tab,
    Hole,
}

/// One side of a regular piece: its contour run plus colours sampled along it.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeDescriptor {
    pub side: EdgeSide,
    /// Contour points from the side's first corner to its last (template coordinates).
    pub points: Vec<Point2<f32>>,
    pub edge_type: EdgeType,
    /// Colour under each entry of `points`.
    pub colors: Vec<[f32; 3]>,
}

impl EdgeDescriptor {
    /// Length of the straight segment between the edge end points.
    pub fn chord_length(&self) -> f32 {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => (b - a).norm(),
            _ => 0.0,
        }
    }
}

/// Deviation from the chord, relative to chord length, below which an edge is flat.
pub const DEFAULT_FLAT_TOLERANCE: f32 = 0.1;

/// Split a clockwise outer contour into its four sides.
///
/// Corners are the contour points nearest the corners of the `width` x `height`
/// bounding box. Returns `None` when those corners do not appear in clockwise
/// order along the contour (the shape is not a four-sided piece).
pub fn split_edges<F>(
    contour: &[Point2<f32>],
    width: usize,
    height: usize,
    flat_tolerance: f32,
    color_at: F,
) -> Option<[EdgeDescriptor; 4]>
where
    F: Fn(Point2<f32>) -> Option<Rgb>,
{
    let n = contour.len();
    if n < 4 || width < 2 || height < 2 {
        return None;
    }
    let w = (width - 1) as f32;
    let h = (height - 1) as f32;
    let box_corners = [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ];

    let corner_idx: Vec<usize> = box_corners
        .iter()
        .map(|c| nearest_index(contour, *c))
        .collect();

    // Offsets relative to the top-left corner must increase strictly.
    let offsets: Vec<usize> = corner_idx
        .iter()
        .map(|&i| (i + n - corner_idx[0]) % n)
        .collect();
    if !(offsets[0] < offsets[1] && offsets[1] < offsets[2] && offsets[2] < offsets[3]) {
        return None;
    }

    let centroid = crate::contour::mean_point(contour)?;
    let mut edges = Vec::with_capacity(4);
    for (k, side) in EdgeSide::ALL.iter().enumerate() {
        let from = corner_idx[k];
        let to = corner_idx[(k + 1) % 4];
        let len = (to + n - from) % n;
        let points: Vec<Point2<f32>> = (0..=len).map(|s| contour[(from + s) % n]).collect();
        let colors = points
            .iter()
            .map(|p| {
                let c = color_at(*p).unwrap_or([0, 0, 0]);
                [c[0] as f32, c[1] as f32, c[2] as f32]
            })
            .collect();
        let edge_type = classify(&points, *side, centroid, flat_tolerance);
        edges.push(EdgeDescriptor {
            side: *side,
            points,
            edge_type,
            colors,
        });
    }

    edges.try_into().ok()
}

fn nearest_index(points: &[Point2<f32>], target: Point2<f32>) -> usize {
    let mut best = 0usize;
    let mut best_d = f32::INFINITY;
    for (i, p) in points.iter().enumerate() {
        let d = (p - target).norm_squared();
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

fn classify(
    points: &[Point2<f32>],
    side: EdgeSide,
    centroid: Point2<f32>,
    flat_tolerance: f32,
) -> EdgeType {
    let (Some(a), Some(b)) = (points.first(), points.last()) else {
        return EdgeType::Flat;
    };
    let chord = b - a;
    let len = chord.norm();
    if len <= f32::EPSILON {
        return EdgeType::Flat;
    }
    let mut normal = Vector2::new(-chord.y, chord.x) / len;
    // Orient the chord normal away from the piece.
    let mid = a + chord * 0.5;
    let away = (mid - centroid) + side.outward();
    if normal.dot(&away) < 0.0 {
        normal = -normal;
    }

    let mut extreme = 0.0f32;
    for p in points {
        let d = (p - a).dot(&normal);
        if d.abs() > extreme.abs() {
            extreme = d;
        }
    }

    if extreme.abs() < flat_tolerance * len {
        EdgeType::Flat
    } else if extreme > 0.0 {
        EdgeType::Tab
    } else {
        EdgeType::Hole
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::trace_outer_contour;
    use crate::image::BinaryMask;

    fn mask_from_rows(rows: &[&str]) -> BinaryMask {
        let h = rows.len();
        let w = rows[0].len();
        let data = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| c == '#'))
            .collect();
        BinaryMask {
            width: w,
            height: h,
            data,
        }
    }

    #[test]
    fn square_has_four_flat_edges() {
        let mask = BinaryMask {
            width: 12,
            height: 12,
            data: vec![true; 144],
        };
        let contour = trace_outer_contour(&mask);
        let edges = split_edges(&contour, 12, 12, DEFAULT_FLAT_TOLERANCE, |_| Some([9, 9, 9]))
            .expect("square splits");
        for (edge, side) in edges.iter().zip(EdgeSide::ALL) {
            assert_eq!(edge.side, side);
            assert_eq!(edge.edge_type, EdgeType::Flat);
            assert!((edge.chord_length() - 11.0).abs() < 1e-4);
        }
    }

    #[test]
    fn detects_tab_on_right_side() {
        let mask = mask_from_rows(&[
            "########..",
            "########..",
            "########..",
            "##########",
            "##########",
            "##########",
            "########..",
            "########..",
            "########..",
        ]);
        let contour = trace_outer_contour(&mask);
        let edges = split_edges(&contour, mask.width, mask.height, DEFAULT_FLAT_TOLERANCE, |_| {
            Some([0, 0, 0])
        })
        .expect("four sides");
        assert_eq!(edges[EdgeSide::Right.index()].edge_type, EdgeType::Tab);
        assert_eq!(edges[EdgeSide::Top.index()].edge_type, EdgeType::Flat);
        assert_eq!(edges[EdgeSide::Bottom.index()].edge_type, EdgeType::Flat);
        assert_eq!(edges[EdgeSide::Left.index()].edge_type, EdgeType::Flat);
    }

    #[test]
    fn detects_hole_on_top_side() {
        let mask = mask_from_rows(&[
            "####..####",
            "####..####",
            "##########",
            "##########",
            "##########",
            "##########",
        ]);
        let contour = trace_outer_contour(&mask);
        let edges = split_edges(&contour, mask.width, mask.height, DEFAULT_FLAT_TOLERANCE, |_| {
            Some([0, 0, 0])
        })
        .expect("four sides");
        assert_eq!(edges[EdgeSide::Top.index()].edge_type, EdgeType::Hole);
        assert_eq!(edges[EdgeSide::Bottom.index()].edge_type, EdgeType::Flat);
    }
}
