//! Four-sided piece matching by per-edge shape and colour profile.

use jigsaw_core::{
    color_distance, resample_colors, resample_polyline, EdgeDescriptor, EdgeSide, EdgeType, Piece,
};
use nalgebra::{Point2, Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::{kind_name, MatchError};
use crate::strategy::{feature_mismatch, score_mismatch, Feature, MatchStrategy, Score};

/// How the shape channel of an edge is compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeShapeMethod {
    /// 0 when the edge types agree, infinity otherwise.
    #[default]
    Type,
    /// Mean point distance between chord-aligned, resampled edge curves.
    Coords,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeParams {
    pub tau_shape: f32,
    /// Mean per-sample RGB distance; 400 is permissive for 8-bit RGB.
    pub tau_color: f32,
    pub method: EdgeShapeMethod,
    pub color_samples: usize,
    pub shape_samples: usize,
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            tau_shape: 100.0,
            tau_color: 400.0,
            method: EdgeShapeMethod::Type,
            color_samples: 300,
            shape_samples: 50,
        }
    }
}

/// Features of one side of a piece.
#[derive(Clone, Debug, PartialEq)]
pub struct SideFeature {
    pub side: EdgeSide,
    pub edge_type: EdgeType,
    /// Edge curve with its first point at the origin and its chord on +x.
    pub shape: Vec<Point2<f32>>,
    pub colors: Vec<[f32; 3]>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EdgeFeature {
    /// Indexed by [`EdgeSide::index`].
    pub sides: Vec<SideFeature>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EdgeMatcher {
    pub params: EdgeParams,
}

impl EdgeMatcher {
    pub fn new(params: EdgeParams) -> Self {
        Self { params }
    }

    fn side_feature(&self, edge: &EdgeDescriptor) -> SideFeature {
        SideFeature {
            side: edge.side,
            edge_type: edge.edge_type,
            shape: align_to_chord(&resample_polyline(&edge.points, self.params.shape_samples)),
            colors: resample_colors(&edge.colors, self.params.color_samples),
        }
    }

    fn shape_distance(&self, a: &SideFeature, b: &SideFeature) -> f32 {
        match self.params.method {
            EdgeShapeMethod::Type => {
                if a.edge_type == b.edge_type {
                    0.0
                } else {
                    f32::INFINITY
                }
            }
            EdgeShapeMethod::Coords => mean_pairwise(&a.shape, &b.shape, |p, q| (p - q).norm()),
        }
    }
}

impl MatchStrategy for EdgeMatcher {
    fn name(&self) -> &'static str {
        "edge"
    }

    fn process(&self, piece: &Piece) -> Result<Feature, MatchError> {
        let edges = piece.template().edges().ok_or(MatchError::TypeMismatch {
            expected: "regular",
            found: kind_name(piece.kind()),
        })?;
        Ok(Feature::Edge(EdgeFeature {
            sides: edges.iter().map(|e| self.side_feature(e)).collect(),
        }))
    }

    fn score(&self, a: &Feature, b: &Feature) -> Result<Score, MatchError> {
        let Feature::Edge(a) = a else {
            return Err(feature_mismatch("edge", a));
        };
        let Feature::Edge(b) = b else {
            return Err(feature_mismatch("edge", b));
        };
        let mut shape = [f32::INFINITY; 4];
        let mut color = [f32::INFINITY; 4];
        for side in EdgeSide::ALL {
            let i = side.index();
            let (Some(sa), Some(sb)) = (a.sides.get(i), b.sides.get(i)) else {
                return Err(MatchError::DegenerateShape);
            };
            shape[i] = self.shape_distance(sa, sb);
            color[i] = mean_pairwise(&sa.colors, &sb.colors, |p, q| color_distance(*p, *q));
        }
        Ok(Score::Edge { shape, color })
    }

    /// Conjunctive gate: every side must pass both channels.
    fn accepts(&self, score: &Score) -> Result<bool, MatchError> {
        let Score::Edge { shape, color } = score else {
            return Err(score_mismatch("edge", score));
        };
        Ok(shape.iter().all(|d| *d < self.params.tau_shape)
            && color.iter().all(|d| *d < self.params.tau_color))
    }
}

fn align_to_chord(points: &[Point2<f32>]) -> Vec<Point2<f32>> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    let chord: Vector2<f32> = last - first;
    let angle = chord.y.atan2(chord.x);
    let rot = Rotation2::new(-angle);
    points
        .iter()
        .map(|p| Point2::from(rot * (p - first)))
        .collect()
}

/// Mean of `dist` over index-aligned pairs; infinity if either side is empty.
fn mean_pairwise<T, F>(a: &[T], b: &[T], dist: F) -> f32
where
    F: Fn(&T, &T) -> f32,
{
    let n = a.len().min(b.len());
    if n == 0 {
        return f32::INFINITY;
    }
    a.iter().zip(b.iter()).map(|(p, q)| dist(p, q)).sum::<f32>() / n as f32
}
