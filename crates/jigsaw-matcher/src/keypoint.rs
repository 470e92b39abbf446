//! Keypoint matching on contour curvature extrema.
//!
//! Keypoints are contour points whose turning angle (measured over a window
//! of `curvature_window` contour steps) is a local extremum above
//! `min_turn_deg`. Each keypoint carries a rotation-invariant descriptor
//!
//! `[radius / mean_radius, turn / pi, r / 255, g / 255, b / 255]`
//!
//! where radius is the distance to the piece centroid and the colour is the
//! mean appearance in a small neighbourhood. Descriptors are paired by mutual
//! nearest neighbour; the polar angles of paired keypoints about their
//! centroids give a relative rotation hypothesis.

use std::f32::consts::PI;

use jigsaw_core::{Piece, PieceTemplate};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::MatchError;
use crate::strategy::{feature_mismatch, score_mismatch, Feature, MatchStrategy, Score};

const DESCRIPTOR_DIM: usize = 5;
/// Upper bound on keypoints per piece; keeps every tree within a single leaf bucket.
pub const MAX_KEYPOINTS: usize = 32;
const COLOR_RADIUS: i64 = 2;

type Descriptor = [f32; DESCRIPTOR_DIM];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypointParams {
    /// Largest accepted mean descriptor distance.
    pub tau: f32,
    /// Clamped to [`MAX_KEYPOINTS`].
    pub max_keypoints: usize,
    pub min_matches: usize,
    pub curvature_window: usize,
    pub min_turn_deg: f32,
}

impl Default for KeypointParams {
    fn default() -> Self {
        Self {
            tau: 0.25,
            max_keypoints: 24,
            min_matches: 3,
            curvature_window: 3,
            min_turn_deg: 30.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    /// Offset from the template centroid.
    pub offset: Vector2<f32>,
    pub descriptor: [f32; DESCRIPTOR_DIM],
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct KeypointFeature {
    pub keypoints: Vec<Keypoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct KeypointMatcher {
    pub params: KeypointParams,
}

impl KeypointMatcher {
    pub fn new(params: KeypointParams) -> Self {
        Self { params }
    }

    /// Detect keypoints on a template's contour.
    pub fn detect(&self, template: &PieceTemplate) -> Vec<Keypoint> {
        let contour = template.contour();
        let n = contour.len();
        let k = self.params.curvature_window.max(1);
        if n < 2 * k + 1 {
            return Vec::new();
        }

        let turns: Vec<f32> = (0..n)
            .map(|i| {
                let prev = contour[(i + n - k) % n];
                let next = contour[(i + k) % n];
                turning_angle(contour[i] - prev, next - contour[i])
            })
            .collect();

        let min_turn = self.params.min_turn_deg.to_radians();
        let mut candidates: Vec<usize> = (0..n)
            .filter(|&i| turns[i].abs() >= min_turn && is_local_peak(&turns, i, k))
            .collect();
        candidates.sort_by(|&a, &b| turns[b].abs().total_cmp(&turns[a].abs()).then(a.cmp(&b)));
        candidates.truncate(self.params.max_keypoints.min(MAX_KEYPOINTS));
        candidates.sort_unstable();

        let centroid = template.centroid();
        let mean_radius = contour.iter().map(|p| (p - centroid).norm()).sum::<f32>() / n as f32;
        if mean_radius <= f32::EPSILON {
            return Vec::new();
        }

        candidates
            .into_iter()
            .map(|i| {
                let p = contour[i];
                let offset = p - centroid;
                let c = local_color(template, p);
                Keypoint {
                    offset,
                    descriptor: [
                        offset.norm() / mean_radius,
                        turns[i] / PI,
                        c[0] / 255.0,
                        c[1] / 255.0,
                        c[2] / 255.0,
                    ],
                }
            })
            .collect()
    }
}

impl MatchStrategy for KeypointMatcher {
    fn name(&self) -> &'static str {
        "keypoint"
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(piece = piece.id()))
    )]
    fn process(&self, piece: &Piece) -> Result<Feature, MatchError> {
        if piece.template().contour().len() < 3 {
            return Err(MatchError::DegenerateShape);
        }
        Ok(Feature::Keypoint(KeypointFeature {
            keypoints: self.detect(piece.template()),
        }))
    }

    fn score(&self, a: &Feature, b: &Feature) -> Result<Score, MatchError> {
        let Feature::Keypoint(a) = a else {
            return Err(feature_mismatch("keypoint", a));
        };
        let Feature::Keypoint(b) = b else {
            return Err(feature_mismatch("keypoint", b));
        };

        let pairs = mutual_matches(&a.keypoints, &b.keypoints);
        log::debug!(
            "{} mutual keypoint matches ({} vs {} keypoints)",
            pairs.len(),
            a.keypoints.len(),
            b.keypoints.len()
        );
        if pairs.is_empty() {
            return Ok(Score::Keypoint {
                distance: f32::INFINITY,
                rotation: None,
                matches: 0,
            });
        }

        let distance = pairs.iter().map(|m| m.2).sum::<f32>() / pairs.len() as f32;
        let (mut s, mut c) = (0.0f32, 0.0f32);
        for &(i, j, _) in &pairs {
            let da = a.keypoints[i].offset;
            let db = b.keypoints[j].offset;
            let delta = da.y.atan2(da.x) - db.y.atan2(db.x);
            // Weight by radius; angles of points near the centroid are unstable.
            let w = da.norm().min(db.norm());
            s += w * delta.sin();
            c += w * delta.cos();
        }
        let rotation = (s.abs() > f32::EPSILON || c.abs() > f32::EPSILON)
            .then(|| s.atan2(c).to_degrees());

        Ok(Score::Keypoint {
            distance,
            rotation,
            matches: pairs.len(),
        })
    }

    fn accepts(&self, score: &Score) -> Result<bool, MatchError> {
        let Score::Keypoint {
            distance, matches, ..
        } = score
        else {
            return Err(score_mismatch("keypoint", score));
        };
        Ok(*matches >= self.params.min_matches && *distance <= self.params.tau)
    }
}

/// Signed angle from `a` to `b` in `(-pi, pi]`.
fn turning_angle(a: Vector2<f32>, b: Vector2<f32>) -> f32 {
    let cross = a.x * b.y - a.y * b.x;
    let dot = a.dot(&b);
    cross.atan2(dot)
}

/// Strict maximum of `|turn|` over the earlier half-window, non-strict over the
/// later one, so plateaus yield a single peak.
fn is_local_peak(turns: &[f32], i: usize, k: usize) -> bool {
    let n = turns.len();
    let v = turns[i].abs();
    (1..=k).all(|d| v > turns[(i + n - d) % n].abs() && v >= turns[(i + d) % n].abs())
}

fn local_color(template: &PieceTemplate, p: Point2<f32>) -> [f32; 3] {
    let (cx, cy) = (p.x.round() as i64, p.y.round() as i64);
    let mut sum = [0.0f32; 3];
    let mut count = 0usize;
    for y in cy - COLOR_RADIUS..=cy + COLOR_RADIUS {
        for x in cx - COLOR_RADIUS..=cx + COLOR_RADIUS {
            if let Some(c) = template.color_at(x, y) {
                for ch in 0..3 {
                    sum[ch] += c[ch] as f32;
                }
                count += 1;
            }
        }
    }
    if count == 0 {
        return sum;
    }
    sum.map(|v| v / count as f32)
}

fn build_tree(keypoints: &[Keypoint]) -> KdTree<f32, DESCRIPTOR_DIM> {
    let mut tree: KdTree<f32, DESCRIPTOR_DIM> = KdTree::new();
    for (i, kp) in keypoints.iter().enumerate() {
        tree.add(&kp.descriptor, i as u64);
    }
    tree
}

/// Pairs `(i, j, distance)` where `a[i]` and `b[j]` are each other's nearest descriptor.
fn mutual_matches(a: &[Keypoint], b: &[Keypoint]) -> Vec<(usize, usize, f32)> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let tree_a = build_tree(a);
    let tree_b = build_tree(b);
    let nearest = |tree: &KdTree<f32, DESCRIPTOR_DIM>, q: &Descriptor| {
        let nn = tree.nearest_one::<SquaredEuclidean>(q);
        (nn.item as usize, nn.distance)
    };

    a.iter()
        .enumerate()
        .filter_map(|(i, kp)| {
            let (j, d2) = nearest(&tree_b, &kp.descriptor);
            let (back, _) = nearest(&tree_a, &b.get(j)?.descriptor);
            (back == i).then(|| (i, j, d2.sqrt()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn turning_angle_sign_follows_image_orientation() {
        // East then south is a clockwise (positive) turn with y pointing down.
        let t = turning_angle(Vector2::new(1.0, 0.0), Vector2::new(0.0, 1.0));
        assert_relative_eq!(t, PI / 2.0, epsilon = 1e-6);
        let t = turning_angle(Vector2::new(1.0, 0.0), Vector2::new(0.0, -1.0));
        assert_relative_eq!(t, -PI / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn plateau_yields_single_peak() {
        let turns = [0.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let peaks: Vec<usize> = (0..turns.len())
            .filter(|&i| is_local_peak(&turns, i, 1))
            .collect();
        assert_eq!(peaks, vec![1]);
    }

    #[test]
    fn empty_features_score_infinite() {
        let m = KeypointMatcher::default();
        let empty = Feature::Keypoint(KeypointFeature::default());
        let s = m.score(&empty, &empty).expect("keypoint");
        assert!(s.magnitude().is_infinite());
        assert!(!m.accepts(&s).expect("keypoint"));
    }
}
