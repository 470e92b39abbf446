//! Shape matching by log-scaled Hu moment invariants of the outer contour.

use jigsaw_core::Piece;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::error::MatchError;
use crate::strategy::{feature_mismatch, score_mismatch, Feature, MatchStrategy, Score};

/// Seven log-scaled Hu invariants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HuMoments(pub [f64; 7]);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MomentsParams {
    /// Largest accepted L1 distance. `None` accepts every pair.
    pub tau: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MomentsMatcher {
    pub params: MomentsParams,
}

impl MomentsMatcher {
    pub fn new(params: MomentsParams) -> Self {
        Self { params }
    }
}

impl MatchStrategy for MomentsMatcher {
    fn name(&self) -> &'static str {
        "moments"
    }

    fn process(&self, piece: &Piece) -> Result<Feature, MatchError> {
        let raw = hu_moments(piece.template().contour()).ok_or(MatchError::DegenerateShape)?;
        Ok(Feature::Moments(HuMoments(raw.map(log_scale))))
    }

    fn score(&self, a: &Feature, b: &Feature) -> Result<Score, MatchError> {
        let Feature::Moments(a) = a else {
            return Err(feature_mismatch("moments", a));
        };
        let Feature::Moments(b) = b else {
            return Err(feature_mismatch("moments", b));
        };
        let distance: f64 = a.0.iter().zip(b.0.iter()).map(|(x, y)| (x - y).abs()).sum();
        Ok(Score::Moments {
            distance: distance as f32,
        })
    }

    fn accepts(&self, score: &Score) -> Result<bool, MatchError> {
        let Score::Moments { distance } = score else {
            return Err(score_mismatch("moments", score));
        };
        Ok(self.params.tau.is_none_or(|tau| *distance <= tau))
    }
}

fn log_scale(h: f64) -> f64 {
    -h.signum() * (1e-6 + h.abs()).log10()
}

/// Hu invariants of the polygon described by `contour` (closed implicitly).
///
/// Returns `None` for fewer than three vertices or a zero-area polygon.
pub fn hu_moments(contour: &[Point2<f32>]) -> Option<[f64; 7]> {
    if contour.len() < 3 {
        return None;
    }

    let mut a = [0.0f64; 10];
    let last = contour[contour.len() - 1];
    let (mut xp, mut yp) = (last.x as f64, last.y as f64);
    for p in contour {
        let (x, y) = (p.x as f64, p.y as f64);
        let dxy = xp * y - x * yp;
        let xs = xp + x;
        let ys = yp + y;
        a[0] += dxy;
        a[1] += dxy * xs;
        a[2] += dxy * ys;
        a[3] += dxy * (xp * xs + x * x);
        a[4] += dxy * (xp * (ys + yp) + x * (ys + y));
        a[5] += dxy * (yp * ys + y * y);
        a[6] += dxy * xs * (xp * xp + x * x);
        a[7] += dxy * (xp * xp * (3.0 * yp + y) + 2.0 * x * xp * ys + x * x * (yp + 3.0 * y));
        a[8] += dxy * (yp * yp * (3.0 * xp + x) + 2.0 * y * yp * xs + y * y * (xp + 3.0 * x));
        a[9] += dxy * ys * (yp * yp + y * y);
        xp = x;
        yp = y;
    }
    if a[0].abs() < f64::EPSILON {
        return None;
    }
    // Traversal direction only flips the sign of every raw moment.
    let sign = a[0].signum();
    let m00 = sign * a[0] / 2.0;
    let m10 = sign * a[1] / 6.0;
    let m01 = sign * a[2] / 6.0;
    let m20 = sign * a[3] / 12.0;
    let m11 = sign * a[4] / 24.0;
    let m02 = sign * a[5] / 12.0;
    let m30 = sign * a[6] / 20.0;
    let m21 = sign * a[7] / 60.0;
    let m12 = sign * a[8] / 60.0;
    let m03 = sign * a[9] / 20.0;

    let cx = m10 / m00;
    let cy = m01 / m00;
    let mu20 = m20 - cx * m10;
    let mu11 = m11 - cx * m01;
    let mu02 = m02 - cy * m01;
    let mu30 = m30 - cx * (3.0 * mu20 + cx * m10);
    let mu21 = m21 - cx * (2.0 * mu11 + cx * m01) - cy * mu20;
    let mu12 = m12 - cy * (2.0 * mu11 + cy * m10) - cx * mu02;
    let mu03 = m03 - cy * (3.0 * mu02 + cy * m01);

    let s2 = 1.0 / (m00 * m00);
    let s3 = s2 / m00.sqrt();
    let (n20, n11, n02) = (mu20 * s2, mu11 * s2, mu02 * s2);
    let (n30, n21, n12, n03) = (mu30 * s3, mu21 * s3, mu12 * s3, mu03 * s3);

    let t0 = n30 + n12;
    let t1 = n21 + n03;
    let q0 = n20 - n02;
    let q1 = n30 - 3.0 * n12;
    let q2 = 3.0 * n21 - n03;

    Some([
        n20 + n02,
        q0 * q0 + 4.0 * n11 * n11,
        q1 * q1 + q2 * q2,
        t0 * t0 + t1 * t1,
        q1 * t0 * (t0 * t0 - 3.0 * t1 * t1) + q2 * t1 * (3.0 * t0 * t0 - t1 * t1),
        q0 * (t0 * t0 - t1 * t1) + 4.0 * n11 * t0 * t1,
        q2 * t0 * (t0 * t0 - 3.0 * t1 * t1) - q1 * t1 * (3.0 * t0 * t0 - t1 * t1),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rect(w: f32, h: f32) -> Vec<Point2<f32>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }

    #[test]
    fn first_invariant_of_square() {
        // eta20 + eta02 = 2 * (a^4 / 12) / a^4 = 1/6
        let hu = hu_moments(&rect(4.0, 4.0)).expect("square");
        assert_relative_eq!(hu[0], 1.0 / 6.0, epsilon = 1e-9);
        assert_relative_eq!(hu[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn invariant_to_direction_translation_and_scale() {
        let base = hu_moments(&rect(6.0, 3.0)).expect("rect");
        let mut reversed = rect(6.0, 3.0);
        reversed.reverse();
        let moved: Vec<_> = rect(12.0, 6.0)
            .into_iter()
            .map(|p| Point2::new(p.x + 40.0, p.y - 7.0))
            .collect();
        for other in [hu_moments(&reversed), hu_moments(&moved)] {
            let other = other.expect("rect");
            for (a, b) in base.iter().zip(other.iter()) {
                assert_relative_eq!(a, b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn invariant_to_quarter_turn() {
        let base = hu_moments(&rect(6.0, 3.0)).expect("rect");
        let turned = hu_moments(&rect(3.0, 6.0)).expect("rect");
        for (a, b) in base.iter().zip(turned.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn degenerate_polygons_are_rejected() {
        assert!(hu_moments(&[Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]).is_none());
        let line = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        ];
        assert!(hu_moments(&line).is_none());
    }

    #[test]
    fn zero_invariant_maps_to_six() {
        assert_relative_eq!(log_scale(0.0), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn gate_respects_tau() {
        let m = MomentsMatcher::new(MomentsParams { tau: Some(0.5) });
        assert!(m.accepts(&Score::Moments { distance: 0.4 }).expect("moments"));
        assert!(!m.accepts(&Score::Moments { distance: 0.6 }).expect("moments"));
        assert!(MomentsMatcher::default()
            .accepts(&Score::Moments { distance: 1e9 })
            .expect("moments"));
        let wrong = Score::Keypoint {
            distance: 0.0,
            rotation: None,
            matches: 0,
        };
        assert!(matches!(
            m.accepts(&wrong),
            Err(MatchError::TypeMismatch { expected: "moments", found: "keypoint" })
        ));
    }
}
