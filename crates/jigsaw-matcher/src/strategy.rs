//! The capability contract shared by every matcher and the closed set of strategies.

use jigsaw_core::Piece;
use serde::{Deserialize, Serialize};

use crate::edge::{EdgeFeature, EdgeMatcher};
use crate::error::{ensure_same_kind, MatchError};
use crate::keypoint::{KeypointFeature, KeypointMatcher};
use crate::moments::{HuMoments, MomentsMatcher};

/// Feature vector produced by [`MatchStrategy::process`].
#[derive(Clone, Debug, PartialEq)]
pub enum Feature {
    Moments(HuMoments),
    Edge(EdgeFeature),
    Keypoint(KeypointFeature),
}

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Moments(_) => "moments",
            Feature::Edge(_) => "edge",
            Feature::Keypoint(_) => "keypoint",
        }
    }
}

/// Dissimilarity between two features. Zero means identical.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Score {
    /// L1 distance between log-scaled Hu moments.
    Moments { distance: f32 },
    /// Per-side shape and colour distances, indexed Top, Right, Bottom, Left.
    Edge { shape: [f32; 4], color: [f32; 4] },
    /// Mean descriptor distance over mutually matched keypoints, plus the
    /// rotation (degrees) of the first piece relative to the second.
    Keypoint {
        distance: f32,
        rotation: Option<f32>,
        matches: usize,
    },
}

impl Score {
    /// Scalar summary used to rank accepted candidates.
    pub fn magnitude(&self) -> f32 {
        match self {
            Score::Moments { distance } => *distance,
            Score::Edge { shape, color } => shape.iter().chain(color.iter()).sum(),
            Score::Keypoint { distance, .. } => *distance,
        }
    }

    /// Pose hypothesis carried by the score, when the strategy estimates one.
    pub fn rotation(&self) -> Option<f32> {
        match self {
            Score::Keypoint { rotation, .. } => *rotation,
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Score::Moments { .. } => "moments",
            Score::Edge { .. } => "edge",
            Score::Keypoint { .. } => "keypoint",
        }
    }
}

/// Capability contract for similarity strategies.
///
/// Every method has a default that fails with [`MatchError::Unimplemented`],
/// so a strategy that forgets to provide an operation fails loudly instead of
/// reporting a meaningless score.
pub trait MatchStrategy {
    /// Short identifier used in errors and logs.
    fn name(&self) -> &'static str;

    /// Extract the feature vector of a piece. Depends only on the piece's own
    /// descriptors, never on its pose.
    fn process(&self, piece: &Piece) -> Result<Feature, MatchError> {
        let _ = piece;
        Err(MatchError::Unimplemented {
            strategy: self.name(),
            operation: "process",
        })
    }

    fn score(&self, a: &Feature, b: &Feature) -> Result<Score, MatchError> {
        let _ = (a, b);
        Err(MatchError::Unimplemented {
            strategy: self.name(),
            operation: "score",
        })
    }

    /// Whether a score lies within this strategy's thresholds.
    fn accepts(&self, score: &Score) -> Result<bool, MatchError> {
        let _ = score;
        Err(MatchError::Unimplemented {
            strategy: self.name(),
            operation: "compare",
        })
    }

    /// Score two pieces directly.
    fn score_pieces(&self, a: &Piece, b: &Piece) -> Result<Score, MatchError> {
        ensure_same_kind(a.kind(), b.kind())?;
        let fa = self.process(a)?;
        let fb = self.process(b)?;
        self.score(&fa, &fb)
    }

    /// True iff the pieces' score is within this strategy's thresholds.
    fn compare(&self, a: &Piece, b: &Piece) -> Result<bool, MatchError> {
        let score = self.score_pieces(a, b)?;
        self.accepts(&score)
    }

    /// Assignment cost of a score, or `None` when the score is gated out.
    fn cost(&self, score: &Score) -> Result<Option<f32>, MatchError> {
        Ok(self.accepts(score)?.then(|| score.magnitude()))
    }
}

/// The closed set of similarity strategies, chosen at construction time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Matcher {
    Moments(MomentsMatcher),
    Edge(EdgeMatcher),
    Keypoint(KeypointMatcher),
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::Moments(MomentsMatcher::default())
    }
}

impl Matcher {
    fn inner(&self) -> &dyn MatchStrategy {
        match self {
            Matcher::Moments(m) => m,
            Matcher::Edge(m) => m,
            Matcher::Keypoint(m) => m,
        }
    }
}

impl MatchStrategy for Matcher {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn process(&self, piece: &Piece) -> Result<Feature, MatchError> {
        self.inner().process(piece)
    }

    fn score(&self, a: &Feature, b: &Feature) -> Result<Score, MatchError> {
        self.inner().score(a, b)
    }

    fn accepts(&self, score: &Score) -> Result<bool, MatchError> {
        self.inner().accepts(score)
    }

    fn cost(&self, score: &Score) -> Result<Option<f32>, MatchError> {
        self.inner().cost(score)
    }
}

impl From<MomentsMatcher> for Matcher {
    fn from(m: MomentsMatcher) -> Self {
        Matcher::Moments(m)
    }
}

impl From<EdgeMatcher> for Matcher {
    fn from(m: EdgeMatcher) -> Self {
        Matcher::Edge(m)
    }
}

impl From<KeypointMatcher> for Matcher {
    fn from(m: KeypointMatcher) -> Self {
        Matcher::Keypoint(m)
    }
}

pub(crate) fn feature_mismatch(expected: &'static str, found: &Feature) -> MatchError {
    MatchError::TypeMismatch {
        expected,
        found: found.name(),
    }
}

pub(crate) fn score_mismatch(expected: &'static str, found: &Score) -> MatchError {
    MatchError::TypeMismatch {
        expected,
        found: found.name(),
    }
}
