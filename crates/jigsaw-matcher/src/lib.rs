//! Piece similarity strategies.
//!
//! Every strategy implements [`MatchStrategy`]: `process` turns a piece into a
//! [`Feature`], `score` compares two features (0 means identical) and
//! `compare` applies the strategy's thresholds. [`Matcher`] is the closed set
//! of concrete strategies used by the correspondence manager.
//!
//! ```
//! use jigsaw_matcher::{Matcher, MatchStrategy, MomentsMatcher};
//!
//! let matcher = Matcher::from(MomentsMatcher::default());
//! assert_eq!(matcher.name(), "moments");
//! ```

mod edge;
mod error;
mod keypoint;
mod moments;
mod strategy;

pub use edge::{EdgeFeature, EdgeMatcher, EdgeParams, EdgeShapeMethod, SideFeature};
pub use error::MatchError;
pub use keypoint::{Keypoint, KeypointFeature, KeypointMatcher, KeypointParams, MAX_KEYPOINTS};
pub use moments::{hu_moments, HuMoments, MomentsMatcher, MomentsParams};
pub use strategy::{Feature, MatchStrategy, Matcher, Score};
