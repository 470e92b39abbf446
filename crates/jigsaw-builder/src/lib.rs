//! Calibration builders.
//!
//! An [`Arrangement`] wraps the solution [`Board`](jigsaw_core::Board) and its
//! placement tolerances. Depending on the [`BuildLevel`] it additionally
//! carries an [`AdjacencyInfo`] (boundary proximity between every pair of
//! pieces) and a [`GridInfo`] (interlocking pairs and integer grid
//! coordinates). Both are computed once, at construction.
//!
//! Builders can start from an existing board, from segmented [`Region`]s, or
//! from an image plus foreground mask via a [`Segmenter`].

mod adjacency;
mod arrangement;
mod error;
mod grid;
mod io;
mod params;
mod segment;

pub use adjacency::{AdjacencyInfo, PairMatrix};
pub use arrangement::{board_from_regions, Arrangement, BuildLevel};
pub use error::BuildError;
pub use grid::{GridCoord, GridInfo, NeighborDirection};
pub use io::{BoardRecord, CalibrationIoError, CalibrationRecord, PieceRecord};
pub use params::{AdjacencyParams, ArrangementParams, BuildParams, GridParams};
pub use segment::{
    bbox_iou, suppress_duplicates, ImageProcessor, LayerSegmenter, Region, SegmentError,
    Segmenter, ThresholdProcessor,
};
