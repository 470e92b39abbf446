//! Core piece, board and raster types for jigsaw puzzle assembly.
//!
//! Pieces pair an immutable [`PieceTemplate`] (mask, contour, appearance and,
//! for four-sided pieces, edge descriptors) with a per-board pose. A [`Board`]
//! owns its pieces and assigns ids on insertion. Nothing here depends on a
//! concrete image library; [`RgbImage`] and [`BinaryMask`] are plain buffers.

mod board;
mod contour;
mod edge;
mod image;
mod logger;
mod piece;

pub use board::{min_distance, Board, BoardError, BoundingBox, DEFAULT_BOUNDARY_SAMPLES};
pub use contour::{
    mean_point, polygon_area, resample_colors, resample_polyline, stride_sample,
    trace_outer_contour,
};
pub use edge::{split_edges, EdgeDescriptor, EdgeSide, EdgeType, DEFAULT_FLAT_TOLERANCE};
pub use image::{color_distance, luma, BinaryMask, Rgb, RgbImage};
pub use piece::{rotate, wrap_degrees, Piece, PieceError, PieceId, PieceKind, PieceTemplate};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init, init_with_level, LogConfig};
