use jigsaw_core::{BoardError, PieceError, PieceId};

use crate::grid::GridCoord;
use crate::segment::SegmentError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("conflicting grid coordinates for piece {piece}: {existing:?} vs {proposed:?}")]
    GridInconsistency {
        piece: PieceId,
        existing: GridCoord,
        proposed: GridCoord,
    },
    #[error("grid cell {cell:?} claimed by pieces {first} and {second}")]
    GridCellOccupied {
        cell: GridCoord,
        first: PieceId,
        second: PieceId,
    },
    #[error(transparent)]
    Segmentation(#[from] SegmentError),
    #[error(transparent)]
    Piece(#[from] PieceError),
    #[error(transparent)]
    Board(#[from] BoardError),
}
