use jigsaw_core::PieceId;
use jigsaw_matcher::MatchError;

/// Which board a piece id refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardSide {
    Measured,
    Solution,
}

impl std::fmt::Display for BoardSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoardSide::Measured => f.write_str("measured"),
            BoardSide::Solution => f.write_str("solution"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ManagerError {
    #[error("matching {side} piece {piece}: {source}")]
    Match {
        side: BoardSide,
        piece: PieceId,
        #[source]
        source: MatchError,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("no piece with id {piece} on the {side} board")]
    UnknownPiece { side: BoardSide, piece: PieceId },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}
