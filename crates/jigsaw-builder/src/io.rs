//! JSON persistence for calibrated arrangements and measured boards.
//!
//! Only the piece data is stored. Contours, edge descriptors, adjacency and
//! grid structure are recomputed on load, so a record saved from an
//! [`Arrangement`] reloads to an identical matrix.

use std::{fs, path::Path};

use jigsaw_core::{BinaryMask, Board, BoardError, Piece, PieceId, PieceKind, PieceTemplate, Rgb};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::arrangement::{Arrangement, BuildLevel};
use crate::error::BuildError;
use crate::params::{AdjacencyParams, ArrangementParams, BuildParams, GridParams};

#[derive(thiserror::Error, Debug)]
pub enum CalibrationIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed record: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid piece {id}: {reason}")]
    InvalidRecord { id: PieceId, reason: String },
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// One persisted piece.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PieceRecord {
    pub id: PieceId,
    pub location: [f32; 2],
    #[serde(default)]
    pub orientation: f32,
    #[serde(default)]
    pub kind: PieceKind,
    pub width: usize,
    pub height: usize,
    /// Row-major, `0` or `1`.
    pub mask: Vec<u8>,
    /// One colour per set mask pixel, row-major.
    pub appearance: Vec<Rgb>,
}

impl PieceRecord {
    pub fn from_piece(piece: &Piece) -> Self {
        let template = piece.template();
        let mask = template.mask();
        Self {
            id: piece.id(),
            location: [piece.location().x, piece.location().y],
            orientation: piece.orientation(),
            kind: template.kind(),
            width: mask.width,
            height: mask.height,
            mask: mask.data.iter().map(|&b| u8::from(b)).collect(),
            appearance: template.appearance().to_vec(),
        }
    }

    pub fn to_piece(&self) -> Result<Piece, CalibrationIoError> {
        let invalid = |reason: String| CalibrationIoError::InvalidRecord {
            id: self.id,
            reason,
        };
        let mask = BinaryMask::from_u8(self.width, self.height, &self.mask).ok_or_else(|| {
            invalid(format!(
                "mask has {} entries, expected {}x{}",
                self.mask.len(),
                self.width,
                self.height
            ))
        })?;
        let template = PieceTemplate::from_parts(self.kind, mask, self.appearance.clone())
            .map_err(|e| invalid(e.to_string()))?;
        let mut piece = Piece::new(
            Arc::new(template),
            Point2::new(self.location[0], self.location[1]),
        );
        piece.set_orientation(self.orientation);
        Ok(piece)
    }
}

fn records_of(board: &Board) -> Vec<PieceRecord> {
    board.iter().map(PieceRecord::from_piece).collect()
}

fn board_of(records: &[PieceRecord]) -> Result<Board, CalibrationIoError> {
    let pieces = records
        .iter()
        .map(|r| Ok((r.id, r.to_piece()?)))
        .collect::<Result<Vec<_>, CalibrationIoError>>()?;
    Board::restore(pieces).map_err(|e| match e {
        BoardError::DuplicateId(id) => CalibrationIoError::InvalidRecord {
            id,
            reason: "duplicate piece id".to_string(),
        },
        BoardError::IdOverflow(id) => CalibrationIoError::InvalidRecord {
            id,
            reason: "piece id too large".to_string(),
        },
        other => CalibrationIoError::Build(other.into()),
    })
}

/// A board on its own, e.g. one measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardRecord {
    pub pieces: Vec<PieceRecord>,
}

impl BoardRecord {
    pub fn from_board(board: &Board) -> Self {
        Self {
            pieces: records_of(board),
        }
    }

    pub fn to_board(&self) -> Result<Board, CalibrationIoError> {
        board_of(&self.pieces)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Persisted calibration: the solution board plus the thresholds it was built with.
///
/// Every threshold is optional; a missing field falls back to the default of
/// the corresponding parameter struct.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    #[serde(default)]
    pub level: BuildLevel,
    pub pieces: Vec<PieceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_dist: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_angle_deg: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_adj: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_samples: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_interlock: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_contact_fraction: Option<f32>,
}

impl CalibrationRecord {
    pub fn from_arrangement(arrangement: &Arrangement) -> Self {
        let adjacency = arrangement.adjacency().map(|a| &a.params);
        let grid = arrangement.grid().map(|g| &g.params);
        Self {
            level: arrangement.level(),
            pieces: records_of(arrangement.solution()),
            tau_dist: Some(arrangement.params().tau_dist),
            tau_angle_deg: Some(arrangement.params().tau_angle_deg),
            tau_adj: adjacency.map(|p| p.tau_adj),
            boundary_samples: adjacency.map(|p| p.boundary_samples),
            tau_interlock: grid.map(|p| p.tau_interlock),
            min_contact_fraction: grid.map(|p| p.min_contact_fraction),
        }
    }

    /// Parameters recorded in this file, defaults elsewhere.
    pub fn build_params(&self) -> BuildParams {
        let arrangement = ArrangementParams::default();
        let adjacency = AdjacencyParams::default();
        let grid = GridParams::default();
        BuildParams {
            arrangement: ArrangementParams {
                tau_dist: self.tau_dist.unwrap_or(arrangement.tau_dist),
                tau_angle_deg: self.tau_angle_deg.unwrap_or(arrangement.tau_angle_deg),
            },
            adjacency: AdjacencyParams {
                tau_adj: self.tau_adj.unwrap_or(adjacency.tau_adj),
                boundary_samples: self.boundary_samples.unwrap_or(adjacency.boundary_samples),
            },
            grid: GridParams {
                tau_interlock: self.tau_interlock.unwrap_or(grid.tau_interlock),
                min_contact_fraction: self
                    .min_contact_fraction
                    .unwrap_or(grid.min_contact_fraction),
                // Persisted ids already reflect any reordering.
                reorder: false,
            },
            ..BuildParams::default()
        }
    }

    /// Rebuild the arrangement at the recorded level.
    pub fn to_arrangement(&self) -> Result<Arrangement, CalibrationIoError> {
        let board = board_of(&self.pieces)?;
        Ok(Arrangement::build(board, &self.build_params(), self.level)?)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Arrangement {
    /// Load a persisted calibration and recompute its derived structure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let record = CalibrationRecord::load_json(path)?;
        log::info!(
            "loaded calibration: {} pieces, level {:?}",
            record.pieces.len(),
            record.level
        );
        record.to_arrangement()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        CalibrationRecord::from_arrangement(self).write_json(path)
    }
}
