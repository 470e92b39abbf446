//! JSON-configured solve runs: calibration + measured board in, action report out.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use jigsaw_builder::{Arrangement, BoardRecord, CalibrationIoError};
use jigsaw_core::PieceId;
use jigsaw_matcher::{MatchStrategy, Matcher};
use jigsaw_solver::{
    Assignment, Manager, ManagerError, ManagerParams, PlanError, Planner, SolveOrder, Solver,
    SolverParams, SolverState, Turn,
};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Calibration(#[from] CalibrationIoError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

fn default_max_turns() -> usize {
    100
}

/// Inputs and overrides for one solve run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolveConfig {
    /// Persisted calibration record.
    pub calibration_path: PathBuf,
    /// Measured board record.
    pub measured_path: PathBuf,
    /// Where to write the report; printed to stdout when absent.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub matcher: Matcher,
    #[serde(default)]
    pub manager: ManagerParams,
    #[serde(default)]
    pub order: SolveOrder,
    /// Overrides the calibration's position tolerance.
    #[serde(default)]
    pub tau_dist: Option<f32>,
    /// Overrides the calibration's orientation tolerance.
    #[serde(default)]
    pub tau_angle_deg: Option<f32>,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl SolveConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SessionError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        write_pretty(self, path.as_ref())
    }

    /// Solver tolerances: config overrides first, then the calibration's.
    pub fn solver_params(&self, arrangement: &Arrangement) -> SolverParams {
        SolverParams {
            tau_dist: self.tau_dist.unwrap_or(arrangement.params().tau_dist),
            tau_angle_deg: self
                .tau_angle_deg
                .unwrap_or(arrangement.params().tau_angle_deg),
            order: self.order,
        }
    }
}

/// Outcome of a solve run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub state: SolverState,
    pub turns: Vec<Turn>,
    /// Correspondence used by the last turn.
    pub assignment: Assignment,
    pub pieces_in_place: usize,
    pub distance_error: Option<f32>,
    /// Measured piece locations after the last turn.
    pub final_locations: BTreeMap<PieceId, Point2<f32>>,
}

impl SolveReport {
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        write_pretty(self, path.as_ref())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn write_pretty<T: Serialize>(value: &T, path: &Path) -> Result<(), SessionError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| SessionError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load both boards, run the planner to completion and summarise.
pub fn solve(config: &SolveConfig) -> Result<SolveReport, SessionError> {
    let arrangement = Arrangement::load(&config.calibration_path)?;
    let mut measured = BoardRecord::load_json(&config.measured_path)?.to_board()?;
    log::info!(
        "solving {} measured pieces against {} calibrated ({})",
        measured.len(),
        arrangement.solution().len(),
        config.matcher.name()
    );

    let solution = arrangement.solution().clone();
    let manager = Manager::new(solution.clone(), config.matcher.clone(), config.manager.clone())?;
    let solver = Solver::new(solution, config.solver_params(&arrangement));
    let mut planner = Planner::new(manager, solver);

    let turns = planner.run(&mut measured, config.max_turns)?;
    let assignment = planner.assignment().clone();
    let pairs = assignment.id_pairs();
    Ok(SolveReport {
        state: planner.state(),
        turns,
        pieces_in_place: arrangement.pieces_in_place(&measured, &pairs),
        distance_error: arrangement.distance_error(&measured, &pairs),
        assignment,
        final_locations: measured.piece_locations(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unserializable_value_is_not_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        // JSON object keys must be strings.
        let value: BTreeMap<[u8; 2], u8> = [([1, 2], 3)].into_iter().collect();
        let err = write_pretty(&value, &path).unwrap_err();
        assert!(matches!(err, SessionError::Serialize { .. }));
        assert!(err.to_string().starts_with("failed to serialize"));
        assert!(!path.exists());
    }
}
