//! Turn-based corrective planning.
//!
//! The solver holds the latest [`Assignment`] and, per turn, corrects one
//! degree of freedom of one matched piece on the caller's measured board.

use jigsaw_core::{wrap_degrees, Board, Piece, PieceId};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::{BoardSide, SolverError};
use crate::manager::{Assignment, Correspondence};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverState {
    /// At least one matched piece is outside tolerance.
    Active,
    /// Every matched piece is within tolerance.
    Solved,
    /// The current assignment is empty.
    NoMatch,
}

/// One corrective action on a measured piece.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Set the piece orientation to `target` degrees.
    Rotate { piece: PieceId, target: f32 },
    /// Set the piece top-left location to `target`.
    Move { piece: PieceId, target: Point2<f32> },
}

impl Action {
    pub fn piece(&self) -> PieceId {
        match self {
            Action::Rotate { piece, .. } | Action::Move { piece, .. } => *piece,
        }
    }

    fn apply(&self, piece: &mut Piece) {
        match *self {
            Action::Rotate { target, .. } => piece.set_orientation(target),
            Action::Move { target, .. } => piece.set_location(target),
        }
    }
}

/// Outcome of [`Solver::take_turn`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// True once the solver is in [`SolverState::Solved`] after this turn.
    pub finished: bool,
    /// The action applied this turn, if any.
    pub action: Option<Action>,
    pub state: SolverState,
}

/// Order in which outstanding pairs are visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SolveOrder {
    /// Ascending solution id.
    #[default]
    BySolutionId,
    /// Best (lowest) match score first, ties by solution id.
    ByScore,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Position tolerance in pixels.
    pub tau_dist: f32,
    /// Orientation tolerance in degrees.
    pub tau_angle_deg: f32,
    pub order: SolveOrder,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            tau_dist: 15.0,
            tau_angle_deg: 2.0,
            order: SolveOrder::default(),
        }
    }
}

/// Pose error of one matched pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PairError {
    pub measured: PieceId,
    pub solution: PieceId,
    /// Signed orientation error in degrees, wrapped to (-180, 180].
    pub angle: f32,
    /// Euclidean location error in pixels.
    pub distance: f32,
}

#[derive(Clone, Debug)]
pub struct Solver {
    solution: Board,
    params: SolverParams,
    assignment: Assignment,
    state: SolverState,
}

impl Solver {
    /// A solver with no match yet; its state is [`SolverState::NoMatch`].
    pub fn new(solution: Board, params: SolverParams) -> Self {
        Self {
            solution,
            params,
            assignment: Assignment::default(),
            state: SolverState::NoMatch,
        }
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn solution(&self) -> &Board {
        &self.solution
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Replace the current correspondence. The state is settled against the
    /// measured board on the next [`Solver::take_turn`] or [`Solver::evaluate`].
    pub fn set_match(&mut self, assignment: Assignment) {
        self.state = if assignment.is_empty() {
            SolverState::NoMatch
        } else {
            SolverState::Active
        };
        self.assignment = assignment;
    }

    /// Pose error of one pair against the measured board.
    pub fn pair_error(
        &self,
        measured: &Board,
        pair: &Correspondence,
    ) -> Result<PairError, SolverError> {
        let m = measured.get(pair.measured).ok_or(SolverError::UnknownPiece {
            side: BoardSide::Measured,
            piece: pair.measured,
        })?;
        let s = self.solution.get(pair.solution).ok_or(SolverError::UnknownPiece {
            side: BoardSide::Solution,
            piece: pair.solution,
        })?;
        let effective = pair.rotation.unwrap_or(0.0) + m.orientation();
        Ok(PairError {
            measured: pair.measured,
            solution: pair.solution,
            angle: wrap_degrees(effective - s.orientation()),
            distance: (m.location() - s.location()).norm(),
        })
    }

    /// Current state of the measured board without acting on it.
    pub fn evaluate(&self, measured: &Board) -> Result<SolverState, SolverError> {
        if self.assignment.is_empty() {
            return Ok(SolverState::NoMatch);
        }
        Ok(match self.next_action(measured)? {
            Some(_) => SolverState::Active,
            None => SolverState::Solved,
        })
    }

    /// Apply at most one action to `measured`. A rotation is preferred over a
    /// move for the same piece; once solved, calls leave the board untouched.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(pairs = self.assignment.len()))
    )]
    pub fn take_turn(&mut self, measured: &mut Board) -> Result<Turn, SolverError> {
        if self.assignment.is_empty() {
            self.state = SolverState::NoMatch;
            log::debug!("no correspondence; waiting for a new measurement");
            return Ok(self.turn(None));
        }

        let Some(action) = self.next_action(measured)? else {
            self.state = SolverState::Solved;
            return Ok(self.turn(None));
        };

        let piece = measured
            .get_mut(action.piece())
            .ok_or(SolverError::UnknownPiece {
                side: BoardSide::Measured,
                piece: action.piece(),
            })?;
        action.apply(piece);
        log::info!("applied {action:?}");

        self.state = self.evaluate(measured)?;
        Ok(self.turn(Some(action)))
    }

    fn turn(&self, action: Option<Action>) -> Turn {
        Turn {
            finished: self.state == SolverState::Solved,
            action,
            state: self.state,
        }
    }

    fn ordered_pairs(&self) -> Vec<&Correspondence> {
        let mut pairs: Vec<&Correspondence> = self.assignment.iter().collect();
        match self.params.order {
            SolveOrder::BySolutionId => pairs.sort_by_key(|c| c.solution),
            SolveOrder::ByScore => pairs.sort_by(|a, b| {
                a.score
                    .total_cmp(&b.score)
                    .then(a.solution.cmp(&b.solution))
            }),
        }
        pairs
    }

    fn next_action(&self, measured: &Board) -> Result<Option<Action>, SolverError> {
        for pair in self.ordered_pairs() {
            let err = self.pair_error(measured, pair)?;
            let target = self
                .solution
                .get(pair.solution)
                .ok_or(SolverError::UnknownPiece {
                    side: BoardSide::Solution,
                    piece: pair.solution,
                })?;
            if err.angle.abs() > self.params.tau_angle_deg {
                let rotation = pair.rotation.unwrap_or(0.0);
                return Ok(Some(Action::Rotate {
                    piece: pair.measured,
                    target: wrap_degrees(target.orientation() - rotation),
                }));
            }
            if err.distance > self.params.tau_dist {
                return Ok(Some(Action::Move {
                    piece: pair.measured,
                    target: target.location(),
                }));
            }
        }
        Ok(None)
    }
}
