//! Correspondence and turn-based planning for jigsaw assembly.
//!
//! - [`Manager`] matches a measured [`jigsaw_core::Board`] against the
//!   calibrated solution with one [`jigsaw_matcher::Matcher`].
//! - [`Solver`] corrects one degree of freedom of one matched piece per turn.
//! - [`Planner`] chains the two for a live loop; [`frame_slot`] hands the
//!   newest measured board from a capture thread to the planning thread.

mod error;
mod frame;
mod manager;
mod planner;
mod solver;

pub use error::{BoardSide, ManagerError, PlanError, SolverError};
pub use frame::{frame_slot, FrameReceiver, FrameSender};
pub use manager::{Assignment, AssignmentStrategy, Correspondence, Manager, ManagerParams};
pub use planner::Planner;
pub use solver::{Action, PairError, SolveOrder, Solver, SolverParams, SolverState, Turn};
