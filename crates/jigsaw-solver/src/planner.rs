use jigsaw_builder::Arrangement;
use jigsaw_core::Board;
use jigsaw_matcher::Matcher;

use crate::error::{ManagerError, PlanError};
use crate::manager::{Assignment, Manager, ManagerParams};
use crate::solver::{Solver, SolverParams, SolverState, Turn};

/// Matches a measured board and takes one solver turn per call.
#[derive(Clone, Debug)]
pub struct Planner {
    manager: Manager,
    solver: Solver,
}

impl Planner {
    pub fn new(manager: Manager, solver: Solver) -> Self {
        Self { manager, solver }
    }

    /// Planner whose tolerances come from a calibration arrangement.
    pub fn from_arrangement(
        arrangement: &Arrangement,
        matcher: Matcher,
        manager_params: ManagerParams,
    ) -> Result<Self, ManagerError> {
        let solution = arrangement.solution().clone();
        let solver_params = SolverParams {
            tau_dist: arrangement.params().tau_dist,
            tau_angle_deg: arrangement.params().tau_angle_deg,
            ..SolverParams::default()
        };
        let manager = Manager::new(solution.clone(), matcher, manager_params)?;
        Ok(Self {
            manager,
            solver: Solver::new(solution, solver_params),
        })
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    pub fn state(&self) -> SolverState {
        self.solver.state()
    }

    /// The assignment used by the most recent turn.
    pub fn assignment(&self) -> &Assignment {
        self.solver.assignment()
    }

    /// Re-match `measured` from scratch, then take one turn on it.
    pub fn process(&mut self, measured: &mut Board) -> Result<Turn, PlanError> {
        let assignment = self.manager.process(measured)?;
        self.solver.set_match(assignment);
        Ok(self.solver.take_turn(measured)?)
    }

    /// Call [`Planner::process`] until solved, out of matches, or `max_turns`
    /// turns have run. Returns every turn taken.
    pub fn run(&mut self, measured: &mut Board, max_turns: usize) -> Result<Vec<Turn>, PlanError> {
        let mut turns = Vec::new();
        for _ in 0..max_turns {
            let turn = self.process(measured)?;
            turns.push(turn);
            if turn.finished || turn.state == SolverState::NoMatch {
                break;
            }
        }
        log::info!(
            "planner stopped after {} turns in state {:?}",
            turns.len(),
            self.solver.state()
        );
        Ok(turns)
    }
}
