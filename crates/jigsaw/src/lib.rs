//! High-level facade for the `jigsaw-*` workspace.
//!
//! This crate provides:
//! - re-exports of the piece model, builders, matchers and planner crates
//! - a JSON-configured solve session that loads a calibration and a measured
//!   board, runs the planner and reports every action
//! - (feature `image`) conversions between `image` buffers and the core raster types
//!
//! ## Quickstart
//!
//! ```no_run
//! use jigsaw::session::{solve, SolveConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SolveConfig::load_json("solve.json")?;
//! let report = solve(&config)?;
//! println!("{:?} after {} turns", report.state, report.turns.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `jigsaw::core`: pieces, boards, rasters, contours and edges.
//! - `jigsaw::builder`: arrangement / adjacency / grid calibration and persistence.
//! - `jigsaw::matcher`: moments, edge and keypoint match strategies.
//! - `jigsaw::solver`: correspondence manager, solver state machine and planner.
//! - `jigsaw::convert` (feature `image`): `image` crate interop.

pub use jigsaw_builder as builder;
pub use jigsaw_core as core;
pub use jigsaw_matcher as matcher;
pub use jigsaw_solver as solver;

pub use jigsaw_builder::{Arrangement, BuildLevel, BuildParams};
pub use jigsaw_core::{Board, Piece, PieceId, PieceKind};
pub use jigsaw_matcher::Matcher;
pub use jigsaw_solver::{Planner, SolverState, Turn};

pub mod session;

#[cfg(feature = "image")]
pub mod convert;
