//! Optimal solver for Multi-Agent Path Finding with Matching (MAPFM).
//!
//! Three layers compose into an anytime-improving optimal planner:
//! - an EPEA* joint-state search driven by precomputed operator selection
//!   tables ([`Pdb`]),
//! - an independence detection wrapper that only couples agents whose
//!   individual paths conflict,
//! - a matching enumerator that explores color-consistent goal assignments
//!   under a shrinking cost bound.
//!
//! The entry point is [`Solver`], configured with an [`Algorithm`] selector.

mod cat;
mod epea;
mod heuristic;
mod heuristic_matching;
mod independence;
mod mapf_problem;
mod matching;
mod matching_id;
mod operator_finder;
mod path_set;
mod pdb;
mod solver;
mod state;

pub use heuristic::Heuristic;
pub use pdb::{Pdb, PdbRow};
pub use solver::{
    Algorithm, CancelToken, Solution, SolveError, SolveStats, Solver, SolverConfig,
};

/// Cost sentinel for "unreachable" / "no bound".
pub(crate) const INFINITY: u32 = u32::MAX;
