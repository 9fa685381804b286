//! Top-level solver facade: algorithm selection, cancellation, statistics.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mapfm_core::{Path, Problem};
use thiserror::Error;
use tracing::info;

use crate::{heuristic_matching, matching_id};

/// Which matching strategy drives the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Evaluate every goal assignment in enumeration order.
    ExhaustiveMatching,
    /// Evaluate goal assignments ordered by initial heuristic.
    ExhaustiveMatchingSorting,
    /// Sorted assignments plus independence detection across color teams.
    ExhaustiveMatchingSortingId,
    /// No enumeration; any same-color goal satisfies an agent.
    HeuristicMatching,
}

impl Algorithm {
    fn label(self) -> &'static str {
        match self {
            Algorithm::ExhaustiveMatching => "EPEA* (exhaustive matching)",
            Algorithm::ExhaustiveMatchingSorting => "EPEA* (exhaustive matching with sorting)",
            Algorithm::ExhaustiveMatchingSortingId => {
                "EPEA* (exhaustive matching with sorting and matching ID)"
            }
            Algorithm::HeuristicMatching => "EPEA* (heuristic matching)",
        }
    }
}

/// Full solver configuration.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub algorithm: Algorithm,
    /// Decompose each assignment's agents into conflict-coupled groups.
    pub independence_detection: bool,
    /// Bound for the sorted-matching queue. `None` holds every pending
    /// assignment; a bound trades memory for a shuffled, possibly less
    /// favorable evaluation order.
    pub queue_capacity: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::ExhaustiveMatchingSortingId,
            independence_detection: true,
            queue_capacity: None,
        }
    }
}

impl SolverConfig {
    pub(crate) fn sorting(&self) -> bool {
        matches!(
            self.algorithm,
            Algorithm::ExhaustiveMatchingSorting | Algorithm::ExhaustiveMatchingSortingId
        )
    }

    /// Human-readable algorithm description.
    pub fn describe(&self) -> String {
        if self.independence_detection {
            format!("{} with ID", self.algorithm.label())
        } else {
            self.algorithm.label().to_string()
        }
    }
}

/// Cooperative cancellation handle shared between the solver and its host.
/// The solver polls it between node expansions and abandons the search with
/// [`SolveError::Cancelled`]; it never returns a partial result.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Errors that abort a solve. "No solution" is not an error; it is the
/// `None` payload of a successful solve.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("solve cancelled by host")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

/// Counters accumulated over one solve.
#[derive(Debug, Clone)]
pub struct SolveStats {
    /// Goal assignments handed to a sub-solver.
    pub assignments_evaluated: u64,
    /// Largest agent group any merge produced.
    pub max_group_size: usize,
    /// EPEA* node expansions across all sub-solves.
    pub nodes_expanded: u64,
}

impl Default for SolveStats {
    fn default() -> Self {
        Self {
            assignments_evaluated: 0,
            max_group_size: 1,
            nodes_expanded: 0,
        }
    }
}

impl SolveStats {
    pub(crate) fn assignment_evaluated(&mut self) {
        self.assignments_evaluated += 1;
    }

    pub(crate) fn group_merged(&mut self, size: usize) {
        self.max_group_size = self.max_group_size.max(size);
    }
}

impl fmt::Display for SolveStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} assignments evaluated, max group size {}, {} nodes expanded",
            self.assignments_evaluated, self.max_group_size, self.nodes_expanded
        )
    }
}

/// A complete plan: one path per agent, all padded to the same horizon.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Paths indexed by agent identifier.
    pub paths: Vec<Path>,
    /// Sum of individual costs.
    pub cost: u32,
    pub stats: SolveStats,
}

/// Solves MAPFM problems with the configured algorithm.
pub struct Solver<'a> {
    problem: &'a Problem,
    config: SolverConfig,
}

impl<'a> Solver<'a> {
    pub fn new(problem: &'a Problem, config: SolverConfig) -> Self {
        Self { problem, config }
    }

    /// Run the solver to completion or cancellation.
    ///
    /// `Ok(None)` means the instance has no solution; an improving solution
    /// found before cancellation is *not* returned, results are atomic.
    pub fn solve(&self, cancel: &CancelToken) -> Result<Option<Solution>, SolveError> {
        let mut stats = SolveStats::default();
        info!(algorithm = %self.config.describe(), agents = self.problem.agent_count(), "solving");

        let paths = match self.config.algorithm {
            Algorithm::HeuristicMatching => {
                heuristic_matching::solve(self.problem, &self.config, cancel, &mut stats)?
            }
            Algorithm::ExhaustiveMatchingSortingId => {
                matching_id::solve_with_matching_id(self.problem, &self.config, cancel, &mut stats)?
            }
            Algorithm::ExhaustiveMatching | Algorithm::ExhaustiveMatchingSorting => {
                matching_id::solve_single_group(self.problem, &self.config, cancel, &mut stats)?
            }
        };

        Ok(paths.map(|paths| assemble(paths, stats)))
    }
}

/// Order paths by agent, pad them to a common horizon, and price the plan.
fn assemble(mut paths: Vec<Path>, stats: SolveStats) -> Solution {
    paths.sort_by_key(|path| path.identifier);
    let horizon = paths.iter().map(Path::len).max().unwrap_or(0);
    for path in &mut paths {
        path.pad_to(horizon);
    }
    let cost = paths.iter().map(Path::cost).sum();
    Solution { paths, cost, stats }
}
