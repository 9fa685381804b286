//! Heuristic matching: solve without enumerating assignments.
//!
//! Agents keep their team colors and the goal test accepts any same-color
//! goal, so the joint search resolves the matching implicitly while it
//! plans. One EPEA*/ID run replaces the whole enumeration.

use mapfm_core::{Coordinate, Path, Problem};

use crate::epea::EpeaStar;
use crate::heuristic::Heuristic;
use crate::independence::IdSolver;
use crate::mapf_problem::MapfProblem;
use crate::pdb::Pdb;
use crate::solver::{CancelToken, SolveError, SolveStats, SolverConfig};
use crate::state::Agent;
use crate::INFINITY;

pub(crate) fn solve(
    problem: &Problem,
    config: &SolverConfig,
    cancel: &CancelToken,
    stats: &mut SolveStats,
) -> Result<Option<Vec<Path>>, SolveError> {
    let grid = problem.grid();
    let heuristic = Heuristic::new(grid, problem.goals());
    let pdb = Pdb::new(&heuristic, grid);
    let mapf = MapfProblem::new(problem.goals(), &pdb, &heuristic);

    let agents: Vec<Agent> = problem
        .starts()
        .iter()
        .enumerate()
        .map(|(id, start)| {
            Agent::new(Coordinate::new(start.x, start.y), start.color, id as u32)
        })
        .collect();

    let solution = if config.independence_detection {
        IdSolver::new(&mapf, None, grid.width(), grid.height(), INFINITY, cancel)
            .solve(&agents, stats)?
    } else {
        let exclude: Vec<u32> = agents.iter().map(|agent| agent.identifier).collect();
        EpeaStar::new(&mapf, Vec::new(), &exclude, INFINITY, cancel).solve(&agents, stats)?
    };
    Ok(solution.map(|(paths, _)| paths))
}
