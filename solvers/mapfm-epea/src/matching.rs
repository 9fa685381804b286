//! Exhaustive matching: enumerate color-consistent goal assignments.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use mapfm_core::{Coordinate, MarkedLocation, Path};
use rand::seq::SliceRandom;
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::cat::Cat;
use crate::epea::EpeaStar;
use crate::heuristic::Heuristic;
use crate::independence::IdSolver;
use crate::mapf_problem::MapfProblem;
use crate::path_set::Group;
use crate::pdb::Pdb;
use crate::solver::{CancelToken, SolveError, SolveStats, SolverConfig};
use crate::state::Agent;
use crate::INFINITY;

/// A goal assignment ranked by its initial heuristic. Ordered worst-first so
/// it can live in a max-heap that pops the most promising assignment via
/// [`Reverse`](std::cmp::Reverse).
#[derive(Debug, Clone, PartialEq, Eq)]
struct GoalAssignment {
    goal_ids: Vec<u32>,
    initial_heuristic: u32,
}

impl Ord for GoalAssignment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.initial_heuristic
            .cmp(&other.initial_heuristic)
            // Deterministic among equal heuristics.
            .then_with(|| self.goal_ids.cmp(&other.goal_ids))
    }
}

impl PartialOrd for GoalAssignment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Streams all bijective assignments as a Cartesian product over each
/// agent's same-color goal candidates, filtering selections that reuse a
/// goal.
struct AssignmentIter<'a> {
    candidates: &'a [Vec<u32>],
    indices: Vec<usize>,
    exhausted: bool,
}

impl<'a> AssignmentIter<'a> {
    fn new(candidates: &'a [Vec<u32>]) -> Self {
        Self {
            candidates,
            indices: vec![0; candidates.len()],
            exhausted: candidates.iter().any(|c| c.is_empty()),
        }
    }

    fn advance(&mut self) {
        let mut digit = self.candidates.len();
        loop {
            if digit == 0 {
                self.exhausted = true;
                return;
            }
            digit -= 1;
            self.indices[digit] += 1;
            if self.indices[digit] < self.candidates[digit].len() {
                return;
            }
            self.indices[digit] = 0;
        }
    }
}

impl Iterator for AssignmentIter<'_> {
    type Item = Vec<u32>;

    fn next(&mut self) -> Option<Vec<u32>> {
        while !self.exhausted {
            let assignment: Vec<u32> = self
                .indices
                .iter()
                .zip(self.candidates)
                .map(|(&i, c)| c[i])
                .collect();
            self.advance();

            let mut used = FxHashSet::default();
            if assignment.iter().all(|goal| used.insert(*goal)) {
                return Some(assignment);
            }
        }
        None
    }
}

/// Finds the optimal solution for one agent group by evaluating every goal
/// assignment, carrying the best cost found so far as the ceiling for all
/// later evaluations.
pub(crate) struct ExhaustiveMatchingSolver<'a> {
    problem: MapfProblem<'a>,
    grid_width: u32,
    grid_height: u32,
    /// Group agents with their team colors.
    agents: Vec<Agent>,
    /// Goal ids of matching color, per agent.
    candidates: Vec<Vec<u32>>,
    config: &'a SolverConfig,
    outer_cat: Option<&'a Cat>,
    cancel: &'a CancelToken,
}

impl<'a> ExhaustiveMatchingSolver<'a> {
    /// `indexed_goals` carry the goal's position in the list as their color,
    /// so a search for an assignment can bind each agent to one specific
    /// goal; `team_goals` keep the original colors for candidate matching.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        indexed_goals: &'a [MarkedLocation],
        team_goals: &[MarkedLocation],
        starts: &[MarkedLocation],
        group: &Group,
        pdb: &'a Pdb,
        heuristic: &'a Heuristic,
        grid_width: u32,
        grid_height: u32,
        config: &'a SolverConfig,
        outer_cat: Option<&'a Cat>,
        cancel: &'a CancelToken,
    ) -> Self {
        let agents: Vec<Agent> = group
            .ids()
            .iter()
            .map(|&id| {
                let start = &starts[id as usize];
                Agent::new(Coordinate::new(start.x, start.y), start.color, id)
            })
            .collect();
        let candidates = agents
            .iter()
            .map(|agent| {
                team_goals
                    .iter()
                    .enumerate()
                    .filter(|(_, goal)| goal.color == agent.color)
                    .map(|(id, _)| id as u32)
                    .collect()
            })
            .collect();
        Self {
            problem: MapfProblem::new(indexed_goals, pdb, heuristic),
            grid_width,
            grid_height,
            agents,
            candidates,
            config,
            outer_cat,
            cancel,
        }
    }

    pub fn solve(
        &self,
        stats: &mut SolveStats,
    ) -> Result<Option<(Vec<Path>, u32)>, SolveError> {
        if self.config.sorting() {
            self.sorted_solve(stats)
        } else {
            self.default_solve(stats)
        }
    }

    /// Evaluate assignments in enumeration order.
    fn default_solve(
        &self,
        stats: &mut SolveStats,
    ) -> Result<Option<(Vec<Path>, u32)>, SolveError> {
        let mut min_cost = INFINITY;
        let mut best = None;

        for goal_ids in AssignmentIter::new(&self.candidates) {
            let initial_heuristic = self.initial_heuristic(&goal_ids);
            if initial_heuristic >= min_cost {
                continue;
            }
            if let Some((paths, cost)) = self.evaluate(&goal_ids, min_cost, stats)? {
                if cost < min_cost {
                    min_cost = cost;
                    best = Some(paths);
                }
            }
        }
        Ok(best.map(|paths| (paths, min_cost)))
    }

    /// Evaluate assignments in order of their initial heuristic, so cheap
    /// matchings shrink the ceiling before expensive ones are attempted.
    ///
    /// A bounded queue holds the `queue_capacity` most promising pending
    /// assignments; the stream is shuffled first in that case so the queue
    /// is not biased toward early-enumerated teams.
    fn sorted_solve(
        &self,
        stats: &mut SolveStats,
    ) -> Result<Option<(Vec<Path>, u32)>, SolveError> {
        use std::cmp::Reverse;

        let mut min_cost = INFINITY;
        let mut best = None;
        let mut pending: BinaryHeap<Reverse<GoalAssignment>> = BinaryHeap::new();

        let stream: Box<dyn Iterator<Item = Vec<u32>>> = match self.config.queue_capacity {
            Some(_) => {
                let mut all: Vec<Vec<u32>> = AssignmentIter::new(&self.candidates).collect();
                all.shuffle(&mut rand::thread_rng());
                Box::new(all.into_iter())
            }
            None => Box::new(AssignmentIter::new(&self.candidates)),
        };
        let capacity = self.config.queue_capacity.unwrap_or(usize::MAX);

        for goal_ids in stream {
            let initial_heuristic = self.initial_heuristic(&goal_ids);
            if initial_heuristic >= min_cost {
                continue;
            }
            pending.push(Reverse(GoalAssignment { goal_ids, initial_heuristic }));
            if pending.len() > capacity {
                let Reverse(next) = pending.pop().expect("queue is non-empty");
                if next.initial_heuristic >= min_cost {
                    continue;
                }
                if let Some((paths, cost)) = self.evaluate(&next.goal_ids, min_cost, stats)? {
                    if cost < min_cost {
                        min_cost = cost;
                        best = Some(paths);
                    }
                }
            }
        }

        while let Some(Reverse(next)) = pending.pop() {
            // Assignments pop in heuristic order: once the head cannot
            // improve the best cost, none of the rest can.
            if next.initial_heuristic >= min_cost {
                break;
            }
            if let Some((paths, cost)) = self.evaluate(&next.goal_ids, min_cost, stats)? {
                if cost < min_cost {
                    min_cost = cost;
                    best = Some(paths);
                }
            }
        }
        Ok(best.map(|paths| (paths, min_cost)))
    }

    /// Solve one assignment under the current best cost as the ceiling.
    fn evaluate(
        &self,
        goal_ids: &[u32],
        min_cost: u32,
        stats: &mut SolveStats,
    ) -> Result<Option<(Vec<Path>, u32)>, SolveError> {
        stats.assignment_evaluated();
        trace!(?goal_ids, ceiling = min_cost, "evaluating goal assignment");

        // Bind each agent to its assigned goal by recoloring it with the
        // goal's index color.
        let agents: Vec<Agent> = self
            .agents
            .iter()
            .zip(goal_ids)
            .map(|(agent, &goal_id)| Agent::new(agent.coord, goal_id, agent.identifier))
            .collect();

        let result = if self.config.independence_detection {
            IdSolver::new(
                &self.problem,
                self.outer_cat,
                self.grid_width,
                self.grid_height,
                min_cost,
                self.cancel,
            )
            .solve(&agents, stats)?
        } else {
            let exclude: Vec<u32> = agents.iter().map(|agent| agent.identifier).collect();
            let cats: Vec<&Cat> = self.outer_cat.into_iter().collect();
            EpeaStar::new(&self.problem, cats, &exclude, min_cost, self.cancel)
                .solve(&agents, stats)?
        };
        if let Some((_, cost)) = &result {
            debug!(cost, "assignment solved");
        }
        Ok(result)
    }

    /// Lower bound of an assignment: each agent pays its starting timestep
    /// plus the distance to its assigned goal.
    fn initial_heuristic(&self, goal_ids: &[u32]) -> u32 {
        self.agents
            .iter()
            .zip(goal_ids)
            .fold(0u32, |total, (agent, &goal_id)| {
                total
                    .saturating_add(1)
                    .saturating_add(self.problem.heuristic.get(goal_id, agent.coord))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn iterates_unique_assignments_only() {
        let candidates = vec![vec![0, 1], vec![0, 1]];
        let assignments: Vec<Vec<u32>> = AssignmentIter::new(&candidates).collect();
        assert_eq!(assignments, vec![vec![0, 1], vec![1, 0]]);
    }

    #[test]
    fn mixed_teams_cross_products() {
        let candidates = vec![vec![0], vec![1, 2], vec![1, 2]];
        let assignments: Vec<Vec<u32>> = AssignmentIter::new(&candidates).collect();
        assert_eq!(assignments, vec![vec![0, 1, 2], vec![0, 2, 1]]);
    }

    #[test]
    fn empty_candidate_list_yields_nothing() {
        let candidates = vec![vec![0], vec![]];
        assert_eq!(AssignmentIter::new(&candidates).count(), 0);
    }

    #[test]
    fn assignments_order_by_heuristic_then_ids() {
        let cheap = GoalAssignment { goal_ids: vec![1, 0], initial_heuristic: 3 };
        let dear = GoalAssignment { goal_ids: vec![0, 1], initial_heuristic: 5 };
        assert!(cheap < dear);
        let tied = GoalAssignment { goal_ids: vec![2, 0], initial_heuristic: 3 };
        assert!(cheap < tied);
    }
}
