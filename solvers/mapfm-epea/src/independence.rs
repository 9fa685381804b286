//! Independence detection: solve agents separately, merge on conflict.

use mapfm_core::Path;
use tracing::debug;

use crate::cat::Cat;
use crate::epea::EpeaStar;
use crate::mapf_problem::MapfProblem;
use crate::path_set::{Group, PathSet};
use crate::solver::{CancelToken, SolveError, SolveStats};
use crate::state::Agent;

/// Solves a fixed goal assignment by decomposing the agents into
/// conflict-coupled groups.
///
/// Each agent is first planned alone; whenever two groups' paths conflict
/// the groups merge and are re-planned jointly under the cost that the
/// remaining groups leave available.
pub(crate) struct IdSolver<'a> {
    problem: &'a MapfProblem<'a>,
    /// Paths fixed outside this run (other matching-level groups), counted
    /// into the tie-breaker only.
    outer_cat: Option<&'a Cat>,
    grid_width: u32,
    grid_height: u32,
    max_cost: u32,
    cancel: &'a CancelToken,
}

impl<'a> IdSolver<'a> {
    pub fn new(
        problem: &'a MapfProblem<'a>,
        outer_cat: Option<&'a Cat>,
        grid_width: u32,
        grid_height: u32,
        max_cost: u32,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            problem,
            outer_cat,
            grid_width,
            grid_height,
            max_cost,
            cancel,
        }
    }

    pub fn solve(
        &self,
        agents: &[Agent],
        stats: &mut SolveStats,
    ) -> Result<Option<(Vec<Path>, u32)>, SolveError> {
        let mut path_set = PathSet::new(
            agents.to_vec(),
            self.problem.heuristic,
            self.grid_width,
            self.grid_height,
        );
        let mut groups: Vec<(Group, u32)> = Vec::new();

        // Individual solves. Each agent's ceiling is what the others leave
        // over, with unsolved agents at their heuristic lower bound.
        for agent in agents {
            let ceiling = path_set.remaining_cost(&[agent.identifier], self.max_cost);
            let solution = self
                .joint_solve(&[*agent], &path_set, ceiling, stats)?;
            let Some((paths, cost)) = solution else {
                return Ok(None);
            };
            groups.push((Group::new(vec![agent.identifier]), cost));
            path_set.update(paths);
        }
        if total_cost(&groups) >= self.max_cost {
            return Ok(None);
        }

        // Merge conflicting groups until the paths coexist.
        while let Some((a, b)) = path_set.find_conflict() {
            let index_a = position_of(&groups, a);
            let index_b = position_of(&groups, b);
            let merged = groups[index_a].0.combine(&groups[index_b].0);
            debug!(agents = ?merged.ids(), "merging conflicting groups");
            groups.remove(index_a.max(index_b));
            groups.remove(index_a.min(index_b));
            stats.group_merged(merged.len());

            let ceiling = self
                .max_cost
                .saturating_sub(total_cost(&groups));
            let merged_agents: Vec<Agent> = agents
                .iter()
                .filter(|agent| merged.contains(agent.identifier))
                .copied()
                .collect();
            let solution = self.joint_solve(&merged_agents, &path_set, ceiling, stats)?;
            let Some((paths, cost)) = solution else {
                return Ok(None);
            };
            groups.push((merged, cost));
            path_set.update(paths);
        }

        let cost = total_cost(&groups);
        Ok(Some((path_set.into_paths(), cost)))
    }

    fn joint_solve(
        &self,
        agents: &[Agent],
        path_set: &PathSet<'_>,
        max_cost: u32,
        stats: &mut SolveStats,
    ) -> Result<Option<(Vec<Path>, u32)>, SolveError> {
        let exclude: Vec<u32> = agents.iter().map(|agent| agent.identifier).collect();
        let mut cats: Vec<&Cat> = vec![&path_set.cat];
        if let Some(outer) = self.outer_cat {
            cats.push(outer);
        }
        EpeaStar::new(self.problem, cats, &exclude, max_cost, self.cancel).solve(agents, stats)
    }
}

fn total_cost(groups: &[(Group, u32)]) -> u32 {
    groups
        .iter()
        .fold(0u32, |total, (_, cost)| total.saturating_add(*cost))
}

fn position_of(groups: &[(Group, u32)], agent_id: u32) -> usize {
    groups
        .iter()
        .position(|(group, _)| group.contains(agent_id))
        .expect("conflicting agent belongs to a group")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::Heuristic;
    use crate::pdb::Pdb;
    use crate::INFINITY;
    use mapfm_core::{Coordinate, Grid, MarkedLocation};
    use pretty_assertions::assert_eq;

    struct Fixture {
        grid: Grid,
        goals: Vec<MarkedLocation>,
        heuristic: Heuristic,
        pdb: Pdb,
    }

    impl Fixture {
        fn new(grid: Grid, goals: Vec<MarkedLocation>) -> Self {
            let heuristic = Heuristic::new(&grid, &goals);
            let pdb = Pdb::new(&heuristic, &grid);
            Self { grid, goals, heuristic, pdb }
        }

        fn solve(&self, agents: &[Agent], stats: &mut SolveStats) -> Option<(Vec<Path>, u32)> {
            let problem = MapfProblem::new(&self.goals, &self.pdb, &self.heuristic);
            let cancel = CancelToken::new();
            IdSolver::new(
                &problem,
                None,
                self.grid.width(),
                self.grid.height(),
                INFINITY,
                &cancel,
            )
            .solve(agents, stats)
            .unwrap()
        }
    }

    #[test]
    fn independent_agents_stay_singletons() {
        let fixture = Fixture::new(
            Grid::open(5, 5),
            vec![MarkedLocation::new(4, 4, 0), MarkedLocation::new(0, 0, 1)],
        );
        let agents = [
            Agent::new(Coordinate::new(0, 0), 0, 0),
            Agent::new(Coordinate::new(4, 4), 1, 1),
        ];
        let mut stats = SolveStats::default();
        let (paths, _) = fixture.solve(&agents, &mut stats).expect("solvable");
        assert_eq!(stats.max_group_size, 1, "no merge should happen");
        assert_eq!(paths[0].cost() + paths[1].cost(), 16);
    }

    #[test]
    fn conflicting_agents_get_merged() {
        // Both agents cross the middle of a 3x3 grid at the same time.
        let fixture = Fixture::new(
            Grid::open(3, 3),
            vec![MarkedLocation::new(2, 1, 0), MarkedLocation::new(1, 2, 1)],
        );
        let agents = [
            Agent::new(Coordinate::new(0, 1), 0, 0),
            Agent::new(Coordinate::new(1, 0), 1, 1),
        ];
        let mut stats = SolveStats::default();
        let (paths, _) = fixture.solve(&agents, &mut stats).expect("solvable");
        assert!(!paths[0].conflicts(&paths[1]));
    }

    #[test]
    fn infeasible_merge_returns_none() {
        let fixture = Fixture::new(
            Grid::open(3, 1),
            vec![MarkedLocation::new(2, 0, 0), MarkedLocation::new(0, 0, 1)],
        );
        let agents = [
            Agent::new(Coordinate::new(0, 0), 0, 0),
            Agent::new(Coordinate::new(2, 0), 1, 1),
        ];
        let mut stats = SolveStats::default();
        assert!(fixture.solve(&agents, &mut stats).is_none());
    }
}
