//! Matching-level independence detection over color teams.
//!
//! The same merge-on-conflict shape as agent-level ID, but a "group" is a
//! whole color team and a "solve" is a full matching enumeration: teams
//! whose best matchings do not interfere never pay for each other's
//! assignment combinatorics.

use mapfm_core::{MarkedLocation, Path, Problem};
use tracing::debug;

use crate::cat::Cat;
use crate::heuristic::Heuristic;
use crate::matching::ExhaustiveMatchingSolver;
use crate::path_set::{Group, Groups};
use crate::pdb::Pdb;
use crate::solver::{CancelToken, SolveError, SolveStats, SolverConfig};

/// Paths of all agents across matching-level groups, with the shared CAT
/// that biases later group solves away from earlier groups' paths.
struct GroupPathSet {
    groups: Groups,
    paths: Vec<Option<Path>>,
    cat: Cat,
}

impl GroupPathSet {
    fn new(agent_count: usize, width: u32, height: u32, teams: Vec<Group>) -> Self {
        Self {
            groups: Groups::new(teams),
            paths: vec![None; agent_count],
            cat: Cat::new(width, height),
        }
    }

    /// Merge all size-1 teams into a single group. A one-agent team has
    /// exactly one matching, so enumerating it separately buys nothing; one
    /// joint ID solve handles the singletons.
    fn merge_singleton_teams(&mut self) {
        let singletons: Vec<u32> = self
            .groups
            .iter()
            .filter(|group| group.len() == 1)
            .map(|group| group.ids()[0])
            .collect();
        if let Some((&first, rest)) = singletons.split_first() {
            for &other in rest {
                self.groups.combine_containing(first, other);
            }
        }
    }

    fn update(&mut self, new_paths: Vec<Path>) {
        for path in new_paths {
            let i = path.identifier as usize;
            if let Some(old) = &self.paths[i] {
                self.cat.remove(old);
            }
            self.cat.add(&path);
            self.paths[i] = Some(path);
        }
    }

    /// Drop the stored paths of a group about to be re-solved, so its own
    /// stale paths do not skew the CAT counts of the new search.
    fn clear(&mut self, agent_ids: &[u32]) {
        for &id in agent_ids {
            if let Some(old) = self.paths[id as usize].take() {
                self.cat.remove(&old);
            }
        }
    }

    fn find_conflict(&self) -> Option<(u32, u32)> {
        for i in 0..self.paths.len() {
            for j in (i + 1)..self.paths.len() {
                if let (Some(a), Some(b)) = (&self.paths[i], &self.paths[j]) {
                    if a.conflicts(b) {
                        return Some((a.identifier, b.identifier));
                    }
                }
            }
        }
        None
    }

    fn into_paths(self) -> Vec<Path> {
        self.paths
            .into_iter()
            .map(|path| path.expect("every agent has a path once solving finished"))
            .collect()
    }
}

/// Shared precomputed context for exhaustive matching solves.
pub(crate) struct MatchingContext {
    /// Goals recolored with their list index, one effective color per goal.
    indexed_goals: Vec<MarkedLocation>,
    heuristic: Heuristic,
    pdb: Pdb,
}

impl MatchingContext {
    /// Build the per-goal heuristic and PDB tables, shared by every
    /// matching evaluated for this problem.
    pub fn new(problem: &Problem) -> Self {
        let indexed_goals: Vec<MarkedLocation> = problem
            .goals()
            .iter()
            .enumerate()
            .map(|(i, goal)| MarkedLocation::new(goal.x, goal.y, i as u32))
            .collect();
        let heuristic = Heuristic::new(problem.grid(), &indexed_goals);
        let pdb = Pdb::new(&heuristic, problem.grid());
        Self { indexed_goals, heuristic, pdb }
    }

    fn solver<'a>(
        &'a self,
        problem: &'a Problem,
        group: &Group,
        config: &'a SolverConfig,
        outer_cat: Option<&'a Cat>,
        cancel: &'a CancelToken,
    ) -> ExhaustiveMatchingSolver<'a> {
        ExhaustiveMatchingSolver::new(
            &self.indexed_goals,
            problem.goals(),
            problem.starts(),
            group,
            &self.pdb,
            &self.heuristic,
            problem.grid().width(),
            problem.grid().height(),
            config,
            outer_cat,
            cancel,
        )
    }
}

/// Solve all agents as one matching group.
pub(crate) fn solve_single_group(
    problem: &Problem,
    config: &SolverConfig,
    cancel: &CancelToken,
    stats: &mut SolveStats,
) -> Result<Option<Vec<Path>>, SolveError> {
    let context = MatchingContext::new(problem);
    let group = Group::new((0..problem.agent_count() as u32).collect());
    let solver = context.solver(problem, &group, config, None, cancel);
    Ok(solver.solve(stats)?.map(|(paths, _)| paths))
}

/// Solve each color team's matching independently, merging teams whose
/// paths conflict.
pub(crate) fn solve_with_matching_id(
    problem: &Problem,
    config: &SolverConfig,
    cancel: &CancelToken,
    stats: &mut SolveStats,
) -> Result<Option<Vec<Path>>, SolveError> {
    let context = MatchingContext::new(problem);

    let mut colors: Vec<u32> = problem.starts().iter().map(|start| start.color).collect();
    colors.sort_unstable();
    colors.dedup();
    let teams: Vec<Group> = colors
        .iter()
        .map(|&color| {
            Group::new(
                problem
                    .starts()
                    .iter()
                    .enumerate()
                    .filter(|(_, start)| start.color == color)
                    .map(|(id, _)| id as u32)
                    .collect(),
            )
        })
        .collect();

    let grid = problem.grid();
    let mut path_set = GroupPathSet::new(problem.agent_count(), grid.width(), grid.height(), teams);
    path_set.merge_singleton_teams();

    let initial_groups: Vec<Group> = path_set.groups.iter().cloned().collect();
    for group in &initial_groups {
        let solution = {
            let solver = context.solver(problem, group, config, Some(&path_set.cat), cancel);
            solver.solve(stats)?
        };
        let Some((paths, _)) = solution else {
            return Ok(None);
        };
        path_set.update(paths);
    }

    while let Some((a, b)) = path_set.find_conflict() {
        let merged = path_set.groups.combine_containing(a, b);
        debug!(agents = ?merged.ids(), "merging conflicting matching groups");
        stats.group_merged(merged.len());
        path_set.clear(merged.ids());
        let solution = {
            let solver = context.solver(problem, &merged, config, Some(&path_set.cat), cancel);
            solver.solve(stats)?
        };
        let Some((paths, _)) = solution else {
            return Ok(None);
        };
        path_set.update(paths);
    }

    Ok(Some(path_set.into_paths()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapfm_core::{Grid, MarkedLocation};
    use pretty_assertions::assert_eq;

    #[test]
    fn singleton_teams_merge_into_one_group() {
        let mut path_set = GroupPathSet::new(
            4,
            4,
            4,
            vec![
                Group::new(vec![0]),
                Group::new(vec![1, 2]),
                Group::new(vec![3]),
            ],
        );
        path_set.merge_singleton_teams();
        let mut sizes: Vec<usize> = path_set.groups.iter().map(|g| g.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![2, 2]);
    }

    #[test]
    fn matching_context_indexes_goal_colors() {
        let problem = Problem::new(
            Grid::open(3, 1),
            vec![MarkedLocation::new(0, 0, 5), MarkedLocation::new(2, 0, 5)],
            vec![MarkedLocation::new(1, 0, 5), MarkedLocation::new(2, 0, 5)],
        )
        .unwrap();
        let context = MatchingContext::new(&problem);
        assert_eq!(context.indexed_goals[0].color, 0);
        assert_eq!(context.indexed_goals[1].color, 1);
    }
}
