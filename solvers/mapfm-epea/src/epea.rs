//! Enhanced Partial-Expansion A* over joint states.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use mapfm_core::{Coordinate, Path};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::cat::Cat;
use crate::mapf_problem::MapfProblem;
use crate::solver::{CancelToken, SolveError, SolveStats};
use crate::state::{Agent, State};
use crate::INFINITY;

/// Search node. Nodes live in an append-only arena; parents are arena
/// indices, walked backwards for path reconstruction.
struct Node {
    state: State,
    cost: u32,
    heuristic: u32,
    collisions: u32,
    /// F(n) = cost + heuristic + delta_f; grows as the node is re-expanded.
    value: u32,
    delta_f: u32,
    time: u32,
    parent: Option<u32>,
}

/// Frontier entry. `seq` is a monotonic insertion counter so that ties
/// resolve deterministically for identical inputs.
#[derive(PartialEq, Eq)]
struct HeapEntry {
    value: u32,
    collisions: u32,
    heuristic: u32,
    seq: u64,
    node: u32,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap on (value, collisions, heuristic, seq).
        (other.value, other.collisions, other.heuristic, other.seq).cmp(&(
            self.value,
            self.collisions,
            self.heuristic,
            self.seq,
        ))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One EPEA* invocation: a single goal assignment, a fixed agent group, and
/// a cost ceiling below which a solution must stay.
pub(crate) struct EpeaStar<'a> {
    problem: &'a MapfProblem<'a>,
    /// Collision tables counted into the tie-breaker, usually the paths of
    /// agents outside this group.
    cats: Vec<&'a Cat>,
    /// Agent identifiers whose own entries are ignored in the tables.
    exclude: &'a [u32],
    max_cost: u32,
    cancel: &'a CancelToken,
}

impl<'a> EpeaStar<'a> {
    pub fn new(
        problem: &'a MapfProblem<'a>,
        cats: Vec<&'a Cat>,
        exclude: &'a [u32],
        max_cost: u32,
        cancel: &'a CancelToken,
    ) -> Self {
        Self { problem, cats, exclude, max_cost, cancel }
    }

    /// Solve for the given agents. `None` means no solution exists below the
    /// cost ceiling.
    pub fn solve(
        &self,
        agents: &[Agent],
        stats: &mut SolveStats,
    ) -> Result<Option<(Vec<Path>, u32)>, SolveError> {
        let mut arena: Vec<Node> = Vec::new();
        let mut frontier: BinaryHeap<HeapEntry> = BinaryHeap::new();
        let mut seen: FxHashSet<State> = FxHashSet::default();
        let mut fully_expanded: FxHashSet<State> = FxHashSet::default();
        let mut seq: u64 = 0;

        let initial_state = State::new(agents.to_vec());
        let initial_heuristic = self.problem.state_heuristic(&initial_state);
        // Every agent pays for the starting timestep.
        let initial_cost = agents.len() as u32;
        arena.push(Node {
            state: initial_state,
            cost: initial_cost,
            heuristic: initial_heuristic,
            collisions: 0,
            value: initial_cost.saturating_add(initial_heuristic),
            delta_f: 0,
            time: 0,
            parent: None,
        });
        frontier.push(HeapEntry {
            value: arena[0].value,
            collisions: 0,
            heuristic: initial_heuristic,
            seq,
            node: 0,
        });

        while let Some(entry) = frontier.pop() {
            if self.cancel.is_cancelled() {
                return Err(SolveError::Cancelled);
            }

            // The frontier is ordered, so once the best value reaches the
            // ceiling nothing below it remains.
            if entry.value >= self.max_cost {
                return Ok(None);
            }

            let node = entry.node as usize;
            if fully_expanded.contains(&arena[node].state) {
                continue;
            }

            // Goal test on dequeue: Δf re-insertion means a state's best F
            // can still drop while it sits in the frontier.
            if self.problem.is_solved(&arena[node].state) {
                let cost = arena[node].cost;
                debug!(cost, expanded = stats.nodes_expanded, "joint search solved");
                return Ok(Some((reconstruct(&arena, node, agents), cost)));
            }

            let (state, cost, delta_f, time, parent_collisions) = {
                let n = &arena[node];
                (n.state.clone(), n.cost, n.delta_f, n.time, n.collisions)
            };
            let (children, next_target) = self.problem.expand(&state, cost, delta_f)?;
            stats.nodes_expanded += 1;

            for (child_state, child_cost) in children {
                if child_state == state || seen.contains(&child_state) {
                    continue;
                }
                let heuristic = self.problem.state_heuristic(&child_state);
                // Collision counts accumulate along the chain, so among
                // equal-F nodes whole conflict-free paths win over paths
                // that merely end cleanly.
                let collisions = parent_collisions + self.count_collisions(&child_state, time + 1);
                seen.insert(child_state.clone());
                let index = arena.len() as u32;
                arena.push(Node {
                    state: child_state,
                    cost: child_cost,
                    heuristic,
                    collisions,
                    value: child_cost.saturating_add(heuristic),
                    delta_f: 0,
                    time: time + 1,
                    parent: Some(entry.node),
                });
                seq += 1;
                frontier.push(HeapEntry {
                    value: arena[index as usize].value,
                    collisions,
                    heuristic,
                    seq,
                    node: index,
                });
            }

            if next_target == INFINITY {
                fully_expanded.insert(state);
            } else if next_target < self.max_cost {
                let n = &mut arena[node];
                n.delta_f = next_target;
                n.value = n.cost.saturating_add(n.heuristic).saturating_add(next_target);
                seq += 1;
                frontier.push(HeapEntry {
                    value: n.value,
                    collisions: n.collisions,
                    heuristic: n.heuristic,
                    seq,
                    node: entry.node,
                });
            }
        }
        Ok(None)
    }

    /// Soft conflict count against already-fixed paths at the child's
    /// timestep; only ever used as a tie-breaker.
    fn count_collisions(&self, state: &State, time: u32) -> u32 {
        if self.cats.is_empty() {
            return 0;
        }
        let mut collisions = 0;
        for agent in state.agents() {
            for cat in &self.cats {
                collisions += cat.count(self.exclude, agent.coord, time);
            }
        }
        collisions
    }
}

/// Walk the parent chain and split the joint states into per-agent paths.
fn reconstruct(arena: &[Node], solved: usize, agents: &[Agent]) -> Vec<Path> {
    let mut chain = Vec::new();
    let mut current = Some(solved);
    while let Some(index) = current {
        chain.push(index);
        current = arena[index].parent.map(|p| p as usize);
    }
    chain.reverse();

    agents
        .iter()
        .enumerate()
        .map(|(i, agent)| {
            let steps: Vec<Coordinate> = chain
                .iter()
                .map(|&index| arena[index].state.agents()[i].coord)
                .collect();
            Path::new(steps, agent.identifier)
        })
        .collect()
}
