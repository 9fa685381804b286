//! Agent groups and the bookkeeping of their current best paths.

use mapfm_core::Path;
use rustc_hash::FxHashMap;

use crate::cat::Cat;
use crate::heuristic::Heuristic;
use crate::state::Agent;

/// A sorted set of agent identifiers solved jointly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Group {
    agent_ids: Vec<u32>,
}

impl Group {
    pub fn new(mut agent_ids: Vec<u32>) -> Self {
        agent_ids.sort_unstable();
        Self { agent_ids }
    }

    /// Merge two sorted groups into one.
    pub fn combine(&self, other: &Group) -> Group {
        let mut merged = Vec::with_capacity(self.agent_ids.len() + other.agent_ids.len());
        let mut i = 0;
        let mut j = 0;
        while i < self.agent_ids.len() && j < other.agent_ids.len() {
            if self.agent_ids[i] < other.agent_ids[j] {
                merged.push(self.agent_ids[i]);
                i += 1;
            } else {
                merged.push(other.agent_ids[j]);
                j += 1;
            }
        }
        merged.extend_from_slice(&self.agent_ids[i..]);
        merged.extend_from_slice(&other.agent_ids[j..]);
        Group { agent_ids: merged }
    }

    pub fn ids(&self) -> &[u32] {
        &self.agent_ids
    }

    pub fn contains(&self, agent_id: u32) -> bool {
        self.agent_ids.binary_search(&agent_id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.agent_ids.len()
    }
}

/// Disjoint groups with lookup by member.
#[derive(Debug, Clone)]
pub(crate) struct Groups {
    groups: Vec<Group>,
}

impl Groups {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    /// Merge the groups containing agents `a` and `b`; returns the merged
    /// group. The two agents must belong to different groups.
    pub fn combine_containing(&mut self, a: u32, b: u32) -> Group {
        let index_a = self.position_of(a);
        let index_b = self.position_of(b);
        debug_assert_ne!(index_a, index_b, "agents already share a group");
        let merged = self.groups[index_a].combine(&self.groups[index_b]);
        // Remove the higher index first so the lower one stays valid.
        self.groups.remove(index_a.max(index_b));
        self.groups.remove(index_a.min(index_b));
        self.groups.push(merged.clone());
        merged
    }

    fn position_of(&self, agent_id: u32) -> usize {
        self.groups
            .iter()
            .position(|group| group.contains(agent_id))
            .expect("every agent belongs to a group")
    }
}

/// Current best path and cost per agent of one independence-detection run.
///
/// Costs of solved agents come from their paths; unsolved agents contribute
/// their heuristic as a lower bound, which keeps the remaining-cost ceiling
/// admissible.
pub(crate) struct PathSet<'a> {
    agents: Vec<Agent>,
    heuristic: &'a Heuristic,
    index: FxHashMap<u32, usize>,
    paths: Vec<Option<Path>>,
    costs: Vec<Option<u32>>,
    pub cat: Cat,
}

impl<'a> PathSet<'a> {
    pub fn new(agents: Vec<Agent>, heuristic: &'a Heuristic, width: u32, height: u32) -> Self {
        let index = agents
            .iter()
            .enumerate()
            .map(|(i, agent)| (agent.identifier, i))
            .collect();
        let count = agents.len();
        Self {
            agents,
            heuristic,
            index,
            paths: vec![None; count],
            costs: vec![None; count],
            cat: Cat::new(width, height),
        }
    }

    /// Replace the stored paths for the agents the new paths belong to.
    pub fn update(&mut self, new_paths: Vec<Path>) {
        for path in new_paths {
            let i = self.index[&path.identifier];
            if let Some(old) = &self.paths[i] {
                self.cat.remove(old);
            }
            self.cat.add(&path);
            self.costs[i] = Some(path.cost());
            self.paths[i] = Some(path);
        }
    }

    /// Known cost of an agent, or its heuristic lower bound while unsolved.
    pub fn cost_of(&self, agent_id: u32) -> u32 {
        let i = self.index[&agent_id];
        match self.costs[i] {
            Some(cost) => cost,
            None => {
                let agent = &self.agents[i];
                self.heuristic.get(agent.color, agent.coord)
            }
        }
    }

    /// Ceiling left for the excluded agents: `max_cost` minus what everyone
    /// else already spends.
    pub fn remaining_cost(&self, exclude: &[u32], max_cost: u32) -> u32 {
        let others: u32 = self
            .agents
            .iter()
            .filter(|agent| !exclude.contains(&agent.identifier))
            .fold(0u32, |total, agent| {
                total.saturating_add(self.cost_of(agent.identifier))
            });
        max_cost.saturating_sub(others)
    }

    /// First pair of stored paths violating the vertex/edge rules.
    pub fn find_conflict(&self) -> Option<(u32, u32)> {
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

    /// All paths in agent order. Panics if an agent was never solved.
    pub fn into_paths(self) -> Vec<Path> {
        self.paths
            .into_iter()
            .map(|path| path.expect("every agent has a path once solving finished"))
            .collect()
    }
}
