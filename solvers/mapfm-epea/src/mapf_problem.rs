//! Joint-state view of a MAPF(M) instance for the EPEA* search.

use mapfm_core::{Direction, MarkedLocation};
use rustc_hash::FxHashSet;

use crate::heuristic::Heuristic;
use crate::operator_finder::OperatorFinder;
use crate::pdb::{Pdb, PdbRow};
use crate::solver::SolveError;
use crate::state::{Agent, State};

/// Goal test, heuristic, and child generation for a fixed goal set.
///
/// The goal set decides the matching discipline: with per-goal colors each
/// agent is bound to one specific goal, with team colors any same-color goal
/// satisfies the agent.
pub(crate) struct MapfProblem<'a> {
    goals: &'a [MarkedLocation],
    pdb: &'a Pdb,
    pub heuristic: &'a Heuristic,
}

impl<'a> MapfProblem<'a> {
    pub fn new(goals: &'a [MarkedLocation], pdb: &'a Pdb, heuristic: &'a Heuristic) -> Self {
        Self { goals, pdb, heuristic }
    }

    /// True iff a goal of the agent's color lies at the agent's position.
    pub fn on_goal(&self, agent: &Agent) -> bool {
        self.goals
            .iter()
            .any(|goal| goal.x == agent.coord.x && goal.y == agent.coord.y && goal.color == agent.color)
    }

    pub fn is_solved(&self, state: &State) -> bool {
        state.agents().iter().all(|agent| self.on_goal(agent))
    }

    /// Sum of individual distances to each agent's nearest matching goal.
    pub fn state_heuristic(&self, state: &State) -> u32 {
        state
            .agents()
            .iter()
            .fold(0u32, |total, agent| {
                total.saturating_add(self.heuristic.get(agent.color, agent.coord))
            })
    }

    /// Generate the children of a node whose joint Δf equals `target`.
    ///
    /// Returns the conflict-free `(state, cost)` children and the next Δf
    /// target for the parent ([`u32::MAX`] when the node is exhausted).
    pub fn expand(
        &self,
        state: &State,
        cost: u32,
        target: u32,
    ) -> Result<(Vec<(State, u32)>, u32), SolveError> {
        let rows: Vec<&[PdbRow]> = state
            .agents()
            .iter()
            .map(|agent| self.pdb.rows(agent.color, agent.coord))
            .collect();
        if rows.iter().any(|table| table.is_empty()) {
            // Agents never step onto cells their goal cannot be reached
            // from, so an empty table here is a bug, not an unsolvable
            // instance.
            return Err(SolveError::Internal("empty operator table at a reached cell"));
        }

        let (operators, next_target) = OperatorFinder::new(target, &rows).run();

        let mut children = Vec::new();
        let mut moves = Vec::with_capacity(state.len());
        for operator in &operators {
            joint_moves(operator, &mut moves, &mut |moves| {
                let child = self.apply(state, cost, moves);
                if !has_conflict(state, &child.0) {
                    children.push(child);
                }
            });
        }
        Ok((children, next_target))
    }

    /// Apply one joint move, producing the child state and its cost.
    ///
    /// Resting on the own goal is free but tracked: the deferred timesteps
    /// turn into real cost the moment the agent leaves the goal again.
    fn apply(&self, state: &State, parent_cost: u32, moves: &[Direction]) -> (State, u32) {
        let mut cost = parent_cost;
        let mut agents = Vec::with_capacity(state.len());
        for (agent, &direction) in state.agents().iter().zip(moves) {
            let mut waiting_cost = 0;
            if self.on_goal(agent) {
                if direction == Direction::Wait {
                    waiting_cost = agent.waiting_cost + 1;
                } else {
                    cost += agent.waiting_cost + 1;
                }
            } else {
                cost += 1;
            }
            agents.push(Agent {
                coord: agent.coord.step(direction),
                color: agent.color,
                identifier: agent.identifier,
                waiting_cost,
            });
        }
        (State::new(agents), cost)
    }
}

/// Expand a committed joint operator into concrete per-agent moves; the
/// Cartesian product over each row's collapsed direction list.
fn joint_moves(
    operator: &[&[Direction]],
    current: &mut Vec<Direction>,
    visit: &mut dyn FnMut(&[Direction]),
) {
    if current.len() == operator.len() {
        visit(current);
        return;
    }
    for &direction in operator[current.len()] {
        current.push(direction);
        joint_moves(operator, current, visit);
        current.pop();
    }
}

/// Vertex conflict: two agents share a cell in the child state.
/// Edge conflict: a pair of agents swapped cells between parent and child.
fn has_conflict(parent: &State, child: &State) -> bool {
    let mut coords = FxHashSet::default();
    for (i, agent) in child.agents().iter().enumerate() {
        if !coords.insert(agent.coord) {
            return true;
        }
        for j in (i + 1)..parent.len() {
            if child.agents()[i].coord == parent.agents()[j].coord
                && child.agents()[j].coord == parent.agents()[i].coord
            {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapfm_core::{Coordinate, Grid};
    use pretty_assertions::assert_eq;

    struct Fixture {
        goals: Vec<MarkedLocation>,
        heuristic: Heuristic,
        pdb: Pdb,
    }

    impl Fixture {
        fn new(grid: &Grid, goals: Vec<MarkedLocation>) -> Self {
            let heuristic = Heuristic::new(grid, &goals);
            let pdb = Pdb::new(&heuristic, grid);
            Self { goals, heuristic, pdb }
        }

        fn problem(&self) -> MapfProblem<'_> {
            MapfProblem::new(&self.goals, &self.pdb, &self.heuristic)
        }
    }

    #[test]
    fn on_goal_requires_matching_color() {
        let grid = Grid::open(2, 1);
        let fixture = Fixture::new(&grid, vec![MarkedLocation::new(0, 0, 0)]);
        let problem = fixture.problem();
        assert!(problem.on_goal(&Agent::new(Coordinate::new(0, 0), 0, 0)));
        assert!(!problem.on_goal(&Agent::new(Coordinate::new(0, 0), 1, 0)));
        assert!(!problem.on_goal(&Agent::new(Coordinate::new(1, 0), 0, 0)));
    }

    #[test]
    fn expand_at_delta_zero_yields_goalward_child() {
        let grid = Grid::open(3, 1);
        let fixture = Fixture::new(&grid, vec![MarkedLocation::new(2, 0, 0)]);
        let problem = fixture.problem();
        let state = State::new(vec![Agent::new(Coordinate::new(0, 0), 0, 0)]);

        let (children, next) = problem.expand(&state, 1, 0).unwrap();
        assert_eq!(children.len(), 1);
        let (child, cost) = &children[0];
        assert_eq!(child.agents()[0].coord, Coordinate::new(1, 0));
        assert_eq!(*cost, 2);
        assert_eq!(next, 1);
    }

    #[test]
    fn waiting_on_goal_defers_cost() {
        let grid = Grid::open(3, 1);
        let fixture = Fixture::new(&grid, vec![MarkedLocation::new(0, 0, 0)]);
        let problem = fixture.problem();
        let state = State::new(vec![Agent::new(Coordinate::new(0, 0), 0, 0)]);

        // Δf = 1 is the WAIT row for an agent on its goal.
        let (children, _) = problem.expand(&state, 1, 1).unwrap();
        let wait_child = children
            .iter()
            .find(|(child, _)| child.agents()[0].coord == Coordinate::new(0, 0))
            .expect("wait child must exist");
        assert_eq!(wait_child.1, 1, "resting on the goal adds no cost");
        assert_eq!(wait_child.0.agents()[0].waiting_cost, 1);
    }

    #[test]
    fn leaving_goal_realizes_deferred_cost() {
        let grid = Grid::open(3, 1);
        let fixture = Fixture::new(&grid, vec![MarkedLocation::new(0, 0, 0)]);
        let problem = fixture.problem();
        let mut agent = Agent::new(Coordinate::new(0, 0), 0, 0);
        agent.waiting_cost = 2;
        let state = State::new(vec![agent]);

        let (children, _) = problem.expand(&state, 1, 2).unwrap();
        let moved = children
            .iter()
            .find(|(child, _)| child.agents()[0].coord == Coordinate::new(1, 0))
            .expect("move child must exist");
        // Two deferred waits plus the move itself.
        assert_eq!(moved.1, 1 + 2 + 1);
        assert_eq!(moved.0.agents()[0].waiting_cost, 0);
    }

    #[test]
    fn vertex_conflicts_are_filtered() {
        let grid = Grid::open(3, 1);
        let fixture = Fixture::new(
            &grid,
            vec![MarkedLocation::new(1, 0, 0), MarkedLocation::new(1, 0, 1)],
        );
        let problem = fixture.problem();
        let state = State::new(vec![
            Agent::new(Coordinate::new(0, 0), 0, 0),
            Agent::new(Coordinate::new(2, 0), 1, 1),
        ]);

        // Δf = 0 would move both agents onto (1, 0) at once.
        let (children, _) = problem.expand(&state, 2, 0).unwrap();
        assert!(children.is_empty());
    }

    #[test]
    fn edge_conflicts_are_filtered() {
        let grid = Grid::open(2, 1);
        let fixture = Fixture::new(
            &grid,
            vec![MarkedLocation::new(1, 0, 0), MarkedLocation::new(0, 0, 1)],
        );
        let problem = fixture.problem();
        let state = State::new(vec![
            Agent::new(Coordinate::new(0, 0), 0, 0),
            Agent::new(Coordinate::new(1, 0), 1, 1),
        ]);

        // The only Δf = 0 joint move is the head-on swap.
        let (children, _) = problem.expand(&state, 2, 0).unwrap();
        assert!(children.is_empty());
    }
}
