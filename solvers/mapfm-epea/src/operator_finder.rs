//! Joint operator selection for partial expansion.

use mapfm_core::Direction;

use crate::pdb::PdbRow;
use crate::INFINITY;

/// Finds every combination of one PDB row per agent whose Δf values sum to a
/// target, and the smallest sum above the target for the next expansion
/// round. Runs once per node expansion, so the tail-bound pruning here is
/// where EPEA* wins or loses.
pub(crate) struct OperatorFinder<'a> {
    target: u32,
    agent_rows: &'a [&'a [PdbRow]],
    /// min_tail[i]: smallest possible Δf sum of agents after index i.
    min_tail: Vec<u32>,
    /// max_tail[i]: largest possible Δf sum of agents after index i.
    max_tail: Vec<u32>,
    operators: Vec<Vec<&'a [Direction]>>,
    next_target: u32,
}

impl<'a> OperatorFinder<'a> {
    pub fn new(target: u32, agent_rows: &'a [&'a [PdbRow]]) -> Self {
        let count = agent_rows.len();
        let mut min_tail = vec![0u32; count];
        let mut max_tail = vec![0u32; count];
        let mut min_sum = 0;
        let mut max_sum = 0;
        for i in (0..count).rev() {
            min_tail[i] = min_sum;
            max_tail[i] = max_sum;
            let rows = agent_rows[i];
            min_sum += rows.first().map_or(0, |row| row.delta_f);
            max_sum += rows.last().map_or(0, |row| row.delta_f);
        }
        Self {
            target,
            agent_rows,
            min_tail,
            max_tail,
            operators: Vec::new(),
            next_target: INFINITY,
        }
    }

    /// Collect all joint operators hitting the target, plus the next target.
    pub fn run(mut self) -> (Vec<Vec<&'a [Direction]>>, u32) {
        if !self.agent_rows.is_empty() {
            let mut chosen = Vec::with_capacity(self.agent_rows.len());
            self.descend(0, &mut chosen, 0);
        }
        (self.operators, self.next_target)
    }

    fn descend(&mut self, depth: usize, chosen: &mut Vec<&'a [Direction]>, sum: u32) {
        let rows = self.agent_rows[depth];
        for row in rows {
            let current = sum + row.delta_f;

            // Rows ascend, so once the optimistic completion overshoots the
            // target every later row does too; remember the overshoot as a
            // candidate for the next expansion target.
            if current + self.min_tail[depth] > self.target {
                self.next_target = self.next_target.min(current + self.min_tail[depth]);
                break;
            }

            if depth + 1 == self.agent_rows.len() {
                if current == self.target {
                    chosen.push(&row.directions);
                    self.operators.push(chosen.clone());
                    chosen.pop();
                }
                continue;
            }

            // Even the most expensive completion falls short of the target.
            if current + self.max_tail[depth] < self.target {
                continue;
            }

            chosen.push(&row.directions);
            self.descend(depth + 1, chosen, current);
            chosen.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(directions: Vec<Direction>, delta_f: u32) -> PdbRow {
        PdbRow { directions, delta_f }
    }

    fn find(target: u32, agent_rows: &[&[PdbRow]]) -> (Vec<Vec<Vec<Direction>>>, u32) {
        let (operators, next) = OperatorFinder::new(target, agent_rows).run();
        let owned = operators
            .into_iter()
            .map(|op| op.into_iter().map(|d| d.to_vec()).collect())
            .collect();
        (owned, next)
    }

    #[test]
    fn single_agent_picks_matching_row() {
        let rows = [
            row(vec![Direction::East], 0),
            row(vec![Direction::Wait], 1),
            row(vec![Direction::West], 2),
        ];
        let tables: [&[PdbRow]; 1] = [&rows];

        let (operators, next) = find(0, &tables);
        assert_eq!(operators, vec![vec![vec![Direction::East]]]);
        assert_eq!(next, 1);

        let (operators, next) = find(2, &tables);
        assert_eq!(operators, vec![vec![vec![Direction::West]]]);
        assert_eq!(next, u32::MAX);
    }

    #[test]
    fn two_agents_enumerate_all_splits() {
        let a = [row(vec![Direction::East], 0), row(vec![Direction::Wait], 1)];
        let b = [row(vec![Direction::North], 0), row(vec![Direction::Wait], 1)];
        let tables: [&[PdbRow]; 2] = [&a, &b];

        let (operators, next) = find(1, &tables);
        assert_eq!(
            operators,
            vec![
                vec![vec![Direction::East], vec![Direction::Wait]],
                vec![vec![Direction::Wait], vec![Direction::North]],
            ]
        );
        assert_eq!(next, 2);
    }

    #[test]
    fn next_target_is_smallest_overshoot() {
        let a = [row(vec![Direction::East], 0), row(vec![Direction::West], 2)];
        let b = [row(vec![Direction::North], 0), row(vec![Direction::South], 2)];
        let tables: [&[PdbRow]; 2] = [&a, &b];

        // Sums reachable: 0, 2, 4. Target 0 leaves 2 as next.
        let (operators, next) = find(0, &tables);
        assert_eq!(operators.len(), 1);
        assert_eq!(next, 2);

        // Target 1 is unreachable: no operators, next is 2.
        let (operators, next) = find(1, &tables);
        assert!(operators.is_empty());
        assert_eq!(next, 2);
    }

    #[test]
    fn exhausted_tables_report_infinite_next_target() {
        let rows = [row(vec![Direction::Wait], 1)];
        let tables: [&[PdbRow]; 1] = [&rows];
        let (operators, next) = find(1, &tables);
        assert_eq!(operators.len(), 1);
        assert_eq!(next, u32::MAX);
    }
}
