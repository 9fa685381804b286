//! Precomputed per-color distance tables (the SIC heuristic).

use std::collections::VecDeque;

use mapfm_core::{Coordinate, Grid, MarkedLocation};
use rustc_hash::FxHashMap;

use crate::INFINITY;

/// For each color, the shortest 4-connected distance from every cell to the
/// nearest goal of that color. Computed once per problem by a multi-source
/// BFS; unreachable cells hold [`u32::MAX`].
pub struct Heuristic {
    width: u32,
    tables: FxHashMap<u32, Box<[u32]>>,
}

impl Heuristic {
    pub fn new(grid: &Grid, goals: &[MarkedLocation]) -> Self {
        let mut grouped: FxHashMap<u32, Vec<Coordinate>> = FxHashMap::default();
        for goal in goals {
            grouped
                .entry(goal.color)
                .or_default()
                .push(Coordinate::new(goal.x, goal.y));
        }

        let mut tables = FxHashMap::default();
        for (color, sources) in grouped {
            tables.insert(color, Self::distances(grid, &sources));
        }
        Self {
            width: grid.width(),
            tables,
        }
    }

    /// BFS from all goals of one color at once. All edges cost 1, so a plain
    /// FIFO frontier expands in nondecreasing distance order.
    fn distances(grid: &Grid, sources: &[Coordinate]) -> Box<[u32]> {
        let mut table = vec![INFINITY; grid.cell_count()];
        let mut frontier = VecDeque::new();
        for &source in sources {
            table[grid.cell_index(source)] = 0;
            frontier.push_back(source);
        }
        while let Some(pos) = frontier.pop_front() {
            let next_cost = table[grid.cell_index(pos)] + 1;
            for neighbor in grid.neighbors(pos) {
                let index = grid.cell_index(neighbor);
                if table[index] == INFINITY {
                    table[index] = next_cost;
                    frontier.push_back(neighbor);
                }
            }
        }
        table.into_boxed_slice()
    }

    /// Distance from `coord` to the nearest goal of `color`.
    #[inline]
    pub fn get(&self, color: u32, coord: Coordinate) -> u32 {
        match self.tables.get(&color) {
            Some(table) => table[(coord.y * self.width + coord.x) as usize],
            None => INFINITY,
        }
    }

    /// Colors that have at least one goal.
    pub fn colors(&self) -> impl Iterator<Item = u32> + '_ {
        self.tables.keys().copied()
    }
}
