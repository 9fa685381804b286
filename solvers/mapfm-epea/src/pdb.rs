//! Pattern database: per-color, per-cell operator selection tables.

use mapfm_core::{Coordinate, Direction, Grid};
use rustc_hash::FxHashMap;

use crate::heuristic::Heuristic;
use crate::INFINITY;

/// One choice point: all directions out of a cell that share the same Δf.
///
/// Collapsing equal-Δf directions into a single row is what keeps the
/// operator finder fast; it commits to a row and defers enumerating the
/// individual directions until a compatible joint combination exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdbRow {
    pub directions: Vec<Direction>,
    pub delta_f: u32,
}

/// For every color and traversable cell with a finite heuristic, the rows of
/// (directions, Δf) sorted ascending by Δf. WAIT is always present with
/// Δf = 1; cells that cannot reach a goal of the color get an empty table.
pub struct Pdb {
    width: u32,
    tables: FxHashMap<u32, Vec<Vec<PdbRow>>>,
}

impl Pdb {
    pub fn new(heuristic: &Heuristic, grid: &Grid) -> Self {
        let mut tables = FxHashMap::default();
        for color in heuristic.colors() {
            tables.insert(color, Self::single_color_tables(color, grid, heuristic));
        }
        Self {
            width: grid.width(),
            tables,
        }
    }

    fn single_color_tables(color: u32, grid: &Grid, heuristic: &Heuristic) -> Vec<Vec<PdbRow>> {
        let mut cells = Vec::with_capacity(grid.cell_count());
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                let coord = Coordinate::new(x, y);
                if grid.traversable_coord(coord) && heuristic.get(color, coord) != INFINITY {
                    cells.push(Self::cell_table(color, coord, grid, heuristic));
                } else {
                    cells.push(Vec::new());
                }
            }
        }
        cells
    }

    /// Build the table for one cell: Δf of each legal move, sorted and
    /// collapsed. Sorting is load-bearing; the operator finder's pruning
    /// assumes rows in ascending Δf order.
    fn cell_table(
        color: u32,
        coord: Coordinate,
        grid: &Grid,
        heuristic: &Heuristic,
    ) -> Vec<PdbRow> {
        let here = heuristic.get(color, coord);
        let mut expanded: Vec<(Direction, u32)> = Vec::with_capacity(5);
        for direction in Direction::CARDINAL {
            let next = coord.step(direction);
            if grid.traversable_coord(next) {
                // Neighbors of a reachable cell are reachable, so this is
                // finite and at least `here - 1`.
                let there = heuristic.get(color, next);
                expanded.push((direction, 1 + there - here));
            }
        }
        expanded.push((Direction::Wait, 1));
        expanded.sort_by_key(|&(_, delta_f)| delta_f);
        Self::collapse(expanded)
    }

    fn collapse(expanded: Vec<(Direction, u32)>) -> Vec<PdbRow> {
        let mut rows: Vec<PdbRow> = Vec::new();
        for (direction, delta_f) in expanded {
            match rows.last_mut() {
                Some(row) if row.delta_f == delta_f => row.directions.push(direction),
                _ => rows.push(PdbRow {
                    directions: vec![direction],
                    delta_f,
                }),
            }
        }
        rows
    }

    /// Rows for an agent of `color` standing at `coord`. Empty for cells
    /// from which no goal of the color is reachable.
    #[inline]
    pub fn rows(&self, color: u32, coord: Coordinate) -> &[PdbRow] {
        match self.tables.get(&color) {
            Some(cells) => &cells[(coord.y * self.width + coord.x) as usize],
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapfm_core::MarkedLocation;
    use pretty_assertions::assert_eq;

    fn pdb_for(grid: &Grid, goals: &[MarkedLocation]) -> (Heuristic, Pdb) {
        let heuristic = Heuristic::new(grid, goals);
        let pdb = Pdb::new(&heuristic, grid);
        (heuristic, pdb)
    }

    #[test]
    fn rows_sorted_with_wait_present() {
        let grid = Grid::open(5, 5);
        let (_, pdb) = pdb_for(&grid, &[MarkedLocation::new(4, 4, 0)]);
        for y in 0..5 {
            for x in 0..5 {
                let rows = pdb.rows(0, Coordinate::new(x, y));
                assert!(!rows.is_empty());
                for pair in rows.windows(2) {
                    assert!(pair[0].delta_f < pair[1].delta_f, "rows must strictly ascend");
                }
                let wait_row = rows
                    .iter()
                    .find(|row| row.directions.contains(&Direction::Wait))
                    .expect("WAIT must appear in every table");
                assert_eq!(wait_row.delta_f, 1);
            }
        }
    }

    #[test]
    fn first_row_holds_goalward_moves() {
        let grid = Grid::open(3, 1);
        let (_, pdb) = pdb_for(&grid, &[MarkedLocation::new(2, 0, 0)]);
        let rows = pdb.rows(0, Coordinate::new(0, 0));
        // Only east makes progress: Δf = 0. WAIT shares a row with nothing.
        assert_eq!(rows[0].directions, vec![Direction::East]);
        assert_eq!(rows[0].delta_f, 0);
        assert_eq!(rows[1].directions, vec![Direction::Wait]);
        assert_eq!(rows[1].delta_f, 1);
    }

    #[test]
    fn equal_delta_f_directions_collapse() {
        let grid = Grid::open(3, 3);
        let (_, pdb) = pdb_for(&grid, &[MarkedLocation::new(2, 2, 0)]);
        let rows = pdb.rows(0, Coordinate::new(0, 0));
        // North and east both make progress and share one row.
        assert_eq!(rows[0].delta_f, 0);
        assert_eq!(rows[0].directions, vec![Direction::North, Direction::East]);
        assert_eq!(rows[1].delta_f, 1);
        assert_eq!(rows[1].directions, vec![Direction::Wait]);
    }

    #[test]
    fn on_goal_cell_wait_collapses_with_moves_away() {
        let grid = Grid::open(3, 1);
        let (_, pdb) = pdb_for(&grid, &[MarkedLocation::new(1, 0, 0)]);
        let rows = pdb.rows(0, Coordinate::new(1, 0));
        // From the goal every cardinal move has Δf = 2; WAIT stands alone.
        assert_eq!(rows[0].directions, vec![Direction::Wait]);
        assert_eq!(rows[0].delta_f, 1);
        assert_eq!(rows[1].delta_f, 2);
    }

    #[test]
    fn unreachable_cell_table_is_empty() {
        let input = "width 3\nheight 1\n.@.\n1\n0 0 0\n\n0 0 0\n";
        let problem = mapfm_core::Problem::parse(input).unwrap();
        let (_, pdb) = pdb_for(problem.grid(), problem.goals());
        assert!(pdb.rows(0, Coordinate::new(2, 0)).is_empty());
    }
}
