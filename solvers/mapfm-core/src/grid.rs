//! Grid geometry: coordinates, directions, traversability.

/// A 2D cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub x: u32,
    pub y: u32,
}

impl Coordinate {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The coordinate one step in the given direction.
    ///
    /// Stepping off the low edge wraps to a huge value, which fails every
    /// bounds check; callers always validate the result against the grid.
    #[inline]
    pub fn step(self, direction: Direction) -> Coordinate {
        let (dx, dy) = direction.delta();
        Coordinate {
            x: self.x.wrapping_add_signed(dx),
            y: self.y.wrapping_add_signed(dy),
        }
    }
}

/// The five moves available to an agent each timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
    Wait,
}

impl Direction {
    /// The four movement directions in fixed expansion order.
    pub const CARDINAL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// (dx, dy) with north pointing toward increasing y.
    #[inline]
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
            Direction::Wait => (0, 0),
        }
    }
}

/// A single cell in a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    /// Agents can traverse this cell.
    Open,
    /// Wall; agents cannot enter.
    Wall,
}

/// A static 2D occupancy grid.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    /// Row-major; index = y * width + x
    tiles: Vec<Tile>,
}

impl Grid {
    /// Create a grid from row-major tiles. Returns `None` on a size mismatch.
    pub fn from_tiles(width: u32, height: u32, tiles: Vec<Tile>) -> Option<Self> {
        if tiles.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self { width, height, tiles })
    }

    /// A fully open grid.
    pub fn open(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::Open; (width as usize) * (height as usize)],
        }
    }

    /// Width of the grid (x dimension).
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the grid (y dimension).
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.tiles.len()
    }

    /// Row-major index of a coordinate. Caller guarantees bounds.
    #[inline]
    pub fn cell_index(&self, coord: Coordinate) -> usize {
        (coord.y * self.width + coord.x) as usize
    }

    /// Check if (x, y) is in bounds and open.
    #[inline]
    pub fn traversable(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.tiles[(y * self.width + x) as usize] == Tile::Open
    }

    /// Check if a coordinate is in bounds and open.
    #[inline]
    pub fn traversable_coord(&self, coord: Coordinate) -> bool {
        self.traversable(coord.x, coord.y)
    }

    /// Traversable neighbors of a cell in fixed NESW order.
    pub fn neighbors(&self, pos: Coordinate) -> Vec<Coordinate> {
        let mut result = Vec::with_capacity(4);
        for direction in Direction::CARDINAL {
            let next = pos.step(direction);
            if self.traversable_coord(next) {
                result.push(next);
            }
        }
        result
    }
}
