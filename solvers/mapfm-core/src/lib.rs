//! Core MAPFM types and problem file parser.
//!
//! Provides the grid geometry, validated problem instances, agent paths,
//! plus a parser for the text problem format (grid with colored starts
//! and goals).

mod grid;
mod map_file;
mod path;
mod problem;

pub use grid::{Coordinate, Direction, Grid, Tile};
pub use map_file::ParseError;
pub use path::Path;
pub use problem::{MarkedLocation, Problem, ProblemError};
