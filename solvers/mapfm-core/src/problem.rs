//! Validated MAPFM problem instances.

use thiserror::Error;

use crate::grid::Grid;

/// A colored start or goal marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkedLocation {
    pub x: u32,
    pub y: u32,
    pub color: u32,
}

impl MarkedLocation {
    pub fn new(x: u32, y: u32, color: u32) -> Self {
        Self { x, y, color }
    }
}

/// Errors from assembling a problem instance.
#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("start/goal count mismatch: {starts} starts, {goals} goals")]
    CountMismatch { starts: usize, goals: usize },

    #[error("color {color} has {starts} starts but {goals} goals")]
    ColorMismatch { color: u32, starts: usize, goals: usize },

    #[error("{kind} marker at ({x}, {y}) is not on an open cell")]
    BlockedMarker { kind: &'static str, x: u32, y: u32 },
}

/// A MAPFM problem: a grid plus colored starts and goals.
///
/// Agents are numbered by their position in `starts`; that index is the
/// stable agent identifier used throughout the solver and in the returned
/// paths.
#[derive(Debug, Clone)]
pub struct Problem {
    grid: Grid,
    starts: Vec<MarkedLocation>,
    goals: Vec<MarkedLocation>,
}

impl Problem {
    /// Assemble and validate a problem instance.
    ///
    /// Checks that starts and goals pair up per color and that every marker
    /// sits on an open cell. Solvability is not checked here; an unsolvable
    /// instance is a valid problem whose answer is "no solution".
    pub fn new(
        grid: Grid,
        starts: Vec<MarkedLocation>,
        goals: Vec<MarkedLocation>,
    ) -> Result<Self, ProblemError> {
        if starts.len() != goals.len() {
            return Err(ProblemError::CountMismatch {
                starts: starts.len(),
                goals: goals.len(),
            });
        }
        for (kind, markers) in [("start", &starts), ("goal", &goals)] {
            for marker in markers.iter() {
                if !grid.traversable(marker.x, marker.y) {
                    return Err(ProblemError::BlockedMarker {
                        kind,
                        x: marker.x,
                        y: marker.y,
                    });
                }
            }
        }
        for start in &starts {
            let color = start.color;
            let start_count = starts.iter().filter(|s| s.color == color).count();
            let goal_count = goals.iter().filter(|g| g.color == color).count();
            if start_count != goal_count {
                return Err(ProblemError::ColorMismatch {
                    color,
                    starts: start_count,
                    goals: goal_count,
                });
            }
        }
        Ok(Self { grid, starts, goals })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn starts(&self) -> &[MarkedLocation] {
        &self.starts
    }

    pub fn goals(&self) -> &[MarkedLocation] {
        &self.goals
    }

    /// Number of agents.
    pub fn agent_count(&self) -> usize {
        self.starts.len()
    }
}
