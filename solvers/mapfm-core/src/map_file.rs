//! Text problem file parser.
//!
//! Expected format:
//! ```text
//! width M
//! height N
//! <N lines of M characters, `.` = open, `@` = wall>
//! K
//! <K lines `x y color` (starts)>
//! <blank line>
//! <K lines `x y color` (goals)>
//! ```

use thiserror::Error;

use crate::grid::{Grid, Tile};
use crate::problem::{MarkedLocation, Problem, ProblemError};

/// Errors from parsing a problem file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing header field: {0}")]
    MissingHeader(&'static str),

    #[error("invalid header value for {field}: {value}")]
    InvalidHeader { field: &'static str, value: String },

    #[error("row {row} width mismatch: expected {expected}, got {got}")]
    RowWidthMismatch { row: u32, expected: u32, got: u32 },

    #[error("unexpected end of file while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("malformed marker on line {line}: {reason}")]
    MalformedMarker { line: usize, reason: String },

    #[error(transparent)]
    Invalid(#[from] ProblemError),
}

impl Problem {
    /// Parse a problem file.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut lines = input.lines().enumerate();

        let width = parse_header(&mut lines, "width")?;
        let height = parse_header(&mut lines, "height")?;

        let mut tiles = Vec::with_capacity((width as usize) * (height as usize));
        for row in 0..height {
            let (_, line) = lines.next().ok_or(ParseError::UnexpectedEof("grid row"))?;
            let cells: Vec<char> = line.trim_end().chars().collect();
            if cells.len() != width as usize {
                return Err(ParseError::RowWidthMismatch {
                    row,
                    expected: width,
                    got: cells.len() as u32,
                });
            }
            for cell in cells {
                tiles.push(if cell == '.' { Tile::Open } else { Tile::Wall });
            }
        }
        let grid = Grid::from_tiles(width, height, tiles)
            .expect("row loop produced exactly width * height tiles");

        let (line_no, count_line) = lines.next().ok_or(ParseError::UnexpectedEof("agent count"))?;
        let agent_count: usize =
            count_line
                .trim()
                .parse()
                .map_err(|_| ParseError::MalformedMarker {
                    line: line_no + 1,
                    reason: format!("invalid agent count: {}", count_line.trim()),
                })?;

        let starts = parse_markers(&mut lines, agent_count, "start")?;
        match lines.next() {
            Some((_, line)) if line.trim().is_empty() => {}
            Some((line_no, line)) => {
                return Err(ParseError::MalformedMarker {
                    line: line_no + 1,
                    reason: format!("expected blank separator line, got: {}", line.trim()),
                })
            }
            None => return Err(ParseError::UnexpectedEof("separator line")),
        }
        let goals = parse_markers(&mut lines, agent_count, "goal")?;

        Ok(Problem::new(grid, starts, goals)?)
    }
}

fn parse_header<'a>(
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
    field: &'static str,
) -> Result<u32, ParseError> {
    let (_, line) = lines.next().ok_or(ParseError::MissingHeader(field))?;
    let rest = line
        .trim()
        .strip_prefix(field)
        .ok_or(ParseError::MissingHeader(field))?;
    rest.trim().parse().map_err(|_| ParseError::InvalidHeader {
        field,
        value: rest.trim().to_string(),
    })
}

fn parse_markers<'a>(
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
    count: usize,
    kind: &'static str,
) -> Result<Vec<MarkedLocation>, ParseError> {
    let mut markers = Vec::with_capacity(count);
    for _ in 0..count {
        let (line_no, line) = lines.next().ok_or(ParseError::UnexpectedEof(kind))?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(ParseError::MalformedMarker {
                line: line_no + 1,
                reason: format!("expected `x y color`, got {} fields", parts.len()),
            });
        }
        let parse = |value: &str, name: &str| -> Result<u32, ParseError> {
            value.parse().map_err(|_| ParseError::MalformedMarker {
                line: line_no + 1,
                reason: format!("invalid {name}: {value}"),
            })
        };
        markers.push(MarkedLocation::new(
            parse(parts[0], "x")?,
            parse(parts[1], "y")?,
            parse(parts[2], "color")?,
        ));
    }
    Ok(markers)
}
