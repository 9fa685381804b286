//! Tests for the problem file parser.

use mapfm_core::{Coordinate, MarkedLocation, ParseError, Problem};
use pretty_assertions::assert_eq;

const SIMPLE_PROBLEM: &str = "\
width 5
height 3
.....
..@..
.....
2
0 0 0
4 2 1

4 0 0
0 2 1
";

const SINGLE_AGENT: &str = "\
width 3
height 1
...
1
0 0 7

2 0 7
";

#[test]
fn parse_simple_problem() {
    let problem = Problem::parse(SIMPLE_PROBLEM).expect("parse failed");
    assert_eq!(problem.grid().width(), 5);
    assert_eq!(problem.grid().height(), 3);
    assert_eq!(problem.agent_count(), 2);

    // The wall at (2, 1), open cells around it
    assert!(!problem.grid().traversable(2, 1));
    assert!(problem.grid().traversable(1, 1));
    assert!(problem.grid().traversable(2, 0));

    assert_eq!(problem.starts()[0], MarkedLocation::new(0, 0, 0));
    assert_eq!(problem.starts()[1], MarkedLocation::new(4, 2, 1));
    assert_eq!(problem.goals()[0], MarkedLocation::new(4, 0, 0));
    assert_eq!(problem.goals()[1], MarkedLocation::new(0, 2, 1));
}

#[test]
fn parse_single_agent_keeps_color() {
    let problem = Problem::parse(SINGLE_AGENT).unwrap();
    assert_eq!(problem.agent_count(), 1);
    assert_eq!(problem.starts()[0].color, 7);
    assert_eq!(problem.goals()[0].color, 7);
}

#[test]
fn parse_missing_header() {
    let err = Problem::parse("height 3\n...\n").unwrap_err();
    assert!(matches!(err, ParseError::MissingHeader("width")));
}

#[test]
fn parse_bad_dimension_value() {
    let err = Problem::parse("width abc\n").unwrap_err();
    assert!(matches!(err, ParseError::InvalidHeader { field: "width", .. }));
}

#[test]
fn parse_row_width_mismatch() {
    let bad = "width 4\nheight 1\n...\n0\n\n";
    let err = Problem::parse(bad).unwrap_err();
    assert!(matches!(
        err,
        ParseError::RowWidthMismatch { row: 0, expected: 4, got: 3 }
    ));
}

#[test]
fn parse_truncated_markers() {
    let bad = "width 3\nheight 1\n...\n2\n0 0 0\n";
    let err = Problem::parse(bad).unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedEof(_)));
}

#[test]
fn parse_malformed_marker() {
    let bad = "width 3\nheight 1\n...\n1\n0 0\n\n2 0 0\n";
    let err = Problem::parse(bad).unwrap_err();
    assert!(matches!(err, ParseError::MalformedMarker { line: 5, .. }));
}

#[test]
fn parse_rejects_mismatched_colors() {
    let bad = "width 3\nheight 1\n...\n1\n0 0 0\n\n2 0 1\n";
    let err = Problem::parse(bad).unwrap_err();
    assert!(matches!(err, ParseError::Invalid(_)));
}

#[test]
fn parse_rejects_start_on_wall() {
    let bad = "width 3\nheight 1\n@..\n1\n0 0 0\n\n2 0 0\n";
    let err = Problem::parse(bad).unwrap_err();
    assert!(matches!(err, ParseError::Invalid(_)));
}

#[test]
fn parsed_grid_neighbor_queries() {
    let problem = Problem::parse(SIMPLE_PROBLEM).unwrap();
    // North of (2, 0) is the wall at (2, 1); south is out of bounds.
    let neighbors = problem.grid().neighbors(Coordinate::new(2, 0));
    assert_eq!(neighbors, vec![Coordinate::new(3, 0), Coordinate::new(1, 0)]);
}
