// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    single = { "mnist" },
    nested = { "vision/resnet50/ablation" },
    mixed_charset = { "a-b_c/D2" },
)]
fn accepts_valid(path: &str) {
    let p = RunPath::parse(path).unwrap();
    assert_eq!(p.as_str(), path);
}

#[parameterized(
    empty = { "", RunPathError::Empty },
    leading_slash = { "/abs", RunPathError::LeadingSlash },
    parent_segment = { "a/../b", RunPathError::ParentSegment },
    trailing_slash = { "a/b/", RunPathError::EmptySegment },
    double_slash = { "a//b", RunPathError::EmptySegment },
    backslash = { "a\\b", RunPathError::InvalidChar('\\') },
    space = { "a b", RunPathError::InvalidChar(' ') },
    dot = { "a.b", RunPathError::InvalidChar('.') },
)]
fn rejects_invalid(path: &str, expected: RunPathError) {
    assert_eq!(RunPath::parse(path).unwrap_err(), expected);
}

#[test]
fn rejects_over_length() {
    let long = "a/".repeat(100) + "bb"; // 202 bytes
    assert!(matches!(RunPath::parse(&long), Err(RunPathError::TooLong(_))));
}

#[test]
fn accepts_exactly_max_length() {
    let path = "a".repeat(MAX_PATH_LEN);
    assert!(RunPath::parse(&path).is_ok());
}

#[test]
fn join_under_stays_below_root() {
    let p = RunPath::parse("vision/resnet").unwrap();
    let joined = p.join_under(Path::new("/data/runicorn"));
    assert_eq!(joined, PathBuf::from("/data/runicorn/vision/resnet"));
}

#[test]
fn from_legacy_synthesizes_two_segments() {
    let p = RunPath::from_legacy("proj", "exp1").unwrap();
    assert_eq!(p.as_str(), "proj/exp1");
    assert_eq!(p.project(), "proj");
}

#[test]
fn starts_with_matches_whole_segments_only() {
    let parent = RunPath::parse("vision").unwrap();
    let child = RunPath::parse("vision/resnet").unwrap();
    let sibling = RunPath::parse("vision2").unwrap();

    assert!(child.starts_with(&parent));
    assert!(parent.starts_with(&parent));
    assert!(!sibling.starts_with(&parent));
}
