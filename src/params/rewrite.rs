// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! In-place rewriting of top-level parameter assignments

use super::value::Parameter;
use pest::Parser;
use pest_derive::Parser;
use std::ops::Range;

#[derive(Parser)]
#[grammar = "params/assignment.pest"]
struct AssignmentParser;

const INJECTED_TAG: &str = "// injected parameter";

/// Options for [`rewrite_with`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteOptions {
    /// Prepend a new assignment when the source has none for the parameter
    pub inject_if_missing: bool,
}

impl RewriteOptions {
    pub fn injecting() -> Self {
        Self {
            inject_if_missing: true,
        }
    }
}

/// What a rewrite did to the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Right-hand side of the assignment on this 1-based line was replaced
    Replaced { line: usize },
    /// A tagged assignment was prepended
    Injected,
    /// No top-level assignment for the parameter; source returned as-is
    Unchanged,
}

/// Result of rewriting one parameter
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub source: String,
    pub outcome: RewriteOutcome,
}

/// Rewrite `parameter` into `source`, leaving it untouched when absent
pub fn rewrite(source: &str, parameter: &Parameter) -> String {
    rewrite_with(source, parameter, RewriteOptions::default()).source
}

/// Rewrite `parameter` into `source` with explicit options
pub fn rewrite_with(source: &str, parameter: &Parameter, options: RewriteOptions) -> Rewrite {
    let literal = parameter.value.to_scad_literal();

    if let Some(rhs) = find_assignment(source, &parameter.name) {
        let mut out = String::with_capacity(source.len() + literal.len());
        out.push_str(&source[..rhs.start]);
        out.push_str(&literal);
        out.push_str(&source[rhs.end..]);
        let line = source[..rhs.start].matches('\n').count() + 1;
        return Rewrite {
            source: out,
            outcome: RewriteOutcome::Replaced { line },
        };
    }

    if options.inject_if_missing {
        let injected = format!("{} = {}; {}\n{}", parameter.name, literal, INJECTED_TAG, source);
        return Rewrite {
            source: injected,
            outcome: RewriteOutcome::Injected,
        };
    }

    Rewrite {
        source: source.to_string(),
        outcome: RewriteOutcome::Unchanged,
    }
}

/// Apply several parameters in order
pub fn rewrite_all<'a>(
    source: &str,
    parameters: impl IntoIterator<Item = &'a Parameter>,
    options: RewriteOptions,
) -> String {
    parameters
        .into_iter()
        .fold(source.to_string(), |code, parameter| {
            rewrite_with(&code, parameter, options).source
        })
}

/// Byte range of the right-hand side of the first top-level assignment to `name`
pub fn find_assignment(source: &str, name: &str) -> Option<Range<usize>> {
    top_level_line_starts(source).into_iter().find_map(|start| {
        let pair = AssignmentParser::parse(Rule::assignment, &source[start..])
            .ok()?
            .next()?;

        let mut identifier = None;
        let mut expression = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::identifier => identifier = Some(inner.as_str()),
                Rule::expression => expression = Some(inner.as_span()),
                _ => {}
            }
        }

        if identifier? != name {
            return None;
        }
        let span = expression?;
        Some(start + span.start()..start + span.end())
    })
}

/// Offsets of lines that begin outside any `{}`, `()` or `[]` group, string
/// or block comment
fn top_level_line_starts(source: &str) -> Vec<usize> {
    let bytes = source.as_bytes();
    let mut starts = Vec::new();
    let mut braces: usize = 0;
    let mut parens: usize = 0;
    let mut brackets: usize = 0;
    let mut in_string = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;
    let mut at_line_start = true;
    let mut i = 0;

    while i < bytes.len() {
        let nested = braces > 0 || parens > 0 || brackets > 0;
        if at_line_start && !nested && !in_string && !in_block_comment {
            starts.push(i);
        }
        at_line_start = false;

        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        if b == b'\n' {
            in_line_comment = false;
            at_line_start = true;
        } else if in_line_comment {
            // skip to end of line
        } else if in_block_comment {
            if b == b'*' && next == Some(b'/') {
                in_block_comment = false;
                i += 1;
            }
        } else if in_string {
            if b == b'\\' {
                i += 1;
            } else if b == b'"' {
                in_string = false;
            }
        } else {
            match (b, next) {
                (b'/', Some(b'/')) => {
                    in_line_comment = true;
                    i += 1;
                }
                (b'/', Some(b'*')) => {
                    in_block_comment = true;
                    i += 1;
                }
                (b'"', _) => in_string = true,
                (b'{', _) => braces += 1,
                (b'}', _) => braces = braces.saturating_sub(1),
                (b'(', _) => parens += 1,
                (b')', _) => parens = parens.saturating_sub(1),
                (b'[', _) => brackets += 1,
                (b']', _) => brackets = brackets.saturating_sub(1),
                _ => {}
            }
        }

        i += 1;
    }

    starts
}
