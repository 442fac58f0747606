// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Typed parameter values and their SCAD literal form

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Parameter overrides keyed by name
pub type ParameterSet = BTreeMap<String, ParameterValue>;

/// A named, typed parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(flatten)]
    pub value: ParameterValue,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, ParameterValue::Number(value))
    }
}

/// Value of a parameter, tagged by its declared type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ParameterValue {
    #[serde(rename = "number")]
    Number(f64),
    #[serde(rename = "string")]
    String(String),
    #[serde(rename = "boolean")]
    Boolean(bool),
    #[serde(rename = "number[]")]
    NumberArray(Vec<f64>),
    #[serde(rename = "string[]")]
    StringArray(Vec<String>),
    #[serde(rename = "boolean[]")]
    BooleanArray(Vec<bool>),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Number(_) => ParameterKind::Number,
            ParameterValue::String(_) => ParameterKind::String,
            ParameterValue::Boolean(_) => ParameterKind::Boolean,
            ParameterValue::NumberArray(_) => ParameterKind::NumberArray,
            ParameterValue::StringArray(_) => ParameterKind::StringArray,
            ParameterValue::BooleanArray(_) => ParameterKind::BooleanArray,
        }
    }

    /// Finite numeric value, if this is a plain number
    pub fn as_finite_number(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    /// Render as a SCAD expression
    pub fn to_scad_literal(&self) -> String {
        match self {
            ParameterValue::Number(v) => number_literal(*v),
            ParameterValue::String(s) => string_literal(s),
            ParameterValue::Boolean(b) => b.to_string(),
            ParameterValue::NumberArray(values) => {
                list_literal(values.iter().map(|v| number_literal(*v)))
            }
            ParameterValue::StringArray(values) => {
                list_literal(values.iter().map(|s| string_literal(s)))
            }
            ParameterValue::BooleanArray(values) => {
                list_literal(values.iter().map(|b| b.to_string()))
            }
        }
    }

    /// Parse command-line text as a value of the given kind.
    ///
    /// Array kinds take a comma-separated list, optionally wrapped in brackets.
    pub fn parse_as(kind: ParameterKind, text: &str) -> Result<Self, ParameterParseError> {
        let text = text.trim();
        match kind {
            ParameterKind::Number => parse_number(text).map(ParameterValue::Number),
            ParameterKind::String => Ok(ParameterValue::String(text.to_string())),
            ParameterKind::Boolean => parse_bool(text).map(ParameterValue::Boolean),
            ParameterKind::NumberArray => split_list(text)
                .map(parse_number)
                .collect::<Result<_, _>>()
                .map(ParameterValue::NumberArray),
            ParameterKind::StringArray => Ok(ParameterValue::StringArray(
                split_list(text).map(str::to_string).collect(),
            )),
            ParameterKind::BooleanArray => split_list(text)
                .map(parse_bool)
                .collect::<Result<_, _>>()
                .map(ParameterValue::BooleanArray),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_scad_literal())
    }
}

/// Declared parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "number[]")]
    NumberArray,
    #[serde(rename = "string[]")]
    StringArray,
    #[serde(rename = "boolean[]")]
    BooleanArray,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::Number => "number",
            ParameterKind::String => "string",
            ParameterKind::Boolean => "boolean",
            ParameterKind::NumberArray => "number[]",
            ParameterKind::StringArray => "string[]",
            ParameterKind::BooleanArray => "boolean[]",
        }
    }
}

impl FromStr for ParameterKind {
    type Err = ParameterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "number" => Ok(ParameterKind::Number),
            "string" => Ok(ParameterKind::String),
            "boolean" | "bool" => Ok(ParameterKind::Boolean),
            "number[]" => Ok(ParameterKind::NumberArray),
            "string[]" => Ok(ParameterKind::StringArray),
            "boolean[]" | "bool[]" => Ok(ParameterKind::BooleanArray),
            other => Err(ParameterParseError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterParseError {
    #[error("unknown parameter type `{0}`")]
    UnknownKind(String),
    #[error("`{0}` is not a number")]
    InvalidNumber(String),
    #[error("`{0}` is not a boolean (expected true or false)")]
    InvalidBoolean(String),
}

/// Shortest decimal form that reads back to the same f64.
/// SCAD has no literal for NaN or infinity, so those become the
/// expressions that evaluate to them.
fn number_literal(value: f64) -> String {
    if value.is_nan() {
        "0/0".to_string()
    } else if value.is_infinite() {
        let literal = if value > 0.0 { "1/0" } else { "-1/0" };
        literal.to_string()
    } else {
        value.to_string()
    }
}

fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn list_literal(items: impl Iterator<Item = String>) -> String {
    format!("[{}]", items.collect::<Vec<_>>().join(","))
}

fn parse_number(text: &str) -> Result<f64, ParameterParseError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| ParameterParseError::InvalidNumber(text.trim().to_string()))
}

fn parse_bool(text: &str) -> Result<bool, ParameterParseError> {
    match text.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ParameterParseError::InvalidBoolean(other.to_string())),
    }
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text);
    inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}
