// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CLI support for polyframe-compile

pub mod discovery;
pub mod reporter;

pub use discovery::{discover_scad, output_path_for};
pub use reporter::Reporter;

use crate::params::{Parameter, ParameterKind, ParameterValue};
use anyhow::{bail, Context, Result};

/// Parse a `name=value` assignment.
///
/// Without an explicit kind the value is read as a number, then a boolean,
/// and otherwise kept as a string.
pub fn parse_assignment(text: &str, kind: Option<ParameterKind>) -> Result<Parameter> {
    let Some((name, value)) = text.split_once('=') else {
        bail!("Expected name=value, got: {text}");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Missing parameter name in: {text}");
    }
    let value = value.trim();

    let value = match kind {
        Some(kind) => ParameterValue::parse_as(kind, value)
            .with_context(|| format!("Invalid value for {name}"))?,
        None => [ParameterKind::Number, ParameterKind::Boolean]
            .into_iter()
            .find_map(|kind| ParameterValue::parse_as(kind, value).ok())
            .unwrap_or_else(|| ParameterValue::String(value.to_string())),
    };
    Ok(Parameter::new(name, value))
}
