// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Parameter model and source rewriting

mod rewrite;
mod value;

pub use rewrite::{
    find_assignment, rewrite, rewrite_all, rewrite_with, Rewrite, RewriteOptions, RewriteOutcome,
};
pub use value::{Parameter, ParameterKind, ParameterParseError, ParameterSet, ParameterValue};
