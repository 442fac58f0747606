// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Base64 transport form of a compiled model

use crate::worker::CompiledModel;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedModel {
    pub stl_base64: String,
    pub triangle_count: u32,
    pub warnings: Vec<String>,
}

impl EncodedModel {
    pub fn from_model(model: &CompiledModel) -> Self {
        Self {
            stl_base64: STANDARD.encode(&model.bytes),
            triangle_count: model.triangle_count,
            warnings: model.warnings.clone(),
        }
    }

    /// Raw STL bytes. Whitespace inside the payload is ignored, so wrapped
    /// or pretty-printed transports decode too.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let compact: String = self
            .stl_base64
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD.decode(compact)
    }
}

impl From<&CompiledModel> for EncodedModel {
    fn from(model: &CompiledModel) -> Self {
        Self::from_model(model)
    }
}
