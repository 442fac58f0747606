// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Structural validation of binary STL output
//!
//! Only the byte layout is checked: an 80-byte header, a little-endian
//! triangle count at offset 80, then 50 bytes per triangle. Triangle
//! geometry is never inspected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header plus triangle count
pub const HEADER_LEN: usize = 84;
/// Offset of the little-endian u32 triangle count
pub const TRIANGLE_COUNT_OFFSET: usize = 80;
/// Normal, three vertices and the attribute byte count
pub const TRIANGLE_RECORD_LEN: usize = 50;

pub const ZERO_TRIANGLES_WARNING: &str = "STL reports 0 triangles.";
pub const TRAILING_DATA_WARNING: &str = "STL contains trailing data beyond declared triangle count.";

/// Successful structural check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StlReport {
    pub triangle_count: u32,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StlValidationError {
    #[error("Binary STL output smaller than 84 byte header (received {actual} bytes).")]
    TooSmall { actual: usize },

    #[error("Binary STL truncated. Expected {expected} bytes for {triangles} triangles, received {actual}.")]
    Truncated {
        expected: u64,
        triangles: u32,
        actual: usize,
    },
}

/// Byte length a binary STL with `triangles` records must have
pub fn expected_len(triangles: u32) -> u64 {
    HEADER_LEN as u64 + triangles as u64 * TRIANGLE_RECORD_LEN as u64
}

/// Check `bytes` against the binary STL length invariant
pub fn validate(bytes: &[u8]) -> Result<StlReport, StlValidationError> {
    if bytes.len() < HEADER_LEN {
        return Err(StlValidationError::TooSmall {
            actual: bytes.len(),
        });
    }

    let mut count = [0u8; 4];
    count.copy_from_slice(&bytes[TRIANGLE_COUNT_OFFSET..HEADER_LEN]);
    let triangle_count = u32::from_le_bytes(count);
    let expected = expected_len(triangle_count);

    let mut warnings = Vec::new();
    if triangle_count == 0 {
        warnings.push(ZERO_TRIANGLES_WARNING.to_string());
    }

    let actual = bytes.len() as u64;
    if actual < expected {
        return Err(StlValidationError::Truncated {
            expected,
            triangles: triangle_count,
            actual: bytes.len(),
        });
    }
    if actual > expected {
        warnings.push(TRAILING_DATA_WARNING.to_string());
    }

    Ok(StlReport {
        triangle_count,
        warnings,
    })
}
