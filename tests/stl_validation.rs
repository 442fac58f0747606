// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Structural checks against STL files produced by a real writer

mod common;

use polyframe_compile::stl::{self, StlValidationError, TRAILING_DATA_WARNING};

#[test]
fn test_writer_output_is_valid() {
    let bytes = common::cube_stl();
    assert_eq!(bytes.len(), 84 + 50 * 12);

    let report = stl::validate(&bytes).unwrap();
    assert_eq!(report.triangle_count, 12);
    assert!(report.warnings.is_empty());

    // The checker agrees with a full parser
    let mesh = stl_io::read_stl(&mut std::io::Cursor::new(&bytes)).unwrap();
    assert_eq!(mesh.faces.len() as u32, report.triangle_count);
}

#[test]
fn test_header_contents_are_ignored() {
    let mut bytes = common::cube_stl();
    bytes[..5].copy_from_slice(b"solid");
    let report = stl::validate(&bytes).unwrap();
    assert_eq!(report.triangle_count, 12);
}

#[test]
fn test_cut_short_output_is_truncated() {
    let bytes = common::cube_stl();
    let err = stl::validate(&bytes[..bytes.len() - 1]).unwrap_err();
    assert_eq!(
        err,
        StlValidationError::Truncated {
            expected: 684,
            triangles: 12,
            actual: 683,
        }
    );
    assert_eq!(
        err.to_string(),
        "Binary STL truncated. Expected 684 bytes for 12 triangles, received 683."
    );
}

#[test]
fn test_appended_bytes_warn() {
    let mut bytes = common::cube_stl();
    bytes.extend_from_slice(&[0u8; 7]);
    let report = stl::validate(&bytes).unwrap();
    assert_eq!(report.triangle_count, 12);
    assert_eq!(report.warnings, vec![TRAILING_DATA_WARNING.to_string()]);
}

#[test]
fn test_ascii_stl_is_rejected() {
    let ascii = b"solid cube\n  facet normal 0 0 -1\n    outer loop\n      vertex 0 0 0\n      vertex 1 1 0\n      vertex 1 0 0\n    endloop\n  endfacet\nendsolid cube\n";
    // Bytes 80..84 decode to a huge count that the file cannot hold
    assert!(matches!(
        stl::validate(ascii),
        Err(StlValidationError::Truncated { .. })
    ));
}

#[test]
fn test_eighty_bytes_is_too_small() {
    let err = stl::validate(&[0u8; 80]).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Binary STL output smaller than 84 byte header"));
}
