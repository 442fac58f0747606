// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Shared fixtures for integration tests

#![allow(dead_code)]

use stl_io::{Normal, Triangle, Vertex};

/// Binary STL of a unit cube (12 triangles) written with stl_io
pub fn cube_stl() -> Vec<u8> {
    let corners = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ];
    let faces: [([usize; 3], [f32; 3]); 12] = [
        ([0, 2, 1], [0.0, 0.0, -1.0]),
        ([0, 3, 2], [0.0, 0.0, -1.0]),
        ([4, 5, 6], [0.0, 0.0, 1.0]),
        ([4, 6, 7], [0.0, 0.0, 1.0]),
        ([0, 1, 5], [0.0, -1.0, 0.0]),
        ([0, 5, 4], [0.0, -1.0, 0.0]),
        ([2, 3, 7], [0.0, 1.0, 0.0]),
        ([2, 7, 6], [0.0, 1.0, 0.0]),
        ([1, 2, 6], [1.0, 0.0, 0.0]),
        ([1, 6, 5], [1.0, 0.0, 0.0]),
        ([0, 4, 7], [-1.0, 0.0, 0.0]),
        ([0, 7, 3], [-1.0, 0.0, 0.0]),
    ];

    let triangles: Vec<Triangle> = faces
        .iter()
        .map(|(idx, normal)| Triangle {
            normal: Normal::new(*normal),
            vertices: [
                Vertex::new(corners[idx[0]]),
                Vertex::new(corners[idx[1]]),
                Vertex::new(corners[idx[2]]),
            ],
        })
        .collect();

    let mut bytes = Vec::new();
    stl_io::write_stl(&mut bytes, triangles.iter()).expect("in-memory STL write");
    bytes
}
