// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Batch input discovery

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// All `.scad` files under `root`, sorted
pub fn discover_scad(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|s| s == "scad").unwrap_or(false))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Output location for `input`, mirroring its position under `root`
pub fn output_path_for(input: &Path, root: &Path, out_dir: &Path) -> PathBuf {
    let relative = input.strip_prefix(root).unwrap_or(input);
    out_dir.join(relative).with_extension("stl")
}
