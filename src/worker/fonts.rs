// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Best-effort font provisioning
//!
//! `text()` needs fontconfig and at least one font. The sandbox gets a
//! minimal `fonts.conf` pointing at `/fonts` plus one fallback font file.
//! Any failure here becomes a warning; the compile always proceeds.

use super::vfs::VirtualFs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const FONTS_CONF_DIR: &str = "/etc/fonts";
pub const FONTS_CONF: &str = "/etc/fonts/fonts.conf";
pub const FONT_DIR: &str = "/fonts";

/// Minimal fontconfig document listing a single font directory
pub fn fonts_conf(font_dir: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE fontconfig SYSTEM \"urn:fontconfig:fonts.dtd\">\n\
         <fontconfig>\n  <dir>{font_dir}</dir>\n</fontconfig>"
    )
}

/// A font file read from the host
#[derive(Debug, Clone)]
pub struct FontAsset {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Outcome of fetching the fallback font
#[derive(Debug, Clone, Default)]
pub struct FontFetch {
    pub asset: Option<FontAsset>,
    pub warnings: Vec<String>,
}

/// Read the first available candidate font
pub async fn fetch_fallback_font(candidates: &[PathBuf]) -> FontFetch {
    let mut fetch = FontFetch::default();
    if candidates.is_empty() {
        debug!("No fallback font configured");
        return fetch;
    }

    for path in candidates {
        match tokio::fs::read(path).await {
            Ok(bytes) if !bytes.is_empty() => {
                debug!(font = %path.display(), size = bytes.len(), "Fetched fallback font");
                fetch.asset = Some(FontAsset {
                    file_name: font_file_name(path),
                    bytes,
                });
                fetch.warnings.clear();
                return fetch;
            }
            Ok(_) => {
                fetch
                    .warnings
                    .push(format!("Font fetch returned empty file: {}", path.display()));
            }
            Err(e) => {
                fetch
                    .warnings
                    .push(format!("Font fetch failed for {}: {}", path.display(), e));
            }
        }
    }

    for warning in &fetch.warnings {
        warn!("{}", warning);
    }
    fetch
}

/// Write `fonts.conf` and the fetched font into the sandbox.
///
/// `font_dir` is the font directory as the compiler will see it.
/// Returns warnings for anything that could not be written.
pub fn mount(vfs: &VirtualFs, font_dir: &str, fetch: &FontFetch) -> Vec<String> {
    let mut warnings = fetch.warnings.clone();

    let conf = vfs
        .mkdir_all(FONTS_CONF_DIR)
        .and_then(|_| vfs.mkdir_all(FONT_DIR))
        .and_then(|_| vfs.write(FONTS_CONF, fonts_conf(font_dir)));
    if let Err(e) = conf {
        let message = format!("Font configuration could not be written: {e}");
        warn!("{}", message);
        warnings.push(message);
    }

    if let Some(asset) = &fetch.asset {
        let guest = format!("{}/{}", FONT_DIR, asset.file_name);
        match vfs.write(&guest, &asset.bytes) {
            Ok(()) => debug!(path = %guest, "Mounted font"),
            Err(e) => {
                let message = format!("Font could not be mounted at {guest}: {e}");
                warn!("{}", message);
                warnings.push(message);
            }
        }
    }

    warnings
}

fn font_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fallback.ttf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fonts_conf_lists_dir() {
        let conf = fonts_conf("/fonts");
        assert!(conf.starts_with("<?xml"));
        assert!(conf.contains("<dir>/fonts</dir>"));
    }

    #[tokio::test]
    async fn test_no_candidates_is_silent() {
        let fetch = fetch_fallback_font(&[]).await;
        assert!(fetch.asset.is_none());
        assert!(fetch.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_font_degrades_to_warning() {
        let fetch = fetch_fallback_font(&[PathBuf::from("/nonexistent/arial.ttf")]).await;
        assert!(fetch.asset.is_none());
        assert_eq!(fetch.warnings.len(), 1);
        assert!(fetch.warnings[0].contains("arial.ttf"));
    }

    #[tokio::test]
    async fn test_first_readable_candidate_wins() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let font = dir.path().join("Liberation.ttf");
        std::fs::write(&font, b"\0\x01\0\0font")?;

        let fetch = fetch_fallback_font(&[dir.path().join("missing.ttf"), font]).await;
        let asset = fetch.asset.expect("font should load");
        assert_eq!(asset.file_name, "Liberation.ttf");
        assert!(fetch.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn test_mount_writes_conf_and_font() -> std::io::Result<()> {
        let vfs = VirtualFs::for_request("fonts")?;
        let fetch = FontFetch {
            asset: Some(FontAsset {
                file_name: "arial.ttf".into(),
                bytes: vec![1, 2, 3],
            }),
            warnings: Vec::new(),
        };

        let warnings = mount(&vfs, FONT_DIR, &fetch);
        assert!(warnings.is_empty());
        assert_eq!(vfs.read("/fonts/arial.ttf")?, vec![1, 2, 3]);
        let conf = String::from_utf8(vfs.read(FONTS_CONF)?).unwrap();
        assert!(conf.contains("<dir>/fonts</dir>"));
        Ok(())
    }
}
