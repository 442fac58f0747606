// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Request-scoped virtual filesystem
//!
//! Each compile gets its own temporary directory that the compiler sees as
//! its filesystem root. Guest paths are absolute (`/work/input.scad`) and
//! resolve beneath that directory. The directory is removed on drop.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

pub struct VirtualFs {
    root: TempDir,
}

impl VirtualFs {
    /// Create a fresh namespace tagged with the request id
    pub fn for_request(request_id: &str) -> io::Result<Self> {
        let root = tempfile::Builder::new()
            .prefix(&format!("polyframe-{request_id}-"))
            .tempdir()?;
        Ok(Self { root })
    }

    /// Host directory backing the guest root
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Host location of a guest path
    pub fn host_path(&self, guest: &str) -> io::Result<PathBuf> {
        let mut host = self.root.path().to_path_buf();
        for component in Path::new(guest).components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(part) => host.push(part),
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("guest path escapes sandbox: {guest}"),
                    ));
                }
            }
        }
        Ok(host)
    }

    pub fn mkdir_all(&self, guest: &str) -> io::Result<()> {
        fs::create_dir_all(self.host_path(guest)?)
    }

    pub fn write(&self, guest: &str, contents: impl AsRef<[u8]>) -> io::Result<()> {
        let host = self.host_path(guest)?;
        if let Some(parent) = host.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(host, contents)
    }

    pub fn read(&self, guest: &str) -> io::Result<Vec<u8>> {
        fs::read(self.host_path(guest)?)
    }

    pub fn exists(&self, guest: &str) -> bool {
        self.host_path(guest).map(|p| p.exists()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read() -> io::Result<()> {
        let vfs = VirtualFs::for_request("abc")?;
        vfs.write("/work/input.scad", "cube(1);")?;
        assert_eq!(vfs.read("/work/input.scad")?, b"cube(1);");
        assert!(vfs.root().join("work/input.scad").exists());
        Ok(())
    }

    #[test]
    fn test_rejects_escape() -> io::Result<()> {
        let vfs = VirtualFs::for_request("abc")?;
        assert!(vfs.host_path("/work/../../etc/passwd").is_err());
        assert!(vfs.write("../outside", "x").is_err());
        Ok(())
    }

    #[test]
    fn test_namespaces_are_distinct_and_removed() -> io::Result<()> {
        let a = VirtualFs::for_request("same")?;
        let b = VirtualFs::for_request("same")?;
        assert_ne!(a.root(), b.root());

        let root = a.root().to_path_buf();
        a.write("/work/out.stl", [0u8; 4])?;
        drop(a);
        assert!(!root.exists());
        Ok(())
    }
}
