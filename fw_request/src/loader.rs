// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Access to firmware files.

use std::fs;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use log::debug;
use remain::sorted;
use thiserror::Error;

#[sorted]
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("firmware {0} is empty")]
    Empty(String),
    #[error("invalid firmware path {0}")]
    InvalidPath(String),
    #[error("failed to read firmware {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("firmware {0} not found")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Source of firmware files, identified by path.
///
/// Implementations may block; they are only called from the context that drives a request.
pub trait FirmwareLoader: Send + Sync {
    /// Returns the contents of the file at `path`.
    fn load(&self, path: &str) -> Result<Vec<u8>>;
}

/// Loads firmware from a list of directories, searched in order.
#[derive(Clone, Debug)]
pub struct DirectoryLoader {
    roots: Vec<PathBuf>,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> DirectoryLoader {
        DirectoryLoader {
            roots: vec![root.into()],
        }
    }

    /// Creates a loader searching `roots` in order, like the kernel firmware search path.
    pub fn with_roots<I, P>(roots: I) -> DirectoryLoader
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        DirectoryLoader {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

// Relative paths must stay below the firmware root. Absolute paths, as produced by a firmware
// path override, bypass the search list.
fn check_path(path: &str) -> Result<&Path> {
    let p = Path::new(path);
    let valid = p
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::RootDir));
    if path.is_empty() || !valid {
        return Err(LoadError::InvalidPath(path.to_owned()));
    }
    Ok(p)
}

impl FirmwareLoader for DirectoryLoader {
    fn load(&self, path: &str) -> Result<Vec<u8>> {
        let p = check_path(path)?;
        let candidates: Vec<PathBuf> = if p.is_absolute() {
            vec![p.to_path_buf()]
        } else {
            self.roots.iter().map(|root| root.join(p)).collect()
        };
        let mut empty = false;
        for full in candidates {
            match fs::read(&full) {
                Ok(data) if data.is_empty() => {
                    debug!("skipping empty {}", full.display());
                    empty = true;
                }
                Ok(data) => {
                    debug!("loaded {} ({} bytes)", full.display(), data.len());
                    return Ok(data);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(LoadError::Io {
                        path: path.to_owned(),
                        source,
                    })
                }
            }
        }
        if empty {
            return Err(LoadError::Empty(path.to_owned()));
        }
        Err(LoadError::NotFound(path.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(dir: &TempDir, path: &str, data: &[u8]) {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, data).unwrap();
    }

    #[test]
    fn load_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "brcm/chip.bin", &[0xde, 0xad]);

        let loader = DirectoryLoader::new(dir.path());
        assert_eq!(loader.load("brcm/chip.bin").unwrap(), vec![0xde, 0xad]);
        assert!(matches!(
            loader.load("brcm/other.bin"),
            Err(LoadError::NotFound(p)) if p == "brcm/other.bin"
        ));
    }

    #[test]
    fn search_order() {
        let updates = TempDir::new().unwrap();
        let base = TempDir::new().unwrap();
        write(&updates, "brcm/chip.bin", b"new");
        write(&base, "brcm/chip.bin", b"old");
        write(&base, "brcm/chip.txt", b"nvram");

        let loader = DirectoryLoader::with_roots([updates.path(), base.path()]);
        assert_eq!(loader.roots().len(), 2);
        assert_eq!(loader.load("brcm/chip.bin").unwrap(), b"new");
        assert_eq!(loader.load("brcm/chip.txt").unwrap(), b"nvram");

        // An empty file does not hide the ones in later roots.
        write(&updates, "brcm/chip.clm_blob", &[]);
        write(&base, "brcm/chip.clm_blob", b"clm");
        assert_eq!(loader.load("brcm/chip.clm_blob").unwrap(), b"clm");
        write(&updates, "brcm/chip.txcap_blob", &[]);
        assert!(matches!(
            loader.load("brcm/chip.txcap_blob"),
            Err(LoadError::Empty(p)) if p == "brcm/chip.txcap_blob"
        ));
    }

    #[test]
    fn empty_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "chip.bin", &[]);

        let loader = DirectoryLoader::new(dir.path());
        assert!(matches!(loader.load("chip.bin"), Err(LoadError::Empty(_))));
    }

    #[test]
    fn absolute_path() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        write(&other, "brcm/chip.bin", b"override");

        let loader = DirectoryLoader::new(dir.path());
        let path = other.path().join("brcm/chip.bin");
        assert_eq!(loader.load(path.to_str().unwrap()).unwrap(), b"override");
    }

    #[test]
    fn reject_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let loader = DirectoryLoader::new(dir.path().join("root"));
        write(&dir, "secret.bin", b"secret");

        for path in ["../secret.bin", "brcm/../../secret.bin", "", "./chip.bin"] {
            assert!(
                matches!(loader.load(path), Err(LoadError::InvalidPath(_))),
                "{}",
                path
            );
        }
    }
}
