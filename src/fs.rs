// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local file system access.
//!
//! The reconciliation logic never touches `std::fs` directly. Instead it goes
//! through the [`FileSystem`] trait, which captures the handful of primitives
//! it needs: existence checks, reads, writes, walks, and modification times.
//! [`LocalFs`] implements the trait for the real file system.
//!
//! # Symbolic Links
//!
//! Symbolic links are never followed. Walks skip them with a warning rather
//! than classify or track whatever they point at.

use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use std::{
    fs::{read, symlink_metadata, write},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// File system primitives needed by reconciliation.
pub trait FileSystem {
    /// Check if path exists. Dangling symlinks count as existing.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a directory without following symlinks.
    fn is_dir(&self, path: &Path) -> bool;

    /// Check if path itself is a symlink.
    fn is_symlink(&self, path: &Path) -> bool;

    /// Read raw file content.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write raw file content, creating parent directories as needed.
    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// List every regular file below target directory.
    ///
    /// Symlinks are skipped. Any unreadable entry aborts the whole walk.
    fn walk(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Last modification time of file.
    fn mod_time(&self, path: &Path) -> Result<DateTime<Utc>>;

    /// Read file content as text.
    ///
    /// # Errors
    ///
    /// - Return [`FsError::NotText`] if content is not valid UTF-8.
    fn read_text(&self, path: &Path) -> Result<String> {
        String::from_utf8(self.read_file(path)?).map_err(|_| FsError::NotText {
            path: path.to_path_buf(),
        })
    }
}

/// File system access through the standard library.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    /// Construct new local file system accessor.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        symlink_metadata(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        symlink_metadata(path).is_ok_and(|meta| meta.is_dir())
    }

    fn is_symlink(&self, path: &Path) -> bool {
        symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        read(path).map_err(|err| FsError::ReadFile {
            source: err,
            path: path.to_path_buf(),
        })
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            mkdirp::mkdirp(parent).map_err(|err| FsError::CreateDir {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        write(path, contents).map_err(|err| FsError::WriteFile {
            source: err,
            path: path.to_path_buf(),
        })
    }

    fn walk(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        // INVARIANT: Visit everything, hidden files and ignored files included.
        let walker = WalkBuilder::new(path)
            .standard_filters(false)
            .follow_links(false)
            .build();

        for entry in walker {
            let entry = entry.map_err(|err| FsError::Walk {
                source: err,
                path: path.to_path_buf(),
            })?;

            if entry.path_is_symlink() {
                warn!("skip symlink {:?}", entry.path().display());
                continue;
            }

            if entry.file_type().is_some_and(|kind| kind.is_file()) {
                debug!("walk found {:?}", entry.path().display());
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    fn mod_time(&self, path: &Path) -> Result<DateTime<Utc>> {
        symlink_metadata(path)
            .and_then(|meta| meta.modified())
            .map(DateTime::<Utc>::from)
            .map_err(|err| FsError::ModTime {
                source: err,
                path: path.to_path_buf(),
            })
    }
}

/// File system access error types.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// File cannot be read.
    #[error("failed to read file at {:?}", path.display())]
    ReadFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be written.
    #[error("failed to write file at {:?}", path.display())]
    WriteFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Parent directory cannot be created.
    #[error("failed to create directory at {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Modification time cannot be determined.
    #[error("failed to get modification time of {:?}", path.display())]
    ModTime {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Directory walk hit an unreadable entry.
    #[error("failed to walk directory at {:?}", path.display())]
    Walk {
        #[source]
        source: ignore::Error,
        path: PathBuf,
    },

    /// File content is not UTF-8 text.
    #[error("file at {:?} is not valid UTF-8 text", path.display())]
    NotText { path: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = FsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::create_dir_all;

    #[test]
    fn local_fs_write_file_creates_parents() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let path = home.path().join(".config").join("nvim").join("init.lua");
        let fs = LocalFs::new();

        fs.write_file(&path, b"vim.o.number = true")?;
        assert_eq!(fs.read_text(&path)?, "vim.o.number = true");
        assert!(fs.is_dir(&home.path().join(".config")));

        Ok(())
    }

    #[test]
    fn local_fs_walk_lists_regular_files() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let fs = LocalFs::new();
        fs.write_file(&home.path().join(".vim/vimrc"), b"set nu")?;
        fs.write_file(&home.path().join(".vim/colors/dark.vim"), b"hi Normal")?;
        fs.write_file(&home.path().join(".vim/.hidden"), b"")?;
        create_dir_all(home.path().join(".vim/empty"))?;

        let mut result = fs.walk(&home.path().join(".vim"))?;
        result.sort();
        let expect = vec![
            home.path().join(".vim/.hidden"),
            home.path().join(".vim/colors/dark.vim"),
            home.path().join(".vim/vimrc"),
        ];
        assert_eq!(result, expect);

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn local_fs_walk_skips_symlinks() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let fs = LocalFs::new();
        fs.write_file(&home.path().join("target"), b"secret")?;
        fs.write_file(&home.path().join(".bash/bashrc"), b"alias ll='ls -l'")?;
        std::os::unix::fs::symlink(
            home.path().join("target"),
            home.path().join(".bash/linked"),
        )?;

        let result = fs.walk(&home.path().join(".bash"))?;
        assert_eq!(result, vec![home.path().join(".bash/bashrc")]);
        assert!(fs.is_symlink(&home.path().join(".bash/linked")));

        Ok(())
    }

    #[test]
    fn local_fs_read_text_rejects_binary() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let fs = LocalFs::new();
        let path = home.path().join("blob");
        fs.write_file(&path, &[0xff, 0xfe, 0x00])?;

        assert!(matches!(fs.read_text(&path), Err(FsError::NotText { .. })));

        Ok(())
    }
}
