// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use chrono::{DateTime, Utc};
use notedot::fs::{FileSystem, LocalFs};
use std::{
    fs::{read_to_string, remove_file, File},
    path::{Path, PathBuf},
    time::SystemTime,
};
use tempfile::TempDir;

/// Throwaway home directory to track dotfiles from.
pub(crate) struct HomeFixture {
    root: TempDir,
}

impl HomeFixture {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            root: tempfile::tempdir()?,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        self.root.path()
    }

    pub(crate) fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.path().join(relative)
    }

    /// Write file below home with current time as modification time.
    pub(crate) fn write(&self, relative: impl AsRef<Path>, contents: impl AsRef<str>) -> Result<PathBuf> {
        let path = self.join(relative);
        LocalFs.write_file(&path, contents.as_ref().as_bytes())?;
        Ok(path)
    }

    /// Write file below home with explicit modification time.
    pub(crate) fn write_at(
        &self,
        relative: impl AsRef<Path>,
        contents: impl AsRef<str>,
        mtime: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let path = self.write(relative, contents)?;

        // INVARIANT: Set modification time after content is on disk.
        File::options()
            .write(true)
            .open(&path)?
            .set_modified(SystemTime::from(mtime))?;

        Ok(path)
    }

    pub(crate) fn read(&self, relative: impl AsRef<Path>) -> Result<String> {
        Ok(read_to_string(self.join(relative))?)
    }

    pub(crate) fn remove(&self, relative: impl AsRef<Path>) -> Result<()> {
        remove_file(self.join(relative))?;
        Ok(())
    }
}
