// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote note store access.
//!
//! notedot never talks to a note service directly. It goes through the
//! [`RemoteStore`] trait, which only knows how to hand over a snapshot of the
//! namespace, and how to take back a batch of changed items. Encrypting,
//! authenticating, and shipping items over the wire is up to whichever store
//! implements the trait.
//!
//! # Provided Stores
//!
//! - [`MemoryStore`] keeps items in memory. Useful for tests and embedding.
//! - [`FileStore`] keeps items in a plain TOML file on disk. The binary uses
//!   it as a local mirror of the namespace.
//!
//! Both stores upsert items by identifier, and keep tombstoned items around
//! instead of dropping them.

use crate::{
    model::{Item, Snapshot},
    reconcile::namespace::Namespace,
};

use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Access to remote store holding tags and notes.
pub trait RemoteStore {
    /// Fetch every live tag of namespace paired with its live notes.
    fn fetch_snapshot(&self, namespace: &Namespace) -> Result<Snapshot>;

    /// Persist created, modified, or tombstoned items in one go.
    fn persist_batch(&mut self, items: Vec<Item>) -> Result<()>;
}

/// Store that keeps items in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: Vec<Item>,
    batches: usize,
}

impl MemoryStore {
    /// Construct new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct store with preloaded items.
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        Self {
            items: items.into_iter().collect(),
            batches: 0,
        }
    }

    /// Every item ever stored, tombstones included.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Number of batches persisted so far.
    pub fn batches(&self) -> usize {
        self.batches
    }
}

impl RemoteStore for MemoryStore {
    fn fetch_snapshot(&self, namespace: &Namespace) -> Result<Snapshot> {
        Ok(Snapshot::from_items(&self.items, namespace))
    }

    fn persist_batch(&mut self, items: Vec<Item>) -> Result<()> {
        upsert(&mut self.items, items);
        self.batches += 1;
        Ok(())
    }
}

/// Store that keeps items in a TOML file.
///
/// The file is read once when the store is opened, and rewritten in full on
/// every persisted batch. A missing file is treated as an empty store.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    items: Vec<Item>,
}

impl FileStore {
    /// Open store file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Read`] if store file exists but cannot be read.
    /// - Return [`StoreError::Deserialize`] if store file is malformed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("no store file at {:?}, start empty", path.display());
            return Ok(Self {
                path,
                items: Vec::new(),
            });
        }

        let content = read_to_string(&path).map_err(|err| StoreError::Read {
            source: err,
            path: path.clone(),
        })?;
        let layout: StoreLayout = toml::de::from_str(&content)?;
        debug!(
            "loaded {} items from {:?}",
            layout.items.len(),
            path.display()
        );

        Ok(Self {
            path,
            items: layout.items,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every item ever stored, tombstones included.
    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

impl RemoteStore for FileStore {
    fn fetch_snapshot(&self, namespace: &Namespace) -> Result<Snapshot> {
        Ok(Snapshot::from_items(&self.items, namespace))
    }

    fn persist_batch(&mut self, items: Vec<Item>) -> Result<()> {
        let mut updated = self.items.clone();
        upsert(&mut updated, items);

        let layout = StoreLayout { items: updated };
        let content = toml::ser::to_string_pretty(&layout)?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            mkdirp::mkdirp(parent).map_err(|err| StoreError::Write {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }
        write(&self.path, content).map_err(|err| StoreError::Write {
            source: err,
            path: self.path.clone(),
        })?;
        info!("wrote {} items to {:?}", layout.items.len(), self.path.display());

        // INVARIANT: Only adopt new items once they are safely on disk.
        self.items = layout.items;

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct StoreLayout {
    #[serde(default, rename = "item")]
    items: Vec<Item>,
}

fn upsert(items: &mut Vec<Item>, batch: Vec<Item>) {
    for item in batch {
        match items.iter_mut().find(|current| current.id() == item.id()) {
            Some(current) => *current = item,
            None => items.push(item),
        }
    }
}

/// Store access error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store file cannot be read.
    #[error("failed to read store file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Store file cannot be written.
    #[error("failed to write store file at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Store file cannot be parsed.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Items cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Note, Tag};
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_store_upserts_by_id() -> anyhow::Result<()> {
        let mut note = Note::new("vimrc", "set nu");
        let mut store = MemoryStore::with_items([Item::from(note.clone())]);

        note.text = "set rnu".into();
        let tag = Tag::new("dotfiles.vim");
        store.persist_batch(vec![Item::from(note.clone()), Item::from(tag.clone())])?;

        assert_eq!(store.items(), &[Item::from(note), Item::from(tag)]);
        assert_eq!(store.batches(), 1);

        Ok(())
    }

    #[test]
    fn file_store_round_trips_through_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("store.toml");
        let namespace = Namespace::default();

        let mut note = Note::new(".bashrc", "export EDITOR=vim\nalias ll='ls -l'\n");
        let mut tag = Tag::new("dotfiles");
        tag.references.push(note.id);
        let mut store = FileStore::open(&path)?;
        assert!(store.fetch_snapshot(&namespace)?.is_empty());
        store.persist_batch(vec![Item::from(tag.clone()), Item::from(note.clone())])?;

        note.deleted = true;
        store.persist_batch(vec![Item::from(note.clone())])?;

        let reopened = FileStore::open(&path)?;
        assert_eq!(reopened.items(), &[Item::from(tag), Item::from(note)]);
        let snapshot = reopened.fetch_snapshot(&namespace)?;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.note_count(), 0);

        Ok(())
    }
}
