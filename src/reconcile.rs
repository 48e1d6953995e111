// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reconciliation between local dotfiles and the remote note store.
//!
//! The remote store is a flat pile of tags and notes. notedot maps each
//! tracked directory below the home directory onto a namespaced tag, and each
//! tracked file onto a note attached to that tag. See [`namespace`] for how
//! paths and tag titles translate into each other.
//!
//! # Operations
//!
//! The [`Reconciler`] exposes the user-facing operations:
//!
//! - __add__: start tracking files, creating any tags their directories need.
//! - __remove__: stop tracking files, pruning tags that become empty.
//! - __sync__: push local changes and pull remote changes.
//! - __status__: report how local files drift from their notes.
//! - __wipe__: stop tracking everything in the namespace.
//!
//! Every operation fetches exactly one snapshot from the store, checks it for
//! namespace conflicts, works out what to change, and hands all changes back
//! to the store in at most one batch. Nothing is physically deleted; removed
//! items are tombstoned.
//!
//! # See Also
//!
//! 1. [`diff`]
//! 2. [`tree`]
//! 3. [`conflict`]

pub mod conflict;
pub mod diff;
pub mod namespace;
pub mod tree;

use crate::{
    fs::{FileSystem, FsError, LocalFs},
    model::{Item, ItemId, Note, Snapshot},
    store::{RemoteStore, StoreError},
};
use diff::{Classification, ItemDiff};
use namespace::{strip_home, Namespace};
use tree::{find_empty_tags, TagLedger, TagTree};

use chrono::Utc;
use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Reconcile local files with a remote store.
#[derive(Debug)]
pub struct Reconciler<S, F = LocalFs>
where
    S: RemoteStore,
    F: FileSystem,
{
    namespace: Namespace,
    store: S,
    fs: F,
}

impl<S, F> Reconciler<S, F>
where
    S: RemoteStore,
    F: FileSystem,
{
    /// Construct new reconciler.
    pub fn new(namespace: Namespace, store: S, fs: F) -> Self {
        Self {
            namespace,
            store,
            fs,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Report drift between local files and their remote notes.
    ///
    /// An empty `paths` reports on every tracked file. Otherwise only paths
    /// at or below the given ones are reported, untracked files included.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::NamespaceConflict`] if snapshot is ambiguous.
    /// - Return [`ReconcileError::PreconditionFailed`] if paths are given but
    ///   nothing is tracked.
    /// - Return [`ReconcileError::NotFound`] if any path does not exist.
    #[instrument(skip(self, home, paths), level = "debug")]
    pub fn status(
        &self,
        home: impl AsRef<Path>,
        paths: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Result<Vec<ItemDiff>> {
        let home = require_home(home.as_ref())?;
        let paths = dedup_paths(paths);
        let snapshot = self.fetch()?;

        diff::diff(&self.fs, &self.namespace, &snapshot, home, &paths)
    }

    /// Start tracking files.
    ///
    /// Directories are expanded into the regular files they contain. Files
    /// that are already tracked are left alone. Missing tags are created for
    /// the directories of new files, ancestors included.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::InvalidArgument`] if home or paths is empty.
    /// - Return [`ReconcileError::NotFound`] if any path does not exist.
    /// - Return [`ReconcileError::NamespaceConflict`] if snapshot is ambiguous.
    /// - Return [`ReconcileError::DuplicateItem`] if a file is tracked by more
    ///   than one note.
    /// - Return [`ReconcileError::Fs`] if files cannot be walked or read.
    /// - Return [`ReconcileError::Store`] if the batch cannot be persisted.
    #[instrument(skip(self, home, paths), level = "debug")]
    pub fn add(
        &mut self,
        home: impl AsRef<Path>,
        paths: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Result<AddOutcome> {
        let home = require_home(home.as_ref())?;
        let paths = require_paths(&self.fs, dedup_paths(paths))?;
        let snapshot = self.fetch()?;

        let mut outcome = AddOutcome::default();
        let mut files = Vec::new();
        for path in paths {
            if self.fs.is_symlink(&path) {
                warn!("refuse to track symlink {:?}", path.display());
                outcome.paths.push((path, AddStatus::Invalid));
            } else if self.fs.is_dir(&path) {
                files.extend(self.fs.walk(&path)?);
            } else {
                files.push(path);
            }
        }

        let mut grouped: BTreeMap<String, Vec<Note>> = BTreeMap::new();
        for file in dedup_paths(files) {
            let Some((tag_title, note_title)) = self.namespace.locate(&file, home) else {
                warn!("cannot track {:?} under {:?}", file.display(), home.display());
                outcome.paths.push((file, AddStatus::Invalid));
                continue;
            };

            match snapshot.find_notes(&tag_title, &note_title).len() {
                0 => {
                    let text = self.fs.read_text(&file)?;
                    debug!("track {:?} as {note_title:?} under {tag_title:?}", file.display());
                    grouped
                        .entry(tag_title)
                        .or_default()
                        .push(Note::new(note_title, text));
                    outcome.paths.push((file, AddStatus::Added));
                }
                1 => {
                    debug!("{:?} already tracked", file.display());
                    outcome.paths.push((file, AddStatus::AlreadyTracked));
                }
                count => {
                    return Err(ReconcileError::DuplicateItem {
                        tag_title,
                        note_title,
                        count,
                    });
                }
            }
        }

        if grouped.is_empty() {
            info!("no new files to track");
            return Ok(outcome);
        }

        let mut ledger = TagLedger::from_snapshot(&snapshot);
        for (tag_title, notes) in &grouped {
            if !ledger.contains(tag_title) {
                let created = ledger.missing_ancestors(tag_title);
                ledger = ledger.with_created(created);
            }
            ledger = ledger.with_attached(tag_title, notes);
        }

        let root = self.namespace.root();
        if !ledger.contains(root) {
            let created = ledger.missing_ancestors(root);
            ledger = ledger.with_created(created);
        }

        let tags = ledger.into_staged();
        let notes = grouped.into_values().flatten().collect::<Vec<_>>();
        outcome.tags_pushed = tags.len();
        outcome.notes_pushed = notes.len();

        let batch = tags
            .into_iter()
            .map(Item::from)
            .chain(notes.into_iter().map(Item::from))
            .collect();
        self.store.persist_batch(batch)?;
        info!(
            "pushed {} tags and {} notes",
            outcome.tags_pushed, outcome.notes_pushed
        );

        Ok(outcome)
    }

    /// Stop tracking files.
    ///
    /// A directory stops tracking every note of its tag and of all tags below
    /// it. Tags left without notes anywhere in their subtree are pruned.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::InvalidArgument`] if home or paths is empty.
    /// - Return [`ReconcileError::NotFound`] if any path does not exist.
    /// - Return [`ReconcileError::NamespaceConflict`] if snapshot is ambiguous.
    /// - Return [`ReconcileError::NoItemsToRemove`] if nothing matched.
    /// - Return [`ReconcileError::Store`] if the batch cannot be persisted.
    #[instrument(skip(self, home, paths), level = "debug")]
    pub fn remove(
        &mut self,
        home: impl AsRef<Path>,
        paths: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Result<RemoveOutcome> {
        let home = require_home(home.as_ref())?;
        let paths = require_paths(&self.fs, dedup_paths(paths))?;
        let snapshot = self.fetch()?;
        let tree = TagTree::build(&snapshot);

        let mut outcome = RemoveOutcome::default();
        let mut matched: Vec<&Note> = Vec::new();
        let mut deleting = HashSet::new();
        for path in paths {
            let found = if self.fs.is_dir(&path) {
                self.namespace
                    .locate_dir(&path, home)
                    .and_then(|title| tree.find(&title))
                    .map(|node| tree.subtree_notes(node))
                    .unwrap_or_default()
            } else {
                self.namespace
                    .locate(&path, home)
                    .map(|(tag_title, note_title)| snapshot.find_notes(&tag_title, &note_title))
                    .unwrap_or_default()
            };

            if found.is_empty() {
                debug!("{:?} is not tracked", path.display());
                outcome.not_tracked += 1;
                outcome.paths.push((path, RemoveStatus::NotTracked));
                continue;
            }

            if found.len() > 1 && !self.fs.is_dir(&path) {
                warn!("{:?} is tracked {} times", path.display(), found.len());
            }

            let instances = found.len();
            for note in found {
                if deleting.insert(note.id) {
                    matched.push(note);
                }
            }
            outcome.paths.push((path, RemoveStatus::Removed { instances }));
        }

        let pruned = find_empty_tags(&snapshot, &deleting);
        if matched.is_empty() && pruned.is_empty() {
            return Err(ReconcileError::NoItemsToRemove);
        }

        let now = Utc::now();
        outcome.notes_removed = matched.len();
        outcome.tags_removed = pruned.len();
        let notes = matched.into_iter().cloned().map(|mut note| {
            note.deleted = true;
            note.updated_at = now;
            Item::from(note)
        });
        let tags = pruned.into_iter().map(|mut tag| {
            tag.deleted = true;
            tag.updated_at = now;
            Item::from(tag)
        });
        self.store.persist_batch(notes.chain(tags).collect())?;
        info!(
            "removed {} notes and {} tags",
            outcome.notes_removed, outcome.tags_removed
        );

        Ok(outcome)
    }

    /// Merge local and remote changes.
    ///
    /// Local files that changed at or after their note are pushed. Notes
    /// that changed after their file, or whose file is gone, are pulled.
    /// Paths at or below any exclude entry are left alone.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::InvalidArgument`] if home is empty.
    /// - Return [`ReconcileError::NamespaceConflict`] if snapshot is ambiguous.
    /// - Return [`ReconcileError::Fs`] if files cannot be read or written.
    /// - Return [`ReconcileError::Store`] if the batch cannot be persisted.
    #[instrument(skip(self, home, exclude), level = "debug")]
    pub fn sync(
        &mut self,
        home: impl AsRef<Path>,
        exclude: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Result<SyncOutcome> {
        let home = require_home(home.as_ref())?;
        let snapshot = self.fetch()?;
        let exclude = dedup_paths(exclude)
            .into_iter()
            .map(|path| strip_home(path, home))
            .collect::<Vec<_>>();

        let mut push = Vec::new();
        let mut pull = Vec::new();
        for item in diff::diff(&self.fs, &self.namespace, &snapshot, home, &[])? {
            if exclude
                .iter()
                .any(|excluded| item.home_relative.starts_with(excluded))
            {
                debug!("exclude {:?}", item.home_relative.display());
                continue;
            }

            match item.classification {
                Classification::LocalNewer => push.push(item),
                Classification::LocalMissing | Classification::RemoteNewer => pull.push(item),
                Classification::Identical | Classification::Untracked => continue,
            }
        }

        if push.is_empty() && pull.is_empty() {
            info!("nothing to do");
            return Ok(SyncOutcome::default());
        }

        let now = Utc::now();
        let batch = push
            .into_iter()
            .filter_map(|item| match (item.remote, item.local) {
                (Some(mut note), Some(local)) => {
                    debug!("push {:?}", item.home_relative.display());
                    note.text = local;
                    note.updated_at = now;
                    Some(Item::from(note))
                }
                _ => None,
            })
            .collect::<Vec<_>>();

        let outcome = SyncOutcome {
            pushed: batch.len(),
            pulled: pull.len(),
        };

        if !batch.is_empty() {
            self.store.persist_batch(batch)?;
        }

        for item in pull {
            if let Some(note) = &item.remote {
                debug!("pull {:?}", item.home_relative.display());
                self.fs.write_file(&item.path, note.text.as_bytes())?;
            }
        }
        info!("pushed {} and pulled {}", outcome.pushed, outcome.pulled);

        Ok(outcome)
    }

    /// Stop tracking everything in the namespace.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::NamespaceConflict`] if snapshot is ambiguous.
    /// - Return [`ReconcileError::NoItemsToRemove`] if the namespace is empty.
    /// - Return [`ReconcileError::Store`] if the batch cannot be persisted.
    #[instrument(skip(self), level = "debug")]
    pub fn wipe(&mut self) -> Result<WipeOutcome> {
        let snapshot = self.fetch()?;
        if snapshot.is_empty() {
            return Err(ReconcileError::NoItemsToRemove);
        }

        let now = Utc::now();
        let mut seen: HashSet<ItemId> = HashSet::new();
        let mut outcome = WipeOutcome::default();
        let mut batch = Vec::new();
        for entry in snapshot.iter() {
            for note in &entry.notes {
                if seen.insert(note.id) {
                    let mut note = note.clone();
                    note.deleted = true;
                    note.updated_at = now;
                    batch.push(Item::from(note));
                    outcome.notes_removed += 1;
                }
            }

            if seen.insert(entry.tag.id) {
                let mut tag = entry.tag.clone();
                tag.deleted = true;
                tag.updated_at = now;
                batch.push(Item::from(tag));
                outcome.tags_removed += 1;
            }
        }

        self.store.persist_batch(batch)?;
        info!(
            "wiped {} notes and {} tags",
            outcome.notes_removed, outcome.tags_removed
        );

        Ok(outcome)
    }

    fn fetch(&self) -> Result<Snapshot> {
        let snapshot = self.store.fetch_snapshot(&self.namespace)?;
        debug!(
            "fetched {} tags and {} notes",
            snapshot.len(),
            snapshot.note_count()
        );
        conflict::preflight(&snapshot, &self.namespace)?;

        Ok(snapshot)
    }
}

/// Per-path result of [`Reconciler::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStatus {
    Added,
    AlreadyTracked,
    Invalid,
}

/// Summary of [`Reconciler::add`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub tags_pushed: usize,
    pub notes_pushed: usize,
    pub paths: Vec<(PathBuf, AddStatus)>,
}

/// Per-path result of [`Reconciler::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveStatus {
    /// Path matched this many notes.
    Removed { instances: usize },
    NotTracked,
}

/// Summary of [`Reconciler::remove`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub notes_removed: usize,
    pub tags_removed: usize,
    pub not_tracked: usize,
    pub paths: Vec<(PathBuf, RemoveStatus)>,
}

/// Summary of [`Reconciler::sync`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub pushed: usize,
    pub pulled: usize,
}

impl SyncOutcome {
    /// Check if sync had nothing to do.
    pub fn is_noop(&self) -> bool {
        self.pushed == 0 && self.pulled == 0
    }
}

/// Summary of [`Reconciler::wipe`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WipeOutcome {
    pub notes_removed: usize,
    pub tags_removed: usize,
}

fn require_home(home: &Path) -> Result<&Path> {
    if home.as_os_str().is_empty() {
        return Err(ReconcileError::InvalidArgument("home directory is empty".into()));
    }

    Ok(home)
}

fn require_paths(fs: &impl FileSystem, paths: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        return Err(ReconcileError::InvalidArgument("no paths given".into()));
    }

    if let Some(missing) = paths.iter().find(|path| !fs.exists(path)) {
        return Err(ReconcileError::NotFound {
            path: missing.clone(),
        });
    }

    Ok(paths)
}

fn dedup_paths(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .map(Into::into)
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Reconciliation error types.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Required local path does not exist.
    #[error("path {:?} does not exist", path.display())]
    NotFound { path: PathBuf },

    /// Operation invoked against an unusable snapshot.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Tag titles and note paths collide.
    #[error("tags and notes collide in namespace: {}", conflicts.join(", "))]
    NamespaceConflict { conflicts: Vec<String> },

    /// Same note title appears more than once under one tag.
    #[error("{count} notes titled {note_title:?} exist under tag {tag_title:?}")]
    DuplicateItem {
        tag_title: String,
        note_title: String,
        count: usize,
    },

    /// Nothing matched for deletion.
    #[error("no items to remove")]
    NoItemsToRemove,

    /// Required argument is missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Local file system access fails.
    #[error(transparent)]
    Fs(#[from] FsError),

    /// Remote store access fails.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Friendly result alias :3
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
