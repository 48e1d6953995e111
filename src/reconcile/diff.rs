// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Drift classification between local files and remote notes.
//!
//! Each note in a snapshot is matched against the file it maps to below the
//! home directory, and the pair is given a [`Classification`]. When the
//! caller restricts the comparison to a set of paths, files under those paths
//! that no note maps to are reported as untracked.
//!
//! # Timestamps
//!
//! Content decides first. Only when the local text differs from the remote
//! text are timestamps compared, and a tie goes to the local file.
//!
//! # Skipped Items
//!
//! Notes whose title is not a plain file name, tags whose title does not
//! decode into a directory, and local symlinks are never classified. Each is
//! skipped with a warning so the rest of the snapshot still gets compared.

use super::{
    namespace::{is_note_title, strip_home, Namespace},
    ReconcileError, Result,
};
use crate::{
    fs::FileSystem,
    model::{Note, Snapshot},
};

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Outcome of comparing one local path to its remote note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Local and remote text match.
    Identical,

    /// Remote note has no local file.
    LocalMissing,

    /// Local file changed at or after the remote note.
    LocalNewer,

    /// Remote note changed after the local file.
    RemoteNewer,

    /// Local file has no remote note.
    Untracked,
}

/// Comparison result for a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDiff {
    /// Title of tag owning the note. Empty when the path cannot be tracked.
    pub tag_title: String,

    /// Title of note, i.e., the file name.
    pub note_title: String,

    /// Absolute local path.
    pub path: PathBuf,

    /// Local path relative to home.
    pub home_relative: PathBuf,

    pub classification: Classification,

    /// Remote note, if any.
    pub remote: Option<Note>,

    /// Local text, if it was read.
    pub local: Option<String>,
}

/// Compare snapshot against local file system.
///
/// An empty `paths` compares the whole snapshot. Otherwise only notes at or
/// below the given paths are compared, and untracked files below them are
/// reported as well.
///
/// # Errors
///
/// - Return [`ReconcileError::PreconditionFailed`] if paths are given for an
///   empty snapshot.
/// - Return [`ReconcileError::NotFound`] if any given path does not exist.
/// - Return [`ReconcileError::Fs`] if local files cannot be read or walked.
pub fn diff<F>(
    fs: &F,
    namespace: &Namespace,
    snapshot: &Snapshot,
    home: &Path,
    paths: &[PathBuf],
) -> Result<Vec<ItemDiff>>
where
    F: FileSystem,
{
    if !paths.is_empty() && snapshot.is_empty() {
        return Err(ReconcileError::PreconditionFailed(
            "cannot compare paths against an empty remote snapshot".into(),
        ));
    }

    if let Some(missing) = paths.iter().find(|path| !fs.exists(path)) {
        return Err(ReconcileError::NotFound {
            path: missing.clone(),
        });
    }

    let mut diffs = Vec::new();
    let mut seen = HashSet::new();
    for entry in snapshot.iter() {
        let dir = match namespace.tag_to_path(&entry.tag.title, home) {
            Ok((dir, _)) => dir,
            Err(err) => {
                warn!("skip tag {:?}: {err}", entry.tag.title);
                continue;
            }
        };

        // INVARIANT: Keep tag if it can hold a note at or below some path.
        if !paths.is_empty()
            && !paths
                .iter()
                .any(|path| path.starts_with(&dir) || dir.starts_with(path))
        {
            continue;
        }

        for note in &entry.notes {
            // INVARIANT: Never resolve a remote title outside its tag directory.
            if !is_note_title(&note.title) {
                warn!(
                    "skip note {:?} under {:?}: not a plain file name",
                    note.title, entry.tag.title
                );
                continue;
            }

            let path = dir.join(&note.title);
            if !paths.is_empty() && !paths.iter().any(|restrict| path.starts_with(restrict)) {
                continue;
            }

            if fs.is_symlink(&path) {
                warn!("skip symlink {:?}", path.display());
                seen.insert(path);
                continue;
            }

            let item = classify(fs, home, &entry.tag.title, note, path)?;
            debug!(
                "{:?} classified as {:?}",
                item.home_relative.display(),
                item.classification
            );
            seen.insert(item.path.clone());
            diffs.push(item);
        }
    }

    for path in paths {
        if seen.contains(path) {
            continue;
        }

        if fs.is_symlink(path) {
            warn!("skip symlink {:?}", path.display());
            continue;
        }

        let files = if fs.is_dir(path) {
            fs.walk(path)?
        } else {
            vec![path.clone()]
        };

        for file in files {
            if seen.insert(file.clone()) {
                diffs.push(untracked(namespace, home, file));
            }
        }
    }

    Ok(diffs)
}

fn classify<F>(fs: &F, home: &Path, tag_title: &str, note: &Note, path: PathBuf) -> Result<ItemDiff>
where
    F: FileSystem,
{
    let home_relative = strip_home(&path, home);
    let (classification, local) = if !fs.exists(&path) {
        (Classification::LocalMissing, None)
    } else {
        let local = fs.read_text(&path)?;
        let classification = if local == note.text {
            Classification::Identical
        } else if fs.mod_time(&path)? >= note.updated_at {
            Classification::LocalNewer
        } else {
            Classification::RemoteNewer
        };
        (classification, Some(local))
    };

    Ok(ItemDiff {
        tag_title: tag_title.to_owned(),
        note_title: note.title.clone(),
        path,
        home_relative,
        classification,
        remote: Some(note.clone()),
        local,
    })
}

fn untracked(namespace: &Namespace, home: &Path, path: PathBuf) -> ItemDiff {
    let (tag_title, note_title) = namespace.locate(&path, home).unwrap_or_else(|| {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        (String::new(), name)
    });

    ItemDiff {
        tag_title,
        note_title,
        home_relative: strip_home(&path, home),
        path,
        classification: Classification::Untracked,
        remote: None,
        local: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::LocalFs,
        model::{Tag, TagWithNotes},
    };
    use chrono::{DateTime, Duration, Utc};
    use pretty_assertions::assert_eq;
    use std::{fs::File, time::SystemTime};

    fn touch(path: &Path, contents: &str, mtime: DateTime<Utc>) -> anyhow::Result<()> {
        LocalFs.write_file(path, contents.as_bytes())?;
        File::options()
            .write(true)
            .open(path)?
            .set_modified(SystemTime::from(mtime))?;
        Ok(())
    }

    fn note_at(title: &str, text: &str, updated_at: DateTime<Utc>) -> Note {
        let mut note = Note::new(title, text);
        note.updated_at = updated_at;
        note
    }

    fn classes(diffs: &[ItemDiff]) -> Vec<(String, Classification)> {
        diffs
            .iter()
            .map(|item| {
                (
                    item.home_relative.to_string_lossy().into_owned(),
                    item.classification,
                )
            })
            .collect()
    }

    #[test]
    fn diff_classifies_every_note() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let now = Utc::now();
        touch(&home.path().join(".fruit/apple"), "A", now)?;
        touch(&home.path().join(".fruit/cherry"), "C local", now)?;
        touch(&home.path().join(".fruit/damson"), "D local", now - Duration::hours(1))?;

        let snapshot = Snapshot::new([TagWithNotes::new(
            Tag::new("dotfiles.fruit"),
            [
                note_at("apple", "A", now),
                note_at("banana", "B", now),
                note_at("cherry", "C remote", now - Duration::hours(1)),
                note_at("damson", "D remote", now),
            ],
        )]);

        let result = diff(&LocalFs, &Namespace::default(), &snapshot, home.path(), &[])?;
        let expect = vec![
            (".fruit/apple".to_string(), Classification::Identical),
            (".fruit/banana".to_string(), Classification::LocalMissing),
            (".fruit/cherry".to_string(), Classification::LocalNewer),
            (".fruit/damson".to_string(), Classification::RemoteNewer),
        ];
        assert_eq!(classes(&result), expect);
        assert_eq!(result[2].local.as_deref(), Some("C local"));

        Ok(())
    }

    #[test]
    fn diff_breaks_timestamp_tie_for_local() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        // Whole seconds survive every file system's timestamp granularity.
        let stamp = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        touch(&home.path().join(".gitconfig"), "[user]\nname = me\n", stamp)?;

        let snapshot = Snapshot::new([TagWithNotes::new(
            Tag::new("dotfiles"),
            [note_at(".gitconfig", "[user]\nname = you\n", stamp)],
        )]);

        let result = diff(&LocalFs, &Namespace::default(), &snapshot, home.path(), &[])?;
        assert_eq!(result[0].classification, Classification::LocalNewer);

        Ok(())
    }

    #[test]
    fn diff_restricts_to_paths_and_reports_untracked() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let now = Utc::now();
        touch(&home.path().join(".fruit/apple"), "A", now)?;
        touch(&home.path().join(".fruit/fig"), "F", now)?;
        touch(&home.path().join(".config/nvim/init.lua"), "set", now)?;
        touch(&home.path().join(".config/nvim/extra.lua"), "extra", now)?;

        let snapshot = Snapshot::new([
            TagWithNotes::new(Tag::new("dotfiles.fruit"), [note_at("apple", "A", now)]),
            TagWithNotes::new(
                Tag::new("dotfiles.config.nvim"),
                [note_at("init.lua", "set", now)],
            ),
        ]);

        let paths = vec![home.path().join(".config")];
        let mut result = diff(&LocalFs, &Namespace::default(), &snapshot, home.path(), &paths)?;
        result.sort_by(|a, b| a.path.cmp(&b.path));
        let expect = vec![
            (".config/nvim/extra.lua".to_string(), Classification::Untracked),
            (".config/nvim/init.lua".to_string(), Classification::Identical),
        ];
        assert_eq!(classes(&result), expect);
        assert_eq!(result[0].tag_title, "dotfiles.config.nvim");

        let paths = vec![home.path().join(".fruit/fig")];
        let result = diff(&LocalFs, &Namespace::default(), &snapshot, home.path(), &paths)?;
        assert_eq!(
            classes(&result),
            vec![(".fruit/fig".to_string(), Classification::Untracked)]
        );

        Ok(())
    }

    #[test]
    fn diff_skips_unsafe_note_titles_and_malformed_tags() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let now = Utc::now();
        touch(&home.path().join(".fruit/apple"), "A", now)?;

        let snapshot = Snapshot::new([
            TagWithNotes::new(
                Tag::new("dotfiles.fruit"),
                [
                    note_at("../../escaped", "gotcha", now),
                    note_at("/etc/hosts", "gotcha", now),
                    note_at("apple", "A", now),
                ],
            ),
            TagWithNotes::new(Tag::new("dotfiles.a..b"), [note_at("x", "X", now)]),
        ]);

        let result = diff(&LocalFs, &Namespace::default(), &snapshot, home.path(), &[])?;
        assert_eq!(
            classes(&result),
            vec![(".fruit/apple".to_string(), Classification::Identical)]
        );

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn diff_skips_symlinked_note_paths() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let now = Utc::now();
        touch(&home.path().join(".fruit/cherry"), "C", now)?;
        std::os::unix::fs::symlink(
            home.path().join(".fruit/gone"),
            home.path().join(".fruit/apple"),
        )?;
        std::os::unix::fs::symlink(
            home.path().join(".fruit/cherry"),
            home.path().join(".fruit/banana"),
        )?;

        let snapshot = Snapshot::new([TagWithNotes::new(
            Tag::new("dotfiles.fruit"),
            [
                note_at("apple", "A", now),
                note_at("banana", "B", now),
                note_at("damson", "D", now),
            ],
        )]);

        let result = diff(&LocalFs, &Namespace::default(), &snapshot, home.path(), &[])?;
        assert_eq!(
            classes(&result),
            vec![(".fruit/damson".to_string(), Classification::LocalMissing)]
        );

        let paths = vec![home.path().join(".fruit/apple")];
        let result = diff(&LocalFs, &Namespace::default(), &snapshot, home.path(), &paths)?;
        assert!(result.is_empty());

        Ok(())
    }

    #[test]
    fn diff_rejects_missing_paths_and_empty_snapshot() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        touch(&home.path().join(".zshrc"), "", Utc::now())?;
        let namespace = Namespace::default();

        let paths = vec![home.path().join(".zshrc")];
        let result = diff(&LocalFs, &namespace, &Snapshot::default(), home.path(), &paths);
        assert!(matches!(result, Err(ReconcileError::PreconditionFailed(_))));

        let snapshot = Snapshot::new([TagWithNotes::new(Tag::new("dotfiles"), [])]);
        let paths = vec![home.path().join(".nope")];
        let result = diff(&LocalFs, &namespace, &snapshot, home.path(), &paths);
        assert!(matches!(result, Err(ReconcileError::NotFound { .. })));

        Ok(())
    }
}
