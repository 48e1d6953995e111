// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Preflight namespace conflict check.
//!
//! Tag titles and note paths share one string namespace. A note titled `z`
//! under tag `x.y` flattens to `x.y.z`, which is exactly the title a tag for
//! a directory named `z` would have. When both exist, looking up either one
//! by name becomes ambiguous, so every operation refuses to touch a snapshot
//! that contains such a collision.

use super::{namespace::Namespace, ReconcileError, Result};
use crate::model::Snapshot;

use std::collections::BTreeSet;
use tracing::warn;

/// Check that no note path collides with a tag title.
///
/// Notes under the root tag keep their own leading dot, so `.fruit` under
/// `dotfiles` flattens to `dotfiles.fruit`.
///
/// # Errors
///
/// - Return [`ReconcileError::NamespaceConflict`] listing every colliding
///   string in sorted order.
pub fn preflight(snapshot: &Snapshot, namespace: &Namespace) -> Result<()> {
    let tag_titles = snapshot
        .iter()
        .map(|entry| entry.tag.title.as_str())
        .collect::<BTreeSet<_>>();

    let conflicts = snapshot
        .iter()
        .flat_map(|entry| {
            entry
                .notes
                .iter()
                .map(move |note| note_path(namespace, &entry.tag.title, &note.title))
        })
        .filter(|path| tag_titles.contains(path.as_str()))
        .collect::<BTreeSet<_>>();

    if conflicts.is_empty() {
        return Ok(());
    }

    let conflicts = conflicts.into_iter().collect::<Vec<_>>();
    warn!("namespace conflicts detected: {conflicts:?}");
    Err(ReconcileError::NamespaceConflict { conflicts })
}

fn note_path(namespace: &Namespace, tag_title: &str, note_title: &str) -> String {
    if namespace.is_root(tag_title) {
        format!("{tag_title}{note_title}")
    } else {
        format!("{tag_title}.{note_title}")
    }
}
