// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote item layout.
//!
//! The note store is flat. It holds two kinds of items: __tags__ and
//! __notes__. A tag carries a dotted title that doubles as a hierarchical
//! path, e.g., `dotfiles.config.nvim`, and a list of references to the notes
//! it owns. A note carries a bare file name, the file's text, and the time
//! it was last updated.
//!
//! Nothing is ever physically removed from the store. Removal marks an item
//! as deleted, and the store keeps the tombstone around.
//!
//! # Snapshots
//!
//! A [`Snapshot`] is the read view of the store that every operation starts
//! from. It pairs each live tag in the namespace with the live notes it
//! references, in the order the store handed them over.

use crate::reconcile::namespace::Namespace;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
};
use uuid::Uuid;

/// Opaque identifier of a stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generate fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ItemId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.0)
    }
}

/// Named container of notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Identifier of tag.
    pub id: ItemId,

    /// Dotted hierarchical title rooted at the namespace root.
    pub title: String,

    /// Notes directly owned by this tag.
    #[serde(default)]
    pub references: Vec<ItemId>,

    /// Last time tag was changed.
    pub updated_at: DateTime<Utc>,

    /// Tombstone flag.
    #[serde(default)]
    pub deleted: bool,
}

impl Tag {
    /// Construct new tag without any references.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            title: title.into(),
            references: Vec::new(),
            updated_at: Utc::now(),
            deleted: false,
        }
    }

    /// Check if tag directly references target note.
    pub fn references(&self, note: ItemId) -> bool {
        self.references.contains(&note)
    }
}

/// Remote copy of a tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Identifier of note.
    pub id: ItemId,

    /// Bare file name. May contain dots.
    pub title: String,

    /// File content.
    pub text: String,

    /// Last time note content was changed.
    pub updated_at: DateTime<Utc>,

    /// Tombstone flag.
    #[serde(default)]
    pub deleted: bool,
}

impl Note {
    /// Construct new note stamped with the current time.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            title: title.into(),
            text: text.into(),
            updated_at: Utc::now(),
            deleted: false,
        }
    }
}

/// Tag paired with the notes it directly references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagWithNotes {
    pub tag: Tag,
    pub notes: Vec<Note>,
}

impl TagWithNotes {
    /// Construct new pairing.
    pub fn new(tag: Tag, notes: impl IntoIterator<Item = Note>) -> Self {
        Self {
            tag,
            notes: notes.into_iter().collect(),
        }
    }
}

/// Unit of persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Item {
    Tag(Tag),
    Note(Note),
}

impl Item {
    /// Identifier of wrapped item.
    pub fn id(&self) -> ItemId {
        match self {
            Self::Tag(tag) => tag.id,
            Self::Note(note) => note.id,
        }
    }

    /// Check if wrapped item is tombstoned.
    pub fn is_deleted(&self) -> bool {
        match self {
            Self::Tag(tag) => tag.deleted,
            Self::Note(note) => note.deleted,
        }
    }
}

impl From<Tag> for Item {
    fn from(tag: Tag) -> Self {
        Self::Tag(tag)
    }
}

impl From<Note> for Item {
    fn from(note: Note) -> Self {
        Self::Note(note)
    }
}

/// Read view of the remote store restricted to one namespace.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<TagWithNotes>,
}

impl Snapshot {
    /// Construct snapshot from already paired entries.
    pub fn new(entries: impl IntoIterator<Item = TagWithNotes>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Build snapshot out of flat listing of stored items.
    ///
    /// Keeps live tags inside the namespace, and pairs each of them with the
    /// live notes it references. References to missing or deleted notes are
    /// dropped.
    pub fn from_items<'a>(
        items: impl IntoIterator<Item = &'a Item>,
        namespace: &Namespace,
    ) -> Self {
        let mut tags = Vec::new();
        let mut notes = HashMap::new();
        for item in items.into_iter().filter(|item| !item.is_deleted()) {
            match item {
                Item::Tag(tag) if namespace.contains(&tag.title) => tags.push(tag),
                Item::Tag(_) => continue,
                Item::Note(note) => {
                    notes.insert(note.id, note);
                }
            }
        }

        let entries = tags
            .into_iter()
            .map(|tag| {
                let owned = tag
                    .references
                    .iter()
                    .filter_map(|id| notes.get(id))
                    .map(|note| (*note).clone());
                TagWithNotes::new(tag.clone(), owned)
            })
            .collect();

        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagWithNotes> {
        self.entries.iter()
    }

    /// Find first tag whose title matches exactly.
    pub fn find_tag(&self, title: &str) -> Option<&Tag> {
        self.entries
            .iter()
            .map(|entry| &entry.tag)
            .find(|tag| tag.title == title)
    }

    /// Find every note with exact title under every tag with exact title.
    pub fn find_notes(&self, tag_title: &str, note_title: &str) -> Vec<&Note> {
        self.entries
            .iter()
            .filter(|entry| entry.tag.title == tag_title)
            .flat_map(|entry| entry.notes.iter())
            .filter(|note| note.title == note_title)
            .collect()
    }

    /// Count of live notes across all tags.
    pub fn note_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.notes.len()).sum()
    }
}

impl FromIterator<TagWithNotes> for Snapshot {
    fn from_iter<I: IntoIterator<Item = TagWithNotes>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn snapshot_from_items_pairs_live_notes() -> anyhow::Result<()> {
        let namespace = Namespace::default();
        let apple = Note::new("apple", "A");
        let mut banana = Note::new("banana", "B");
        banana.deleted = true;
        let mut fruit = Tag::new("dotfiles.fruit");
        fruit.references = vec![apple.id, banana.id, ItemId::new()];
        let foreign = Tag::new("music.jazz");

        let items = vec![
            Item::from(fruit.clone()),
            Item::from(apple.clone()),
            Item::from(banana),
            Item::from(foreign),
        ];
        let result = Snapshot::from_items(&items, &namespace);
        let expect = Snapshot::new([TagWithNotes::new(fruit, [apple])]);
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn snapshot_from_items_skips_lookalike_root() {
        let namespace = Namespace::default();
        let items = vec![
            Item::from(Tag::new("dotfiles")),
            Item::from(Tag::new("dotfilesextra")),
        ];
        let result = Snapshot::from_items(&items, &namespace);
        assert_eq!(result.len(), 1);
        assert!(result.find_tag("dotfilesextra").is_none());
    }

    #[test]
    fn snapshot_find_notes_spans_duplicate_tags() {
        let first = Note::new("init.lua", "one");
        let second = Note::new("init.lua", "two");
        let snapshot = Snapshot::new([
            TagWithNotes::new(Tag::new("dotfiles.config.nvim"), [first]),
            TagWithNotes::new(Tag::new("dotfiles.config.nvim"), [second]),
        ]);

        let result = snapshot
            .find_notes("dotfiles.config.nvim", "init.lua")
            .into_iter()
            .map(|note| note.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(result, vec!["one", "two"]);
        assert!(snapshot.find_notes("dotfiles.config", "init.lua").is_empty());
    }
}
