// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tag hierarchy management.
//!
//! Tag titles are stored as dotted strings, but hierarchy questions are
//! answered on a parsed [`TagTree`]. The tree is an arena of nodes indexed by
//! position. Each node knows its parent and children by index. Ancestors that
//! have no stored tag still get a node, so that the tree is always connected
//! from the top-level title down.
//!
//! # Invariants
//!
//! - A parent node is always inserted before any of its children, so parent
//!   indices are strictly smaller than child indices and cycles cannot exist.
//! - Only stored tags are ever created, attached to, or pruned. Implied
//!   ancestor nodes have nothing to persist.

use super::namespace::SEPARATOR;
use crate::model::{ItemId, Note, Snapshot, Tag};

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Index of node inside [`TagTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node<'a> {
    title: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tags: Vec<&'a Tag>,
    notes: Vec<&'a Note>,
}

/// Parsed tag hierarchy of a snapshot.
#[derive(Debug)]
pub struct TagTree<'a> {
    nodes: Vec<Node<'a>>,
    index: HashMap<String, NodeId>,
}

impl<'a> TagTree<'a> {
    /// Parse snapshot into tree.
    ///
    /// Tags sharing a title share one node.
    pub fn build(snapshot: &'a Snapshot) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        };

        for entry in snapshot.iter() {
            let id = tree.insert(&entry.tag.title);
            let node = &mut tree.nodes[id.0];
            node.tags.push(&entry.tag);
            node.notes.extend(entry.notes.iter());
        }

        tree
    }

    fn insert(&mut self, title: &str) -> NodeId {
        if let Some(id) = self.index.get(title) {
            return *id;
        }

        let parent = parent_title(title).map(|parent| self.insert(parent));
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            title: title.to_owned(),
            parent,
            children: Vec::new(),
            tags: Vec::new(),
            notes: Vec::new(),
        });

        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        self.index.insert(title.to_owned(), id);

        id
    }

    /// Find node by exact title.
    pub fn find(&self, title: &str) -> Option<NodeId> {
        self.index.get(title).copied()
    }

    #[cfg(test)]
    fn title(&self, id: NodeId) -> &str {
        &self.nodes[id.0].title
    }

    #[cfg(test)]
    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    #[cfg(test)]
    fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Collect notes of node and of every descendant.
    pub fn subtree_notes(&self, id: NodeId) -> Vec<&'a Note> {
        let mut notes = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current.0];
            notes.extend(node.notes.iter().copied());
            stack.extend(node.children.iter().rev().copied());
        }

        notes
    }

    /// Determine which stored tags become empty if target notes go away.
    ///
    /// A node is pruned when it retains no notes and all of its children are
    /// pruned. Children always sit at larger indices than their parent, so a
    /// single reverse sweep over the arena settles every node bottom-up. The
    /// namespace root falls out of the same rule: it only goes once every
    /// direct child is gone and it holds nothing itself.
    ///
    /// Returned tags are ordered descendants first, without duplicates.
    pub fn empty_tags(&self, deleting: &HashSet<ItemId>) -> Vec<Tag> {
        let mut pruned = vec![false; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate().rev() {
            let retained = node
                .notes
                .iter()
                .filter(|note| !deleting.contains(&note.id))
                .count();
            pruned[index] = retained == 0 && node.children.iter().all(|child| pruned[child.0]);
        }

        let mut seen = HashSet::new();
        self.nodes
            .iter()
            .enumerate()
            .rev()
            .filter(|(index, _)| pruned[*index])
            .flat_map(|(_, node)| node.tags.iter())
            .filter(|tag| seen.insert(tag.id))
            .map(|tag| (*tag).clone())
            .collect()
    }
}

/// Find stored tags that would be left empty after deleting target notes.
pub fn find_empty_tags(snapshot: &Snapshot, deleting: &HashSet<ItemId>) -> Vec<Tag> {
    TagTree::build(snapshot).empty_tags(deleting)
}

/// Create tags for every prefix of title that does not exist yet.
///
/// Prefixes are visited shortest first, so the returned tags are ordered
/// ancestor to descendant, and the last one is the full title when it was
/// missing.
pub fn create_missing_ancestors(title: &str, exists: impl Fn(&str) -> bool) -> Vec<Tag> {
    let mut created: Vec<Tag> = Vec::new();
    for prefix in prefixes(title) {
        if exists(prefix) || created.iter().any(|tag| tag.title == prefix) {
            continue;
        }
        created.push(Tag::new(prefix));
    }

    created
}

/// Add references from tag to notes.
///
/// Existing references are kept, and no reference is added twice.
pub fn attach<'n>(mut tag: Tag, notes: impl IntoIterator<Item = &'n Note>) -> Tag {
    let mut changed = false;
    for note in notes {
        if !tag.references(note.id) {
            tag.references.push(note.id);
            changed = true;
        }
    }

    if changed {
        tag.updated_at = Utc::now();
    }

    tag
}

/// Working set of tags for one batch of additions.
///
/// Each step consumes the ledger and hands back the updated one, so tags
/// created for one path are visible to every later path in the batch.
#[derive(Debug, Default, Clone)]
pub struct TagLedger {
    tags: BTreeMap<String, Tag>,
    staged: BTreeSet<String>,
}

impl TagLedger {
    /// Start ledger from the stored tags of a snapshot.
    ///
    /// The first stored tag wins when several share a title.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut tags = BTreeMap::new();
        for entry in snapshot.iter() {
            tags.entry(entry.tag.title.clone())
                .or_insert_with(|| entry.tag.clone());
        }

        Self {
            tags,
            staged: BTreeSet::new(),
        }
    }

    pub fn contains(&self, title: &str) -> bool {
        self.tags.contains_key(title)
    }

    /// Tags needed to make title and all its ancestors exist.
    pub fn missing_ancestors(&self, title: &str) -> Vec<Tag> {
        create_missing_ancestors(title, |prefix| self.contains(prefix))
    }

    /// Fold newly created tags into ledger.
    pub fn with_created(mut self, created: impl IntoIterator<Item = Tag>) -> Self {
        for tag in created {
            self.staged.insert(tag.title.clone());
            self.tags.insert(tag.title.clone(), tag);
        }

        self
    }

    /// Attach notes to the tag with target title.
    ///
    /// Does nothing if no such tag is known.
    pub fn with_attached<'n>(
        mut self,
        title: &str,
        notes: impl IntoIterator<Item = &'n Note>,
    ) -> Self {
        if let Some(tag) = self.tags.remove(title) {
            let before = tag.references.len();
            let tag = attach(tag, notes);
            if tag.references.len() != before {
                self.staged.insert(title.to_owned());
            }
            self.tags.insert(title.to_owned(), tag);
        }

        self
    }

    /// Tags that were created or changed, ordered by title.
    pub fn into_staged(mut self) -> Vec<Tag> {
        self.staged
            .iter()
            .filter_map(|title| self.tags.remove(title))
            .collect()
    }
}

fn parent_title(title: &str) -> Option<&str> {
    title.rfind(SEPARATOR).map(|split| &title[..split])
}

fn prefixes(title: &str) -> impl Iterator<Item = &str> {
    title
        .match_indices(SEPARATOR)
        .map(|(split, _)| &title[..split])
        .chain(std::iter::once(title))
}
