// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path and tag title translation.
//!
//! Every tracked directory maps to a tag title, and every tag title maps back
//! to a directory. The title is the namespace root followed by the
//! directory's home-relative path with separators replaced by dots. The
//! leading dot of the top-level directory folds into the separator, e.g.,
//! `~/.config/nvim` maps to `dotfiles.config.nvim`, and files placed directly
//! in the home directory live under the root tag itself.
//!
//! # Well-Formed Directories
//!
//! The mapping only round trips for directories whose top-level segment is a
//! hidden name, and whose segments contain no other dots. Anything else
//! cannot be tracked, because its title would decode into a different
//! directory.

use super::{ReconcileError, Result};

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Default namespace root.
pub const DEFAULT_ROOT: &str = "dotfiles";

/// Separator of tag title segments.
pub const SEPARATOR: char = '.';

/// Tag namespace rooted at a fixed title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    root: String,
}

impl Namespace {
    /// Construct new namespace with target root.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::InvalidArgument`] if root is empty, or
    ///   contains a dot or path separator.
    pub fn new(root: impl Into<String>) -> Result<Self> {
        let root = root.into();
        if root.is_empty() || root.contains(SEPARATOR) || root.contains(MAIN_SEPARATOR) {
            return Err(ReconcileError::InvalidArgument(format!(
                "namespace root {root:?} must be a single non-empty segment"
            )));
        }

        Ok(Self { root })
    }

    /// Title of namespace root tag.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Check if title is the namespace root.
    pub fn is_root(&self, title: &str) -> bool {
        title == self.root
    }

    /// Check if title is the root or lies below it.
    pub fn contains(&self, title: &str) -> bool {
        match title.strip_prefix(self.root.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }

    /// Convert home-relative directory into tag title.
    pub fn path_to_tag(&self, home_relative_dir: impl AsRef<Path>) -> String {
        let dir = home_relative_dir.as_ref().to_string_lossy();
        let title = format!("{}{}", self.root, dir).replace(MAIN_SEPARATOR, ".");
        match title.strip_suffix(SEPARATOR) {
            Some(title) => title.to_owned(),
            None => title,
        }
    }

    /// Convert tag title into absolute directory below home.
    ///
    /// Also reports whether the title was the root tag, i.e., whether the
    /// directory is home itself.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::InvalidArgument`] if title or home is
    ///   empty, or title does not belong to namespace.
    pub fn tag_to_path(&self, tag_title: &str, home: impl AsRef<Path>) -> Result<(PathBuf, bool)> {
        let home = home.as_ref();
        if tag_title.is_empty() {
            return Err(ReconcileError::InvalidArgument("tag title is empty".into()));
        }

        if home.as_os_str().is_empty() {
            return Err(ReconcileError::InvalidArgument("home directory is empty".into()));
        }

        if self.is_root(tag_title) {
            return Ok((home.to_path_buf(), true));
        }

        let rest = tag_title
            .strip_prefix(self.root.as_str())
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
            .filter(|rest| rest.split(SEPARATOR).all(|segment| !segment.is_empty()))
            .ok_or_else(|| {
                ReconcileError::InvalidArgument(format!(
                    "tag {tag_title:?} is not a valid title under {:?}",
                    self.root
                ))
            })?;

        let mut dir = home.to_path_buf();
        for (index, segment) in rest.split(SEPARATOR).enumerate() {
            // INVARIANT: Top-level directory gets back the dot it lost.
            if index == 0 {
                dir.push(format!(".{segment}"));
            } else {
                dir.push(segment);
            }
        }

        Ok((dir, false))
    }

    /// Resolve file to the tag title and note title that track it.
    ///
    /// Returns `None` if file is not under home, or its directory is not
    /// well-formed.
    pub fn locate(&self, file: impl AsRef<Path>, home: impl AsRef<Path>) -> Option<(String, String)> {
        let relative = file.as_ref().strip_prefix(home.as_ref()).ok()?;
        let note_title = relative.file_name()?.to_str()?.to_owned();
        let dir = relative.parent().unwrap_or_else(|| Path::new(""));
        if !is_well_formed(dir) {
            return None;
        }

        Some((self.path_to_tag(dir), note_title))
    }

    /// Resolve directory to the tag title that tracks it.
    ///
    /// Returns `None` if directory is not under home, or is not well-formed.
    pub fn locate_dir(&self, dir: impl AsRef<Path>, home: impl AsRef<Path>) -> Option<String> {
        let relative = dir.as_ref().strip_prefix(home.as_ref()).ok()?;
        is_well_formed(relative).then(|| self.path_to_tag(relative))
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.into(),
        }
    }
}

/// Remove home prefix from path.
///
/// Leaves path untouched if home is empty or not a prefix of path.
pub fn strip_home(path: impl AsRef<Path>, home: impl AsRef<Path>) -> PathBuf {
    let (path, home) = (path.as_ref(), home.as_ref());
    if home.as_os_str().is_empty() {
        return path.to_path_buf();
    }

    path.strip_prefix(home)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Check if title names a single file, i.e., a lone normal path component.
pub fn is_note_title(title: &str) -> bool {
    let mut components = Path::new(title).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == title
    );

    single && !title.contains(MAIN_SEPARATOR) && !title.contains('/')
}

fn is_well_formed(dir: &Path) -> bool {
    let mut segments = dir.components().map(|component| match component {
        Component::Normal(segment) => segment.to_str(),
        _ => None,
    });

    let top = match segments.next() {
        None => return true,
        Some(top) => top,
    };

    let top_ok = top
        .and_then(|top| top.strip_prefix('.'))
        .is_some_and(|name| !name.is_empty() && !name.contains(SEPARATOR));

    top_ok && segments.all(|segment| segment.is_some_and(|name| !name.contains(SEPARATOR)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("", "dotfiles"; "home directory")]
    #[test_case(".fruit", "dotfiles.fruit"; "top level directory")]
    #[test_case(".fruit/", "dotfiles.fruit"; "trailing separator")]
    #[test_case(".config/nvim/lua", "dotfiles.config.nvim.lua"; "nested directory")]
    #[test]
    fn path_to_tag_flattens_directory(dir: &str, expect: &str) {
        let namespace = Namespace::default();
        assert_eq!(namespace.path_to_tag(dir), expect);
    }

    #[test_case(""; "home directory")]
    #[test_case(".fruit"; "top level directory")]
    #[test_case(".config/nvim/lua"; "nested directory")]
    #[test_case(".local/share/fonts"; "deep directory")]
    #[test]
    fn tag_to_path_inverts_path_to_tag(dir: &str) {
        let namespace = Namespace::default();
        let home = Path::new("/home/blah");

        let (result, is_root) = namespace
            .tag_to_path(&namespace.path_to_tag(dir), home)
            .unwrap();
        assert_eq!(result, home.join(dir));
        assert_eq!(is_root, dir.is_empty());
    }

    #[test_case("", "/home/blah"; "empty title")]
    #[test_case("dotfiles.fruit", ""; "empty home")]
    #[test_case("music.jazz", "/home/blah"; "foreign title")]
    #[test_case("dotfiles..fruit", "/home/blah"; "empty segment")]
    #[test]
    fn tag_to_path_rejects_invalid_arguments(title: &str, home: &str) {
        let namespace = Namespace::default();
        let result = namespace.tag_to_path(title, home);
        assert!(matches!(result, Err(ReconcileError::InvalidArgument(_))));
    }

    #[test_case("/home/blah/.bashrc", "/home/blah", ".bashrc"; "file under home")]
    #[test_case("/home/blah", "/home/blah", ""; "home itself")]
    #[test_case("/etc/hosts", "/home/blah", "/etc/hosts"; "file outside home")]
    #[test_case("/home/blah/.vim/vimrc", "", "/home/blah/.vim/vimrc"; "empty home")]
    #[test]
    fn strip_home_removes_prefix(path: &str, home: &str, expect: &str) {
        assert_eq!(strip_home(path, home), PathBuf::from(expect));
    }

    #[test]
    fn locate_resolves_tag_and_note() {
        let namespace = Namespace::default();
        let home = Path::new("/home/blah");

        let result = namespace.locate("/home/blah/.config/nvim/init.lua", home);
        let expect = Some(("dotfiles.config.nvim".to_string(), "init.lua".to_string()));
        assert_eq!(result, expect);

        let result = namespace.locate("/home/blah/.bashrc", home);
        let expect = Some(("dotfiles".to_string(), ".bashrc".to_string()));
        assert_eq!(result, expect);
    }

    #[test_case("/etc/hosts"; "outside home")]
    #[test_case("/home/blah/bin/script"; "visible top level directory")]
    #[test_case("/home/blah/.config/conf.d/extra"; "dotted inner directory")]
    #[test_case("/home/blah/.local.d/file"; "dotted top level directory")]
    #[test]
    fn locate_rejects_malformed_directories(file: &str) {
        let namespace = Namespace::default();
        assert_eq!(namespace.locate(file, "/home/blah"), None);
    }

    #[test_case("init.lua", true; "plain file name")]
    #[test_case(".bashrc", true; "hidden file name")]
    #[test_case("../../escaped", false; "parent traversal")]
    #[test_case("..", false; "parent directory")]
    #[test_case(".", false; "current directory")]
    #[test_case("/etc/passwd", false; "absolute path")]
    #[test_case("nvim/init.lua", false; "nested path")]
    #[test_case("", false; "empty title")]
    #[test]
    fn is_note_title_accepts_only_plain_names(title: &str, expect: bool) {
        assert_eq!(is_note_title(title), expect);
    }

    #[test]
    fn namespace_rejects_dotted_root() {
        assert!(Namespace::new("dot.files").is_err());
        assert!(Namespace::new("").is_err());
        assert!(Namespace::new("stash").is_ok());
    }
}
