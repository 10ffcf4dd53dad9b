// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where the documents of a collection live inside the site root.
//!
//! # Site Layout
//!
//! ```text
//! <root>/_data/<collection>.yml             data collection document
//! <root>/_content/<collection>/<slug>.md    content collection entry
//! ```
//!
//! Collection names and slugs become path components verbatim, so they are
//! validated before any path is built. Nothing here checks whether the
//! returned paths exist.

use std::path::{Path, PathBuf};

/// Directory holding data collection documents.
pub const DATA_DIR: &str = "_data";

/// Directory holding one subdirectory per content collection.
pub const CONTENT_DIR: &str = "_content";

/// File extension of data collection documents.
pub const DATA_EXT: &str = "yml";

/// File extension of content collection entries.
pub const ENTRY_EXT: &str = "md";

/// Check that a collection name or slug is safe to use as a path component.
///
/// Accepts ASCII letters, digits, `-`, `_` and `.`, but never a leading `.`,
/// which rules out `.`, `..` and hidden files.
///
/// # Errors
///
/// - Return [`InvalidName`] if the name is empty or contains anything else.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(InvalidName {
            name: name.to_string(),
        })
    }
}

/// Path to data document of a collection, i.e., `<root>/_data/<name>.yml`.
pub fn data_file(root: impl AsRef<Path>, collection: &str) -> PathBuf {
    root.as_ref()
        .join(DATA_DIR)
        .join(format!("{collection}.{DATA_EXT}"))
}

/// Path to directory of a content collection, i.e., `<root>/_content/<name>`.
pub fn content_dir(root: impl AsRef<Path>, collection: &str) -> PathBuf {
    root.as_ref().join(CONTENT_DIR).join(collection)
}

/// Path to a single content entry, i.e., `<root>/_content/<name>/<slug>.md`.
pub fn entry_file(root: impl AsRef<Path>, collection: &str, slug: &str) -> PathBuf {
    content_dir(root, collection).join(format!("{slug}.{ENTRY_EXT}"))
}

/// Extract slug from entry file name.
///
/// Returns `None` if the file name does not carry the `.md` extension.
pub fn slug_of(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(ENTRY_EXT)
        .and_then(|stem| stem.strip_suffix('.'))
        .filter(|slug| !slug.is_empty())
}

/// Name cannot be used as a path component.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid name {name:?}: use letters, digits, '-', '_' or '.' without a leading '.'")]
pub struct InvalidName {
    pub name: String,
}

/// Friendly result alias :3
pub type Result<T, E = InvalidName> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("settings"; "plain")]
    #[test_case("here-we-are"; "dashes")]
    #[test_case("piece_2.v1"; "underscore and dot")]
    #[test]
    fn validate_name_accepts(name: &str) {
        assert_eq!(validate_name(name), Ok(()));
    }

    #[test_case(""; "empty")]
    #[test_case(".."; "parent")]
    #[test_case(".hidden"; "hidden")]
    #[test_case("../etc"; "traversal")]
    #[test_case("a/b"; "separator")]
    #[test_case("a b"; "space")]
    #[test]
    fn validate_name_rejects(name: &str) {
        assert!(validate_name(name).is_err());
    }

    #[test]
    fn resolve_layout() {
        let root = Path::new("/site");
        assert_eq!(
            data_file(root, "settings"),
            PathBuf::from("/site/_data/settings.yml")
        );
        assert_eq!(
            content_dir(root, "current"),
            PathBuf::from("/site/_content/current")
        );
        assert_eq!(
            entry_file(root, "current", "my-item"),
            PathBuf::from("/site/_content/current/my-item.md")
        );
    }

    #[test_case("my-item.md", Some("my-item"); "entry")]
    #[test_case("notes.txt", None; "other extension")]
    #[test_case(".md", None; "no stem")]
    #[test_case("readme", None; "no extension")]
    #[test]
    fn slug_from_file_name(file_name: &str, expect: Option<&str>) {
        assert_eq!(slug_of(file_name), expect);
    }
}
