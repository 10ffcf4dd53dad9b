// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Content store gateway.
//!
//! Folio keeps every piece of editable site content in a flat file tree
//! under the site root called the __content store__. The store translates a
//! `(collection, slug?)` key coming from the CMS into a file in that tree
//! and reads, lists, writes or deletes it.
//!
//! # Content Store Layout
//!
//! Data collections are single YAML documents at `_data/<collection>.yml`.
//! Content collections are directories at `_content/<collection>/`, each
//! entry a markdown file named after its slug. See [`crate::path`] for the
//! exact resolution rules.
//!
//! Writes overwrite in full with a single write call. There is no merging,
//! no optimistic concurrency check and no rollback. The last writer wins,
//! and git history is the only audit trail.

use crate::{
    cache::{MemoryCache, ReadCache},
    collection::{CollectionError, CollectionKind, CollectionRegistry},
    path::{self, InvalidName},
};

use glob::{glob_with, MatchOptions, Pattern};
use serde::Serialize;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Reference to a single entry of a content collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryRef {
    /// Entry slug.
    pub slug: String,

    /// File name of entry inside its collection directory.
    pub path: String,
}

/// Result of reading a collection key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Full text of a data document or content entry.
    Document(String),

    /// Entries of a content collection when no slug was given.
    Listing(Vec<EntryRef>),
}

/// Resolved storage location of a collection key.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Target {
    File(PathBuf),
    Directory(PathBuf),
}

/// Content store over a site root.
#[derive(Debug)]
pub struct ContentStore<C = MemoryCache>
where
    C: ReadCache,
{
    root: PathBuf,
    registry: CollectionRegistry,
    cache: C,
}

impl<C> ContentStore<C>
where
    C: ReadCache,
{
    /// Construct new content store.
    pub fn new(root: impl Into<PathBuf>, registry: CollectionRegistry, cache: C) -> Self {
        Self {
            root: root.into(),
            registry,
            cache,
        }
    }

    /// Site root of content store.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Collection registry used for classification.
    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// Read document or list collection entries.
    ///
    /// Data collections and content entries yield [`Lookup::Document`]. A
    /// content collection without slug yields [`Lookup::Listing`], which is
    /// empty when the collection directory does not exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if the document does not exist.
    /// - Return [`StoreError::InvalidName`] or [`StoreError::Collection`] if
    ///   the key cannot be resolved.
    /// - Return [`StoreError::Read`] or [`StoreError::List`] on I/O failure.
    #[instrument(skip(self), level = "debug")]
    pub fn get(&self, collection: &str, slug: Option<&str>) -> Result<Lookup> {
        match self.resolve(collection, slug)? {
            Target::File(path) => self.read_file(path).map(Lookup::Document),
            Target::Directory(dir) => list_entries(&dir).map(Lookup::Listing),
        }
    }

    /// Read document text of target key.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::MissingSlug`] for a content collection without
    ///   slug.
    /// - Otherwise fails like [`ContentStore::get`].
    pub fn read(&self, collection: &str, slug: Option<&str>) -> Result<String> {
        match self.resolve(collection, slug)? {
            Target::File(path) => self.read_file(path),
            Target::Directory(_) => Err(StoreError::MissingSlug {
                collection: collection.into(),
            }),
        }
    }

    /// List entries of target content collection, ordered by slug.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotContent`] if the collection holds data.
    /// - Return [`StoreError::List`] on I/O failure.
    pub fn list(&self, collection: &str) -> Result<Vec<EntryRef>> {
        match self.resolve(collection, None)? {
            Target::Directory(dir) => list_entries(&dir),
            Target::File(_) => Err(StoreError::NotContent {
                collection: collection.into(),
            }),
        }
    }

    /// Write text to target key, replacing whatever was there.
    ///
    /// Creates missing parent directories. Returns path written.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::MissingSlug`] for a content collection without
    ///   slug.
    /// - Return [`StoreError::CreateDir`] or [`StoreError::Write`] on I/O
    ///   failure.
    #[instrument(skip(self, text), level = "debug")]
    pub fn put(&self, collection: &str, slug: Option<&str>, text: &str) -> Result<PathBuf> {
        let path = self.resolve_file(collection, slug)?;

        if let Some(parent) = path.parent() {
            if mkdirp::mkdirp(parent)
                .map_err(|source| StoreError::CreateDir {
                    source,
                    path: parent.to_path_buf(),
                })?
                .is_some()
            {
                info!("create directory {:?}", parent.display());
            }
        }

        // INVARIANT: Never leave stale text cached, even if the write fails halfway.
        self.cache.invalidate(&path);
        info!("save {:?}", path.display());
        fs::write(&path, text).map_err(|source| StoreError::Write {
            source,
            path: path.clone(),
        })?;

        Ok(path)
    }

    /// Delete document of target key. Returns path removed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if there is nothing to delete.
    /// - Return [`StoreError::MissingSlug`] for a content collection without
    ///   slug.
    /// - Return [`StoreError::Delete`] on I/O failure.
    #[instrument(skip(self), level = "debug")]
    pub fn delete(&self, collection: &str, slug: Option<&str>) -> Result<PathBuf> {
        let path = self.resolve_file(collection, slug)?;
        self.cache.invalidate(&path);

        match fs::remove_file(&path) {
            Ok(()) => {
                info!("delete {:?}", path.display());
                Ok(path)
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Err(StoreError::NotFound { path }),
            Err(source) => Err(StoreError::Delete { source, path }),
        }
    }

    /// Create standard directory layout of the site.
    ///
    /// Creates `_content/`, `_data/`, and one directory per registered content
    /// collection. Existing directories are left alone. Returns directories
    /// that were actually created.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::CreateDir`] on I/O failure.
    pub fn init_layout(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = vec![
            self.root.join(path::CONTENT_DIR),
            self.root.join(path::DATA_DIR),
        ];
        dirs.extend(
            self.registry
                .names(CollectionKind::Content)
                .map(|name| path::content_dir(&self.root, name)),
        );

        let mut created = Vec::new();
        for dir in dirs {
            let first = mkdirp::mkdirp(&dir).map_err(|source| StoreError::CreateDir {
                source,
                path: dir.clone(),
            })?;

            if first.is_some() {
                info!("create directory {:?}", dir.display());
                created.push(dir);
            } else {
                debug!("directory {:?} already exists", dir.display());
            }
        }

        Ok(created)
    }

    fn resolve(&self, collection: &str, slug: Option<&str>) -> Result<Target> {
        path::validate_name(collection)?;
        if let Some(slug) = slug {
            path::validate_name(slug)?;
        }

        let target = match (self.registry.classify(collection, slug)?, slug) {
            (CollectionKind::Data, _) => Target::File(path::data_file(&self.root, collection)),
            (CollectionKind::Content, Some(slug)) => {
                Target::File(path::entry_file(&self.root, collection, slug))
            }
            (CollectionKind::Content, None) => {
                Target::Directory(path::content_dir(&self.root, collection))
            }
        };

        Ok(target)
    }

    fn resolve_file(&self, collection: &str, slug: Option<&str>) -> Result<PathBuf> {
        match self.resolve(collection, slug)? {
            Target::File(path) => Ok(path),
            Target::Directory(_) => Err(StoreError::MissingSlug {
                collection: collection.into(),
            }),
        }
    }

    fn read_file(&self, path: PathBuf) -> Result<String> {
        if let Some(text) = self.cache.get(&path) {
            debug!("cache hit {:?}", path.display());
            return Ok(text);
        }

        match fs::read_to_string(&path) {
            Ok(text) => {
                self.cache.insert(path, text.clone());
                Ok(text)
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Err(StoreError::NotFound { path }),
            Err(source) => Err(StoreError::Read { source, path }),
        }
    }
}

fn list_entries(dir: &Path) -> Result<Vec<EntryRef>> {
    if !dir.is_dir() {
        debug!("collection directory {:?} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let list_error = |source: std::io::Error| StoreError::List {
        source,
        path: dir.to_path_buf(),
    };

    // INVARIANT: Hidden files are never entries.
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let pattern = format!(
        "{}/*.{}",
        Pattern::escape(dir.to_string_lossy().as_ref()),
        path::ENTRY_EXT
    );
    let paths = glob_with(&pattern, options)
        .map_err(|error| list_error(std::io::Error::other(error.to_string())))?;

    let mut entries = Vec::new();
    for path in paths {
        let path = path.map_err(|error| list_error(error.into()))?;
        if !path.is_file() {
            continue;
        }

        let Some(file_name) = path.file_name().map(|name| name.to_string_lossy().into_owned())
        else {
            continue;
        };

        if let Some(slug) = path::slug_of(&file_name) {
            entries.push(EntryRef {
                slug: slug.to_string(),
                path: file_name.clone(),
            });
        }
    }

    entries.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(entries)
}

/// All possible error types for content store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Collection name or slug is not a valid path component.
    #[error(transparent)]
    InvalidName(#[from] InvalidName),

    /// Collection cannot be classified.
    #[error(transparent)]
    Collection(#[from] CollectionError),

    /// Content collection addressed without slug where one is needed.
    #[error("collection {collection:?} needs a slug")]
    MissingSlug { collection: String },

    /// Data collection addressed where a content collection is needed.
    #[error("collection {collection:?} is not a content collection")]
    NotContent { collection: String },

    /// Document does not exist.
    #[error("file not found at {:?}", path.display())]
    NotFound { path: PathBuf },

    /// Document cannot be read.
    #[error("failed to read {:?}: {source}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Document cannot be written.
    #[error("failed to write {:?}: {source}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Document cannot be deleted.
    #[error("failed to delete {:?}: {source}", path.display())]
    Delete {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Directory cannot be created.
    #[error("failed to create directory {:?}: {source}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Collection directory cannot be listed.
    #[error("failed to list {:?}: {source}", path.display())]
    List {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::NoCache, collection::FallbackPolicy, config::CollectionSettings};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn registry() -> CollectionRegistry {
        CollectionRegistry::from_settings(&CollectionSettings::default(), None).unwrap()
    }

    fn store() -> (TempDir, ContentStore) {
        let root = TempDir::new().unwrap();
        let store = ContentStore::new(root.path(), registry(), MemoryCache::new());
        (root, store)
    }

    #[test]
    fn put_then_get_is_identity() -> anyhow::Result<()> {
        let (_root, store) = store();
        let text = "---\r\ntitle: \"T\"\r\n---\r\n# Body  \n\n";

        store.put("current", Some("my-item"), text)?;
        assert_eq!(
            store.get("current", Some("my-item"))?,
            Lookup::Document(text.into())
        );

        Ok(())
    }

    #[test]
    fn data_document_lands_in_data_dir() -> anyhow::Result<()> {
        let (root, store) = store();
        let text = indoc! {r#"
            site_title: "Avery Smith"
            site_description: Showcase of artistic work
        "#};

        let path = store.put("settings", None, text)?;
        assert_eq!(path, root.path().join("_data/settings.yml"));
        assert_eq!(fs::read_to_string(path)?, text);

        // Slug is ignored for data collections.
        assert_eq!(store.read("settings", Some("ignored"))?, text);

        Ok(())
    }

    #[test]
    fn put_creates_missing_directory() -> anyhow::Result<()> {
        let (root, store) = store();
        assert!(!root.path().join("_content/projects").exists());

        let path = store.put("projects", Some("project-1"), "# One")?;
        assert_eq!(path, root.path().join("_content/projects/project-1.md"));
        assert!(path.is_file());

        Ok(())
    }

    #[test]
    fn put_overwrites_in_full() -> anyhow::Result<()> {
        let (_root, store) = store();

        store.put("about", None, "name: Initial Content\nbio: long")?;
        store.put("about", None, "name: Updated Content")?;
        assert_eq!(store.read("about", None)?, "name: Updated Content");

        Ok(())
    }

    #[test]
    fn delete_after_put_makes_get_not_found() -> anyhow::Result<()> {
        let (_root, store) = store();

        let written = store.put("choreography", Some("piece"), "# Piece")?;
        let deleted = store.delete("choreography", Some("piece"))?;
        assert_eq!(written, deleted);
        assert!(matches!(
            store.get("choreography", Some("piece")),
            Err(StoreError::NotFound { .. })
        ));

        Ok(())
    }

    #[test]
    fn missing_documents_are_not_found() {
        let (_root, store) = store();

        assert!(matches!(
            store.get("contact", None),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.get("current", Some("nope")),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("current", Some("nope")),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn listing_absent_collection_is_empty() -> anyhow::Result<()> {
        let (_root, store) = store();
        assert_eq!(store.get("performances", None)?, Lookup::Listing(vec![]));

        Ok(())
    }

    #[test]
    fn listing_skips_non_markdown_and_sorts() -> anyhow::Result<()> {
        let (root, store) = store();
        store.put("projects", Some("project-2"), "# Two")?;
        store.put("projects", Some("project-1"), "# One")?;
        let dir = root.path().join("_content/projects");
        fs::write(dir.join("not-markdown.txt"), "skip")?;
        fs::write(dir.join(".draft.md"), "skip")?;
        fs::create_dir(dir.join("nested.md"))?;

        let expect = vec![
            EntryRef {
                slug: "project-1".into(),
                path: "project-1.md".into(),
            },
            EntryRef {
                slug: "project-2".into(),
                path: "project-2.md".into(),
            },
        ];
        assert_eq!(store.get("projects", None)?, Lookup::Listing(expect.clone()));
        assert_eq!(store.list("projects")?, expect);

        Ok(())
    }

    #[test]
    fn content_collection_mutation_needs_slug() {
        let (_root, store) = store();

        assert!(matches!(
            store.put("current", None, "# Body"),
            Err(StoreError::MissingSlug { .. })
        ));
        assert!(matches!(
            store.delete("current", None),
            Err(StoreError::MissingSlug { .. })
        ));
        assert!(matches!(
            store.list("settings"),
            Err(StoreError::NotContent { .. })
        ));
    }

    #[test]
    fn invalid_names_never_touch_disk() {
        let (root, store) = store();

        assert!(matches!(
            store.put("current", Some(".."), "escape"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            store.put("../current", Some("x"), "escape"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(!root.path().join("_content").exists());
    }

    #[test]
    fn unknown_collection_follows_fallback_policy() -> anyhow::Result<()> {
        let (root, store) = store();
        assert!(matches!(
            store.get("blog", None),
            Err(StoreError::Collection(CollectionError::Unknown { .. }))
        ));

        let lenient = ContentStore::new(
            root.path(),
            CollectionRegistry::new(FallbackPolicy::BySlug),
            NoCache,
        );
        assert_eq!(
            lenient.put("site-test", None, "a: 1")?,
            root.path().join("_data/site-test.yml")
        );
        assert_eq!(
            lenient.put("blog", Some("post"), "# Post")?,
            root.path().join("_content/blog/post.md")
        );

        Ok(())
    }

    #[test]
    fn writes_invalidate_cached_reads() -> anyhow::Result<()> {
        let (_root, store) = store();

        store.put("settings", None, "site_title: One")?;
        assert_eq!(store.read("settings", None)?, "site_title: One");
        assert_eq!(store.cache.len(), 1);

        store.put("settings", None, "site_title: Two")?;
        assert_eq!(store.read("settings", None)?, "site_title: Two");

        store.delete("settings", None)?;
        assert!(store.cache.is_empty());
        assert!(matches!(
            store.read("settings", None),
            Err(StoreError::NotFound { .. })
        ));

        Ok(())
    }

    #[test]
    fn init_layout_is_idempotent() -> anyhow::Result<()> {
        let (root, store) = store();

        let created = store.init_layout()?;
        let expect: Vec<PathBuf> = [
            "_content",
            "_data",
            "_content/choreography",
            "_content/current",
            "_content/performances",
            "_content/projects",
        ]
        .iter()
        .map(|dir| root.path().join(dir))
        .collect();
        assert_eq!(created, expect);

        fs::write(root.path().join("_content/current/keep.md"), "# Keep")?;
        assert_eq!(store.init_layout()?, Vec::<PathBuf>::new());
        assert!(root.path().join("_content/current/keep.md").is_file());

        Ok(())
    }
}
