// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Read-through caching of document text.
//!
//! The content store asks its cache before touching the disk, and
//! invalidates the resolved path on every write or delete. Cache population
//! is best effort: two racing writers can leave either text cached until the
//! next mutation, which is fine for a single editor.

use parking_lot::Mutex;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Layer of indirection for caching document text by resolved path.
pub trait ReadCache: Send + Sync + 'static {
    /// Cached text of target path, if any.
    fn get(&self, path: &Path) -> Option<String>;

    /// Remember text read from target path.
    fn insert(&self, path: PathBuf, text: String);

    /// Forget target path.
    fn invalidate(&self, path: &Path);
}

impl<C> ReadCache for Box<C>
where
    C: ReadCache + ?Sized,
{
    fn get(&self, path: &Path) -> Option<String> {
        (**self).get(path)
    }

    fn insert(&self, path: PathBuf, text: String) {
        (**self).insert(path, text)
    }

    fn invalidate(&self, path: &Path) {
        (**self).invalidate(path)
    }
}

/// Pick cache for a server, memory if enabled.
pub fn select(enabled: bool) -> Box<dyn ReadCache> {
    if enabled {
        Box::new(MemoryCache::new())
    } else {
        Box::new(NoCache)
    }
}

/// In-memory cache backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<PathBuf, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ReadCache for MemoryCache {
    fn get(&self, path: &Path) -> Option<String> {
        self.entries.lock().get(path).cloned()
    }

    fn insert(&self, path: PathBuf, text: String) {
        self.entries.lock().insert(path, text);
    }

    fn invalidate(&self, path: &Path) {
        self.entries.lock().remove(path);
    }
}

/// Cache that never remembers anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl ReadCache for NoCache {
    fn get(&self, _: &Path) -> Option<String> {
        None
    }

    fn insert(&self, _: PathBuf, _: String) {}

    fn invalidate(&self, _: &Path) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_cache_invalidation() {
        let cache = MemoryCache::new();
        let path = Path::new("/site/_data/settings.yml");

        cache.insert(path.to_path_buf(), "site_title: A".into());
        assert_eq!(cache.get(path), Some("site_title: A".into()));
        assert_eq!(cache.len(), 1);

        cache.invalidate(path);
        assert_eq!(cache.get(path), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn no_cache_forgets() {
        let cache = NoCache;
        let path = Path::new("/site/_data/settings.yml");

        cache.insert(path.to_path_buf(), "site_title: A".into());
        assert_eq!(cache.get(path), None);
    }

    #[test]
    fn select_boxed_cache() {
        let path = Path::new("/site/_content/current/a.md");

        let enabled = select(true);
        enabled.insert(path.to_path_buf(), "# A".into());
        assert_eq!(enabled.get(path), Some("# A".into()));

        let disabled = select(false);
        disabled.insert(path.to_path_buf(), "# A".into());
        assert_eq!(disabled.get(path), None);
    }
}
