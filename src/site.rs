// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Structured view of all site content.
//!
//! The front-end renders the portfolio from one snapshot: every data
//! document decomposed into fields, and every content collection as a list
//! of decomposed entries in display order.

use crate::{
    cache::ReadCache,
    collection::CollectionKind,
    frontmatter::{self, Document, Fields},
    store::{ContentStore, Result, StoreError},
};

use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::{debug, warn};

/// Every data document and content collection of a site.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SiteSnapshot {
    /// Data documents by collection, `None` when missing or malformed.
    pub data: BTreeMap<String, Option<Fields>>,

    /// Content entries by collection, in display order.
    pub collections: BTreeMap<String, Vec<SiteItem>>,
}

/// Content entry as shown on the site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SiteItem {
    pub slug: String,

    /// Identifier derived from title, used for anchors.
    pub id: String,

    #[serde(flatten)]
    pub document: Document,
}

impl SiteSnapshot {
    /// Load snapshot of every registered collection.
    ///
    /// Entries are ordered by their `order` field, ties broken by slug.
    /// Documents that cannot be read are logged and left out.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if a collection cannot be listed.
    pub fn load<C: ReadCache>(store: &ContentStore<C>) -> Result<Self> {
        let mut snapshot = Self::default();

        for name in store.registry().names(CollectionKind::Data) {
            let fields = match store.read(name, None) {
                Ok(text) => frontmatter::parse_data(&text),
                Err(StoreError::NotFound { path }) => {
                    debug!("no data document at {:?}", path.display());
                    None
                }
                Err(StoreError::Read { source, path }) => {
                    warn!("skipping {:?}: {source}", path.display());
                    None
                }
                Err(error) => return Err(error),
            };
            snapshot.data.insert(name.to_string(), fields);
        }

        for name in store.registry().names(CollectionKind::Content) {
            let mut items = Vec::new();
            for entry in store.list(name)? {
                let Some(text) = read_entry(store, name, &entry.slug)? else {
                    continue;
                };
                let document = Document::load(&entry.slug, &text);
                let id = frontmatter::generate_id(document.title().unwrap_or(&entry.slug));
                items.push(SiteItem {
                    slug: entry.slug,
                    id,
                    document,
                });
            }

            items.sort_by(|a, b| {
                a.document
                    .order()
                    .cmp(&b.document.order())
                    .then_with(|| a.slug.cmp(&b.slug))
            });
            snapshot.collections.insert(name.to_string(), items);
        }

        Ok(snapshot)
    }
}

/// Read entry text, `None` if the file vanished or cannot be read.
fn read_entry<C: ReadCache>(
    store: &ContentStore<C>,
    collection: &str,
    slug: &str,
) -> Result<Option<String>> {
    match store.read(collection, Some(slug)) {
        Ok(text) => Ok(Some(text)),
        Err(StoreError::NotFound { path }) => {
            debug!("entry {:?} vanished while listing", path.display());
            Ok(None)
        }
        Err(StoreError::Read { source, path }) => {
            warn!("skipping {:?}: {source}", path.display());
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

/// Problem found in a content entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryProblem {
    pub collection: String,
    pub slug: String,
    pub kind: ProblemKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProblemKind {
    /// Entry cannot be read, e.g., not UTF-8.
    Unreadable,

    /// Entry has no parsable frontmatter.
    NoFrontmatter,

    /// Entry lacks required fields.
    MissingFields(Vec<String>),
}

impl Display for EntryProblem {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}/{}: ", self.collection, self.slug)?;
        match &self.kind {
            ProblemKind::Unreadable => fmt.write_str("cannot be read"),
            ProblemKind::NoFrontmatter => fmt.write_str("no frontmatter"),
            ProblemKind::MissingFields(fields) => {
                write!(fmt, "missing {}", fields.join(", "))
            }
        }
    }
}

/// Check every content entry for frontmatter and required fields.
///
/// # Errors
///
/// - Return [`StoreError`] if a collection cannot be listed.
pub fn check_entries<C: ReadCache>(
    store: &ContentStore<C>,
    required: &[String],
) -> Result<Vec<EntryProblem>> {
    let mut problems = Vec::new();

    for name in store.registry().names(CollectionKind::Content) {
        for entry in store.list(name)? {
            let text = match store.read(name, Some(&entry.slug)) {
                Ok(text) => Some(text),
                Err(StoreError::Read { source, path }) => {
                    warn!("cannot read {:?}: {source}", path.display());
                    None
                }
                Err(StoreError::NotFound { .. }) => continue,
                Err(error) => return Err(error),
            };

            let kind = match text.as_deref().map(frontmatter::parse) {
                None => Some(ProblemKind::Unreadable),
                Some(None) => Some(ProblemKind::NoFrontmatter),
                Some(Some(document)) => {
                    let missing = document.missing_fields(required.iter().map(String::as_str));
                    (!missing.is_empty()).then(|| {
                        ProblemKind::MissingFields(missing.into_iter().map(String::from).collect())
                    })
                }
            };

            if let Some(kind) = kind {
                problems.push(EntryProblem {
                    collection: name.to_string(),
                    slug: entry.slug,
                    kind,
                });
            }
        }
    }

    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::NoCache, collection::CollectionRegistry, config::CollectionSettings,
        frontmatter::FieldValue,
    };
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store() -> (TempDir, ContentStore<NoCache>) {
        let root = TempDir::new().unwrap();
        let registry =
            CollectionRegistry::from_settings(&CollectionSettings::default(), None).unwrap();
        let store = ContentStore::new(root.path(), registry, NoCache);
        (root, store)
    }

    #[test]
    fn snapshot_orders_entries() -> anyhow::Result<()> {
        let (_root, store) = store();
        store.put(
            "settings",
            None,
            "site_title: \"Avery Smith\"\nsite_description: Dance\n",
        )?;
        store.put(
            "projects",
            Some("project-b"),
            "---\ntitle: \"Second\"\norder: 2\n---\nB",
        )?;
        store.put(
            "projects",
            Some("project-a"),
            "---\ntitle: \"First Piece\"\norder: 1\n---\nA",
        )?;
        store.put("projects", Some("untitled-work"), "No metadata at all")?;

        let snapshot = SiteSnapshot::load(&store)?;

        let settings = snapshot.data["settings"].as_ref().unwrap();
        assert_eq!(
            settings["site_title"],
            FieldValue::Text("Avery Smith".into())
        );
        assert_eq!(snapshot.data["about"], None);

        let projects = &snapshot.collections["projects"];
        let ids: Vec<_> = projects.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["untitled-work", "first-piece", "second"]);
        assert_eq!(projects[0].document.content, "No metadata at all");
        assert!(snapshot.collections["current"].is_empty());

        Ok(())
    }

    #[test]
    fn check_reports_problems() -> anyhow::Result<()> {
        let (_root, store) = store();
        store.put(
            "current",
            Some("complete"),
            indoc! {r#"
                ---
                title: "Valid Content"
                description: "Has all required fields"
                thumbnail: "/images/thumb.jpg"
                order: 1
                ---
                # Content
            "#},
        )?;
        store.put(
            "current",
            Some("partial"),
            "---\ntitle: \"Invalid\"\ndescription: \"Missing\"\n---\n# Content",
        )?;
        store.put("current", Some("bare"), "# Simple Markdown")?;

        let required: Vec<String> = ["title", "description", "thumbnail", "order"]
            .map(String::from)
            .to_vec();
        let problems = check_entries(&store, &required)?;

        assert_eq!(
            problems,
            vec![
                EntryProblem {
                    collection: "current".into(),
                    slug: "bare".into(),
                    kind: ProblemKind::NoFrontmatter,
                },
                EntryProblem {
                    collection: "current".into(),
                    slug: "partial".into(),
                    kind: ProblemKind::MissingFields(vec!["thumbnail".into(), "order".into()]),
                },
            ]
        );
        assert_eq!(problems[1].to_string(), "current/partial: missing thumbnail, order");

        Ok(())
    }

    #[test]
    fn unreadable_entries_are_skipped() -> anyhow::Result<()> {
        let (root, store) = store();
        store.put(
            "projects",
            Some("good"),
            "---\ntitle: \"Good\"\norder: 1\n---\nBody",
        )?;
        std::fs::write(root.path().join("_content/projects/bad.md"), [0xff, 0xfe, 0x00])?;
        std::fs::create_dir_all(root.path().join("_data"))?;
        std::fs::write(root.path().join("_data/about.yml"), [0xff, 0xfe, 0x00])?;

        let snapshot = SiteSnapshot::load(&store)?;
        let slugs: Vec<_> = snapshot.collections["projects"]
            .iter()
            .map(|item| item.slug.as_str())
            .collect();
        assert_eq!(slugs, vec!["good"]);
        assert_eq!(snapshot.data["about"], None);

        let problems = check_entries(&store, &["title".to_string()])?;
        assert_eq!(
            problems,
            vec![EntryProblem {
                collection: "projects".into(),
                slug: "bad".into(),
                kind: ProblemKind::Unreadable,
            }]
        );
        assert_eq!(problems[0].to_string(), "projects/bad: cannot be read");

        Ok(())
    }
}
