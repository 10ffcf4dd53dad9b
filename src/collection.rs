// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Collection classification.
//!
//! Every collection the CMS edits is either a __data__ collection, a single
//! YAML document without slugs, or a __content__ collection, a directory of
//! markdown entries identified by slug. The kind of each known collection is
//! resolved once at startup into a [`CollectionRegistry`], from the static
//! lists in `folio.toml` merged with whatever the CMS `config.yml` declares.
//!
//! Names that appear in neither list are handled by an explicit
//! [`FallbackPolicy`] instead of being guessed per request.

use crate::config::{CmsConfig, CollectionSettings, ConfigError, Settings};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Storage kind of a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionKind {
    /// Singleton document at `_data/<name>.yml`.
    Data,

    /// Entries at `_content/<name>/<slug>.md`.
    Content,
}

/// Treatment of collection names missing from the registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Refuse unknown collections.
    #[default]
    Strict,

    /// Unknown names without a slug are data, with a slug are content.
    BySlug,
}

/// Known collections and their kinds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectionRegistry {
    kinds: BTreeMap<String, CollectionKind>,
    fallback: FallbackPolicy,
}

impl CollectionRegistry {
    /// Construct empty registry with target fallback policy.
    pub fn new(fallback: FallbackPolicy) -> Self {
        Self {
            kinds: BTreeMap::new(),
            fallback,
        }
    }

    /// Build registry from static settings and optional CMS configuration.
    ///
    /// # Errors
    ///
    /// - Return [`CollectionError::Conflict`] if a name is declared as both
    ///   data and content.
    pub fn from_settings(
        settings: &CollectionSettings,
        cms: Option<&CmsConfig>,
    ) -> Result<Self> {
        let mut registry = Self::new(settings.fallback);
        registry.extend(settings.data.iter(), CollectionKind::Data)?;
        registry.extend(settings.content.iter(), CollectionKind::Content)?;

        if let Some(cms) = cms {
            for file in cms.misplaced_files() {
                warn!(
                    "CMS file {:?} declares {:?}, but it is stored at {:?}",
                    file.name,
                    file.file.as_deref().unwrap_or_default(),
                    file.data_path()
                );
            }
            registry.extend(cms.data_collections(), CollectionKind::Data)?;
            registry.extend(cms.content_collections(), CollectionKind::Content)?;
        }

        debug!("collection registry: {:?}", registry.kinds);
        Ok(registry)
    }

    /// Build registry of a site, reading its CMS configuration if present.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError`] if the CMS configuration cannot be read, or
    ///   declares a name as both kinds.
    pub fn load(settings: &Settings) -> Result<Self, ConfigError> {
        let path = settings.cms_config_path();
        let cms = if path.is_file() {
            Some(CmsConfig::load(&path)?)
        } else {
            debug!("no CMS configuration at {:?}", path.display());
            None
        };

        Ok(Self::from_settings(&settings.collections, cms.as_ref())?)
    }

    /// Register collection names under target kind.
    ///
    /// Registering a name twice under the same kind is harmless.
    ///
    /// # Errors
    ///
    /// - Return [`CollectionError::Conflict`] if a name is already registered
    ///   under the other kind.
    pub fn extend(
        &mut self,
        names: impl IntoIterator<Item = impl AsRef<str>>,
        kind: CollectionKind,
    ) -> Result<()> {
        for name in names {
            let name = name.as_ref();
            match self.kinds.get(name) {
                Some(existing) if *existing != kind => {
                    return Err(CollectionError::Conflict { name: name.into() });
                }
                Some(_) => continue,
                None => {
                    self.kinds.insert(name.into(), kind);
                }
            }
        }

        Ok(())
    }

    /// Classify collection for a request that may or may not carry a slug.
    ///
    /// Registered names always resolve to their registered kind, regardless
    /// of slug presence.
    ///
    /// # Errors
    ///
    /// - Return [`CollectionError::Unknown`] if the name is not registered and
    ///   the fallback policy is [`FallbackPolicy::Strict`].
    pub fn classify(&self, collection: &str, slug: Option<&str>) -> Result<CollectionKind> {
        if let Some(kind) = self.kinds.get(collection) {
            return Ok(*kind);
        }

        match self.fallback {
            FallbackPolicy::Strict => Err(CollectionError::Unknown {
                name: collection.into(),
            }),
            FallbackPolicy::BySlug if slug.is_some() => Ok(CollectionKind::Content),
            FallbackPolicy::BySlug => Ok(CollectionKind::Data),
        }
    }

    /// Iterate registered names of target kind in name order.
    pub fn names(&self, kind: CollectionKind) -> impl Iterator<Item = &str> {
        self.kinds
            .iter()
            .filter(move |(_, k)| **k == kind)
            .map(|(name, _)| name.as_str())
    }
}

/// Collection classification error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// Name is neither a data nor a content collection.
    #[error("unknown collection {name:?}")]
    Unknown { name: String },

    /// Name is declared as both kinds.
    #[error("collection {name:?} is declared as both data and content")]
    Conflict { name: String },
}

/// Friendly result alias :3
type Result<T, E = CollectionError> = std::result::Result<T, E>;
