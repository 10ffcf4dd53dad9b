// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of `folio.toml`, the settings file of a site, and of
//! the CMS `config.yml` that the admin UI reads. Every section of
//! `folio.toml` is optional, so a site without one runs on the defaults.
//!
//! # Environment Overrides
//!
//! Deployment secrets and a few per-machine values are taken from the
//! environment when present, overriding the file:
//!
//! | Variable              | Setting               |
//! |-----------------------|-----------------------|
//! | `PORT`                | port of `server.address` |
//! | `OAUTH_CLIENT_ID`     | `oauth.client_id`     |
//! | `OAUTH_CLIENT_SECRET` | `oauth.client_secret` |
//! | `NETLIFY_URL`         | `oauth.site_url`      |
//! | `GIT_USERNAME`        | `sync.author_name`    |
//! | `GIT_EMAIL`           | `sync.author_email`   |

use crate::collection::FallbackPolicy;

use serde::{Deserialize, Serialize};
use std::{
    env,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Default name of the settings file at the site root.
pub const SETTINGS_FILE: &str = "folio.toml";

/// Site settings layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Where the site lives on disk.
    pub site: SiteSettings,

    /// HTTP server settings.
    pub server: ServerSettings,

    /// Collection classification.
    pub collections: CollectionSettings,

    /// Git content synchronization.
    pub sync: SyncSettings,

    /// OAuth flow against the identity provider.
    pub oauth: OAuthSettings,
}

impl Settings {
    /// Load settings file from target path.
    ///
    /// A missing file is not an error, the defaults are used instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if the file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if the file is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no settings file at {:?}, using defaults", path.display());
            return Ok(Self::default());
        }

        read_to_string(path)
            .map_err(|source| ConfigError::Read {
                source,
                path: path.to_path_buf(),
            })?
            .parse()
    }

    /// Apply environment overrides from the current process.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::InvalidEnv`] if `PORT` is not a port number.
    pub fn with_env(mut self) -> Result<Self> {
        if let Ok(port) = env::var("PORT") {
            let port: u16 = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PORT".into(),
                value: port.clone(),
            })?;
            self.server.address = match self.server.address.rsplit_once(':') {
                Some((host, _)) => format!("{host}:{port}"),
                None => format!("{}:{port}", self.server.address),
            };
        }

        if let Ok(id) = env::var("OAUTH_CLIENT_ID") {
            self.oauth.client_id = Some(id);
        }

        if let Ok(secret) = env::var("OAUTH_CLIENT_SECRET") {
            self.oauth.client_secret = Some(secret);
        }

        if let Ok(url) = env::var("NETLIFY_URL") {
            self.oauth.site_url = url;
        }

        if let Ok(name) = env::var("GIT_USERNAME") {
            self.sync.author_name = name;
        }

        if let Ok(email) = env::var("GIT_EMAIL") {
            self.sync.author_email = email;
        }

        Ok(self)
    }

    /// Absolute path to CMS configuration file of the site.
    pub fn cms_config_path(&self) -> PathBuf {
        self.site.root.join(&self.site.cms_config)
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on site root.
        settings.site.root = PathBuf::from(
            shellexpand::full(settings.site.root.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned(),
        );

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Site location settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Root directory holding `_data/` and `_content/`.
    pub root: PathBuf,

    /// CMS configuration file, relative to the root.
    pub cms_config: PathBuf,

    /// Frontmatter keys every content entry is expected to carry.
    pub required_fields: Vec<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            cms_config: PathBuf::from("admin/config.yml"),
            required_fields: ["title", "description", "thumbnail", "order"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to listen on.
    pub address: String,

    /// Largest accepted request body in bytes.
    pub body_limit: usize,

    /// Keep read documents in memory until the server writes them.
    ///
    /// Leave off when other processes edit the tree, e.g., `folio pull`.
    pub cache: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8082".into(),
            body_limit: 10 * 1024 * 1024,
            cache: false,
        }
    }
}

/// Static collection classification.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectionSettings {
    /// Singleton collections stored as `_data/<name>.yml`.
    pub data: Vec<String>,

    /// Repeatable collections stored as `_content/<name>/<slug>.md`.
    pub content: Vec<String>,

    /// How to treat names in neither list.
    pub fallback: FallbackPolicy,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            data: ["settings", "about", "contact"].map(String::from).to_vec(),
            content: ["current", "choreography", "projects", "performances"]
                .map(String::from)
                .to_vec(),
            fallback: FallbackPolicy::default(),
        }
    }
}

/// Git content synchronization settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Remote to push to and pull from.
    pub remote: String,

    /// Branch to push to and pull from.
    pub branch: String,

    /// Author name of content commits.
    pub author_name: String,

    /// Author email of content commits.
    pub author_email: String,

    /// Directories staged on push, relative to the root.
    pub directories: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            remote: "origin".into(),
            branch: "main".into(),
            author_name: "Content Bot".into(),
            author_email: "content-bot@example.com".into(),
            directories: [crate::path::CONTENT_DIR, crate::path::DATA_DIR]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// OAuth settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthSettings {
    /// Client id issued by the identity provider.
    pub client_id: Option<String>,

    /// Client secret issued by the identity provider.
    pub client_secret: Option<String>,

    /// Public URL of the site, used to build the redirect URI.
    pub site_url: String,

    /// Scope requested when the CMS does not ask for one.
    pub scope: String,

    /// Authorization endpoint of the provider.
    pub authorize_url: String,

    /// Token endpoint of the provider.
    pub token_url: String,

    /// Where to send the browser once a token is granted.
    pub admin_path: String,

    /// Timeout of the token exchange request in seconds.
    pub timeout_secs: u64,

    /// Reject callbacks whose state was not issued by this server.
    pub verify_state: bool,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            site_url: "http://localhost:8082".into(),
            scope: "repo,user".into(),
            authorize_url: "https://github.com/login/oauth/authorize".into(),
            token_url: "https://github.com/login/oauth/access_token".into(),
            admin_path: "/admin/".into(),
            timeout_secs: 10,
            verify_state: true,
        }
    }
}

/// CMS configuration layout.
///
/// Only the parts describing collections are read, everything else in the
/// admin UI's `config.yml` is ignored.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct CmsConfig {
    #[serde(default)]
    pub collections: Vec<CmsCollection>,
}

impl CmsConfig {
    /// Load CMS configuration from target path.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if the file cannot be read.
    /// - Return [`ConfigError::Yaml`] if the file is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        read_to_string(path)
            .map_err(|source| ConfigError::Read {
                source,
                path: path.to_path_buf(),
            })?
            .parse()
    }

    /// Names of folder collections, i.e., repeatable content.
    pub fn content_collections(&self) -> impl Iterator<Item = &str> {
        self.collections
            .iter()
            .filter(|collection| collection.folder.is_some())
            .map(|collection| collection.name.as_str())
    }

    /// Names of single file entries, i.e., data documents.
    pub fn data_collections(&self) -> impl Iterator<Item = &str> {
        self.collections
            .iter()
            .filter(|collection| collection.folder.is_none())
            .flat_map(|collection| collection.files.iter())
            .map(|file| file.name.as_str())
    }

    /// File entries whose `file` path is not where data documents live.
    pub fn misplaced_files(&self) -> impl Iterator<Item = &CmsFile> {
        self.collections
            .iter()
            .filter(|collection| collection.folder.is_none())
            .flat_map(|collection| collection.files.iter())
            .filter(|file| !file.is_stored_as_data())
    }
}

impl FromStr for CmsConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_yaml::from_str(data).map_err(ConfigError::Yaml)
    }
}

/// Collection entry of CMS configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct CmsCollection {
    pub name: String,

    /// Present on folder collections.
    pub folder: Option<String>,

    /// Present on file collections.
    #[serde(default)]
    pub files: Vec<CmsFile>,
}

/// Single file entry of a CMS file collection.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct CmsFile {
    pub name: String,
    pub file: Option<String>,
}

impl CmsFile {
    /// Path of the document relative to the site root, `_data/<name>.yml`.
    pub fn data_path(&self) -> String {
        format!("{}/{}.{}", crate::path::DATA_DIR, self.name, crate::path::DATA_EXT)
    }

    /// Check that a declared `file` path matches [`CmsFile::data_path`].
    pub fn is_stored_as_data(&self) -> bool {
        match &self.file {
            Some(file) => {
                let file = file.trim_start_matches("./").trim_start_matches('/');
                file == self.data_path()
            }
            None => true,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize settings.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize settings.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to parse CMS configuration.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Failed to perform shell expansion on settings.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Configuration file cannot be read.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Environment variable holds an unusable value.
    #[error("invalid value {value:?} for environment variable {name}")]
    InvalidEnv { name: String, value: String },

    /// Collections cannot be classified.
    #[error(transparent)]
    Collection(#[from] crate::collection::CollectionError),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
