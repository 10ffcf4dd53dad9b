// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! OAuth authorization code flow.
//!
//! The admin UI logs in through the git host. Folio sends the browser to the
//! provider's authorize endpoint, receives the authorization code back on
//! its callback route, trades the code for an access token, and finally
//! redirects to the admin page with the token in the URL fragment, where the
//! CMS picks it up.
//!
//! The code-for-token trade goes through the [`TokenExchange`] trait so the
//! HTTP round trip to the provider can be swapped out.

use crate::config::OAuthSettings;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info, instrument, warn};
use url::{form_urlencoded, Url};
use uuid::Uuid;

/// Prefix of every issued state parameter.
pub const STATE_PREFIX: &str = "dcmsauth";

/// Token lifetime reported when the provider does not report one.
pub const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Only identity provider supported.
pub const PROVIDER: &str = "github";

/// Maximum number of outstanding states remembered at once.
///
/// Past the cap the oldest state is forgotten. Anyone able to reach `/auth`
/// can push out a pending login by starting enough logins of their own, so
/// an editor caught by that simply has to log in again. Fine for a site
/// with a handful of editors; put `/auth` behind rate limiting otherwise.
const MAX_PENDING_STATES: usize = 256;

/// Where to send the browser to start a login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
    /// Full authorize URL at the provider.
    pub url: Url,

    /// State parameter embedded in the URL.
    pub state: String,
}

/// Memory of issued state parameters.
///
/// Each state can be consumed once. When too many logins are left
/// unfinished the oldest states are forgotten.
#[derive(Debug, Default)]
pub struct StateLedger {
    issued: Mutex<VecDeque<String>>,
}

impl StateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue fresh state and remember it.
    pub fn issue(&self) -> String {
        let state = format!("{STATE_PREFIX}{}", Uuid::new_v4().simple());
        let mut issued = self.issued.lock();
        if issued.len() == MAX_PENDING_STATES {
            issued.pop_front();
        }
        issued.push_back(state.clone());

        state
    }

    /// Forget target state. Returns false if it was never issued, or was
    /// already consumed.
    pub fn consume(&self, state: &str) -> bool {
        let mut issued = self.issued.lock();
        match issued.iter().position(|known| known == state) {
            Some(index) => {
                issued.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of outstanding states.
    pub fn pending(&self) -> usize {
        self.issued.lock().len()
    }
}

/// Request body of the code-for-token trade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenRequest {
    pub client_id: String,
    pub client_secret: String,
    pub code: String,
    pub redirect_uri: String,
}

/// Access token granted by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Body of a token endpoint reply, which carries either a grant or an
/// error with a 200 status.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    Denied {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
    Granted(TokenGrant),
}

/// Layer of indirection for trading an authorization code for a token.
#[async_trait]
pub trait TokenExchange: Send + Sync + 'static {
    /// Trade authorization code for access token.
    ///
    /// # Errors
    ///
    /// - Return [`OAuthError::UpstreamAuth`] if the provider refuses.
    /// - Return [`OAuthError::UpstreamNetwork`] if the provider cannot be
    ///   reached or replies with garbage.
    async fn exchange(&self, request: &TokenRequest) -> Result<TokenGrant>;
}

/// Token exchange against GitHub's token endpoint.
#[derive(Clone, Debug)]
pub struct GithubExchange {
    client: reqwest::Client,
    token_url: String,
}

impl GithubExchange {
    /// Construct new exchange posting to target token endpoint.
    ///
    /// # Errors
    ///
    /// - Return [`OAuthError::UpstreamNetwork`] if the HTTP client cannot be
    ///   built.
    pub fn new(token_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            token_url: token_url.into(),
        })
    }

    /// Construct exchange from the token endpoint and timeout of target
    /// settings.
    ///
    /// # Errors
    ///
    /// - Return [`OAuthError::UpstreamNetwork`] if the HTTP client cannot be
    ///   built.
    pub fn from_settings(settings: &OAuthSettings) -> Result<Self> {
        Self::new(
            settings.token_url.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

#[async_trait]
impl TokenExchange for GithubExchange {
    #[instrument(skip(self, request), level = "debug")]
    async fn exchange(&self, request: &TokenRequest) -> Result<TokenGrant> {
        let response = self
            .client
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;
        debug!("token endpoint replied {}", response.status());

        match response.json::<TokenResponse>().await? {
            TokenResponse::Granted(grant) => Ok(grant),
            TokenResponse::Denied {
                error,
                error_description,
            } => Err(OAuthError::UpstreamAuth {
                error,
                description: error_description,
            }),
        }
    }
}

#[async_trait]
impl<T> TokenExchange for Box<T>
where
    T: TokenExchange + ?Sized,
{
    async fn exchange(&self, request: &TokenRequest) -> Result<TokenGrant> {
        (**self).exchange(request).await
    }
}

/// OAuth flow of a site.
#[derive(Debug)]
pub struct OAuth<T = GithubExchange>
where
    T: TokenExchange,
{
    settings: OAuthSettings,
    ledger: StateLedger,
    exchange: T,
}

impl<T> OAuth<T>
where
    T: TokenExchange,
{
    /// Construct new flow with target token exchange.
    pub fn new(settings: OAuthSettings, exchange: T) -> Self {
        Self {
            settings,
            ledger: StateLedger::new(),
            exchange,
        }
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &StateLedger {
        &self.ledger
    }

    /// Callback URL the provider redirects back to.
    pub fn redirect_uri(&self) -> String {
        format!("{}/callback", self.settings.site_url.trim_end_matches('/'))
    }

    /// Build authorize URL at the provider, issuing a fresh state.
    ///
    /// # Errors
    ///
    /// - Return [`OAuthError::UnsupportedProvider`] for any provider but
    ///   GitHub.
    /// - Return [`OAuthError::NotConfigured`] if client credentials are
    ///   missing.
    /// - Return [`OAuthError::InvalidUrl`] if the authorize URL is malformed.
    pub fn authorize(&self, provider: Option<&str>, scope: Option<&str>) -> Result<Authorization> {
        check_provider(provider)?;
        let (client_id, _) = self.credentials()?;
        let scope = scope.unwrap_or(&self.settings.scope);
        let state = self.ledger.issue();

        let url = Url::parse_with_params(
            &self.settings.authorize_url,
            &[
                ("client_id", client_id),
                ("redirect_uri", self.redirect_uri().as_str()),
                ("scope", scope),
                ("response_type", "code"),
                ("state", state.as_str()),
            ],
        )?;
        info!("start login with scope {scope:?}");

        Ok(Authorization { url, state })
    }

    /// Finish login, returning where to send the browser with its token.
    ///
    /// # Errors
    ///
    /// - Return [`OAuthError::MissingCode`] if no code was given.
    /// - Return [`OAuthError::InvalidState`] if state verification is on and
    ///   the state was not issued, or was already used.
    /// - Return [`OAuthError::NotConfigured`] if client credentials are
    ///   missing.
    /// - Otherwise fails like [`TokenExchange::exchange`].
    pub async fn callback(&self, code: Option<&str>, state: Option<&str>) -> Result<String> {
        let code = code.filter(|code| !code.is_empty()).ok_or(OAuthError::MissingCode)?;

        if self.settings.verify_state {
            match state {
                Some(state) if self.ledger.consume(state) => {}
                _ => {
                    warn!("reject callback with state {state:?}");
                    return Err(OAuthError::InvalidState);
                }
            }
        }

        let (client_id, client_secret) = self.credentials()?;
        let request = TokenRequest {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            code: code.into(),
            redirect_uri: self.redirect_uri(),
        };

        let grant = self.exchange.exchange(&request).await.inspect_err(|error| {
            warn!("token exchange failed: {error}");
        })?;
        info!("login complete");

        Ok(callback_location(&self.settings.admin_path, &grant))
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.settings.client_id, &self.settings.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Ok((id.as_str(), secret.as_str()))
            }
            _ => Err(OAuthError::NotConfigured),
        }
    }
}

/// Admin page location carrying a grant in its fragment.
pub fn callback_location(admin_path: &str, grant: &TokenGrant) -> String {
    let expires_in = grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN).to_string();
    let fragment = form_urlencoded::Serializer::new(String::new())
        .append_pair("access_token", &grant.access_token)
        .append_pair("token_type", "bearer")
        .append_pair("expires_in", &expires_in)
        .finish();

    format!("{admin_path}#{fragment}")
}

fn check_provider(provider: Option<&str>) -> Result<()> {
    match provider {
        None => Ok(()),
        Some(provider) if provider.eq_ignore_ascii_case(PROVIDER) => Ok(()),
        Some(provider) => Err(OAuthError::UnsupportedProvider {
            provider: provider.into(),
        }),
    }
}

/// All possible error types of the OAuth flow.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Callback arrived without authorization code.
    #[error("Missing code parameter")]
    MissingCode,

    /// Callback state was never issued or was already used.
    #[error("invalid or expired state parameter")]
    InvalidState,

    /// Login requested for a provider other than GitHub.
    #[error("unsupported provider {provider:?}")]
    UnsupportedProvider { provider: String },

    /// Client credentials are missing.
    #[error("OAuth credentials not properly configured")]
    NotConfigured,

    /// Provider refused the authorization code.
    #[error("{error}: {}", description.as_deref().unwrap_or("no description"))]
    UpstreamAuth {
        error: String,
        description: Option<String>,
    },

    /// Provider could not be reached, or replied with garbage.
    #[error(transparent)]
    UpstreamNetwork(#[from] reqwest::Error),

    /// Authorize URL is malformed.
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
}

/// Friendly result alias :3
pub type Result<T, E = OAuthError> = std::result::Result<T, E>;
