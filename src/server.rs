// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! HTTP surface of the CMS backend.
//!
//! Exposes the content store as a small REST API the admin UI talks to,
//! the site snapshot the front-end renders from, and the two OAuth routes
//! of the login flow. All responses are JSON, except the OAuth redirects.

mod auth;
mod entries;

use crate::{
    cache::{self, ReadCache},
    collection::{CollectionError, CollectionRegistry},
    config::{ConfigError, Settings},
    oauth::{GithubExchange, OAuth, OAuthError, TokenExchange},
    store::{ContentStore, StoreError},
};

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Content store shared by all requests.
pub type SharedStore = ContentStore<Box<dyn ReadCache>>;

/// OAuth flow shared by all requests.
pub type SharedOAuth = OAuth<Box<dyn TokenExchange>>;

/// State handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SharedStore>,
    pub oauth: Arc<SharedOAuth>,
    pub body_limit: usize,
}

impl AppState {
    /// Construct new application state.
    pub fn new(store: SharedStore, oauth: SharedOAuth, body_limit: usize) -> Self {
        Self {
            store: Arc::new(store),
            oauth: Arc::new(oauth),
            body_limit,
        }
    }

    /// Build application state of a site from its settings.
    ///
    /// # Errors
    ///
    /// - Return [`ServerError::Config`] if collections cannot be classified.
    /// - Return [`ServerError::OAuth`] if the HTTP client cannot be built.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let registry = CollectionRegistry::load(settings)?;
        let store = ContentStore::new(
            settings.site.root.clone(),
            registry,
            cache::select(settings.server.cache),
        );

        let exchange: Box<dyn TokenExchange> =
            Box::new(GithubExchange::from_settings(&settings.oauth)?);
        let oauth = OAuth::new(settings.oauth.clone(), exchange);

        Ok(Self::new(store, oauth, settings.server.body_limit))
    }
}

/// Build router serving every route of the backend.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/entries/:collection",
            get(entries::get_collection)
                .put(entries::put_collection)
                .delete(entries::delete_collection),
        )
        .route(
            "/api/v1/entries/:collection/:slug",
            get(entries::get_entry)
                .put(entries::put_entry)
                .delete(entries::delete_entry),
        )
        .route("/api/v1/site", get(entries::get_site))
        .route("/auth", get(auth::authorize))
        .route("/callback", get(auth::callback))
        .fallback(fallback)
        .layer(from_fn(cors))
        .layer(from_fn(log_requests))
        .layer(DefaultBodyLimit::max(state.body_limit))
        .with_state(state)
}

/// Serve application state on target address until interrupted.
///
/// # Errors
///
/// - Return [`ServerError::Bind`] if the address cannot be bound.
/// - Return [`ServerError::Serve`] if the server fails.
pub async fn serve(state: AppState, address: &str) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| ServerError::Bind {
            source,
            address: address.into(),
        })?;
    let local = listener.local_addr().map_err(ServerError::Serve)?;
    info!("CMS backend listening on http://{local}");
    info!("content root {:?}", state.store.root().display());

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;
    info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for shutdown signal: {error}");
        std::future::pending::<()>().await;
    }
}

async fn fallback(method: Method, uri: axum::http::Uri) -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        format!("no route for {method} {}", uri.path()),
    )
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );

    response
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let status = response.status();
    if status.is_server_error() {
        error!("{method} {path} -> {}", status.as_u16());
    } else {
        info!("{method} {path} -> {}", status.as_u16());
    }

    response
}

/// Error reply of the API, a status with a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        let status = match &error {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Collection(CollectionError::Unknown { .. }) => StatusCode::NOT_FOUND,
            StoreError::InvalidName(_)
            | StoreError::MissingSlug { .. }
            | StoreError::NotContent { .. }
            | StoreError::Collection(_) => StatusCode::BAD_REQUEST,
            StoreError::Read { .. }
            | StoreError::Write { .. }
            | StoreError::Delete { .. }
            | StoreError::CreateDir { .. }
            | StoreError::List { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("{error}");
        }

        Self::new(status, error.to_string())
    }
}

impl From<OAuthError> for ApiError {
    fn from(error: OAuthError) -> Self {
        match error {
            OAuthError::UpstreamAuth { error, description } => {
                let mut body = json!({ "error": error });
                if let Some(description) = description {
                    body["error_description"] = description.into();
                }

                Self {
                    status: StatusCode::BAD_REQUEST,
                    body,
                }
            }
            OAuthError::MissingCode
            | OAuthError::InvalidState
            | OAuthError::UnsupportedProvider { .. } => {
                Self::new(StatusCode::BAD_REQUEST, error.to_string())
            }
            OAuthError::NotConfigured
            | OAuthError::UpstreamNetwork(_)
            | OAuthError::InvalidUrl(_) => {
                error!("{error}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        }
    }
}

/// Server error types.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Site configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// OAuth flow cannot be set up.
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// Listening address cannot be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        #[source]
        source: std::io::Error,
        address: String,
    },

    /// Server stopped with an I/O failure.
    #[error(transparent)]
    Serve(std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = ServerError> = std::result::Result<T, E>;
