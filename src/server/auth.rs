// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! OAuth routes.

use crate::server::{ApiError, AppState};

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuthParams {
    provider: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

pub(crate) async fn authorize(
    State(state): State<AppState>,
    Query(params): Query<AuthParams>,
) -> Result<Response, ApiError> {
    let login = state
        .oauth
        .authorize(params.provider.as_deref(), params.scope.as_deref())?;

    Ok((
        StatusCode::FOUND,
        [
            (header::LOCATION, login.url.to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
    )
        .into_response())
}

pub(crate) async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let location = state
        .oauth
        .callback(params.code.as_deref(), params.state.as_deref())
        .await?;

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
