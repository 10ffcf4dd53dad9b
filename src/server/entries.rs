// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Content store routes.

use crate::{
    server::{ApiError, AppState},
    site::SiteSnapshot,
    store::Lookup,
};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

/// Request body of a write.
#[derive(Debug, Deserialize)]
pub(crate) struct WriteBody {
    data: String,
}

type Reply = Result<Response, ApiError>;

pub(crate) async fn get_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Reply {
    read(&state, &collection, None)
}

pub(crate) async fn get_entry(
    State(state): State<AppState>,
    Path((collection, slug)): Path<(String, String)>,
) -> Reply {
    read(&state, &collection, Some(&slug))
}

pub(crate) async fn put_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    body: Result<Json<WriteBody>, JsonRejection>,
) -> Reply {
    write(&state, &collection, None, body)
}

pub(crate) async fn put_entry(
    State(state): State<AppState>,
    Path((collection, slug)): Path<(String, String)>,
    body: Result<Json<WriteBody>, JsonRejection>,
) -> Reply {
    write(&state, &collection, Some(&slug), body)
}

pub(crate) async fn delete_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Reply {
    delete(&state, &collection, None)
}

pub(crate) async fn delete_entry(
    State(state): State<AppState>,
    Path((collection, slug)): Path<(String, String)>,
) -> Reply {
    delete(&state, &collection, Some(&slug))
}

pub(crate) async fn get_site(State(state): State<AppState>) -> Reply {
    let snapshot = SiteSnapshot::load(state.store.as_ref())?;
    Ok(Json(snapshot).into_response())
}

fn read(state: &AppState, collection: &str, slug: Option<&str>) -> Reply {
    let reply = match state.store.get(collection, slug)? {
        Lookup::Document(data) => json!({ "data": data }),
        Lookup::Listing(entries) => json!({ "entries": entries }),
    };

    Ok(Json(reply).into_response())
}

fn write(
    state: &AppState,
    collection: &str,
    slug: Option<&str>,
    body: Result<Json<WriteBody>, JsonRejection>,
) -> Reply {
    // INVARIANT: Oversized bodies keep their 413, every other rejection is a bad request.
    let Json(body) = body.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::new(rejection.status(), rejection.body_text()),
        _ => ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text()),
    })?;

    let path = state.store.put(collection, slug, &body.data)?;
    Ok(Json(json!({ "success": true, "path": path })).into_response())
}

fn delete(state: &AppState, collection: &str, slug: Option<&str>) -> Reply {
    let path = state.store.delete(collection, slug)?;
    Ok(Json(json!({ "success": true, "deleted": path })).into_response())
}
