// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Flat-file content backend for a portfolio site.
//!
//! Folio serves a git-based CMS admin UI. Edits come in over a small REST
//! API and land as YAML data documents and markdown entries under the site
//! root, the front-end reads a structured snapshot of that content, and the
//! CLI publishes or picks up content through git.

pub mod cache;
pub mod collection;
pub mod config;
pub mod frontmatter;
pub mod oauth;
pub mod path;
pub mod server;
pub mod site;
pub mod store;
pub mod sync;
