// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use folio::{
    cache::NoCache,
    collection::CollectionRegistry,
    config::{Settings, SETTINGS_FILE},
    server::{self, AppState},
    site::check_entries,
    store::ContentStore,
    sync::ContentSync,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::{path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "folio [options] <folio-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file, `<root>/folio.toml` by default.
    #[arg(short, long, global = true, value_name = "file")]
    pub config: Option<PathBuf>,

    /// Site root, overriding the settings file.
    #[arg(short, long, global = true, value_name = "dir")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = self.load_settings()?;
        match self.command {
            Command::Serve(opts) => run_serve(settings, opts).await,
            Command::Init => run_init(settings),
            Command::Push => run_push(settings),
            Command::Pull => run_pull(settings),
            Command::Check => run_check(settings),
        }
    }

    fn load_settings(&self) -> Result<Settings> {
        let base = self.root.clone().unwrap_or_else(|| PathBuf::from("."));
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| base.join(SETTINGS_FILE));
        let mut settings = Settings::load(&path)?.with_env()?;

        // INVARIANT: Relative roots in a settings file are relative to that file.
        settings.site.root = match &self.root {
            Some(root) => root.clone(),
            None => match path.parent() {
                Some(dir) => dir.join(&settings.site.root),
                None => settings.site.root,
            },
        };

        Ok(settings)
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Serve CMS backend API.
    #[command(override_usage = "folio serve [options]")]
    Serve(ServeOptions),

    /// Create standard content directories.
    #[command(override_usage = "folio init [options]")]
    Init,

    /// Commit content changes and push them to the remote.
    #[command(override_usage = "folio push [options]")]
    Push,

    /// Fetch and merge content changes from the remote.
    #[command(override_usage = "folio pull [options]")]
    Pull,

    /// Check content entries for missing frontmatter fields.
    #[command(override_usage = "folio check [options]")]
    Check,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ServeOptions {
    /// Address to listen on, overriding the settings file.
    #[arg(short, long, value_name = "host:port")]
    pub address: Option<String>,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

async fn run_serve(settings: Settings, opts: ServeOptions) -> Result<()> {
    let address = opts.address.unwrap_or_else(|| settings.server.address.clone());
    if settings.oauth.client_id.is_none() || settings.oauth.client_secret.is_none() {
        warn!("OAuth credentials not set, login through /auth is disabled");
    }

    let state = AppState::from_settings(&settings)?;
    server::serve(state, &address).await?;

    Ok(())
}

fn run_init(settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let created = store.init_layout()?;
    if created.is_empty() {
        info!("content directories already in place");
    }

    Ok(())
}

fn run_push(settings: Settings) -> Result<()> {
    let sync = ContentSync::open(&settings.site.root, settings.sync)?;
    let outcome = sync.push(&ProgressBar::new(0))?;
    info!("{outcome}");

    Ok(())
}

fn run_pull(settings: Settings) -> Result<()> {
    let sync = ContentSync::open(&settings.site.root, settings.sync)?;
    let outcome = sync.pull(&ProgressBar::new(0))?;
    info!("{outcome}");

    Ok(())
}

fn run_check(settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let problems = check_entries(&store, &settings.site.required_fields)?;
    for problem in &problems {
        warn!("{problem}");
    }

    if !problems.is_empty() {
        bail!("{} content entries need attention", problems.len());
    }
    info!("all content entries are valid");

    Ok(())
}

fn open_store(settings: &Settings) -> Result<ContentStore<NoCache>> {
    let registry = CollectionRegistry::load(settings)?;
    Ok(ContentStore::new(
        settings.site.root.clone(),
        registry,
        NoCache,
    ))
}
