// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use folio::{
    config::SyncSettings,
    sync::{ContentSync, PullOutcome, PushOutcome, SyncError},
};

use anyhow::Result;
use git2::{Repository, RepositoryInitOptions};
use indicatif::ProgressBar;
use pretty_assertions::assert_eq;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

struct SyncFixture {
    dir: TempDir,
    remote: PathBuf,
}

impl SyncFixture {
    fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let remote = dir.path().join("remote.git");
        init_repo(&remote, true)?;

        Ok(Self { dir, remote })
    }

    /// Fresh working repository with the bare remote as `origin`.
    fn site(&self, name: &str) -> Result<(PathBuf, ContentSync)> {
        let root = self.dir.path().join(name);
        let repo = init_repo(&root, false)?;
        repo.remote("origin", &self.remote.to_string_lossy())?;
        let sync = ContentSync::open(&root, SyncSettings::default())?;

        Ok((root, sync))
    }

    fn remote_repo(&self) -> Result<Repository> {
        Ok(Repository::open_bare(&self.remote)?)
    }
}

fn init_repo(path: &Path, bare: bool) -> Result<Repository> {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    opts.bare(bare);
    Ok(Repository::init_opts(path, &opts)?)
}

fn write(root: &Path, path: &str, text: &str) -> Result<()> {
    let path = root.join(path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;

    Ok(())
}

fn bar() -> ProgressBar {
    ProgressBar::hidden()
}

#[test]
fn push_commits_only_content_directories() -> Result<()> {
    let fixture = SyncFixture::new()?;
    let (root, sync) = fixture.site("site")?;
    write(&root, "_content/current/piece.md", "---\ntitle: \"Piece\"\n---\nBody")?;
    write(&root, "_data/settings.yml", "site_title: \"Avery\"\n")?;
    write(&root, "notes.txt", "not content")?;

    let PushOutcome::Pushed { commit } = sync.push(&bar())? else {
        panic!("expected a pushed commit");
    };

    let remote = fixture.remote_repo()?;
    assert_eq!(remote.refname_to_id("refs/heads/main")?, commit);
    let pushed = remote.find_commit(commit)?;
    assert!(pushed
        .message()
        .unwrap_or_default()
        .starts_with("Content update: "));
    assert_eq!(pushed.author().name(), Some("Content Bot"));

    let tree = pushed.tree()?;
    assert!(tree.get_path(Path::new("_content/current/piece.md")).is_ok());
    assert!(tree.get_path(Path::new("_data/settings.yml")).is_ok());
    assert!(tree.get_path(Path::new("notes.txt")).is_err());

    assert_eq!(sync.push(&bar())?, PushOutcome::NothingToCommit);

    Ok(())
}

#[test]
fn push_stages_deletions() -> Result<()> {
    let fixture = SyncFixture::new()?;
    let (root, sync) = fixture.site("site")?;
    write(&root, "_content/projects/one.md", "# One")?;
    write(&root, "_content/projects/two.md", "# Two")?;
    sync.push(&bar())?;

    fs::remove_file(root.join("_content/projects/one.md"))?;
    let PushOutcome::Pushed { commit } = sync.push(&bar())? else {
        panic!("expected a pushed commit");
    };

    let remote = fixture.remote_repo()?;
    let tree = remote.find_commit(commit)?.tree()?;
    assert!(tree.get_path(Path::new("_content/projects/one.md")).is_err());
    assert!(tree.get_path(Path::new("_content/projects/two.md")).is_ok());

    Ok(())
}

#[test]
fn push_with_nothing_staged() -> Result<()> {
    let fixture = SyncFixture::new()?;
    let (root, sync) = fixture.site("site")?;
    write(&root, "README.md", "not content")?;

    assert_eq!(sync.push(&bar())?, PushOutcome::NothingToCommit);
    let remote = fixture.remote_repo()?;
    assert!(remote.find_reference("refs/heads/main").is_err());
    assert_eq!(remote.references()?.count(), 0);

    Ok(())
}

#[test]
fn pull_picks_up_remote_content() -> Result<()> {
    let fixture = SyncFixture::new()?;
    let (editor, editor_sync) = fixture.site("editor")?;
    let (mirror, mirror_sync) = fixture.site("mirror")?;

    write(&editor, "_content/current/first.md", "# First")?;
    let PushOutcome::Pushed { commit: first } = editor_sync.push(&bar())? else {
        panic!("expected a pushed commit");
    };
    assert_eq!(
        mirror_sync.pull(&bar())?,
        PullOutcome::Adopted { commit: first }
    );
    assert_eq!(
        fs::read_to_string(mirror.join("_content/current/first.md"))?,
        "# First"
    );

    write(&editor, "_content/current/second.md", "# Second")?;
    let PushOutcome::Pushed { commit: second } = editor_sync.push(&bar())? else {
        panic!("expected a pushed commit");
    };
    assert_eq!(
        mirror_sync.pull(&bar())?,
        PullOutcome::FastForward { commit: second }
    );
    assert!(mirror.join("_content/current/second.md").is_file());
    assert_eq!(mirror_sync.repository().head()?.target(), Some(second));

    assert_eq!(mirror_sync.pull(&bar())?, PullOutcome::UpToDate);

    Ok(())
}

#[test]
fn pull_merges_diverged_content() -> Result<()> {
    let fixture = SyncFixture::new()?;
    let (editor, editor_sync) = fixture.site("editor")?;
    let (mirror, mirror_sync) = fixture.site("mirror")?;

    write(&editor, "_content/current/base.md", "# Base")?;
    editor_sync.push(&bar())?;
    mirror_sync.pull(&bar())?;

    write(&editor, "_content/current/remote.md", "# Remote")?;
    editor_sync.push(&bar())?;

    // Local commit lands, but the remote refuses the stale branch.
    write(&mirror, "_content/current/local.md", "# Local")?;
    assert!(mirror_sync.push(&bar()).is_err());

    let PullOutcome::Merged { commit } = mirror_sync.pull(&bar())? else {
        panic!("expected a merge commit");
    };
    let merge = mirror_sync.repository().find_commit(commit)?;
    assert_eq!(merge.parent_count(), 2);
    for name in ["base", "remote", "local"] {
        assert!(mirror.join(format!("_content/current/{name}.md")).is_file());
    }

    Ok(())
}

#[test]
fn pull_reports_conflicts_without_touching_files() -> Result<()> {
    let fixture = SyncFixture::new()?;
    let (editor, editor_sync) = fixture.site("editor")?;
    let (mirror, mirror_sync) = fixture.site("mirror")?;

    write(&editor, "_data/about.yml", "bio: base\n")?;
    editor_sync.push(&bar())?;
    mirror_sync.pull(&bar())?;

    write(&editor, "_data/about.yml", "bio: from editor\n")?;
    editor_sync.push(&bar())?;
    write(&mirror, "_data/about.yml", "bio: from mirror\n")?;
    assert!(mirror_sync.push(&bar()).is_err());

    match mirror_sync.pull(&bar()) {
        Err(SyncError::MergeConflict { paths }) => {
            assert_eq!(paths, vec!["_data/about.yml".to_string()]);
        }
        other => panic!("expected merge conflict, got {other:?}"),
    }
    assert_eq!(
        fs::read_to_string(mirror.join("_data/about.yml"))?,
        "bio: from mirror\n"
    );

    Ok(())
}
