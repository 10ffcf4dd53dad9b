// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Content synchronization through git.
//!
//! Edits made through the CMS only touch files on disk. Publishing them
//! means committing the content directories of the site repository and
//! pushing the result to its remote, while picking up edits made elsewhere
//! means fetching and merging the remote branch back in.
//!
//! Only the content directories are ever staged. Whatever else is dirty in
//! the working tree is left for a human to deal with.

use crate::config::SyncSettings;

use auth_git2::{GitAuthenticator, Prompter};
use chrono::{SecondsFormat, Utc};
use git2::{
    build::CheckoutBuilder, AnnotatedCommit, Commit, ErrorCode, FetchOptions, IndexAddOption,
    Oid, PushOptions, RemoteCallbacks, Repository, Signature, Tree,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    time,
};
use tracing::{debug, info, instrument, warn};

/// Prefix of every commit made by [`ContentSync::push`].
pub const COMMIT_PREFIX: &str = "Content update";

/// Result of publishing content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Content directories match `HEAD`, nothing was committed or pushed.
    NothingToCommit,

    /// New commit was made and pushed.
    Pushed { commit: Oid },
}

impl Display for PushOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::NothingToCommit => fmt.write_str("no content changes to commit"),
            Self::Pushed { commit } => write!(fmt, "pushed content update {commit}"),
        }
    }
}

/// Result of picking up remote content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PullOutcome {
    /// Local branch already contains the remote branch.
    UpToDate,

    /// Local branch was moved forward to the remote branch.
    FastForward { commit: Oid },

    /// Local branch had no commits and now points at the remote branch.
    Adopted { commit: Oid },

    /// Both sides diverged and were joined by a merge commit.
    Merged { commit: Oid },
}

impl Display for PullOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::UpToDate => fmt.write_str("already up to date"),
            Self::FastForward { commit } => write!(fmt, "fast-forward to {commit}"),
            Self::Adopted { commit } => write!(fmt, "checked out remote branch at {commit}"),
            Self::Merged { commit } => write!(fmt, "merged remote changes in {commit}"),
        }
    }
}

/// Git synchronization of site content.
pub struct ContentSync {
    repo: Repository,
    settings: SyncSettings,
}

impl ContentSync {
    /// Open site repository at target root.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Git2`] if the root is not a git repository with a
    ///   working tree.
    pub fn open(root: impl AsRef<Path>, settings: SyncSettings) -> Result<Self> {
        let repo = Repository::open(root.as_ref())?;
        if repo.is_bare() {
            return Err(git2::Error::from_str("site repository has no working tree").into());
        }

        Ok(Self { repo, settings })
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Commit content directories and push them to the remote branch.
    ///
    /// Additions, modifications, and deletions under the content
    /// directories are all staged. The commit message is `Content update:`
    /// followed by the current time in RFC 3339.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::PushRejected`] if the remote refuses the update.
    /// - Return [`SyncError::Git2`] if libgit2 operations fail.
    #[instrument(skip(self, bar), level = "debug")]
    pub fn push(&self, bar: &ProgressBar) -> Result<PushOutcome> {
        let mut index = self.repo.index()?;
        let pathspecs = || self.settings.directories.iter().map(String::as_str);
        index.add_all(pathspecs(), IndexAddOption::DEFAULT, None)?;
        index.update_all(pathspecs(), None)?;
        index.write()?;

        let tree = self.repo.find_tree(index.write_tree()?)?;
        let parent = self.head_commit()?;
        let unchanged = match &parent {
            Some(parent) => parent.tree_id() == tree.id(),
            None => tree.is_empty(),
        };
        if unchanged {
            info!("no content changes to commit");
            return Ok(PushOutcome::NothingToCommit);
        }

        let signature = self.signature()?;
        let message = format!(
            "{COMMIT_PREFIX}: {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let parents = parent.iter().collect::<Vec<_>>();
        let commit = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, &message, &tree, &parents)?;
        info!("commit {message:?} as {commit}");

        // INVARIANT: Push whatever branch HEAD is on to the configured branch.
        let head = self.repo.head()?;
        let local = head.name().unwrap_or("HEAD");
        let refspec = format!("{local}:refs/heads/{}", self.settings.branch);
        self.push_refspec(&refspec, bar)?;

        Ok(PushOutcome::Pushed { commit })
    }

    /// Fetch remote branch and merge it into the current branch.
    ///
    /// The working tree is updated with a safe checkout, so local edits to
    /// files touched by the remote abort the pull instead of being lost.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::MergeConflict`] if both sides changed the same
    ///   content. Nothing is changed in that case.
    /// - Return [`SyncError::Git2`] if libgit2 operations fail.
    #[instrument(skip(self, bar), level = "debug")]
    pub fn pull(&self, bar: &ProgressBar) -> Result<PullOutcome> {
        let fetched = self.fetch(bar)?;
        let (analysis, _) = self.repo.merge_analysis(&[&fetched])?;

        if analysis.is_up_to_date() {
            info!("already up to date");
            return Ok(PullOutcome::UpToDate);
        }

        let remote_commit = self.repo.find_commit(fetched.id())?;
        if analysis.is_unborn() {
            let refname = format!("refs/heads/{}", self.settings.branch);
            self.checkout(&remote_commit.tree()?)?;
            self.repo
                .reference(&refname, remote_commit.id(), true, "pull: adopt remote branch")?;
            self.repo.set_head(&refname)?;
            info!("adopt remote branch at {}", remote_commit.id());
            return Ok(PullOutcome::Adopted {
                commit: remote_commit.id(),
            });
        }

        if analysis.is_fast_forward() {
            self.checkout(&remote_commit.tree()?)?;
            let mut head = self.repo.head()?;
            head.set_target(remote_commit.id(), "pull: fast-forward")?;
            info!("fast-forward to {}", remote_commit.id());
            return Ok(PullOutcome::FastForward {
                commit: remote_commit.id(),
            });
        }

        let commit = self.merge(&remote_commit)?;
        Ok(PullOutcome::Merged { commit })
    }

    fn merge(&self, remote_commit: &Commit<'_>) -> Result<Oid> {
        let local_commit = self.repo.head()?.peel_to_commit()?;
        let base = self.repo.merge_base(local_commit.id(), remote_commit.id())?;
        let ancestor = self.repo.find_commit(base)?.tree()?;

        let mut merged = self.repo.merge_trees(
            &ancestor,
            &local_commit.tree()?,
            &remote_commit.tree()?,
            None,
        )?;

        if merged.has_conflicts() {
            let mut paths = Vec::new();
            for conflict in merged.conflicts()? {
                let conflict = conflict?;
                let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
                if let Some(entry) = entry {
                    paths.push(String::from_utf8_lossy(&entry.path).into_owned());
                }
            }
            warn!("merge conflict in {paths:?}");
            return Err(SyncError::MergeConflict { paths });
        }

        let tree = self.repo.find_tree(merged.write_tree_to(&self.repo)?)?;
        self.checkout(&tree)?;

        let signature = self.signature()?;
        let message = format!("Merge {}/{}", self.settings.remote, self.settings.branch);
        let commit = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &message,
            &tree,
            &[&local_commit, remote_commit],
        )?;
        info!("merge remote changes in {commit}");

        Ok(commit)
    }

    fn fetch(&self, bar: &ProgressBar) -> Result<AnnotatedCommit<'_>> {
        set_style(bar, &format!("fetch {}", self.settings.remote))?;

        let prompter = IndicatifPrompter::new(bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let config = self.repo.config()?;

        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                bar.set_length(progress.total_objects() as u64);
                bar.set_position(progress.received_objects() as u64);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let mut remote = self.repo.find_remote(&self.settings.remote)?;
        remote.fetch(&[self.settings.branch.as_str()], Some(&mut fo), None)?;
        bar.finish_and_clear();

        let fetch_head = self.repo.find_reference("FETCH_HEAD")?;
        debug!("fetched {:?}", fetch_head.target());

        Ok(self.repo.reference_to_annotated_commit(&fetch_head)?)
    }

    fn push_refspec(&self, refspec: &str, bar: &ProgressBar) -> Result<()> {
        set_style(bar, &format!("push {}", self.settings.remote))?;

        let prompter = IndicatifPrompter::new(bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let config = self.repo.config()?;
        let mut remote = self.repo.find_remote(&self.settings.remote)?;

        let mut rejection = None;
        {
            let mut rc = RemoteCallbacks::new();
            rc.credentials(authenticator.credentials(&config));
            rc.push_transfer_progress(|current, total, _| {
                bar.set_length(total as u64);
                bar.set_position(current as u64);
            });
            rc.push_update_reference(|reference, status| {
                if let Some(message) = status {
                    rejection = Some((reference.to_string(), message.to_string()));
                }
                Ok(())
            });

            let mut po = PushOptions::new();
            po.remote_callbacks(rc);
            remote.push(&[refspec], Some(&mut po))?;
        }
        bar.finish_and_clear();

        if let Some((reference, message)) = rejection {
            return Err(SyncError::PushRejected { reference, message });
        }

        info!("push {refspec} to {}", self.settings.remote);
        Ok(())
    }

    fn checkout(&self, tree: &Tree<'_>) -> Result<()> {
        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        self.repo.checkout_tree(tree.as_object(), Some(&mut checkout))?;

        Ok(())
    }

    fn head_commit(&self) -> Result<Option<Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(error) if matches!(error.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn signature(&self) -> Result<Signature<'static>> {
        Ok(Signature::now(
            &self.settings.author_name,
            &self.settings.author_email,
        )?)
    }
}

fn set_style(bar: &ProgressBar, message: &str) -> Result<()> {
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    bar.set_message(message.to_string());

    Ok(())
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Content synchronization error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Local and remote changed the same content.
    #[error("merge conflict in {}", paths.join(", "))]
    MergeConflict { paths: Vec<String> },

    /// Remote refused reference update.
    #[error("remote rejected {reference}: {message}")]
    PushRejected { reference: String, message: String },
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
