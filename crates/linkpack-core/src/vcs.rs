// crates/linkpack-core/src/vcs.rs
// ============================================================================
// Module: Linkpack Git Collaborator
// Description: Thin git wrappers supplying repository directories and refs.
// Purpose: Prepare working copies for the link-and-pack pipeline.
// Dependencies: thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! [`GitClient`] issues single git invocations through the [`CommandRunner`]
//! seam. The only recovered failure is a conflicting merge, which is aborted
//! so the destination repository is left unmerged and clean.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tokio::fs;
use tracing::info;
use tracing::warn;

use crate::process::CommandOutput;
use crate::process::CommandRunner;
use crate::process::CommandSpec;
use crate::process::ProcessError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default git executable.
pub const DEFAULT_GIT_PROGRAM: &str = "git";
/// Remote name used for merging the origin repository.
const UPSTREAM_REMOTE: &str = "upstream";
/// Marker git prints for conflicting merges.
const CONFLICT_MARKER: &str = "CONFLICT";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by git operations.
#[derive(Debug, Error)]
pub enum VcsError {
    /// A git command failed.
    #[error(transparent)]
    Process(#[from] ProcessError),
    /// A git command succeeded with output that could not be interpreted.
    #[error("unexpected output from `{command}`: {output}")]
    UnexpectedOutput {
        /// Rendered command line.
        command: String,
        /// Offending output.
        output: String,
    },
    /// A clone destination could not be cleared.
    #[error("failed to clear {path}: {message}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error message.
        message: String,
    },
}

/// Result of merging an upstream branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The merge completed.
    Merged,
    /// The merge conflicted and was aborted; the repository is unchanged.
    Aborted,
}

// ============================================================================
// SECTION: Git Client
// ============================================================================

/// Git wrapper bound to a command runner.
pub struct GitClient<'a> {
    /// Runner executing git.
    runner: &'a dyn CommandRunner,
    /// Git executable.
    program: String,
}

impl<'a> GitClient<'a> {
    /// Creates a client using the default git executable.
    #[must_use]
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self::with_program(runner, DEFAULT_GIT_PROGRAM)
    }

    /// Creates a client using a specific git executable.
    #[must_use]
    pub fn with_program(runner: &'a dyn CommandRunner, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Clones `source` into `dest`, replacing any existing destination.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when the destination cannot be cleared or git fails.
    pub async fn clone_repo(&self, source: &str, dest: &Path) -> Result<(), VcsError> {
        match fs::remove_dir_all(dest).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(VcsError::Io {
                    path: dest.to_path_buf(),
                    message: err.to_string(),
                });
            }
        }
        let command =
            CommandSpec::new(&self.program).arg("clone").arg(source).arg(dest.to_string_lossy());
        self.runner.run(&command).await?;
        Ok(())
    }

    /// Checks out a ref, fetching first when the repository has remotes.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when git fails.
    pub async fn checkout(&self, reference: &str, repo: &Path) -> Result<(), VcsError> {
        if !self.remotes(repo).await?.is_empty() {
            self.git(repo, ["fetch"]).await?;
        }
        self.git(repo, ["checkout", reference]).await?;
        Ok(())
    }

    /// Returns the highest stable version tag, skipping prereleases and any
    /// tag contained in `excluding`.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when git fails.
    pub async fn latest_stable_tag(
        &self,
        repo: &Path,
        excluding: Option<&str>,
    ) -> Result<Option<String>, VcsError> {
        let output = self.git(repo, ["tag", "--list"]).await?;
        Ok(select_latest_stable(output.stdout.lines(), excluding))
    }

    /// Returns the commit id of `HEAD`.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when git fails or prints nothing.
    pub async fn head_commit_id(&self, repo: &Path) -> Result<String, VcsError> {
        let output = self.git(repo, ["rev-parse", "HEAD"]).await?;
        let commit = output.stdout.trim();
        if commit.is_empty() {
            return Err(VcsError::UnexpectedOutput {
                command: format!("{} rev-parse HEAD", self.program),
                output: output.stdout.clone(),
            });
        }
        Ok(commit.to_string())
    }

    /// Hard-resets the working copy to a ref.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when git fails.
    pub async fn hard_reset(&self, reference: &str, repo: &Path) -> Result<(), VcsError> {
        self.git(repo, ["reset", "--hard", reference]).await?;
        Ok(())
    }

    /// Merges `upstream/<reference>` from the origin repository into `dest`.
    ///
    /// A conflicting merge is aborted and reported as [`MergeOutcome::Aborted`].
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] for any failure other than a merge conflict.
    pub async fn merge_remote_branch(
        &self,
        reference: &str,
        origin: &Path,
        dest: &Path,
    ) -> Result<MergeOutcome, VcsError> {
        let origin = origin.to_string_lossy();
        if self.remotes(dest).await?.iter().any(|remote| remote == UPSTREAM_REMOTE) {
            self.git(dest, ["remote", "set-url", UPSTREAM_REMOTE, &*origin]).await?;
        } else {
            self.git(dest, ["remote", "add", UPSTREAM_REMOTE, &*origin]).await?;
        }
        self.git(dest, ["fetch", UPSTREAM_REMOTE]).await?;

        let branch = format!("{UPSTREAM_REMOTE}/{reference}");
        match self.git(dest, ["merge", "--no-edit", branch.as_str()]).await {
            Ok(_) => {
                info!(branch = %branch, "merge successful");
                Ok(MergeOutcome::Merged)
            }
            Err(err) if err.output_contains(CONFLICT_MARKER) => {
                warn!(branch = %branch, error = %err, "merge conflicted");
                self.git(dest, ["merge", "--abort"]).await?;
                info!(branch = %branch, "aborted merge");
                Ok(MergeOutcome::Aborted)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the configured remote names.
    async fn remotes(&self, repo: &Path) -> Result<Vec<String>, VcsError> {
        let output = self.git(repo, ["remote"]).await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|remote| !remote.is_empty())
            .map(String::from)
            .collect())
    }

    /// Runs git with arguments inside a repository.
    async fn git<const N: usize>(
        &self,
        repo: &Path,
        args: [&str; N],
    ) -> Result<CommandOutput, ProcessError> {
        let command = CommandSpec::new(&self.program).args(args).current_dir(repo);
        self.runner.run(&command).await
    }
}

// ============================================================================
// SECTION: Tag Selection
// ============================================================================

/// Picks the highest stable version tag from a tag listing.
///
/// Tags containing `-` are prereleases. Tags whose text appears in
/// `excluding` are skipped. Tags that are not dotted numeric versions
/// (optionally prefixed with `v`) are ignored.
#[must_use]
pub fn select_latest_stable<'t>(
    tags: impl IntoIterator<Item = &'t str>,
    excluding: Option<&str>,
) -> Option<String> {
    tags.into_iter()
        .map(str::trim)
        .filter(|tag| !tag.is_empty() && !tag.contains('-'))
        .filter(|tag| excluding.is_none_or(|excluded| !excluded.contains(tag)))
        .filter_map(|tag| parse_version(tag).map(|version| (version, tag)))
        .max_by(|(left, _), (right, _)| compare_versions(left, right))
        .map(|(_, tag)| tag.to_string())
}

/// Parses `v1.2.3` or `1.2.3` into numeric components.
fn parse_version(tag: &str) -> Option<Vec<u64>> {
    let digits = tag.strip_prefix('v').unwrap_or(tag);
    digits.split('.').map(|part| part.parse::<u64>().ok()).collect()
}

/// Compares numeric versions component-wise, padding with zeros.
fn compare_versions(left: &[u64], right: &[u64]) -> Ordering {
    let len = left.len().max(right.len());
    (0 .. len)
        .map(|i| {
            let l = left.get(i).copied().unwrap_or(0);
            let r = right.get(i).copied().unwrap_or(0);
            l.cmp(&r)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}
