//! Working tree inspection.
//!
//! Shells out to `git` to collect the pending changes that the commit
//! message should describe.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("{0} is not inside a git working tree")]
    NotARepository(PathBuf),
    #[error("No changes found, nothing to commit")]
    NoChanges,
    #[error("`git {args}` failed: {stderr}")]
    CommandFailed { args: String, stderr: String },
}

/// A git working tree rooted at `root`.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Find the working tree containing `path`.
    pub fn discover(path: &Path) -> Result<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .output()
            .context("Failed to run git. Is it installed?")?;

        if !output.status.success() {
            return Err(GitError::NotARepository(path.to_path_buf()).into());
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Working tree root: {}", root);
        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staged changes followed by unstaged changes.
    pub fn diff(&self) -> Result<String> {
        let staged = self.run(&["diff", "--cached", "--no-color", "--no-ext-diff"])?;
        let unstaged = self.run(&["diff", "--no-color", "--no-ext-diff"])?;

        let diff = [staged, unstaged]
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if diff.is_empty() {
            return Err(GitError::NoChanges.into());
        }

        debug!("Collected diff of {} bytes", diff.len());
        Ok(diff)
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
