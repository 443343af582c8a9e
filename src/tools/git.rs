//! Git collaborator: every query the source-control checks make.

use super::process::{self, command_line};
use crate::errors::ToolError;
use crate::version::parse_git_version;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Abstraction over the git executable for testability.
/// Real implementation: `GitCli`. Test double: `FakeGit` in the checks tests.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Whether the working directory is inside a git work tree.
    async fn is_repo(&self) -> bool;

    /// The `X.Y.Z` version of git itself.
    async fn version(&self) -> Result<String, ToolError>;

    /// One entry per modified, staged or untracked path.
    async fn changed_paths(&self) -> Result<Vec<String>, ToolError>;

    /// Short name of the checked-out branch.
    async fn current_branch(&self) -> Result<String, ToolError>;

    /// Succeeds when `remote`'s `HEAD` resolves.
    async fn verify_remote_head(&self, remote: &str) -> Result<(), ToolError>;

    /// Fetch `branch` from `remote`.
    async fn fetch(&self, remote: &str, branch: &str) -> Result<(), ToolError>;

    /// Human-readable `git status` text, including the upstream tracking line.
    async fn status_text(&self) -> Result<String, ToolError>;
}

/// Runs the `git` executable in a fixed working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
}

impl GitCli {
    pub fn new(workdir: impl AsRef<Path>) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String, ToolError> {
        process::run("git", args, &self.workdir)
            .await
            .map(|out| out.stdout)
    }
}

#[async_trait]
impl GitClient for GitCli {
    async fn is_repo(&self) -> bool {
        self.git(&["rev-parse", "--is-inside-work-tree"])
            .await
            .is_ok_and(|out| out.trim() == "true")
    }

    async fn version(&self) -> Result<String, ToolError> {
        let out = self.git(&["version"]).await?;
        parse_git_version(&out).ok_or_else(|| ToolError::UnexpectedOutput {
            command: command_line("git", &["version"]),
            detail: format!("no version number in '{}'", out.trim()),
        })
    }

    async fn changed_paths(&self) -> Result<Vec<String>, ToolError> {
        let out = self.git(&["status", "--porcelain"]).await?;
        Ok(out
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn current_branch(&self) -> Result<String, ToolError> {
        let out = self.git(&["symbolic-ref", "--short", "-q", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }

    async fn verify_remote_head(&self, remote: &str) -> Result<(), ToolError> {
        self.git(&["ls-remote", remote, "HEAD"]).await.map(|_| ())
    }

    async fn fetch(&self, remote: &str, branch: &str) -> Result<(), ToolError> {
        self.git(&["fetch", remote, branch]).await.map(|_| ())
    }

    async fn status_text(&self) -> Result<String, ToolError> {
        self.git(&["status"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success())
    }

    #[tokio::test]
    async fn plain_directory_is_not_a_repo() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        assert!(!GitCli::new(dir.path()).is_repo().await);
    }

    #[tokio::test]
    async fn initialised_directory_is_a_repo_with_untracked_files() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let init = std::process::Command::new("git")
            .args(["init", "-q", "-b", "release"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        if !init.success() {
            // git older than 2.28 has no `-b`
            return;
        }
        std::fs::write(dir.path().join("README.md"), "hello").unwrap();

        let git = GitCli::new(dir.path());
        assert!(git.is_repo().await);
        assert_eq!(git.current_branch().await.unwrap(), "release");
        let changed = git.changed_paths().await.unwrap();
        assert_eq!(changed, vec!["?? README.md"]);
        assert!(!git.version().await.unwrap().is_empty());
    }
}
