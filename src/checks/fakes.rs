//! Scriptable git and npm doubles for the check tests.

use crate::errors::ToolError;
use crate::tools::{Collaborators, GitClient, NpmClient};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

pub(crate) fn exit_error(command: &str, stderr: &str) -> ToolError {
    ToolError::NonZeroExit {
        command: command.to_string(),
        code: 1,
        stderr: stderr.to_string(),
    }
}

/// Each field is the scripted answer to the matching `GitClient` query.
pub(crate) struct FakeGit {
    pub is_repo: bool,
    pub version: String,
    pub changed_paths: Vec<String>,
    pub branch: Result<String, String>,
    /// `Err(stderr)` makes `ls-remote` fail with that stderr
    pub remote_head: Result<(), String>,
    pub fetch_ok: bool,
    pub status_text: String,
    pub calls: Mutex<Vec<String>>,
}

impl FakeGit {
    /// A clean `master` checkout in sync with `origin/master`.
    pub fn healthy() -> Self {
        Self {
            is_repo: true,
            version: "2.39.2".into(),
            changed_paths: Vec::new(),
            branch: Ok("master".into()),
            remote_head: Ok(()),
            fetch_ok: true,
            status_text: "On branch master\nYour branch is up to date with 'origin/master'.\n\nnothing to commit, working tree clean".into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.to_string());
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GitClient for FakeGit {
    async fn is_repo(&self) -> bool {
        self.record("is_repo");
        self.is_repo
    }

    async fn version(&self) -> Result<String, ToolError> {
        self.record("version");
        Ok(self.version.clone())
    }

    async fn changed_paths(&self) -> Result<Vec<String>, ToolError> {
        self.record("changed_paths");
        Ok(self.changed_paths.clone())
    }

    async fn current_branch(&self) -> Result<String, ToolError> {
        self.record("current_branch");
        self.branch
            .clone()
            .map_err(|stderr| exit_error("git symbolic-ref --short -q HEAD", &stderr))
    }

    async fn verify_remote_head(&self, remote: &str) -> Result<(), ToolError> {
        self.record(&format!("verify_remote_head {remote}"));
        self.remote_head
            .clone()
            .map_err(|stderr| exit_error(&format!("git ls-remote {remote} HEAD"), &stderr))
    }

    async fn fetch(&self, remote: &str, branch: &str) -> Result<(), ToolError> {
        self.record(&format!("fetch {remote} {branch}"));
        if self.fetch_ok {
            Ok(())
        } else {
            Err(exit_error(
                &format!("git fetch {remote} {branch}"),
                "fatal: couldn't find remote ref",
            ))
        }
    }

    async fn status_text(&self) -> Result<String, ToolError> {
        self.record("status_text");
        Ok(self.status_text.clone())
    }
}

/// Each field is the scripted answer to the matching `NpmClient` query.
pub(crate) struct FakeNpm {
    pub version: String,
    pub registry: String,
    /// URLs that answer; everything else is unreachable
    pub reachable: HashSet<String>,
    pub whoami: Result<String, String>,
    pub collaborators: Result<Collaborators, String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeNpm {
    /// npm 10, logged in as `alice` with write access to a published package.
    pub fn healthy() -> Self {
        Self {
            version: "10.2.4".into(),
            registry: "https://registry.npmjs.org/".into(),
            reachable: HashSet::from([
                "https://registry.npmjs.org/".to_string(),
                "https://npm.example.com/".to_string(),
            ]),
            whoami: Ok("alice".into()),
            collaborators: Ok(Collaborators::Listed(BTreeMap::from([(
                "alice".to_string(),
                "read-write".to_string(),
            )]))),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.to_string());
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NpmClient for FakeNpm {
    async fn version(&self) -> Result<String, ToolError> {
        self.record("version");
        Ok(self.version.clone())
    }

    async fn registry_url(&self, scope: Option<&str>) -> Result<String, ToolError> {
        self.record(&format!("registry_url {}", scope.unwrap_or("-")));
        Ok(self.registry.clone())
    }

    async fn is_reachable(&self, url: &str) -> bool {
        self.record(&format!("is_reachable {url}"));
        self.reachable.contains(url)
    }

    async fn whoami(&self, registry: &str) -> Result<String, ToolError> {
        self.record(&format!("whoami {registry}"));
        self.whoami
            .clone()
            .map_err(|stderr| exit_error("npm whoami", &stderr))
    }

    async fn collaborators(
        &self,
        package: &str,
        registry: &str,
    ) -> Result<Collaborators, ToolError> {
        self.record(&format!("collaborators {package} {registry}"));
        self.collaborators
            .clone()
            .map_err(|stderr| exit_error("npm access ls-collaborators", &stderr))
    }
}
