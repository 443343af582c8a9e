//! Source-control phase: toolchain, working tree, branch and upstream.

use super::ReleaseContext;
use crate::errors::{StepError, ToolError, ensure};
use crate::pipeline::{Phase, PhaseGuard, Skip, Step, StepTask};
use crate::tools::GitClient;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

pub const PHASE_NAME: &str = "Git";

/// Remote the release branch must be pushed to.
pub const REMOTE: &str = "origin";

static OUT_OF_SYNC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Your branch is (ahead|behind) .*")
        .expect("upstream status regex is a valid static pattern")
});

static FATAL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"fatal: .+").expect("fatal line regex is a valid static pattern")
});

pub fn phase(git: Arc<dyn GitClient>) -> Phase<ReleaseContext> {
    Phase::new(PHASE_NAME)
        .guard(InsideCheckout { git: git.clone() })
        .step(VerifyGitVersion { git: git.clone() })
        .step(VerifyCleanTree { git: git.clone() })
        .step(VerifyReleaseBranch { git: git.clone() })
        .step(VerifyRemoteHead { git: git.clone() })
        .step(VerifyInSyncWithUpstream { git })
}

struct InsideCheckout {
    git: Arc<dyn GitClient>,
}

#[async_trait]
impl PhaseGuard<ReleaseContext> for InsideCheckout {
    async fn skip(&self, _ctx: &ReleaseContext) -> Skip {
        Skip::when(
            !self.git.is_repo().await,
            "Not a git repo. Skipping git checks.",
        )
    }
}

struct VerifyGitVersion {
    git: Arc<dyn GitClient>,
}

#[async_trait]
impl Step<ReleaseContext> for VerifyGitVersion {
    fn title(&self) -> &str {
        "Verify Git version"
    }

    async fn run(
        &self,
        ctx: &mut ReleaseContext,
        task: &mut StepTask<'_>,
    ) -> Result<(), StepError> {
        task.set_title("Verifying Git version...");
        let found = self
            .git
            .version()
            .await
            .map_err(|e| StepError::tool("Failed to read Git version", e))?;

        let required = &ctx.options.required_git;
        ensure(required.satisfies_str(&found), || {
            format!("Git version expected to satisfy {required}. Found {found}")
        })?;

        task.set_title(format!("Git version is {found}"));
        Ok(())
    }
}

struct VerifyCleanTree {
    git: Arc<dyn GitClient>,
}

#[async_trait]
impl Step<ReleaseContext> for VerifyCleanTree {
    fn title(&self) -> &str {
        "Verify working directory is clean"
    }

    async fn run(
        &self,
        _ctx: &mut ReleaseContext,
        task: &mut StepTask<'_>,
    ) -> Result<(), StepError> {
        task.set_title("Verifying working directory is clean...");
        let changed = self
            .git
            .changed_paths()
            .await
            .map_err(|e| StepError::tool("Failed to read working tree status", e))?;

        ensure(changed.is_empty(), || {
            let plural = if changed.len() > 1 { "s" } else { "" };
            format!(
                "Expected working directory to be clean but found {} file{plural}",
                changed.len()
            )
        })?;

        task.set_title("Working directory is clean");
        Ok(())
    }
}

struct VerifyReleaseBranch {
    git: Arc<dyn GitClient>,
}

#[async_trait]
impl Step<ReleaseContext> for VerifyReleaseBranch {
    fn title(&self) -> &str {
        "Verify current branch is release branch"
    }

    async fn run(
        &self,
        ctx: &mut ReleaseContext,
        task: &mut StepTask<'_>,
    ) -> Result<(), StepError> {
        task.set_title("Verifying current branch is release branch...");
        let current = match self.git.current_branch().await {
            Ok(branch) => branch,
            Err(error) if is_detached_head(&error) => String::new(),
            Err(error) => return Err(StepError::tool("Failed to read current branch", error)),
        };

        let release = &ctx.options.release_branch;
        ensure(&current == release, || {
            format!("Must be on release branch \"{release}\". Found \"{current}\".")
        })?;

        task.set_title(format!("Current branch is \"{release}\""));
        ctx.git_current_branch = Some(current);
        Ok(())
    }
}

/// `symbolic-ref -q` exits 1 without output when HEAD is detached.
fn is_detached_head(error: &ToolError) -> bool {
    matches!(error, ToolError::NonZeroExit { code: 1, stderr, .. } if stderr.is_empty())
}

struct VerifyRemoteHead {
    git: Arc<dyn GitClient>,
}

#[async_trait]
impl Step<ReleaseContext> for VerifyRemoteHead {
    fn title(&self) -> &str {
        "Verify remote head exists"
    }

    async fn run(
        &self,
        _ctx: &mut ReleaseContext,
        task: &mut StepTask<'_>,
    ) -> Result<(), StepError> {
        task.set_title("Verifying remote head exists...");
        if let Err(error) = self.git.verify_remote_head(REMOTE).await {
            let fatal = error
                .stderr()
                .and_then(|stderr| FATAL_LINE.find(stderr))
                .map(|m| m.as_str().to_string());
            return Err(match fatal {
                Some(line) => StepError::Assertion(line),
                None => StepError::tool(format!("Failed to resolve {REMOTE} HEAD"), error),
            });
        }

        task.set_title("Remote head exists");
        Ok(())
    }
}

struct VerifyInSyncWithUpstream {
    git: Arc<dyn GitClient>,
}

#[async_trait]
impl Step<ReleaseContext> for VerifyInSyncWithUpstream {
    fn title(&self) -> &str {
        "Verify current branch is identical to upstream"
    }

    async fn run(
        &self,
        ctx: &mut ReleaseContext,
        task: &mut StepTask<'_>,
    ) -> Result<(), StepError> {
        task.set_title("Verifying current branch is identical to upstream...");
        let branch = ctx.git_current_branch()?;

        self.git
            .fetch(REMOTE, branch)
            .await
            .map_err(|e| StepError::tool(format!("Failed to fetch {REMOTE}/{branch}"), e))?;
        let status = self
            .git
            .status_text()
            .await
            .map_err(|e| StepError::tool("Failed to read upstream status", e))?;

        if let Some(marker) = OUT_OF_SYNC.find(&status) {
            return Err(StepError::Assertion(marker.as_str().to_string()));
        }

        task.set_title("Current branch is identical to upstream");
        Ok(())
    }
}
