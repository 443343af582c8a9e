//! The release checks: an `npm` phase for the package and its registry,
//! then a `Git` phase for the checkout.
//!
//! | Phase | Steps                                                                  |
//! |-------|------------------------------------------------------------------------|
//! | `npm` | detect package.json, validate it, npm version, npmrc registry, custom publish registry, authentication and write access |
//! | `Git` | git version, clean tree, release branch, remote head, in sync with upstream |
//!
//! The `Git` phase is skipped outright when the project is not a checkout.

pub mod git;
pub mod npm;

#[cfg(test)]
pub(crate) mod fakes;

use crate::config::CheckOptions;
use crate::errors::StepError;
use crate::package::PackageJson;
use crate::pipeline::Phase;
use crate::tools::{GitClient, NpmClient};
use std::path::PathBuf;
use std::sync::Arc;

/// State threaded through one run of the release checks.
///
/// `options` is seeded before the run; every other slot is written by a
/// step and read by later ones.
#[derive(Debug, Clone)]
pub struct ReleaseContext {
    pub options: CheckOptions,
    /// Parsed descriptor, set by "Detect package.json"
    pub package: Option<PackageJson>,
    /// Where the descriptor was found, set by "Detect package.json"
    pub package_path: Option<PathBuf>,
    /// Set by "Verify npm version"
    pub npm_version: Option<String>,
    /// Set by "Verify current branch is release branch"
    pub git_current_branch: Option<String>,
    /// Set by "Check npmrc registry", possibly replaced by
    /// "Check custom publish registry"
    pub publish_registry_url: Option<String>,
    /// Set by "Verify user authentication with publish registry"
    pub authenticated_user: Option<String>,
}

impl ReleaseContext {
    pub fn new(options: CheckOptions) -> Self {
        Self {
            options,
            package: None,
            package_path: None,
            npm_version: None,
            git_current_branch: None,
            publish_registry_url: None,
            authenticated_user: None,
        }
    }

    pub fn package(&self) -> Result<&PackageJson, StepError> {
        self.package
            .as_ref()
            .ok_or(StepError::MissingContext("package"))
    }

    pub fn publish_registry_url(&self) -> Result<&str, StepError> {
        self.publish_registry_url
            .as_deref()
            .ok_or(StepError::MissingContext("publish_registry_url"))
    }

    pub fn git_current_branch(&self) -> Result<&str, StepError> {
        self.git_current_branch
            .as_deref()
            .ok_or(StepError::MissingContext("git_current_branch"))
    }
}

/// Build the full pipeline in run order.
pub fn build_phases(
    git: Arc<dyn GitClient>,
    npm: Arc<dyn NpmClient>,
) -> Vec<Phase<ReleaseContext>> {
    vec![npm::phase(npm), git::phase(git)]
}
