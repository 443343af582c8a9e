//! Layered configuration for a release-check run.
//!
//! Values are resolved file → environment → CLI, later layers winning, with
//! built-in defaults for anything left unset.
//!
//! # Configuration File Format
//!
//! `prerelease-checks.toml` in the project directory, all keys optional:
//!
//! ```toml
//! [checks]
//! release_branch = "main"
//! required_npm = ">=8"
//! required_git = ">=2.30.0"
//!
//! [registry]
//! timeout_secs = 5
//! unpublished_package = "allow"   # or "deny"
//! ```

use crate::errors::ConfigError;
use crate::version::VersionRange;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "prerelease-checks.toml";

pub const DEFAULT_RELEASE_BRANCH: &str = "master";
pub const DEFAULT_REQUIRED_NPM: &str = ">=6.8.0";
pub const DEFAULT_REQUIRED_GIT: &str = ">=2.11.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

pub const ENV_RELEASE_BRANCH: &str = "PRERELEASE_RELEASE_BRANCH";
pub const ENV_REQUIRED_NPM: &str = "PRERELEASE_REQUIRED_NPM";
pub const ENV_REQUIRED_GIT: &str = "PRERELEASE_REQUIRED_GIT";
pub const ENV_UNPUBLISHED_PACKAGE: &str = "PRERELEASE_UNPUBLISHED_PACKAGE";

/// What to do when the registry has never seen the package being released.
///
/// | Policy  | Behaviour                                                       |
/// |---------|-----------------------------------------------------------------|
/// | `Allow` | Treat "no collaborator list" as success; first publish proceeds |
/// | `Deny`  | Fail: create access on the registry cannot be verified          |
///
/// `Allow` is the default. It trusts that whoever is authenticated may
/// create the package, which nothing checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnpublishedPackagePolicy {
    #[default]
    Allow,
    Deny,
}

impl std::fmt::Display for UnpublishedPackagePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnpublishedPackagePolicy::Allow => write!(f, "allow"),
            UnpublishedPackagePolicy::Deny => write!(f, "deny"),
        }
    }
}

impl std::str::FromStr for UnpublishedPackagePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(UnpublishedPackagePolicy::Allow),
            "deny" => Ok(UnpublishedPackagePolicy::Deny),
            _ => Err(ConfigError::InvalidValue {
                option: "unpublished_package",
                value: s.to_string(),
                expected: "allow, deny",
            }),
        }
    }
}

/// `[checks]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecksSection {
    #[serde(default)]
    pub release_branch: Option<String>,
    #[serde(default)]
    pub required_npm: Option<String>,
    #[serde(default)]
    pub required_git: Option<String>,
}

/// `[registry]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySection {
    /// Reachability probe timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub unpublished_package: Option<UnpublishedPackagePolicy>,
}

/// Contents of `prerelease-checks.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecksToml {
    #[serde(default)]
    pub checks: ChecksSection,
    #[serde(default)]
    pub registry: RegistrySection,
}

impl ChecksToml {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `prerelease-checks.toml` from `dir`, or defaults when absent.
    pub fn load_or_default(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn as_overrides(&self) -> Overrides {
        Overrides {
            release_branch: self.checks.release_branch.clone(),
            required_npm: self.checks.required_npm.clone(),
            required_git: self.checks.required_git.clone(),
            timeout_secs: self.registry.timeout_secs,
            unpublished_package: self.registry.unpublished_package.map(|p| p.to_string()),
        }
    }
}

/// One configuration layer. `None` means "not set here".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub release_branch: Option<String>,
    pub required_npm: Option<String>,
    pub required_git: Option<String>,
    pub timeout_secs: Option<u64>,
    pub unpublished_package: Option<String>,
}

impl Overrides {
    /// Read the `PRERELEASE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a layer from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            release_branch: get(ENV_RELEASE_BRANCH),
            required_npm: get(ENV_REQUIRED_NPM),
            required_git: get(ENV_REQUIRED_GIT),
            timeout_secs: None,
            unpublished_package: get(ENV_UNPUBLISHED_PACKAGE),
        }
    }

    /// `self` wins wherever it is set; `lower` fills the gaps.
    pub fn over(self, lower: Overrides) -> Overrides {
        Overrides {
            release_branch: self.release_branch.or(lower.release_branch),
            required_npm: self.required_npm.or(lower.required_npm),
            required_git: self.required_git.or(lower.required_git),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
            unpublished_package: self.unpublished_package.or(lower.unpublished_package),
        }
    }
}

/// Fully resolved and validated options seeded into every run.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub project_dir: PathBuf,
    /// Branch releases must happen from
    pub release_branch: String,
    /// Required range for npm
    pub required_npm: VersionRange,
    /// Required range for git
    pub required_git: VersionRange,
    /// Timeout for registry reachability probes
    pub timeout: Duration,
    pub unpublished_package: UnpublishedPackagePolicy,
}

impl CheckOptions {
    /// Defaults for `project_dir`, with no file, environment or CLI input.
    pub fn defaults(project_dir: impl Into<PathBuf>) -> Self {
        Self::from_layer(project_dir.into(), Overrides::default())
            .expect("built-in defaults are valid")
    }

    /// Resolve file → environment → `cli` for `project_dir`.
    pub fn load(project_dir: impl Into<PathBuf>, cli: Overrides) -> Result<Self, ConfigError> {
        let project_dir = project_dir.into();
        let file = ChecksToml::load_or_default(&project_dir)?;
        Self::resolve(project_dir, &file, Overrides::from_env(), cli)
    }

    pub fn resolve(
        project_dir: PathBuf,
        file: &ChecksToml,
        env: Overrides,
        cli: Overrides,
    ) -> Result<Self, ConfigError> {
        let layer = cli.over(env).over(file.as_overrides());
        Self::from_layer(project_dir, layer)
    }

    fn from_layer(project_dir: PathBuf, layer: Overrides) -> Result<Self, ConfigError> {
        let required_npm = parse_range(
            "required_npm",
            layer.required_npm.as_deref().unwrap_or(DEFAULT_REQUIRED_NPM),
        )?;
        let required_git = parse_range(
            "required_git",
            layer.required_git.as_deref().unwrap_or(DEFAULT_REQUIRED_GIT),
        )?;
        let unpublished_package = match layer.unpublished_package {
            Some(value) => value.parse()?,
            None => UnpublishedPackagePolicy::default(),
        };

        let release_branch = layer
            .release_branch
            .unwrap_or_else(|| DEFAULT_RELEASE_BRANCH.to_string());
        if release_branch.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                option: "release_branch",
                value: release_branch,
                expected: "a non-empty branch name",
            });
        }
        let timeout_secs = layer.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                option: "timeout_secs",
                value: timeout_secs.to_string(),
                expected: "a positive number of seconds",
            });
        }

        Ok(Self {
            project_dir,
            release_branch,
            required_npm,
            required_git,
            timeout: Duration::from_secs(timeout_secs),
            unpublished_package,
        })
    }
}

fn parse_range(option: &'static str, range: &str) -> Result<VersionRange, ConfigError> {
    VersionRange::parse(range).ok_or_else(|| ConfigError::InvalidRange {
        option,
        range: range.to_string(),
    })
}
