//! npm collaborator: package-manager version, registry configuration,
//! authentication and package access queries.

use super::probe::Probe;
use super::process::{self, command_line};
use crate::errors::ToolError;
use crate::version::parse_loose;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::debug;

/// Registry used when npm reports none.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// npm release that replaced `access ls-collaborators` with
/// `access list collaborators`.
const ACCESS_LIST_MAJOR: u64 = 9;

/// Collaborators of a package on a registry, keyed by user name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collaborators {
    /// The registry has never seen this package.
    NotFound,
    /// User name to permission string (`read-only`, `read-write`).
    Listed(BTreeMap<String, String>),
}

impl Collaborators {
    /// Whether `user` appears with a permission that includes `write`.
    pub fn can_write(&self, user: &str) -> bool {
        match self {
            Collaborators::NotFound => false,
            Collaborators::Listed(users) => users
                .get(user)
                .is_some_and(|permission| permission.contains("write")),
        }
    }
}

/// Abstraction over npm and the network for testability.
/// Real implementation: `NpmCli`. Test double: `FakeNpm` in the checks tests.
#[async_trait]
pub trait NpmClient: Send + Sync {
    /// Version reported by `npm --version`.
    async fn version(&self) -> Result<String, ToolError>;

    /// Registry npm would publish to, honouring a per-scope override when
    /// `scope` (e.g. `@acme`) has one. Always ends with `/`.
    async fn registry_url(&self, scope: Option<&str>) -> Result<String, ToolError>;

    async fn is_reachable(&self, url: &str) -> bool;

    /// User name the local credentials authenticate as on `registry`.
    async fn whoami(&self, registry: &str) -> Result<String, ToolError>;

    async fn collaborators(&self, package: &str, registry: &str)
    -> Result<Collaborators, ToolError>;
}

/// Runs the `npm` executable in a fixed working directory.
pub struct NpmCli {
    workdir: PathBuf,
    probe: Probe,
    major: OnceCell<u64>,
}

impl NpmCli {
    pub fn new(workdir: impl AsRef<Path>, probe: Probe) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
            probe,
            major: OnceCell::new(),
        }
    }

    async fn npm(&self, args: &[&str]) -> Result<String, ToolError> {
        process::run("npm", args, &self.workdir)
            .await
            .map(|out| out.stdout)
    }

    async fn major_version(&self) -> Result<u64, ToolError> {
        self.major
            .get_or_try_init(|| async {
                let raw = self.version().await?;
                parse_loose(&raw)
                    .map(|v| v.major)
                    .ok_or_else(|| ToolError::UnexpectedOutput {
                        command: command_line("npm", &["--version"]),
                        detail: format!("'{raw}' is not a version"),
                    })
            })
            .await
            .copied()
    }

    async fn config_get(&self, key: &str) -> Result<Option<String>, ToolError> {
        let value = self.npm(&["config", "get", key]).await?;
        Ok(configured_value(&value))
    }
}

#[async_trait]
impl NpmClient for NpmCli {
    async fn version(&self) -> Result<String, ToolError> {
        Ok(self.npm(&["--version"]).await?.trim().to_string())
    }

    async fn registry_url(&self, scope: Option<&str>) -> Result<String, ToolError> {
        if let Some(scope) = scope {
            let key = format!("{scope}:registry");
            if let Some(url) = self.config_get(&key).await? {
                debug!(%scope, %url, "using scoped registry");
                return Ok(with_trailing_slash(&url));
            }
        }
        let url = self
            .config_get("registry")
            .await?
            .unwrap_or_else(|| DEFAULT_REGISTRY.to_string());
        Ok(with_trailing_slash(&url))
    }

    async fn is_reachable(&self, url: &str) -> bool {
        self.probe.is_reachable(url).await
    }

    async fn whoami(&self, registry: &str) -> Result<String, ToolError> {
        Ok(self
            .npm(&["whoami", "--registry", registry])
            .await?
            .trim()
            .to_string())
    }

    async fn collaborators(
        &self,
        package: &str,
        registry: &str,
    ) -> Result<Collaborators, ToolError> {
        let args: Vec<&str> = if self.major_version().await? >= ACCESS_LIST_MAJOR {
            vec!["access", "list", "collaborators", package, "--json", "--registry", registry]
        } else {
            vec!["access", "ls-collaborators", package, "--registry", registry]
        };

        match self.npm(&args).await {
            Ok(stdout) => parse_collaborators(&command_line("npm", &args), &stdout),
            Err(err) if is_not_found(&err) => Ok(Collaborators::NotFound),
            Err(err) => Err(err),
        }
    }
}

/// `npm config get` prints `undefined` (or nothing) for unset keys.
fn configured_value(raw: &str) -> Option<String> {
    let value = raw.trim();
    match value {
        "" | "undefined" | "null" => None,
        _ => Some(value.to_string()),
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

fn is_not_found(err: &ToolError) -> bool {
    err.stderr().is_some_and(|stderr| stderr.contains("E404"))
}

fn parse_collaborators(command: &str, stdout: &str) -> Result<Collaborators, ToolError> {
    if stdout.trim().is_empty() {
        return Ok(Collaborators::Listed(BTreeMap::new()));
    }
    serde_json::from_str::<BTreeMap<String, String>>(stdout)
        .map(Collaborators::Listed)
        .map_err(|source| ToolError::Json {
            command: command.to_string(),
            source,
        })
}
