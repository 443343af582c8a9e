//! `package.json` discovery and validation.
//!
//! The descriptor is located by walking from the project directory towards
//! the filesystem root and taking the first `package.json` found.

use crate::errors::PackageError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const DESCRIPTOR_FILE: &str = "package.json";

const MAX_NAME_LENGTH: usize = 214;

static SCOPED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@[a-z\d][\w\-.]+/[a-z\d][\w\-.]*$").expect("scoped name regex is a valid static pattern")
});

static SCOPE_PARTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@([^/]+?)[/])?([^/]+?)$").expect("scope parts regex is a valid static pattern")
});

/// Node core module names; npm refuses new packages that shadow them.
const CORE_MODULES: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

const BLACKLISTED_NAMES: &[&str] = &["node_modules", "favicon.ico"];

/// The subset of `package.json` the release gate cares about.
///
/// `name`, `version` and `private` stay untyped so that a descriptor with
/// wrongly typed fields still parses and is rejected by validation instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default)]
    pub private: Option<Value>,
    /// Kept untyped: a present-but-malformed `registry` entry must still be
    /// distinguishable from an absent one.
    #[serde(default)]
    pub publish_config: Option<Map<String, Value>>,
}

impl PackageJson {
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// The name when it is a string, otherwise empty.
    pub fn name(&self) -> &str {
        self.name.as_ref().and_then(Value::as_str).unwrap_or_default()
    }

    /// The version when it is a string, otherwise empty.
    pub fn version(&self) -> &str {
        self.version.as_ref().and_then(Value::as_str).unwrap_or_default()
    }

    /// The version as written, for messages: `undefined` when absent.
    pub fn version_text(&self) -> String {
        match &self.version {
            None => "undefined".to_string(),
            Some(Value::String(version)) => version.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// JavaScript truthiness of `private`.
    pub fn is_private(&self) -> bool {
        match &self.private {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_) | Value::Object(_)) => true,
        }
    }

    /// Problems with the `name` field, the type checks before [`name_problems`].
    pub fn name_problems(&self) -> Vec<String> {
        match &self.name {
            None => vec!["name cannot be undefined".to_string()],
            Some(Value::Null) => vec!["name cannot be null".to_string()],
            Some(Value::String(name)) => name_problems(name),
            Some(_) => vec!["name must be a string".to_string()],
        }
    }

    /// Whether `publishConfig.registry` is declared at all, whatever its value.
    pub fn has_custom_registry(&self) -> bool {
        self.publish_config
            .as_ref()
            .is_some_and(|config| config.contains_key("registry"))
    }

    /// `publishConfig.registry` when it is a non-empty string.
    pub fn custom_registry(&self) -> Option<&str> {
        self.publish_config
            .as_ref()?
            .get("registry")?
            .as_str()
            .filter(|url| !url.is_empty())
    }

    /// The `@scope` part of the name, including the `@`.
    pub fn scope(&self) -> Option<&str> {
        let name = self.name();
        if !name.starts_with('@') {
            return None;
        }
        name.split_once('/').map(|(scope, _)| scope)
    }
}

/// A descriptor together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    pub path: PathBuf,
    pub package: PackageJson,
}

/// Find the nearest `package.json` at or above `start`.
pub fn find_descriptor(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(DESCRIPTOR_FILE))
        .find(|candidate| candidate.is_file())
}

/// Locate and parse the nearest `package.json`. `Ok(None)` when none exists.
pub fn read_nearest(start: &Path) -> Result<Option<PackageDescriptor>, PackageError> {
    let Some(path) = find_descriptor(start) else {
        return Ok(None);
    };
    let content = std::fs::read_to_string(&path).map_err(|source| PackageError::Read {
        path: path.clone(),
        source,
    })?;
    let package = PackageJson::parse(&content).map_err(|source| PackageError::Parse {
        path: path.clone(),
        source,
    })?;
    Ok(Some(PackageDescriptor { path, package }))
}

/// Whether `name` has the form `@scope/name`.
pub fn is_scoped(name: &str) -> bool {
    SCOPED_NAME.is_match(name)
}

/// Problems that make `name` unusable for a newly published package,
/// hard errors first.
pub fn name_problems(name: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if name.is_empty() {
        errors.push("name length must be greater than zero".to_string());
    }
    if name.starts_with('.') {
        errors.push("name cannot start with a period".to_string());
    }
    if name.starts_with('_') {
        errors.push("name cannot start with an underscore".to_string());
    }
    if name.trim() != name {
        errors.push("name cannot contain leading or trailing spaces".to_string());
    }
    let lower = name.to_lowercase();
    for blacklisted in BLACKLISTED_NAMES {
        if lower == *blacklisted {
            errors.push(format!("{blacklisted} is not a valid package name"));
        }
    }

    if CORE_MODULES.contains(&lower.as_str()) {
        warnings.push(format!("{name} is a core module name"));
    }
    if name.len() > MAX_NAME_LENGTH {
        warnings.push(format!(
            "name can no longer contain more than {MAX_NAME_LENGTH} characters"
        ));
    }
    if lower != name {
        warnings.push("name can no longer contain capital letters".to_string());
    }
    let last_segment = name.rsplit('/').next().unwrap_or(name);
    if last_segment.chars().any(|c| "~'!()*".contains(c)) {
        warnings.push("name can no longer contain special characters (\"~'!()*\")".to_string());
    }

    if !name.is_empty() && !is_url_safe(name) {
        let scoped_ok = SCOPE_PARTS
            .captures(name)
            .and_then(|caps| Some((caps.get(1)?, caps.get(2)?)))
            .is_some_and(|(scope, package)| {
                is_url_safe(scope.as_str()) && is_url_safe(package.as_str())
            });
        if !scoped_ok {
            errors.push("name can only contain URL-friendly characters".to_string());
        }
    }

    errors.extend(warnings);
    errors
}

/// Characters `encodeURIComponent` leaves untouched.
fn is_url_safe(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_.!~*'()".contains(c))
}
