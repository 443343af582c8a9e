//! Version parsing and npm-style range matching.
//!
//! Tool versions are matched against ranges written the way npm writes them
//! (`>=6.8.0`, `^2.0.0 || ^3.0.0`, `1.2.3 - 2.0.0`, `>=1 <2`). Prerelease
//! versions take part in matching by precedence, so `7.0.0-beta.1`
//! satisfies `>=6.8.0`.

use regex::Regex;
use semver::{Comparator, Op, Version, VersionReq};
use std::fmt;
use std::sync::LazyLock;

static GIT_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"git version (\d+\.\d+\.\d+)").expect("git version regex is a valid static pattern")
});

/// Extract `X.Y.Z` from `git version` output such as
/// `git version 2.39.2 (Apple Git-143)`.
pub fn parse_git_version(output: &str) -> Option<String> {
    GIT_VERSION
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse a version the way `semver.valid` does: surrounding whitespace and
/// a single leading `v` are tolerated, nothing else.
pub fn parse_loose(version: &str) -> Option<Version> {
    let trimmed = version.trim();
    Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed)).ok()
}

/// Whether `version` is a valid semantic version.
pub fn is_valid(version: &str) -> bool {
    parse_loose(version).is_some()
}

/// A set of alternative requirements; satisfied when any alternative is.
#[derive(Debug, Clone)]
pub struct VersionRange {
    source: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse an npm-style range. Returns `None` when any part is malformed.
    pub fn parse(range: &str) -> Option<Self> {
        let source = range.trim().to_string();
        let mut alternatives = Vec::new();
        for part in source.split("||") {
            alternatives.push(parse_alternative(part.trim())?);
        }
        Some(Self {
            source,
            alternatives,
        })
    }

    /// Whether `version` satisfies this range, prereleases included.
    pub fn satisfies(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|req| req.matches(version) || matches_including_prerelease(req, version))
    }

    /// Convenience wrapper: false when `version` does not parse.
    pub fn satisfies_str(&self, version: &str) -> bool {
        parse_loose(version).is_some_and(|v| self.satisfies(&v))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_alternative(part: &str) -> Option<VersionReq> {
    if part.is_empty() || part == "*" || part.eq_ignore_ascii_case("x") {
        return Some(VersionReq::STAR);
    }

    // Hyphen range: "1.2.3 - 2.3.4"
    if let Some((low, high)) = part.split_once(" - ") {
        return VersionReq::parse(&format!(">={}, <={}", low.trim(), high.trim())).ok();
    }

    let tokens: Vec<&str> = part.split_whitespace().collect();
    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        if token.chars().all(|c| "<>=~^".contains(c)) {
            // Operator separated from its version by whitespace: ">= 1.2.3"
            pending_op = Some(token);
            continue;
        }
        let comparator = match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            // A bare version is an exact match in npm ranges, a caret in `semver`.
            None if is_bare_version(token) => format!("={token}"),
            None => token.to_string(),
        };
        comparators.push(comparator);
    }
    if pending_op.is_some() || comparators.is_empty() {
        return None;
    }
    VersionReq::parse(&comparators.join(", ")).ok()
}

/// `1.2.3` or `1.2.3-rc.1`, as opposed to an operator or an `x` wildcard.
fn is_bare_version(token: &str) -> bool {
    let core = token.split(['-', '+']).next().unwrap_or(token);
    token.starts_with(|c: char| c.is_ascii_digit()) && !core.contains(['x', 'X', '*'])
}

/// Range matching that treats a prerelease like any other version.
///
/// `VersionReq::matches` rejects prereleases unless a comparator names the
/// same `major.minor.patch`. Ordering comparators are re-evaluated here by
/// plain precedence. A fully specified `=` needs the exact prerelease; the
/// remaining operators are checked against the release the prerelease leads
/// up to.
fn matches_including_prerelease(req: &VersionReq, version: &Version) -> bool {
    if version.pre.is_empty() {
        return false;
    }
    let release = Version::new(version.major, version.minor, version.patch);
    req.comparators.iter().all(|c| match c.op {
        Op::Greater | Op::GreaterEq | Op::Less | Op::LessEq => {
            let bound = comparator_bound(c);
            let ordering = version.cmp_precedence(&bound);
            match c.op {
                Op::Greater => ordering.is_gt(),
                Op::GreaterEq => ordering.is_ge(),
                Op::Less => ordering.is_lt(),
                _ => ordering.is_le(),
            }
        }
        Op::Exact if c.patch.is_some() => c.matches(version),
        _ => c.matches(&release),
    })
}

fn comparator_bound(c: &Comparator) -> Version {
    let mut bound = Version::new(c.major, c.minor.unwrap_or(0), c.patch.unwrap_or(0));
    bound.pre = c.pre.clone();
    bound
}
