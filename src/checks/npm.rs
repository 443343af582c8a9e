//! Registry phase: the package descriptor, the npm toolchain and the
//! registry the package would be published to.

use super::ReleaseContext;
use crate::config::UnpublishedPackagePolicy;
use crate::errors::{StepError, ensure};
use crate::package::{self, is_scoped};
use crate::pipeline::{Phase, Skip, Step, StepTask};
use crate::tools::{Collaborators, NpmClient};
use crate::version;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub const PHASE_NAME: &str = "npm";

pub fn phase(npm: Arc<dyn NpmClient>) -> Phase<ReleaseContext> {
    Phase::new(PHASE_NAME)
        .step(DetectPackage)
        .step(ValidatePackage)
        .step(VerifyNpmVersion { npm: npm.clone() })
        .step(CheckNpmrcRegistry { npm: npm.clone() })
        .step(CheckCustomRegistry { npm: npm.clone() })
        .step(VerifyPublishAccess { npm })
}

struct DetectPackage;

#[async_trait]
impl Step<ReleaseContext> for DetectPackage {
    fn title(&self) -> &str {
        "Detect package.json"
    }

    async fn run(
        &self,
        ctx: &mut ReleaseContext,
        task: &mut StepTask<'_>,
    ) -> Result<(), StepError> {
        task.set_title("Detecting package.json...");
        let descriptor = package::read_nearest(&ctx.options.project_dir)?
            .ok_or_else(|| StepError::assertion("package.json not found"))?;

        task.set_title(format!("Found package.json at {}", descriptor.path.display()));
        ctx.package = Some(descriptor.package);
        ctx.package_path = Some(descriptor.path);
        Ok(())
    }
}

struct ValidatePackage;

#[async_trait]
impl Step<ReleaseContext> for ValidatePackage {
    fn title(&self) -> &str {
        "Validate package.json"
    }

    async fn run(
        &self,
        ctx: &mut ReleaseContext,
        task: &mut StepTask<'_>,
    ) -> Result<(), StepError> {
        task.set_title("Validating package.json...");
        let package = ctx.package()?;

        if let Some(problem) = package.name_problems().into_iter().next() {
            return Err(StepError::Assertion(problem));
        }
        ensure(version::is_valid(package.version()), || {
            format!(
                "Package version must be a valid semver. Found \"{}\"",
                package.version_text()
            )
        })?;
        ensure(!package.is_private() || is_scoped(package.name()), || {
            "package must either be public or scoped".to_string()
        })?;

        task.set_title("Valid package.json");
        Ok(())
    }
}

struct VerifyNpmVersion {
    npm: Arc<dyn NpmClient>,
}

#[async_trait]
impl Step<ReleaseContext> for VerifyNpmVersion {
    fn title(&self) -> &str {
        "Verify npm version"
    }

    async fn run(
        &self,
        ctx: &mut ReleaseContext,
        task: &mut StepTask<'_>,
    ) -> Result<(), StepError> {
        task.set_title("Verifying npm version...");
        let found = self
            .npm
            .version()
            .await
            .map_err(|e| StepError::tool("Failed to read npm version", e))?;

        let required = &ctx.options.required_npm;
        ensure(required.satisfies_str(&found), || {
            format!("npm version expected to satisfy {required}. Found {found}")
        })?;

        task.set_title(format!("npm version is {found}"));
        ctx.npm_version = Some(found);
        Ok(())
    }
}

struct CheckNpmrcRegistry {
    npm: Arc<dyn NpmClient>,
}

#[async_trait]
impl Step<ReleaseContext> for CheckNpmrcRegistry {
    fn title(&self) -> &str {
        "Check npmrc registry"
    }

    async fn run(
        &self,
        ctx: &mut ReleaseContext,
        task: &mut StepTask<'_>,
    ) -> Result<(), StepError> {
        task.set_title("Checking npmrc registry...");
        let scope = ctx.package()?.scope();
        let url = self
            .npm
            .registry_url(scope)
            .await
            .map_err(|e| StepError::tool("Failed to read npm registry configuration", e))?;

        ensure(self.npm.is_reachable(&url).await, || {
            format!("Failed to connect to {url}")
        })?;

        task.set_title(format!("Connected to npmrc registry {url}"));
        ctx.publish_registry_url = Some(url);
        Ok(())
    }
}

struct CheckCustomRegistry {
    npm: Arc<dyn NpmClient>,
}

#[async_trait]
impl Step<ReleaseContext> for CheckCustomRegistry {
    fn title(&self) -> &str {
        "Check custom publish registry"
    }

    async fn skip(&self, ctx: &ReleaseContext) -> Skip {
        let declared = ctx
            .package
            .as_ref()
            .is_some_and(|package| package.has_custom_registry());
        Skip::when(!declared, "No custom publish registry")
    }

    async fn run(
        &self,
        ctx: &mut ReleaseContext,
        task: &mut StepTask<'_>,
    ) -> Result<(), StepError> {
        task.set_title("Checking custom publish registry...");
        let url = ctx
            .package()?
            .custom_registry()
            .map(str::to_string)
            .ok_or_else(|| {
                StepError::assertion(
                    "Invalid registry found in package.json at publishConfig.registry",
                )
            })?;

        ensure(self.npm.is_reachable(&url).await, || {
            format!("Failed to connect to {url}")
        })?;

        task.set_title(format!("Connected to custom publish registry {url}"));
        ctx.publish_registry_url = Some(url);
        Ok(())
    }
}

struct VerifyPublishAccess {
    npm: Arc<dyn NpmClient>,
}

#[async_trait]
impl Step<ReleaseContext> for VerifyPublishAccess {
    fn title(&self) -> &str {
        "Verify user authentication with publish registry"
    }

    async fn run(
        &self,
        ctx: &mut ReleaseContext,
        task: &mut StepTask<'_>,
    ) -> Result<(), StepError> {
        task.set_title("Verifying user authentication with publish registry...");
        let registry = ctx.publish_registry_url()?.to_string();
        let name = ctx.package()?.name().to_string();

        let user = self
            .npm
            .whoami(&registry)
            .await
            .map_err(|e| StepError::tool(format!("Not authenticated with {registry}"), e))?;
        task.set_title(format!("User authenticated as \"{user}\""));
        ctx.authenticated_user = Some(user.clone());

        let collaborators = self
            .npm
            .collaborators(&name, &registry)
            .await
            .map_err(|e| {
                StepError::tool(format!("Failed to list collaborators on {registry}"), e)
            })?;

        match collaborators {
            Collaborators::NotFound => match ctx.options.unpublished_package {
                UnpublishedPackagePolicy::Allow => {
                    warn!(
                        package = %name,
                        registry = %registry,
                        "Package is not published yet; create access is assumed"
                    );
                    Ok(())
                }
                UnpublishedPackagePolicy::Deny => Err(StepError::Assertion(format!(
                    "Package \"{name}\" is not published on {registry}; refusing to assume create access"
                ))),
            },
            listed => {
                debug!(package = %name, ?listed, "Collaborators");
                ensure(listed.can_write(&user), || {
                    format!("User \"{user}\" does not have write access to this package")
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::fakes::FakeNpm;
    use crate::config::CheckOptions;
    use crate::pipeline::{Engine, PhaseOutcome, RecordingReporter, RunResult, StepEvent};
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    fn project(package_json: &str) -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), package_json).unwrap();
        dir
    }

    async fn run_phase(
        npm: Arc<FakeNpm>,
        dir: &Path,
        options: impl FnOnce(&mut CheckOptions),
    ) -> (RunResult, ReleaseContext, Vec<StepEvent>) {
        let mut opts = CheckOptions::defaults(dir);
        options(&mut opts);
        let mut ctx = ReleaseContext::new(opts);
        let reporter = Arc::new(RecordingReporter::new());
        let result = Engine::new(reporter.clone())
            .run(&[phase(npm)], &mut ctx)
            .await;
        (result, ctx, reporter.events())
    }

    fn failure_message(result: &RunResult) -> String {
        result
            .failure
            .as_ref()
            .map(|f| f.error.to_string())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn healthy_package_passes_and_fills_context() {
        let dir = project(r#"{"name": "left-pad", "version": "1.3.0"}"#);
        let (result, ctx, events) =
            run_phase(Arc::new(FakeNpm::healthy()), dir.path(), |_| {}).await;

        assert!(result.is_success(), "{:?}", result.failure);
        assert_eq!(ctx.package_path, Some(dir.path().join("package.json")));
        assert_eq!(ctx.npm_version.as_deref(), Some("10.2.4"));
        assert_eq!(
            ctx.publish_registry_url.as_deref(),
            Some("https://registry.npmjs.org/")
        );
        assert!(events.contains(&StepEvent::StepTitleUpdated {
            phase: "npm".into(),
            index: 5,
            title: "User authenticated as \"alice\"".into(),
        }));
    }

    #[tokio::test]
    async fn descriptor_is_found_in_an_ancestor_directory() {
        let dir = project(r#"{"name": "left-pad", "version": "1.3.0"}"#);
        let nested = dir.path().join("src/lib");
        fs::create_dir_all(&nested).unwrap();

        let (result, ctx, _) = run_phase(Arc::new(FakeNpm::healthy()), &nested, |_| {}).await;

        assert!(result.is_success());
        assert_eq!(ctx.package_path, Some(dir.path().join("package.json")));
    }

    #[tokio::test]
    async fn invalid_package_name_reports_first_problem() {
        let dir = project(r#"{"name": "Left-Pad", "version": "1.3.0"}"#);
        let (result, _, _) = run_phase(Arc::new(FakeNpm::healthy()), dir.path(), |_| {}).await;

        assert_eq!(result.failure.as_ref().unwrap().step, "Validate package.json");
        assert_eq!(
            failure_message(&result),
            "name can no longer contain capital letters"
        );
    }

    #[tokio::test]
    async fn invalid_version_is_quoted_in_message() {
        let dir = project(r#"{"name": "left-pad", "version": "one"}"#);
        let (result, _, _) = run_phase(Arc::new(FakeNpm::healthy()), dir.path(), |_| {}).await;

        assert_eq!(
            failure_message(&result),
            "Package version must be a valid semver. Found \"one\""
        );
    }

    #[tokio::test]
    async fn private_unscoped_package_is_rejected() {
        let dir = project(r#"{"name": "left-pad", "version": "1.3.0", "private": true}"#);
        let npm = Arc::new(FakeNpm::healthy());
        let (result, _, _) = run_phase(npm.clone(), dir.path(), |_| {}).await;

        assert_eq!(failure_message(&result), "package must either be public or scoped");
        assert!(npm.calls().is_empty());
    }

    #[tokio::test]
    async fn truthy_non_boolean_private_is_validated_not_a_parse_error() {
        let dir = project(r#"{"name": "left-pad", "version": "1.3.0", "private": "true"}"#);
        let (result, _, _) = run_phase(Arc::new(FakeNpm::healthy()), dir.path(), |_| {}).await;

        assert_eq!(result.failure.as_ref().unwrap().step, "Validate package.json");
        assert_eq!(failure_message(&result), "package must either be public or scoped");
    }

    #[tokio::test]
    async fn non_string_name_fails_validation() {
        let dir = project(r#"{"name": 42, "version": "1.3.0"}"#);
        let (result, ctx, _) = run_phase(Arc::new(FakeNpm::healthy()), dir.path(), |_| {}).await;

        assert_eq!(result.failure.as_ref().unwrap().step, "Validate package.json");
        assert_eq!(failure_message(&result), "name must be a string");
        assert!(ctx.package_path.is_some());
    }

    #[tokio::test]
    async fn private_scoped_package_is_accepted() {
        let dir = project(r#"{"name": "@acme/left-pad", "version": "1.3.0", "private": true}"#);
        let npm = Arc::new(FakeNpm::healthy());
        let (result, _, _) = run_phase(npm.clone(), dir.path(), |_| {}).await;

        assert!(result.is_success(), "{:?}", result.failure);
        assert!(npm.calls().contains(&"registry_url @acme".to_string()));
    }

    #[tokio::test]
    async fn npm_version_outside_range_names_both() {
        let dir = project(r#"{"name": "left-pad", "version": "1.3.0"}"#);
        let npm = Arc::new(FakeNpm {
            version: "6.4.1".into(),
            ..FakeNpm::healthy()
        });
        let (result, ctx, _) = run_phase(npm, dir.path(), |_| {}).await;

        assert_eq!(
            failure_message(&result),
            "npm version expected to satisfy >=6.8.0. Found 6.4.1"
        );
        assert_eq!(ctx.npm_version, None);
    }

    #[tokio::test]
    async fn unreachable_npmrc_registry_fails() {
        let dir = project(r#"{"name": "left-pad", "version": "1.3.0"}"#);
        let npm = Arc::new(FakeNpm {
            registry: "https://offline.example.com/".into(),
            ..FakeNpm::healthy()
        });
        let (result, _, _) = run_phase(npm, dir.path(), |_| {}).await;

        assert_eq!(
            failure_message(&result),
            "Failed to connect to https://offline.example.com/"
        );
    }

    #[tokio::test]
    async fn absent_custom_registry_is_skipped_and_default_is_kept() {
        let dir = project(r#"{"name": "left-pad", "version": "1.3.0"}"#);
        let npm = Arc::new(FakeNpm::healthy());
        let (result, ctx, events) = run_phase(npm.clone(), dir.path(), |_| {}).await;

        assert!(result.is_success());
        assert!(events.contains(&StepEvent::StepSkipped {
            phase: "npm".into(),
            index: 4,
            title: "Check custom publish registry".into(),
            reason: "No custom publish registry".into(),
        }));
        assert_eq!(
            ctx.publish_registry_url.as_deref(),
            Some("https://registry.npmjs.org/")
        );
        assert!(npm.calls().contains(&"whoami https://registry.npmjs.org/".to_string()));
    }

    #[tokio::test]
    async fn custom_registry_overrides_npmrc_registry() {
        let dir = project(
            r#"{"name": "left-pad", "version": "1.3.0",
                "publishConfig": {"registry": "https://npm.example.com/"}}"#,
        );
        let npm = Arc::new(FakeNpm::healthy());
        let (result, ctx, _) = run_phase(npm.clone(), dir.path(), |_| {}).await;

        assert!(result.is_success(), "{:?}", result.failure);
        assert_eq!(
            ctx.publish_registry_url.as_deref(),
            Some("https://npm.example.com/")
        );
        assert!(npm.calls().contains(&"whoami https://npm.example.com/".to_string()));
    }

    #[tokio::test]
    async fn unreachable_custom_registry_fails_and_keeps_default() {
        let dir = project(
            r#"{"name": "left-pad", "version": "1.3.0",
                "publishConfig": {"registry": "https://offline.example.com/"}}"#,
        );
        let npm = Arc::new(FakeNpm::healthy());
        let (result, ctx, _) = run_phase(npm.clone(), dir.path(), |_| {}).await;

        assert_eq!(result.failure.as_ref().unwrap().step, "Check custom publish registry");
        assert_eq!(
            failure_message(&result),
            "Failed to connect to https://offline.example.com/"
        );
        assert_eq!(
            ctx.publish_registry_url.as_deref(),
            Some("https://registry.npmjs.org/")
        );
        assert!(!npm.calls().iter().any(|call| call.starts_with("whoami")));
    }

    #[tokio::test]
    async fn malformed_custom_registry_is_rejected() {
        for registry in [r#""""#, "42", "null"] {
            let dir = project(&format!(
                r#"{{"name": "left-pad", "version": "1.3.0", "publishConfig": {{"registry": {registry}}}}}"#
            ));
            let (result, _, _) =
                run_phase(Arc::new(FakeNpm::healthy()), dir.path(), |_| {}).await;

            assert_eq!(
                failure_message(&result),
                "Invalid registry found in package.json at publishConfig.registry",
                "registry value {registry}"
            );
        }
    }

    #[tokio::test]
    async fn unauthenticated_user_names_the_registry() {
        let dir = project(r#"{"name": "left-pad", "version": "1.3.0"}"#);
        let npm = Arc::new(FakeNpm {
            whoami: Err("npm ERR! code ENEEDAUTH".into()),
            ..FakeNpm::healthy()
        });
        let (result, ctx, _) = run_phase(npm, dir.path(), |_| {}).await;

        assert!(failure_message(&result).starts_with("Not authenticated with https://registry.npmjs.org/"));
        assert_eq!(ctx.authenticated_user, None);
    }

    #[tokio::test]
    async fn unpublished_package_is_allowed_without_permission_check() {
        let dir = project(r#"{"name": "brand-new", "version": "0.1.0"}"#);
        let npm = Arc::new(FakeNpm {
            collaborators: Ok(Collaborators::NotFound),
            ..FakeNpm::healthy()
        });
        let (result, ctx, _) = run_phase(npm, dir.path(), |_| {}).await;

        assert!(result.is_success(), "{:?}", result.failure);
        assert_eq!(ctx.authenticated_user.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn unpublished_package_is_refused_under_deny_policy() {
        let dir = project(r#"{"name": "brand-new", "version": "0.1.0"}"#);
        let npm = Arc::new(FakeNpm {
            collaborators: Ok(Collaborators::NotFound),
            ..FakeNpm::healthy()
        });
        let (result, _, _) = run_phase(npm, dir.path(), |opts| {
            opts.unpublished_package = UnpublishedPackagePolicy::Deny;
        })
        .await;

        assert_eq!(
            failure_message(&result),
            "Package \"brand-new\" is not published on https://registry.npmjs.org/; refusing to assume create access"
        );
    }

    #[tokio::test]
    async fn read_only_collaborator_is_rejected() {
        let dir = project(r#"{"name": "left-pad", "version": "1.3.0"}"#);
        let npm = Arc::new(FakeNpm {
            collaborators: Ok(Collaborators::Listed(BTreeMap::from([
                ("alice".to_string(), "read-only".to_string()),
                ("bob".to_string(), "read-write".to_string()),
            ]))),
            ..FakeNpm::healthy()
        });
        let (result, _, _) = run_phase(npm, dir.path(), |_| {}).await;

        assert_eq!(
            failure_message(&result),
            "User \"alice\" does not have write access to this package"
        );
        assert_eq!(result.phases[0].outcome, PhaseOutcome::Failed {
            step: "Verify user authentication with publish registry".into()
        });
    }

    #[tokio::test]
    async fn collaborator_lookup_failure_is_a_tool_error() {
        let dir = project(r#"{"name": "left-pad", "version": "1.3.0"}"#);
        let npm = Arc::new(FakeNpm {
            collaborators: Err("npm ERR! code E500".into()),
            ..FakeNpm::healthy()
        });
        let (result, _, _) = run_phase(npm, dir.path(), |_| {}).await;

        let error = &result.failure.as_ref().unwrap().error;
        assert!(matches!(error, StepError::Tool { .. }));
        assert!(error.to_string().contains("E500"));
    }
}
