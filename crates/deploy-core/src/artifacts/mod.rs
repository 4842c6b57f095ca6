//! Artifact readiness gate.
//!
//! Before a stack is created or updated, every build artifact the template
//! refers to must exist. Artifacts are declared per kind under `artifacts` in
//! `.deploy`:
//! - `docker`: `<repository>:<tag>`, defaulting to `{{project}}:{{gitsha}}`
//!   when a `Dockerfile` is present
//! - `lambda` and `s3`: `<bucket>/<key>`
//!
//! Each artifact is polled on its own; the first failure ends the check.

mod oracle;
mod pattern;
mod poll;

pub use oracle::{ArtifactOracle, AwsCliOracle, ObjectHead};
pub use pattern::{ArtifactKind, ArtifactSpec, ArtifactTarget, Placeholders, render};
pub use poll::{DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS, PollPolicy, Probe, poll_until_present};

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::config::ArtifactSetting;
use crate::context::Context;
use crate::error::{DeployError, Result};

/// File whose presence enables the default image check.
pub const BUILD_DESCRIPTOR: &str = "Dockerfile";

const DEFAULT_IMAGE_PATTERN: &str = "{{project}}:{{gitsha}}";

/// Confirms artifacts exist before mutation.
#[derive(Debug, Clone)]
pub struct ArtifactGate<O> {
    oracle: O,
    policy: PollPolicy,
}

impl<O: ArtifactOracle> ArtifactGate<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            policy: PollPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Every artifact the context requires, rendered and validated.
    ///
    /// Fails on the first malformed pattern, before any lookup is made.
    pub fn plan(&self, context: &Context) -> Result<Vec<ArtifactSpec>> {
        let mut specs = Vec::new();
        for kind in ArtifactKind::ALL {
            let patterns = patterns_for(kind, context);
            if patterns.is_empty() {
                continue;
            }
            let values = Placeholders::for_kind(kind, context);
            for pattern in patterns {
                specs.push(ArtifactSpec::parse(kind, &pattern, &values)?);
            }
        }
        Ok(specs)
    }

    /// Wait until every required artifact exists.
    pub async fn check(&self, context: &Context) -> Result<bool> {
        let specs = self.plan(context)?;
        debug!(count = specs.len(), "checking artifacts");

        try_join_all(specs.iter().map(|spec| self.confirm(spec))).await?;
        Ok(true)
    }

    async fn confirm(&self, spec: &ArtifactSpec) -> Result<()> {
        let label = spec.kind.label();
        let found = poll_until_present(&self.policy, move |attempt| async move {
            let probe = self.probe(spec).await;
            if attempt == 1 && matches!(probe, Ok(Probe::Missing)) {
                info!("Waiting for {}: {}", label, spec.resolved);
            }
            probe
        })
        .await?;

        match found {
            Some(attempts) => {
                info!("Found {}: {}", label, spec.resolved);
                debug!(artifact = %spec.resolved, attempts, "artifact confirmed");
                Ok(())
            }
            None => Err(DeployError::artifact(
                &spec.resolved,
                format!(
                    "No {} found after {} attempts",
                    label, self.policy.max_attempts
                ),
            )),
        }
    }

    async fn probe(&self, spec: &ArtifactSpec) -> Result<Probe> {
        let result = match &spec.target {
            ArtifactTarget::Image { repository, tag } => self
                .oracle
                .image_exists(repository, tag)
                .await
                .map(|present| if present { Probe::Present } else { Probe::Missing }),
            ArtifactTarget::Object { bucket, key } => {
                self.oracle.head_object(bucket, key).await.and_then(|head| {
                    match (head.present, head.size) {
                        (false, _) => Ok(Probe::Missing),
                        (true, Some(0)) => {
                            Err(DeployError::artifact(&spec.resolved, "object is empty"))
                        }
                        (true, _) => Ok(Probe::Present),
                    }
                })
            }
        };

        result.map_err(|err| match err {
            DeployError::ArtifactCheck { .. } => err,
            other => DeployError::artifact(&spec.resolved, other.to_string()),
        })
    }
}

/// Patterns declared for `kind`, or the implicit image default.
fn patterns_for(kind: ArtifactKind, context: &Context) -> Vec<String> {
    let artifacts = &context.dotdeploy.artifacts;
    let setting = match kind {
        ArtifactKind::RegistryImage => artifacts.docker.as_ref(),
        ArtifactKind::FunctionObject => artifacts.lambda.as_ref(),
        ArtifactKind::GenericObject => artifacts.s3.as_ref(),
    };

    match setting {
        Some(setting) if setting.is_disabled() => Vec::new(),
        Some(ArtifactSetting::Enabled(true)) | None => {
            if kind == ArtifactKind::RegistryImage
                && context.working_dir.join(BUILD_DESCRIPTOR).is_file()
            {
                vec![DEFAULT_IMAGE_PATTERN.to_string()]
            } else {
                Vec::new()
            }
        }
        Some(setting) => setting.patterns(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::time::Instant;

    use crate::config::ArtifactOverrides;

    /// Reports an artifact present from its configured poll onward.
    #[derive(Default)]
    struct ScriptedOracle {
        found_on: HashMap<String, u32>,
        failing: HashMap<String, String>,
        sizes: HashMap<String, u64>,
        calls: Mutex<HashMap<String, u32>>,
    }

    impl ScriptedOracle {
        fn found_on(mut self, artifact: &str, poll: u32) -> Self {
            self.found_on.insert(artifact.to_string(), poll);
            self
        }

        fn failing(mut self, artifact: &str, reason: &str) -> Self {
            self.failing.insert(artifact.to_string(), reason.to_string());
            self
        }

        fn sized(mut self, artifact: &str, size: u64) -> Self {
            self.sizes.insert(artifact.to_string(), size);
            self
        }

        fn calls(&self, artifact: &str) -> u32 {
            self.calls.lock().unwrap().get(artifact).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> u32 {
            self.calls.lock().unwrap().values().sum()
        }

        fn lookup(&self, artifact: String) -> Result<bool> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let entry = calls.entry(artifact.clone()).or_default();
                *entry += 1;
                *entry
            };
            if let Some(reason) = self.failing.get(&artifact) {
                return Err(DeployError::config(reason.clone()));
            }
            Ok(self.found_on.get(&artifact).is_some_and(|poll| call >= *poll))
        }
    }

    #[async_trait]
    impl ArtifactOracle for ScriptedOracle {
        async fn image_exists(&self, repository: &str, tag: &str) -> Result<bool> {
            self.lookup(format!("{}:{}", repository, tag))
        }

        async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
            let artifact = format!("{}/{}", bucket, key);
            let size = self.sizes.get(&artifact).copied().unwrap_or(1024);
            Ok(if self.lookup(artifact)? {
                ObjectHead::found(size)
            } else {
                ObjectHead::missing()
            })
        }
    }

    fn context_with(artifacts: ArtifactOverrides) -> Context {
        let mut context = Context::for_commit("myrepo", "abc123");
        context.stack = "prod".into();
        context.name = "prod".into();
        context.dotdeploy.artifacts = artifacts;
        context
    }

    fn docker(setting: ArtifactSetting) -> ArtifactOverrides {
        ArtifactOverrides {
            docker: Some(setting),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn image_found_on_third_poll() {
        let gate = ArtifactGate::new(ScriptedOracle::default().found_on("myrepo:abc123", 3));
        let context = context_with(docker(ArtifactSetting::One("{{project}}:{{gitsha}}".into())));

        let start = Instant::now();
        assert!(gate.check(&context).await.unwrap());
        assert_eq!(gate.oracle().calls("myrepo:abc123"), 3);
        assert_eq!(start.elapsed(), DEFAULT_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_ceiling() {
        let gate = ArtifactGate::new(ScriptedOracle::default());
        let context = context_with(docker(ArtifactSetting::One("myrepo:missing".into())));

        let err = gate.check(&context).await.unwrap_err();
        assert!(matches!(err, DeployError::ArtifactCheck { ref artifact, .. } if artifact == "myrepo:missing"));
        assert_eq!(gate.oracle().calls("myrepo:missing"), DEFAULT_MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_pattern_fails_before_any_lookup() {
        let gate = ArtifactGate::new(ScriptedOracle::default().found_on("ok:tag", 1));
        let context = context_with(docker(ArtifactSetting::Many(vec![
            "ok:tag".into(),
            "no-tag-here".into(),
        ])));

        let err = gate.check(&context).await.unwrap_err();
        assert!(matches!(err, DeployError::MalformedArtifact { .. }));
        assert_eq!(gate.oracle().total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_error_terminates_immediately() {
        let gate = ArtifactGate::new(
            ScriptedOracle::default().failing("myrepo:abc123", "RepositoryNotFoundException"),
        );
        let context = context_with(docker(ArtifactSetting::One("{{project}}:{{gitsha}}".into())));

        let err = gate.check(&context).await.unwrap_err();
        assert!(err.to_string().contains("RepositoryNotFoundException"));
        assert_eq!(gate.oracle().calls("myrepo:abc123"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_does_not_wait_for_other_artifacts() {
        let gate = ArtifactGate::new(
            ScriptedOracle::default().failing("bucket/broken.zip", "AccessDenied"),
        );
        let context = context_with(ArtifactOverrides {
            docker: Some(ArtifactSetting::One("myrepo:never".into())),
            lambda: Some(ArtifactSetting::One("bucket/broken.zip".into())),
            ..Default::default()
        });

        let start = Instant::now();
        let err = gate.check(&context).await.unwrap_err();
        assert!(err.to_string().contains("AccessDenied"));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(gate.oracle().calls("myrepo:never") < DEFAULT_MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_object_is_an_error() {
        let gate = ArtifactGate::new(
            ScriptedOracle::default()
                .found_on("bucket/empty.zip", 1)
                .sized("bucket/empty.zip", 0),
        );
        let context = context_with(ArtifactOverrides {
            s3: Some(ArtifactSetting::One("bucket/empty.zip".into())),
            ..Default::default()
        });

        let err = gate.check(&context).await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_and_absent_kinds_are_skipped() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(BUILD_DESCRIPTOR), "FROM scratch\n").unwrap();

        let gate = ArtifactGate::new(ScriptedOracle::default());
        let mut context = context_with(ArtifactOverrides {
            docker: Some(ArtifactSetting::Enabled(false)),
            ..Default::default()
        });
        context.working_dir = temp.path().to_path_buf();

        assert!(gate.check(&context).await.unwrap());
        assert_eq!(gate.oracle().total_calls(), 0);
    }

    #[test]
    fn dockerfile_enables_default_image() {
        let temp = TempDir::new().unwrap();
        let gate = ArtifactGate::new(ScriptedOracle::default());
        let mut context = context_with(ArtifactOverrides::default());
        context.working_dir = temp.path().to_path_buf();

        assert!(gate.plan(&context).unwrap().is_empty());

        std::fs::write(temp.path().join(BUILD_DESCRIPTOR), "FROM scratch\n").unwrap();
        let specs = gate.plan(&context).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].resolved, "myrepo:abc123");
    }
}
