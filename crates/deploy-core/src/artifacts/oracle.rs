//! Existence lookups against artifact stores.

use async_trait::async_trait;

use crate::aws::AwsCli;
use crate::context::Context;
use crate::error::{DeployError, Result};

/// Metadata returned by an object head-check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub present: bool,
    pub size: Option<u64>,
}

impl ObjectHead {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn found(size: u64) -> Self {
        Self {
            present: true,
            size: Some(size),
        }
    }
}

/// Answers whether an artifact exists.
///
/// A definitive "not found" is `Ok(false)` / `present: false`; every other
/// failure is an error and ends polling.
#[async_trait]
pub trait ArtifactOracle: Send + Sync {
    async fn image_exists(&self, repository: &str, tag: &str) -> Result<bool>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead>;
}

/// Oracle backed by `aws ecr` and `aws s3api`.
#[derive(Debug, Clone)]
pub struct AwsCliOracle {
    cli: AwsCli,
}

impl AwsCliOracle {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }

    pub fn for_context(context: &Context) -> Self {
        Self::new(AwsCli::new(&context.region, context.credentials.clone()))
    }
}

#[async_trait]
impl ArtifactOracle for AwsCliOracle {
    async fn image_exists(&self, repository: &str, tag: &str) -> Result<bool> {
        let image_id = format!("imageTag={}", tag);
        let output = self
            .cli
            .run(&[
                "ecr",
                "batch-get-image",
                "--repository-name",
                repository,
                "--image-ids",
                &image_id,
                "--query",
                "length(images)",
                "--output",
                "text",
            ])
            .await?;

        if !output.success {
            return Err(DeployError::artifact(
                format!("{}:{}", repository, tag),
                output.stderr,
            ));
        }
        let count: u64 = output.stdout.parse().map_err(|_| {
            DeployError::artifact(
                format!("{}:{}", repository, tag),
                format!("unexpected ecr response '{}'", output.stdout),
            )
        })?;
        Ok(count > 0)
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let output = self
            .cli
            .run(&[
                "s3api",
                "head-object",
                "--bucket",
                bucket,
                "--key",
                key,
                "--query",
                "ContentLength",
                "--output",
                "text",
            ])
            .await?;

        if !output.success {
            if is_not_found(&output.stderr) {
                return Ok(ObjectHead::missing());
            }
            return Err(DeployError::artifact(
                format!("{}/{}", bucket, key),
                output.stderr,
            ));
        }
        let size = output.stdout.parse().map_err(|_| {
            DeployError::artifact(
                format!("{}/{}", bucket, key),
                format!("unexpected head-object response '{}'", output.stdout),
            )
        })?;
        Ok(ObjectHead::found(size))
    }
}

fn is_not_found(stderr: &str) -> bool {
    stderr.contains("(404)") || stderr.contains("Not Found") || stderr.contains("NoSuchKey")
}
