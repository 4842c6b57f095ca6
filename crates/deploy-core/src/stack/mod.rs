//! Seam to the stack mutation engine.
//!
//! Context resolution produces a [`StackConfig`]; commands drive any
//! [`StackManager`] built from it. [`AwsCliStackManager`] is the production
//! engine.

mod aws;

pub use aws::AwsCliStackManager;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use crate::credentials::AccessKeys;
use crate::error::StackError;
use crate::tags::TagSet;

pub const CONFIG_BUCKET_PURPOSE: &str = "cfn-config-active";
pub const TEMPLATE_BUCKET_PURPOSE: &str = "cfn-config-templates";

/// Per-account bucket name: `<purpose>-<accountId>-<region>`.
pub fn bucket_name(purpose: &str, account_id: &str, region: &str) -> String {
    format!("{}-{}-{}", purpose, account_id, region)
}

/// Everything needed to construct a mutation engine handle.
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Repository name; deployed stacks are named `<name>-<stack>`
    pub name: String,
    pub region: String,
    pub credentials: AccessKeys,
    pub config_bucket: String,
    pub template_bucket: String,
}

impl StackConfig {
    pub fn new(name: &str, region: &str, account_id: &str, credentials: AccessKeys) -> Self {
        Self {
            name: name.to_string(),
            region: region.to_string(),
            credentials,
            config_bucket: bucket_name(CONFIG_BUCKET_PURPOSE, account_id, region),
            template_bucket: bucket_name(TEMPLATE_BUCKET_PURPOSE, account_id, region),
        }
    }

    /// The deployed stack name for an effective name.
    pub fn stack_name(&self, name: &str) -> String {
        format!("{}-{}", self.name, name)
    }
}

/// Template parameters and stack tags for create/update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackParameters {
    pub parameters: BTreeMap<String, String>,
    pub tags: Vec<(String, String)>,
}

impl StackParameters {
    /// Parameters for deploying a commit: `GitSha` plus fully-valued tags.
    pub fn for_commit(sha: &str, tags: &TagSet) -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert("GitSha".to_string(), sha.to_string());
        let tags = tags
            .iter()
            .filter_map(|tag| tag.value().map(|v| (tag.key().to_string(), v.to_string())))
            .collect();
        Self { parameters, tags }
    }
}

/// The stack mutation engine.
#[async_trait]
pub trait StackManager: Send + Sync {
    async fn create(
        &self,
        name: &str,
        template: &Path,
        params: &StackParameters,
    ) -> Result<(), StackError>;

    async fn update(
        &self,
        name: &str,
        template: &Path,
        params: &StackParameters,
    ) -> Result<(), StackError>;

    async fn delete(&self, name: &str) -> Result<(), StackError>;

    async fn cancel(&self, name: &str) -> Result<(), StackError>;
}
