//! Shared AWS credentials file provider.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{AccessKeys, CredentialProvider};
use crate::aws::AwsCli;
use crate::config::paths::default_credentials_path;
use crate::error::{DeployError, Result};

/// Reads `~/.aws/credentials` and asks STS for the account id when the file
/// does not record one.
#[derive(Debug, Clone)]
pub struct SharedCredentialsProvider {
    path: Option<PathBuf>,
    aws_program: String,
}

impl SharedCredentialsProvider {
    pub fn new() -> Self {
        Self {
            path: default_credentials_path(),
            aws_program: "aws".to_string(),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            aws_program: "aws".to_string(),
        }
    }

    pub fn with_aws_program(mut self, program: impl Into<String>) -> Self {
        self.aws_program = program.into();
        self
    }

    fn section(&self, profile: &str) -> Result<BTreeMap<String, String>> {
        let path = self.path.as_deref().ok_or_else(|| DeployError::Credential {
            profile: profile.to_string(),
            reason: "could not locate the shared credentials file".to_string(),
        })?;
        let content = read_credentials(path, profile)?;
        parse_ini(&content)
            .remove(profile)
            .ok_or_else(|| DeployError::Credential {
                profile: profile.to_string(),
                reason: format!("no [{}] section in {}", profile, path.display()),
            })
    }
}

impl Default for SharedCredentialsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for SharedCredentialsProvider {
    async fn materialize(&self, profile: &str) -> Result<AccessKeys> {
        let section = self.section(profile)?;
        let missing = |key: &str| DeployError::Credential {
            profile: profile.to_string(),
            reason: format!("{} is not set", key),
        };

        let access_key_id = section
            .get("aws_access_key_id")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("aws_access_key_id"))?;
        let secret_access_key = section
            .get("aws_secret_access_key")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("aws_secret_access_key"))?;

        let mut keys = AccessKeys::new(access_key_id, secret_access_key);
        if let Some(token) = section.get("aws_session_token").filter(|v| !v.is_empty()) {
            keys = keys.with_session_token(token);
        }
        Ok(keys)
    }

    async fn account_id(&self, profile: &str, keys: &AccessKeys, region: &str) -> Result<String> {
        if let Ok(section) = self.section(profile)
            && let Some(account) = section.get("aws_account_id").filter(|v| !v.is_empty())
        {
            return Ok(account.clone());
        }

        debug!(profile, "looking up account id via sts");
        let cli = AwsCli::new(region, keys.clone()).with_program(&self.aws_program);
        let output = cli
            .run(&[
                "sts",
                "get-caller-identity",
                "--query",
                "Account",
                "--output",
                "text",
            ])
            .await
            .map_err(|err| DeployError::Credential {
                profile: profile.to_string(),
                reason: format!("failed to run aws sts get-caller-identity: {}", err),
            })?;

        if !output.success || output.stdout.is_empty() {
            return Err(DeployError::Credential {
                profile: profile.to_string(),
                reason: format!("could not determine account id: {}", output.stderr),
            });
        }
        Ok(output.stdout)
    }
}

fn read_credentials(path: &Path, profile: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| DeployError::Credential {
        profile: profile.to_string(),
        reason: format!("cannot read {}: {}", path.display(), err),
    })
}

/// Parse an INI document into sections of key/value pairs.
///
/// `[profile name]` headers (the AWS config file style) are keyed as `name`.
pub fn parse_ini(content: &str) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let header = header.trim();
            let name = header.strip_prefix("profile ").unwrap_or(header).trim();
            sections.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            continue;
        }

        if let (Some(section), Some((key, value))) = (&current, line.split_once('='))
            && let Some(entries) = sections.get_mut(section)
        {
            entries.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    sections
}
