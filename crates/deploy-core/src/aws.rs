//! Thin runner for the `aws` command line client.
//!
//! Credentials and region are passed explicitly through the child
//! environment so the resolved profile is used, never ambient settings.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::credentials::AccessKeys;

const AWS_ENV_OVERRIDES: [&str; 4] = [
    "AWS_PROFILE",
    "AWS_DEFAULT_PROFILE",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
];

/// Captured output of one `aws` invocation.
#[derive(Debug, Clone)]
pub struct CliOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `aws` with a fixed region and access keys.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    region: String,
    keys: AccessKeys,
}

impl AwsCli {
    pub fn new(region: impl Into<String>, keys: AccessKeys) -> Self {
        Self {
            program: "aws".to_string(),
            region: region.into(),
            keys,
        }
    }

    /// Use a different executable (for testing or non-standard installs).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        for key in AWS_ENV_OVERRIDES {
            cmd.env_remove(key);
        }
        cmd.env("AWS_ACCESS_KEY_ID", &self.keys.access_key_id)
            .env("AWS_SECRET_ACCESS_KEY", &self.keys.secret_access_key)
            .env("AWS_REGION", &self.region)
            .env("AWS_DEFAULT_REGION", &self.region)
            .env("AWS_PAGER", "");
        match &self.keys.session_token {
            Some(token) => {
                cmd.env("AWS_SESSION_TOKEN", token);
            }
            None => {
                cmd.env_remove("AWS_SESSION_TOKEN");
            }
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run `aws <args>` and capture its output.
    pub async fn run(&self, args: &[&str]) -> std::io::Result<CliOutput> {
        debug!(args = ?args, region = %self.region, "running aws");
        let output = self.command().args(args).output().await?;
        Ok(CliOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
