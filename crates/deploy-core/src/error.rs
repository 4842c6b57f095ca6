//! Error types for deploy-core

use std::fmt;

use thiserror::Error;

use crate::config::validate::Violation;

/// Result type for deploy operations
pub type Result<T> = std::result::Result<T, DeployError>;

/// Errors that can occur while resolving, gating or recording a deployment
#[derive(Error, Debug)]
pub enum DeployError {
    /// Malformed or missing required configuration
    #[error("{0}")]
    Config(String),

    /// A configuration file failed schema validation
    #[error("{path} does not conform to schema:\n{}", format_violations(.violations))]
    Schema {
        path: String,
        violations: Vec<Violation>,
    },

    /// More than one profile exists and none was selected
    #[error(
        "Multiple deploy profiles found ({}). Deploy with --profile or set a .deploy file",
        .profiles.join(", ")
    )]
    AmbiguousProfile { profiles: Vec<String> },

    /// No usable access keys for the selected profile
    #[error("creds not set for profile {profile}: {reason} (run deploy init)")]
    Credential { profile: String, reason: String },

    /// Not inside a git repository, or git metadata could not be read
    #[error("{0}")]
    Git(String),

    /// No infrastructure template could be located
    #[error("Could not find CF Template in {0}")]
    TemplateNotFound(String),

    /// An artifact could not be confirmed
    #[error("{artifact}: {reason}")]
    ArtifactCheck { artifact: String, reason: String },

    /// An artifact pattern does not parse into its kind's segments
    #[error("{pattern}: {reason}")]
    MalformedArtifact { pattern: String, reason: String },

    /// CI checks did not settle in time
    #[error("status checks for {sha} still pending after {waited_secs}s")]
    StatusCheckTimeout { sha: String, waited_secs: u64 },

    /// CI checks settled in a failing state
    #[error("status checks failed for {sha}: {}", .checks.join(", "))]
    StatusCheckFailed { sha: String, checks: Vec<String> },

    /// The collaboration API returned an error or could not be reached
    #[error("{}", format_release_error(.status, .message))]
    ReleaseApi { status: Option<u16>, message: String },

    /// The stack manager reported a failure
    #[error(transparent)]
    Stack(#[from] StackError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    pub fn config(message: impl Into<String>) -> Self {
        DeployError::Config(message.into())
    }

    pub fn git(message: impl Into<String>) -> Self {
        DeployError::Git(message.into())
    }

    pub fn artifact(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::ArtifactCheck {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::MalformedArtifact {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    pub fn release(status: Option<u16>, message: impl Into<String>) -> Self {
        DeployError::ReleaseApi {
            status,
            message: message.into(),
        }
    }

    /// Errors that `force` downgrades to warnings.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            DeployError::ReleaseApi { .. }
                | DeployError::StatusCheckTimeout { .. }
                | DeployError::StatusCheckFailed { .. }
        )
    }
}

impl From<git2::Error> for DeployError {
    fn from(err: git2::Error) -> Self {
        DeployError::Git(format!("Is this a git repo? {}", err.message()))
    }
}

impl From<reqwest::Error> for DeployError {
    fn from(err: reqwest::Error) -> Self {
        DeployError::ReleaseApi {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Failure reported by the stack mutation engine.
///
/// `execution` and `status` mirror the change-set fields the engine reports;
/// the release controller inspects them on update failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StackError {
    pub message: String,
    pub execution: Option<String>,
    pub status: Option<String>,
}

impl StackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            execution: None,
            status: None,
        }
    }

    pub fn with_change_set(mut self, execution: &str, status: &str) -> Self {
        self.execution = Some(execution.to_string());
        self.status = Some(status.to_string());
        self
    }

    /// An update whose change set could not execute because nothing changed.
    ///
    /// The stack already matches the commit, so the deployment counts as
    /// successful.
    pub fn is_unchanged_update(&self) -> bool {
        self.execution.as_deref() == Some("UNAVAILABLE") && self.status.as_deref() == Some("FAILED")
    }
}

/// The workflow stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Context,
    Artifacts,
    StatusCheck,
    Deployment,
    Create,
    Update,
    Delete,
    Cancel,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Context => "Context Resolution Failed",
            Phase::Artifacts => "Artifacts Check Failed",
            Phase::StatusCheck => "Status Check Polling Failed",
            Phase::Deployment => "GitHub Deployment Failed",
            Phase::Create => "Create failed",
            Phase::Update => "Update failed",
            Phase::Delete => "Delete failed",
            Phase::Cancel => "Cancel failed",
        };
        f.write_str(label)
    }
}

/// A fatal workflow error tagged with the phase that produced it.
#[derive(Error, Debug)]
#[error("{phase}: {source}")]
pub struct PhaseError {
    pub phase: Phase,
    #[source]
    pub source: DeployError,
}

impl PhaseError {
    pub fn new(phase: Phase, source: DeployError) -> Self {
        Self { phase, source }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_release_error(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("GitHub API error (HTTP {}): {}", code, message),
        None => format!("GitHub API error: {}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_prefix_matches_diagnostics() {
        let err = PhaseError::new(
            Phase::Artifacts,
            DeployError::artifact("repo:abc", "No image found"),
        );
        assert_eq!(
            err.to_string(),
            "Artifacts Check Failed: repo:abc: No image found"
        );
    }

    #[test]
    fn unchanged_update_requires_both_fields() {
        let err = StackError::new("no changes").with_change_set("UNAVAILABLE", "FAILED");
        assert!(err.is_unchanged_update());

        let err = StackError::new("rollback").with_change_set("AVAILABLE", "FAILED");
        assert!(!err.is_unchanged_update());
        assert!(!StackError::new("boom").is_unchanged_update());
    }

    #[test]
    fn release_errors_are_collaborator_failures() {
        assert!(DeployError::release(Some(500), "oops").is_collaborator_failure());
        assert!(!DeployError::config("bad").is_collaborator_failure());
    }
}
