//! Typed configuration documents
//!
//! Two files feed context resolution:
//! - Override: `.deploy` in the working directory or git root
//! - Profile store: `~/.deployrc.json`, keyed by profile name

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validate::{self, Violation};
use crate::tags::Tag;

/// A configuration document that is validated before it is decoded.
pub trait Schema: Serialize + for<'de> Deserialize<'de> + Default {
    /// Human-readable file label used in error messages.
    const LABEL: &'static str;

    fn validate(value: &Value) -> Vec<Violation>;
}

/// Per-repository overrides read from `.deploy`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DotDeploy {
    /// Replaces the git-derived repository name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Profile to select from the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,

    #[serde(default, skip_serializing_if = "ArtifactOverrides::is_empty")]
    pub artifacts: ArtifactOverrides,
}

impl Schema for DotDeploy {
    const LABEL: &'static str = ".deploy";

    fn validate(value: &Value) -> Vec<Violation> {
        validate::validate_override(value)
    }
}

/// Artifact overrides, one entry per artifact store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactOverrides {
    /// Container registry images, `<repository>:<tag>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<ArtifactSetting>,

    /// Packaged function objects, `<bucket>/<key>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda: Option<ArtifactSetting>,

    /// Generic objects, `<bucket>/<key>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<ArtifactSetting>,
}

impl ArtifactOverrides {
    pub fn is_empty(&self) -> bool {
        self.docker.is_none() && self.lambda.is_none() && self.s3.is_none()
    }
}

/// `false` to disable a kind, or one or more patterns to check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactSetting {
    Enabled(bool),
    One(String),
    Many(Vec<String>),
}

impl ArtifactSetting {
    pub fn is_disabled(&self) -> bool {
        matches!(self, ArtifactSetting::Enabled(false))
    }

    pub fn patterns(&self) -> Vec<String> {
        match self {
            ArtifactSetting::Enabled(_) => Vec::new(),
            ArtifactSetting::One(pattern) => vec![pattern.clone()],
            ArtifactSetting::Many(patterns) => patterns.clone(),
        }
    }
}

/// One profile in `~/.deployrc.json`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// GitHub token for deployment records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("region", &self.region)
            .field("github", &self.github.as_ref().map(|_| "<redacted>"))
            .field("tags", &self.tags)
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// The global profile store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileStore {
    pub profiles: BTreeMap<String, Profile>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// The single profile, if there is exactly one.
    pub fn only(&self) -> Option<&str> {
        if self.profiles.len() == 1 {
            self.profiles.keys().next().map(String::as_str)
        } else {
            None
        }
    }

    /// Insert or replace a profile.
    pub fn upsert(&mut self, name: impl Into<String>, profile: Profile) {
        self.profiles.insert(name.into(), profile);
    }
}

impl Schema for ProfileStore {
    const LABEL: &'static str = "~/.deployrc.json";

    fn validate(value: &Value) -> Vec<Violation> {
        validate::validate_store(value)
    }
}
