//! Artifact patterns: placeholder rendering and segment parsing.

use std::collections::BTreeMap;
use std::fmt;

use crate::context::Context;
use crate::error::{DeployError, Result};

/// The artifact stores the gate knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// `<repository>:<tag>` in the container registry
    RegistryImage,
    /// `<bucket>/<key>` holding a packaged function
    FunctionObject,
    /// `<bucket>/<key>` of any kind
    GenericObject,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::RegistryImage,
        ArtifactKind::FunctionObject,
        ArtifactKind::GenericObject,
    ];

    /// Key under `artifacts` in `.deploy`.
    pub fn config_key(&self) -> &'static str {
        match self {
            ArtifactKind::RegistryImage => "docker",
            ArtifactKind::FunctionObject => "lambda",
            ArtifactKind::GenericObject => "s3",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::RegistryImage => "Docker Image",
            ArtifactKind::FunctionObject => "Lambda",
            ArtifactKind::GenericObject => "S3 Object",
        }
    }

    fn is_object(&self) -> bool {
        !matches!(self, ArtifactKind::RegistryImage)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArtifactKind::RegistryImage => "registry-image",
            ArtifactKind::FunctionObject => "function-object",
            ArtifactKind::GenericObject => "generic-object",
        })
    }
}

/// Where a resolved artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactTarget {
    Image { repository: String, tag: String },
    Object { bucket: String, key: String },
}

/// One artifact the gate must confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub kind: ArtifactKind,
    pub pattern: String,
    pub resolved: String,
    pub target: ArtifactTarget,
}

impl ArtifactSpec {
    /// Render `pattern` for `kind` and split it into the kind's segments.
    pub fn parse(kind: ArtifactKind, pattern: &str, values: &Placeholders) -> Result<Self> {
        let resolved = render(pattern, values)?;
        let target = match kind {
            ArtifactKind::RegistryImage => {
                let segments: Vec<&str> = resolved.split(':').collect();
                match segments.as_slice() {
                    [repository, tag] if !repository.is_empty() && !tag.is_empty() => {
                        ArtifactTarget::Image {
                            repository: repository.to_string(),
                            tag: tag.to_string(),
                        }
                    }
                    _ => {
                        return Err(DeployError::malformed(
                            &resolved,
                            "docker artifact must be in format <ECR>:<TAG>",
                        ));
                    }
                }
            }
            ArtifactKind::FunctionObject | ArtifactKind::GenericObject => {
                match resolved.split_once('/') {
                    Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                        ArtifactTarget::Object {
                            bucket: bucket.to_string(),
                            key: key.to_string(),
                        }
                    }
                    _ => {
                        return Err(DeployError::malformed(
                            &resolved,
                            format!("{} artifact must be in format <BUCKET>/<KEY>", kind.config_key()),
                        ));
                    }
                }
            }
        };

        Ok(Self {
            kind,
            pattern: pattern.to_string(),
            resolved,
            target,
        })
    }
}

/// Values substituted into `{{name}}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    values: BTreeMap<&'static str, String>,
}

impl Placeholders {
    /// The placeholder set available to `kind`.
    ///
    /// Images see `project` and `gitsha`; object kinds additionally see
    /// `rootStackName`, `fullStackName`, `accountId` and `region`.
    pub fn for_kind(kind: ArtifactKind, context: &Context) -> Self {
        let mut values = BTreeMap::new();
        values.insert("project", context.repo.clone());
        values.insert("gitsha", context.sha.clone());
        if kind.is_object() {
            values.insert("rootStackName", context.root_stack_name());
            values.insert("fullStackName", context.full_stack_name());
            values.insert("accountId", context.account_id.clone());
            values.insert("region", context.region.clone());
        }
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Substitute every `{{name}}` in `pattern`.
///
/// Unknown names and unterminated placeholders are malformed patterns.
pub fn render(pattern: &str, values: &Placeholders) -> Result<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| DeployError::malformed(pattern, "unterminated placeholder"))?;
        let name = after[..end].trim();
        let value = values.get(name).ok_or_else(|| {
            DeployError::malformed(pattern, format!("unknown placeholder '{}'", name))
        })?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}
