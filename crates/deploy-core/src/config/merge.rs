//! Configuration layer merging logic
//!
//! Precedence is computed per field rather than by overlaying documents:
//! - region: CLI -> override -> selected profile -> `us-east-1`
//! - profile: CLI -> override -> the only profile in the store
//! - github: CLI -> selected profile
//! - tags: selected profile tags, then override tags

use super::schema::{DotDeploy, Profile, ProfileStore};
use crate::error::{DeployError, Result};
use crate::tags::TagSet;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Profile used when the store is empty and nothing selects one.
pub const DEFAULT_PROFILE: &str = "default";

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliLayer {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub github: Option<String>,
    /// Turn deployment records off regardless of configured tokens
    pub disable_github: bool,
}

/// The outcome of merging CLI flags, override file and profile store.
#[derive(Debug, Clone, PartialEq)]
pub struct Layers {
    pub profile: String,
    pub region: String,
    pub github: Option<String>,
    pub tags: TagSet,
    /// The selected store entry, empty when the store has none
    pub stored: Profile,
}

/// Merge the three configuration layers.
pub fn resolve_layers(
    cli: &CliLayer,
    dotdeploy: Option<&DotDeploy>,
    store: &ProfileStore,
) -> Result<Layers> {
    let profile = resolve_profile(cli, dotdeploy, store)?;
    let stored = store.get(&profile).cloned().unwrap_or_default();

    let region = first_present([
        cli.region.as_deref(),
        dotdeploy.and_then(|d| d.region.as_deref()),
        stored.region.as_deref(),
    ])
    .unwrap_or(DEFAULT_REGION)
    .to_string();

    let github = if cli.disable_github {
        None
    } else {
        first_present([cli.github.as_deref(), stored.github.as_deref()]).map(str::to_string)
    };

    let mut tags = TagSet::new();
    tags.extend(&stored.tags);
    if let Some(dotdeploy) = dotdeploy {
        tags.extend(&dotdeploy.tags);
    }

    Ok(Layers {
        profile,
        region,
        github,
        tags,
        stored,
    })
}

fn resolve_profile(
    cli: &CliLayer,
    dotdeploy: Option<&DotDeploy>,
    store: &ProfileStore,
) -> Result<String> {
    if let Some(profile) = first_present([
        cli.profile.as_deref(),
        dotdeploy.and_then(|d| d.profile.as_deref()),
    ]) {
        return Ok(profile.to_string());
    }

    match store.len() {
        0 => Ok(DEFAULT_PROFILE.to_string()),
        1 => Ok(store.only().unwrap_or(DEFAULT_PROFILE).to_string()),
        _ => Err(DeployError::AmbiguousProfile {
            profiles: store.names(),
        }),
    }
}

fn first_present<'a, const N: usize>(values: [Option<&'a str>; N]) -> Option<&'a str> {
    values
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}
