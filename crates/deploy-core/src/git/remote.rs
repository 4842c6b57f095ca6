//! Remote URL parsing.

use url::Url;

use crate::error::{DeployError, Result};

const SCP_PREFIX: &str = "git@github.com:";

/// Extract the owner from a GitHub remote URL.
///
/// Supports formats:
/// - `git@github.com:owner/repo.git`
/// - `https://github.com/owner/repo(.git)`
/// - `ssh://git@github.com/owner/repo.git`
pub fn parse_owner(remote: &str) -> Result<String> {
    let remote = remote.trim();

    if let Some(idx) = remote.find(SCP_PREFIX) {
        let path = &remote[idx + SCP_PREFIX.len()..];
        return owner_segment(path.split('/').next(), remote);
    }

    let url = Url::parse(remote).map_err(|_| unsupported(remote))?;
    if url.host_str() != Some("github.com") {
        return Err(unsupported(remote));
    }
    let first = url.path_segments().and_then(|mut segments| segments.next());
    owner_segment(first, remote)
}

fn owner_segment(segment: Option<&str>, remote: &str) -> Result<String> {
    match segment {
        Some(owner) if !owner.is_empty() => Ok(owner.to_string()),
        _ => Err(unsupported(remote)),
    }
}

fn unsupported(remote: &str) -> DeployError {
    DeployError::git(format!(
        "only origins of format git@github.com or https://github.com are supported (found {})",
        remote
    ))
}
