//! Git metadata for the repository being deployed.
//!
//! This module provides a read-only view of the working repository:
//! - Root directory and repository name
//! - Current commit sha and upstream owner
//! - Uncommitted / unpushed state

mod remote;
mod repository;

pub use remote::parse_owner;
pub use repository::Git2Oracle;

use std::path::PathBuf;

use crate::error::{DeployError, Result};

/// Read-only access to git metadata.
pub trait GitOracle {
    /// Top level directory of the working tree.
    fn root(&self) -> Result<PathBuf>;

    /// Name of the repository, derived from the root directory.
    fn repo(&self) -> Result<String> {
        let root = self.root()?;
        root.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                DeployError::git(format!(
                    "Could not determine repository name from {}",
                    root.display()
                ))
            })
    }

    /// Owner of the `origin` remote, `None` when there is no origin.
    fn owner(&self) -> Result<Option<String>>;

    /// Configured `user.name`, if any.
    fn user(&self) -> Result<Option<String>>;

    /// Full commit id of `HEAD`.
    fn sha(&self) -> Result<String>;

    /// Whether the working tree has uncommitted changes.
    fn uncommitted(&self) -> Result<bool>;

    /// Whether `HEAD` has been pushed to its upstream branch.
    fn pushed(&self) -> Result<bool>;
}

/// A full commit id: 40 (sha1) or 64 (sha256) hex characters.
pub fn is_commit_id(sha: &str) -> bool {
    matches!(sha.len(), 40 | 64) && sha.chars().all(|c| c.is_ascii_hexdigit())
}
