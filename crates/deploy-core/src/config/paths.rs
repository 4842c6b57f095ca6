//! Config path resolution helpers.

use std::path::{Path, PathBuf};

use crate::error::{DeployError, Result};

/// Per-repository override file name.
pub const OVERRIDE_FILE: &str = ".deploy";

/// Global profile store file name, relative to the home directory.
pub const STORE_FILE: &str = ".deployrc.json";

/// Override file locations in search order: working directory, then git root.
pub fn override_candidates(working_dir: &Path, git_root: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![working_dir.join(OVERRIDE_FILE)];
    let root_candidate = git_root.join(OVERRIDE_FILE);
    if !candidates.contains(&root_candidate) {
        candidates.push(root_candidate);
    }
    candidates
}

pub fn default_store_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(STORE_FILE))
        .ok_or_else(|| DeployError::config("Could not determine home directory"))
}

/// Shared AWS credentials file, honouring `AWS_SHARED_CREDENTIALS_FILE`.
pub fn default_credentials_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".aws").join("credentials"))
}
