//! Configuration loading for deploy
//!
//! Two documents are read for every invocation:
//! - Override: `.deploy`, per repository, optional
//! - Profile store: `~/.deployrc.json`, per machine, empty when missing
//!
//! Both are schema validated before decoding; see [`validate`].

pub mod merge;
pub mod paths;
pub mod schema;
pub mod store;
pub mod validate;

use std::path::Path;

pub use merge::{CliLayer, Layers, resolve_layers};
pub use paths::{OVERRIDE_FILE, STORE_FILE, default_store_path, override_candidates};
pub use schema::{ArtifactOverrides, ArtifactSetting, DotDeploy, Profile, ProfileStore, Schema};
pub use store::ValidatedStore;
pub use validate::Violation;

use crate::error::Result;

/// Load the first override file found in the working directory or git root.
pub fn load_override(working_dir: &Path, git_root: &Path) -> Result<Option<DotDeploy>> {
    for candidate in override_candidates(working_dir, git_root) {
        let store = ValidatedStore::<DotDeploy>::new(candidate);
        if let Some(dotdeploy) = store.load()? {
            return Ok(Some(dotdeploy));
        }
    }
    Ok(None)
}

/// Load the profile store, empty when the file does not exist.
pub fn load_profiles(path: &Path) -> Result<ProfileStore> {
    ValidatedStore::<ProfileStore>::new(path).load_or_default()
}
