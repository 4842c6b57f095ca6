//! `deploy init`: write a profile into the profile store.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{Profile, ProfileStore, ValidatedStore};
use crate::error::Result;

/// Values collected for one profile.
#[derive(Clone, Default)]
pub struct InitOptions {
    pub profile: String,
    pub region: String,
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub github: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub path: PathBuf,
    pub profile: String,
    /// False when an existing profile was replaced
    pub created: bool,
}

/// Insert or replace `options.profile` in the store at `store_path`.
///
/// Tags already recorded for the profile are kept. The whole store is
/// validated before it is written.
pub fn init_profile(store_path: &Path, options: InitOptions) -> Result<InitReport> {
    let store = ValidatedStore::<ProfileStore>::new(store_path);
    let mut profiles = store.load_or_default()?;

    let existing = profiles.get(&options.profile).cloned();
    let created = existing.is_none();
    let profile = Profile {
        region: Some(options.region),
        github: options.github.filter(|token| !token.trim().is_empty()),
        tags: existing.map(|p| p.tags).unwrap_or_default(),
        account_id: Some(options.account_id),
        access_key_id: Some(options.access_key_id),
        secret_access_key: Some(options.secret_access_key),
        session_token: None,
    };

    profiles.upsert(options.profile.clone(), profile);
    store.save(&profiles)?;
    info!("Saved profile {} to {}", options.profile, store_path.display());

    Ok(InitReport {
        path: store_path.to_path_buf(),
        profile: options.profile,
        created,
    })
}
