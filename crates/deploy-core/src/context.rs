//! Per-invocation deployment context.
//!
//! [`ContextResolver`] combines command line flags, the `.deploy` override,
//! the profile store, git metadata and credentials into one [`Context`].
//! The context is read-only afterwards except for the deployment record id.

use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::debug;

use crate::config::{self, CliLayer, DotDeploy, resolve_layers};
use crate::credentials::{AccessKeys, CredentialProvider};
use crate::error::{DeployError, Result};
use crate::git::{GitOracle, is_commit_id};
use crate::stack::StackConfig;
use crate::tags::TagSet;
use crate::template::{TemplateRequest, resolve_template};

/// Values taken from the command line.
#[derive(Clone, Default)]
pub struct CliFlags {
    /// Target stack, with or without the `<repo>-` prefix
    pub stack: Option<String>,
    /// Overrides the effective stack name
    pub name: Option<String>,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub template: TemplateRequest,
    pub github: Option<String>,
    pub disable_github: bool,
    pub force: bool,
}

impl fmt::Debug for CliFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliFlags")
            .field("stack", &self.stack)
            .field("name", &self.name)
            .field("profile", &self.profile)
            .field("region", &self.region)
            .field("template", &self.template)
            .field("github", &self.github.as_ref().map(|_| "<redacted>"))
            .field("disable_github", &self.disable_github)
            .field("force", &self.force)
            .finish()
    }
}

/// The resolved configuration for one invocation.
#[derive(Clone)]
pub struct Context {
    pub repo: String,
    pub owner: Option<String>,
    pub user: Option<String>,
    pub sha: String,

    /// Target stack with the `<repo>-` prefix stripped
    pub stack: String,
    /// Effective stack name: subname followed by stack, or `--name`
    pub name: String,
    pub subname: String,

    pub profile: String,
    pub region: String,
    pub credentials: AccessKeys,
    pub account_id: String,
    pub template: Option<PathBuf>,
    pub tags: TagSet,

    /// Token for deployment records; `None` disables them
    pub github: Option<String>,
    /// Downgrade collaborator failures to warnings
    pub force: bool,

    pub working_dir: PathBuf,
    pub git_root: PathBuf,
    pub uncommitted: bool,
    pub pushed: bool,
    pub dotdeploy: DotDeploy,

    deployment_id: OnceLock<u64>,
}

impl Context {
    /// A context for `repo` at `sha` with every other field at its default.
    pub fn for_commit(repo: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            owner: None,
            user: None,
            sha: sha.into(),
            stack: String::new(),
            name: String::new(),
            subname: String::new(),
            profile: config::merge::DEFAULT_PROFILE.to_string(),
            region: config::merge::DEFAULT_REGION.to_string(),
            credentials: AccessKeys::new("", ""),
            account_id: String::new(),
            template: None,
            tags: TagSet::new(),
            github: None,
            force: false,
            working_dir: PathBuf::from("."),
            git_root: PathBuf::from("."),
            uncommitted: false,
            pushed: true,
            dotdeploy: DotDeploy::default(),
            deployment_id: OnceLock::new(),
        }
    }

    /// Id of the deployment record for this invocation, once known.
    pub fn deployment_id(&self) -> Option<u64> {
        self.deployment_id.get().copied()
    }

    /// Cache the deployment record id. Only the first id is kept.
    pub fn record_deployment(&self, id: u64) -> bool {
        self.deployment_id.set(id).is_ok()
    }

    pub fn github_enabled(&self) -> bool {
        self.github.is_some()
    }

    /// `<repo>-<stack>`
    pub fn root_stack_name(&self) -> String {
        format!("{}-{}", self.repo, self.stack)
    }

    /// `<repo>-<name>`, the name of the deployed stack
    pub fn full_stack_name(&self) -> String {
        format!("{}-{}", self.repo, self.name)
    }

    /// Configuration for the stack mutation engine.
    pub fn stack_config(&self) -> StackConfig {
        StackConfig::new(
            &self.repo,
            &self.region,
            &self.account_id,
            self.credentials.clone(),
        )
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("repo", &self.repo)
            .field("owner", &self.owner)
            .field("user", &self.user)
            .field("sha", &self.sha)
            .field("stack", &self.stack)
            .field("name", &self.name)
            .field("profile", &self.profile)
            .field("region", &self.region)
            .field("credentials", &self.credentials)
            .field("account_id", &self.account_id)
            .field("template", &self.template)
            .field("tags", &self.tags)
            .field("github", &self.github.as_ref().map(|_| "<redacted>"))
            .field("force", &self.force)
            .field("deployment_id", &self.deployment_id())
            .finish()
    }
}

/// Builds a [`Context`] from flags, configuration files and collaborators.
pub struct ContextResolver<'a> {
    git: &'a dyn GitOracle,
    credentials: &'a dyn CredentialProvider,
    working_dir: PathBuf,
    store_path: PathBuf,
}

impl<'a> ContextResolver<'a> {
    pub fn new(
        git: &'a dyn GitOracle,
        credentials: &'a dyn CredentialProvider,
        working_dir: impl Into<PathBuf>,
        store_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            git,
            credentials,
            working_dir: working_dir.into(),
            store_path: store_path.into(),
        }
    }

    pub async fn resolve(&self, flags: &CliFlags) -> Result<Context> {
        let git_root = self.git.root()?;
        let sha = self.git.sha()?;
        if !is_commit_id(&sha) {
            return Err(DeployError::git(format!("'{}' is not a commit id", sha)));
        }
        let git_repo = self.git.repo()?;
        let owner = self.git.owner()?;
        let user = self.git.user()?;
        let uncommitted = self.git.uncommitted()?;
        let pushed = self.git.pushed()?;

        let dotdeploy = config::load_override(&self.working_dir, &git_root)?;
        let store = config::load_profiles(&self.store_path)?;

        let cli = CliLayer {
            profile: flags.profile.clone(),
            region: flags.region.clone(),
            github: flags.github.clone(),
            disable_github: flags.disable_github,
        };
        let layers = resolve_layers(&cli, dotdeploy.as_ref(), &store)?;
        debug!(profile = %layers.profile, region = %layers.region, "resolved configuration layers");

        let repo = dotdeploy
            .as_ref()
            .and_then(|d| d.name.clone())
            .unwrap_or(git_repo);

        if layers.github.is_some() && owner.is_none() {
            return Err(DeployError::git(
                "Could not determine the GitHub owner from remote.origin.url (use --no-github to skip deployment records)",
            ));
        }

        let template = resolve_template(&flags.template, &self.working_dir, &repo)?;
        let stack = strip_repo_prefix(flags.stack.as_deref().unwrap_or_default(), &repo);
        let name = match flags.name.as_deref() {
            Some(name) => strip_repo_prefix(name, &repo),
            None => format!("{}{}", template.subname, stack),
        };

        let credentials = match legacy_keys(&layers.stored) {
            Some(keys) => keys,
            None => self.credentials.materialize(&layers.profile).await?,
        };
        let account_id = match layers.stored.account_id.clone() {
            Some(id) => id,
            None => {
                self.credentials
                    .account_id(&layers.profile, &credentials, &layers.region)
                    .await?
            }
        };

        Ok(Context {
            repo,
            owner,
            user,
            sha,
            stack,
            name,
            subname: template.subname,
            profile: layers.profile,
            region: layers.region,
            credentials,
            account_id,
            template: template.path,
            tags: layers.tags,
            github: layers.github,
            force: flags.force,
            working_dir: self.working_dir.clone(),
            git_root,
            uncommitted,
            pushed,
            dotdeploy: dotdeploy.unwrap_or_default(),
            deployment_id: OnceLock::new(),
        })
    }
}

/// Keys stored directly in the profile, if both halves are present.
fn legacy_keys(profile: &config::Profile) -> Option<AccessKeys> {
    let access_key_id = profile.access_key_id.as_deref()?;
    let secret_access_key = profile.secret_access_key.as_deref()?;
    let keys = AccessKeys::new(access_key_id, secret_access_key);
    Some(match profile.session_token.as_deref() {
        Some(token) => keys.with_session_token(token),
        None => keys,
    })
}

fn strip_repo_prefix(value: &str, repo: &str) -> String {
    value
        .strip_prefix(&format!("{}-", repo))
        .unwrap_or(value)
        .to_string()
}
