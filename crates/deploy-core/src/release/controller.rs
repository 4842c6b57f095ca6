//! Deployment record state machine.
//!
//! The first call in an invocation waits for CI, then finds or creates the
//! record for `sha`/environment and caches its id on the [`Context`]. Later
//! calls only post a status.

use tracing::{debug, info, warn};

use super::client::{DEPLOY_TASK, DeploymentState, GitHubClient, NewDeployment};
use super::status::{StatusPolicy, StatusSnapshot, poll_status_checks};
use crate::context::Context;
use crate::error::{DeployError, Result};

const PRODUCTION_ENVIRONMENTS: [&str; 2] = ["prod", "production"];

/// Keeps the deployment record in step with a stack mutation.
pub struct ReleaseController<'a> {
    context: &'a Context,
    client: Option<GitHubClient>,
    policy: StatusPolicy,
}

impl<'a> ReleaseController<'a> {
    /// A controller talking to api.github.com, inert when no token is set.
    pub fn new(context: &'a Context) -> Result<Self> {
        let client = match context.github.as_deref() {
            Some(token) => Some(GitHubClient::new(token, owner(context)?, &context.repo)?),
            None => None,
        };
        Ok(Self {
            context,
            client,
            policy: StatusPolicy::default(),
        })
    }

    pub fn with_client(context: &'a Context, client: GitHubClient) -> Self {
        Self {
            context,
            client: Some(client),
            policy: StatusPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Record the state of deploying to `stack`.
    ///
    /// `None` marks the deployment pending, `Some(true)` successful and
    /// `Some(false)` failed.
    pub async fn deployment(&self, stack: &str, outcome: Option<bool>) -> Result<()> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        let state = DeploymentState::from_outcome(outcome);
        let result = self.sync(client, stack, state).await;
        self.downgrade(result)
    }

    /// Retire the record for `stack` at this commit, if one exists.
    pub async fn retire(&self, stack: &str) -> Result<()> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        if self.context.deployment_id().is_none() {
            match self.find(client, stack).await {
                Ok(Some(id)) => {
                    self.context.record_deployment(id);
                }
                Ok(None) => return Ok(()),
                Err(err) => return self.downgrade(Err(err)),
            }
        }
        self.discard().await
    }

    /// Mark the cached record inactive and delete it.
    pub async fn discard(&self) -> Result<()> {
        let (Some(client), Some(id)) = (&self.client, self.context.deployment_id()) else {
            return Ok(());
        };
        let result = async {
            client
                .create_status(id, DeploymentState::Inactive, "", "discarded")
                .await?;
            client.delete_deployment(id).await
        }
        .await;
        self.downgrade(result)
    }

    async fn sync(&self, client: &GitHubClient, stack: &str, state: DeploymentState) -> Result<()> {
        let id = match self.context.deployment_id() {
            Some(id) => id,
            None => {
                self.await_checks(client).await?;
                let id = match self.find(client, stack).await? {
                    Some(id) => id,
                    None => self.create(client, stack).await?,
                };
                self.context.record_deployment(id);
                id
            }
        };

        debug!(id, state = state.as_str(), "updating deployment status");
        let description = format!("{} {}", DEPLOY_TASK, self.context.full_stack_name());
        client.create_status(id, state, stack, &description).await
    }

    async fn await_checks(&self, client: &GitHubClient) -> Result<()> {
        let sha = &self.context.sha;
        if self.context.force {
            warn!("--force: not waiting for status checks on {}", sha);
            return Ok(());
        }
        poll_status_checks(sha, &self.policy, move || async move {
            let listing = client.check_runs(sha).await?;
            Ok(StatusSnapshot::from_listing(&listing))
        })
        .await
        .map(|_| ())
    }

    /// Newest existing record for this commit and environment.
    async fn find(&self, client: &GitHubClient, stack: &str) -> Result<Option<u64>> {
        let deployments = client.list_deployments(&self.context.sha, stack).await?;
        Ok(deployments
            .into_iter()
            .max_by_key(|d| d.created_at)
            .map(|d| d.id))
    }

    async fn create(&self, client: &GitHubClient, stack: &str) -> Result<u64> {
        let deployment = client
            .create_deployment(&NewDeployment {
                git_ref: self.context.sha.clone(),
                task: DEPLOY_TASK.to_string(),
                environment: stack.to_string(),
                production_environment: PRODUCTION_ENVIRONMENTS.contains(&stack),
                auto_merge: false,
                required_contexts: Vec::new(),
                description: format!("{} by {}", DEPLOY_TASK, self.actor()),
            })
            .await?;
        info!("Created GitHub deployment {} for {}", deployment.id, stack);
        Ok(deployment.id)
    }

    fn actor(&self) -> &str {
        self.context.user.as_deref().unwrap_or("unknown")
    }

    fn downgrade(&self, result: Result<()>) -> Result<()> {
        match result {
            Err(err) if self.context.force && err.is_collaborator_failure() => {
                warn!("--force: ignoring GitHub deployment failure: {}", err);
                Ok(())
            }
            other => other,
        }
    }
}

fn owner(context: &Context) -> Result<&str> {
    context.owner.as_deref().ok_or_else(|| {
        DeployError::git("Could not determine the GitHub owner from remote.origin.url")
    })
}
