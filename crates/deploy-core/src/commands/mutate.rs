//! Stack mutation workflows.
//!
//! create/update: artifacts gate, pending record, mutation, final record.
//! delete/cancel: mutation only; a successful delete retires the record.

use std::fmt;

use tracing::{info, warn};

use crate::artifacts::{ArtifactGate, ArtifactOracle};
use crate::context::Context;
use crate::error::{DeployError, Phase, PhaseError, StackError};
use crate::release::ReleaseController;
use crate::stack::{StackManager, StackParameters};

/// The four stack mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Create,
    Update,
    Delete,
    Cancel,
}

impl Mutation {
    pub fn phase(&self) -> Phase {
        match self {
            Mutation::Create => Phase::Create,
            Mutation::Update => Phase::Update,
            Mutation::Delete => Phase::Delete,
            Mutation::Cancel => Phase::Cancel,
        }
    }

    /// Whether the mutation deploys a template and is gated on artifacts.
    pub fn deploys(&self) -> bool {
        matches!(self, Mutation::Create | Mutation::Update)
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mutation::Create => "create",
            Mutation::Update => "update",
            Mutation::Delete => "delete",
            Mutation::Cancel => "cancel",
        })
    }
}

/// What a successful workflow did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub mutation: Mutation,
    /// Deployed stack name, `<repo>-<name>`
    pub stack: String,
    /// The update had nothing to change
    pub unchanged: bool,
}

/// Runs one mutation against its collaborators.
pub struct MutateCommand<'a, O, M: ?Sized> {
    context: &'a Context,
    gate: &'a ArtifactGate<O>,
    release: &'a ReleaseController<'a>,
    manager: &'a M,
}

impl<'a, O, M> MutateCommand<'a, O, M>
where
    O: ArtifactOracle,
    M: StackManager + ?Sized,
{
    pub fn new(
        context: &'a Context,
        gate: &'a ArtifactGate<O>,
        release: &'a ReleaseController<'a>,
        manager: &'a M,
    ) -> Self {
        Self {
            context,
            gate,
            release,
            manager,
        }
    }

    pub async fn run(&self, mutation: Mutation) -> Result<MutationReport, PhaseError> {
        match mutation {
            Mutation::Create | Mutation::Update => self.deploy(mutation).await,
            Mutation::Delete => self.delete().await,
            Mutation::Cancel => {
                self.manager
                    .cancel(&self.context.name)
                    .await
                    .map_err(|err| PhaseError::new(Phase::Cancel, err.into()))?;
                Ok(self.report(mutation, false))
            }
        }
    }

    async fn deploy(&self, mutation: Mutation) -> Result<MutationReport, PhaseError> {
        let context = self.context;
        if context.uncommitted {
            warn!("You have uncommitted changes; deploying {}", context.sha);
        }
        if !context.pushed {
            warn!("{} has not been pushed to its upstream branch", context.sha);
        }

        let template = context.template.as_deref().ok_or_else(|| {
            PhaseError::new(
                Phase::Context,
                DeployError::config(format!("{} requires a template", mutation)),
            )
        })?;

        self.gate
            .check(context)
            .await
            .map_err(|err| PhaseError::new(Phase::Artifacts, err))?;

        self.record(None).await?;

        let params = StackParameters::for_commit(&context.sha, &context.tags);
        info!("Running {} on {}", mutation, context.full_stack_name());
        let result = match mutation {
            Mutation::Create => self.manager.create(&context.name, template, &params).await,
            _ => self.manager.update(&context.name, template, &params).await,
        };

        match result {
            Ok(()) => {
                self.record(Some(true)).await?;
                Ok(self.report(mutation, false))
            }
            Err(err) if mutation == Mutation::Update && err.is_unchanged_update() => {
                warn!("{}: {}", context.full_stack_name(), err);
                self.record(Some(true)).await?;
                Ok(self.report(mutation, true))
            }
            Err(err) => Err(self.fail(mutation, err).await),
        }
    }

    async fn delete(&self) -> Result<MutationReport, PhaseError> {
        self.manager
            .delete(&self.context.name)
            .await
            .map_err(|err| PhaseError::new(Phase::Delete, err.into()))?;
        self.release
            .retire(&self.context.stack)
            .await
            .map_err(|err| PhaseError::new(Phase::Deployment, err))?;
        Ok(self.report(Mutation::Delete, false))
    }

    /// Mark the record failed, keeping the mutation error as the result.
    async fn fail(&self, mutation: Mutation, err: StackError) -> PhaseError {
        if let Err(record_err) = self.release.deployment(&self.context.stack, Some(false)).await {
            warn!("Could not mark deployment failed: {}", record_err);
        }
        PhaseError::new(mutation.phase(), err.into())
    }

    async fn record(&self, outcome: Option<bool>) -> Result<(), PhaseError> {
        self.release
            .deployment(&self.context.stack, outcome)
            .await
            .map_err(|err| {
                let phase = match err {
                    DeployError::StatusCheckTimeout { .. } | DeployError::StatusCheckFailed { .. } => {
                        Phase::StatusCheck
                    }
                    _ => Phase::Deployment,
                };
                PhaseError::new(phase, err)
            })
    }

    fn report(&self, mutation: Mutation, unchanged: bool) -> MutationReport {
        MutationReport {
            mutation,
            stack: self.context.full_stack_name(),
            unchanged,
        }
    }
}
