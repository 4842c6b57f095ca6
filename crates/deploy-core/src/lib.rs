//! Deploy Core Library
//!
//! Gates stack mutations behind a resolved deployment context, an artifact
//! readiness check and a GitHub deployment record.

pub mod artifacts;
pub mod aws;
pub mod commands;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod git;
pub mod release;
pub mod stack;
pub mod tags;
pub mod template;

/// Re-exports of commonly used types
pub mod prelude {
    // Context
    pub use crate::context::{CliFlags, Context, ContextResolver};
    pub use crate::template::TemplateRequest;

    // Configuration
    pub use crate::config::{DotDeploy, Profile, ProfileStore, ValidatedStore};
    pub use crate::tags::{Tag, TagSet};

    // Collaborators
    pub use crate::artifacts::{ArtifactGate, ArtifactOracle, AwsCliOracle};
    pub use crate::credentials::{AccessKeys, CredentialProvider, SharedCredentialsProvider};
    pub use crate::git::{Git2Oracle, GitOracle};
    pub use crate::release::ReleaseController;
    pub use crate::stack::{AwsCliStackManager, StackManager};

    // Commands
    pub use crate::commands::{MutateCommand, Mutation, MutationReport};

    // Errors
    pub use crate::error::{DeployError, Phase, PhaseError};
}
