//! Command workflows shared by frontends.

pub mod env;
pub mod init;
pub mod mutate;

pub use env::env_exports;
pub use init::{InitOptions, InitReport, init_profile};
pub use mutate::{MutateCommand, Mutation, MutationReport};
