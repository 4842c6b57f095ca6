//! Deployment records and CI status on GitHub.

mod client;
mod controller;
mod status;

pub use client::{
    CheckRun, CheckRunList, DEPLOY_TASK, Deployment, DeploymentState, GITHUB_API, GitHubClient, NewDeployment,
};
pub use controller::ReleaseController;
pub use status::{
    CheckState, CheckStatus, DEFAULT_STATUS_INTERVAL, DEFAULT_STATUS_TIMEOUT, StatusPolicy,
    StatusSnapshot, poll_status_checks,
};
