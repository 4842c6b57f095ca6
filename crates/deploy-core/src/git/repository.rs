//! git2-backed implementation of [`GitOracle`].

use std::path::{Path, PathBuf};

use git2::{Branch, Repository, StatusOptions};

use super::{GitOracle, is_commit_id, parse_owner};
use crate::error::{DeployError, Result};

/// Reads git metadata through libgit2.
pub struct Git2Oracle {
    repo: Repository,
}

impl Git2Oracle {
    /// Open the repository containing `path`.
    pub fn discover(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path).map_err(|_| {
            DeployError::git(format!(
                "Is this a git repo? Could not determine Git Root Directory from {}",
                path.display()
            ))
        })?;
        Ok(Self { repo })
    }
}

impl GitOracle for Git2Oracle {
    fn root(&self) -> Result<PathBuf> {
        self.repo
            .workdir()
            .map(|dir| dir.components().collect::<PathBuf>())
            .ok_or_else(|| DeployError::git("Is this a git repo? Bare repositories have no root"))
    }

    fn owner(&self) -> Result<Option<String>> {
        let remote = match self.repo.find_remote("origin") {
            Ok(remote) => remote,
            Err(err) if err.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        // Non-GitHub remotes have no owner; callers that need one report it.
        Ok(remote.url().and_then(|url| parse_owner(url).ok()))
    }

    fn user(&self) -> Result<Option<String>> {
        let config = self.repo.config()?;
        Ok(config.get_string("user.name").ok())
    }

    fn sha(&self) -> Result<String> {
        let commit = self
            .repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(|_| DeployError::git("Is this a git repo? Could not determine GitSha"))?;
        let sha = commit.id().to_string();
        if !is_commit_id(&sha) {
            return Err(DeployError::git(format!("Unexpected GitSha: {}", sha)));
        }
        Ok(sha)
    }

    fn uncommitted(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).exclude_submodules(true);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }

    fn pushed(&self) -> Result<bool> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(_) => return Ok(false),
        };
        if !head.is_branch() {
            return Ok(false);
        }
        let Some(local) = head.target() else {
            return Ok(false);
        };

        let branch = Branch::wrap(head);
        let upstream = match branch.upstream() {
            Ok(upstream) => upstream,
            Err(_) => return Ok(false),
        };
        let Some(remote) = upstream.get().target() else {
            return Ok(false);
        };

        let (ahead, _behind) = self.repo.graph_ahead_behind(local, remote)?;
        Ok(ahead == 0)
    }
}
