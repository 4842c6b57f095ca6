//! Infrastructure template location and stack subnames.

use std::path::{Path, PathBuf};

use crate::error::{DeployError, Result};

/// Directory scanned for the repository's default template.
pub const TEMPLATE_DIR: &str = "cloudformation";

/// Rendered JSON is preferred over its `.js` source.
const TEMPLATE_EXTENSIONS: [&str; 2] = ["json", "js"];

/// Where the template for this invocation comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TemplateRequest {
    /// `--template <path>`
    Explicit(PathBuf),
    /// Look for `cloudformation/<repo>.template.js(on)`
    Discover,
    /// The command does not need a template
    #[default]
    Skip,
}

/// A located template and the stack-name prefix it implies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTemplate {
    pub path: Option<PathBuf>,
    /// Prefix for the effective stack name, empty for the default template
    pub subname: String,
}

pub fn resolve_template(
    request: &TemplateRequest,
    working_dir: &Path,
    repo: &str,
) -> Result<ResolvedTemplate> {
    match request {
        TemplateRequest::Explicit(path) => {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                working_dir.join(path)
            };
            Ok(ResolvedTemplate {
                subname: subname_for(&path),
                path: Some(path),
            })
        }
        TemplateRequest::Discover => Ok(ResolvedTemplate {
            path: Some(discover(working_dir, repo)?),
            subname: String::new(),
        }),
        TemplateRequest::Skip => Ok(ResolvedTemplate::default()),
    }
}

/// `cloudformation/machine-ecs.template.js` -> `machine-ecs-`
pub fn subname_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}-", stem.replacen(".template", "", 1))
}

fn discover(working_dir: &Path, repo: &str) -> Result<PathBuf> {
    let dir = working_dir.join(TEMPLATE_DIR);
    for ext in TEMPLATE_EXTENSIONS {
        let candidate = dir.join(format!("{}.template.{}", repo, ext));
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(DeployError::TemplateNotFound(format!(
        "{}/{}.template.js(on)",
        TEMPLATE_DIR, repo
    )))
}
