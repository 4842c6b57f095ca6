mod support;

use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

use deploy_core::context::{CliFlags, ContextResolver};
use deploy_core::error::DeployError;
use deploy_core::git::Git2Oracle;
use deploy_core::tags::Tag;
use deploy_core::template::TemplateRequest;

use support::fakes::StaticCredentials;
use support::git::init_repo;

const ORIGIN: &str = "git@github.com:openaddresses/myrepo.git";

struct Workspace {
    _temp: TempDir,
    repo: PathBuf,
    store: PathBuf,
    sha: String,
}

impl Workspace {
    fn new(origin: Option<&str>) -> Self {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("myrepo");
        let sha = init_repo(&repo, origin);
        let store = temp.path().join("home").join(".deployrc.json");
        Self {
            _temp: temp,
            repo,
            store,
            sha,
        }
    }

    fn write_override(&self, value: serde_json::Value) {
        std::fs::write(self.repo.join(".deploy"), value.to_string()).unwrap();
    }

    fn write_store(&self, value: serde_json::Value) {
        std::fs::create_dir_all(self.store.parent().unwrap()).unwrap();
        std::fs::write(&self.store, value.to_string()).unwrap();
    }

    fn write_template(&self, name: &str) -> PathBuf {
        let dir = self.repo.join("cloudformation");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, "{}").unwrap();
        path
    }
}

async fn resolve(
    workspace: &Workspace,
    working_dir: &Path,
    credentials: &StaticCredentials,
    flags: &CliFlags,
) -> deploy_core::error::Result<deploy_core::context::Context> {
    let git = Git2Oracle::discover(working_dir)?;
    ContextResolver::new(&git, credentials, working_dir, &workspace.store)
        .resolve(flags)
        .await
}

fn stack(name: &str) -> CliFlags {
    CliFlags {
        stack: Some(name.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn override_region_beats_store_region() {
    let ws = Workspace::new(Some(ORIGIN));
    ws.write_override(json!({ "region": "eu-west-1", "tags": ["Owner"] }));
    ws.write_store(json!({ "default": { "region": "us-east-1" } }));
    let creds = StaticCredentials::new("123456789012");

    let context = resolve(&ws, &ws.repo, &creds, &stack("prod")).await.unwrap();

    assert_eq!(context.region, "eu-west-1");
    assert_eq!(context.profile, "default");
    assert_eq!(context.sha, ws.sha);
    assert_eq!(context.repo, "myrepo");
    assert_eq!(context.owner.as_deref(), Some("openaddresses"));
    assert_eq!(context.user.as_deref(), Some("Test User"));
    assert_eq!(context.tags.iter().cloned().collect::<Vec<_>>(), vec![Tag::Name("Owner".into())]);
    assert_eq!(context.account_id, "123456789012");
    assert_eq!(context.credentials.access_key_id, "AKIADEFAULT");
    assert!(context.uncommitted);
    assert!(!context.pushed);
}

#[tokio::test]
async fn cli_region_beats_override() {
    let ws = Workspace::new(None);
    ws.write_override(json!({ "region": "eu-west-1" }));
    let creds = StaticCredentials::new("123456789012");
    let flags = CliFlags {
        region: Some("ap-southeast-2".into()),
        ..stack("prod")
    };

    let context = resolve(&ws, &ws.repo, &creds, &flags).await.unwrap();
    assert_eq!(context.region, "ap-southeast-2");
}

#[tokio::test]
async fn missing_store_resolves_default_profile() {
    let ws = Workspace::new(None);
    let creds = StaticCredentials::new("123456789012");

    let context = resolve(&ws, &ws.repo, &creds, &stack("prod")).await.unwrap();
    assert_eq!(context.profile, "default");
    assert_eq!(context.region, "us-east-1");
    assert!(context.github.is_none());
}

#[tokio::test]
async fn multiple_profiles_need_selection() {
    let ws = Workspace::new(None);
    ws.write_store(json!({
        "staging": { "region": "us-west-2" },
        "production": { "region": "eu-west-1" }
    }));
    let creds = StaticCredentials::new("123456789012");

    let err = resolve(&ws, &ws.repo, &creds, &stack("prod")).await.unwrap_err();
    assert!(matches!(err, DeployError::AmbiguousProfile { .. }));
    assert!(err.to_string().contains("--profile"));
    assert_eq!(creds.calls(), 0);

    ws.write_override(json!({ "profile": "staging" }));
    let context = resolve(&ws, &ws.repo, &creds, &stack("prod")).await.unwrap();
    assert_eq!(context.profile, "staging");
    assert_eq!(context.region, "us-west-2");
}

#[tokio::test]
async fn store_keys_are_used_before_provider() {
    let ws = Workspace::new(None);
    ws.write_store(json!({
        "default": {
            "accountId": "210987654321",
            "accessKeyId": "AKIASTORED",
            "secretAccessKey": "stored-secret"
        }
    }));
    let creds = StaticCredentials::missing();

    let context = resolve(&ws, &ws.repo, &creds, &stack("prod")).await.unwrap();
    assert_eq!(context.credentials.access_key_id, "AKIASTORED");
    assert_eq!(context.account_id, "210987654321");
    assert_eq!(creds.calls(), 0);

    let config = context.stack_config();
    assert_eq!(config.config_bucket, "cfn-config-active-210987654321-us-east-1");
    assert_eq!(config.template_bucket, "cfn-config-templates-210987654321-us-east-1");
}

#[tokio::test]
async fn missing_credentials_point_at_init() {
    let ws = Workspace::new(None);
    let creds = StaticCredentials::missing();

    let err = resolve(&ws, &ws.repo, &creds, &stack("prod")).await.unwrap_err();
    assert!(matches!(err, DeployError::Credential { .. }));
    assert!(err.to_string().contains("deploy init"));
}

#[tokio::test]
async fn malformed_override_is_fatal() {
    let ws = Workspace::new(None);
    std::fs::write(ws.repo.join(".deploy"), "{ not json").unwrap();
    let creds = StaticCredentials::new("123456789012");

    let err = resolve(&ws, &ws.repo, &creds, &stack("prod")).await.unwrap_err();
    assert!(matches!(err, DeployError::Config(_)));
    assert!(err.to_string().contains("Invalid JSON"));
}

#[tokio::test]
async fn schema_violations_are_all_reported() {
    let ws = Workspace::new(None);
    ws.write_store(json!({ "default": { "region": 5, "colour": "blue" } }));
    let creds = StaticCredentials::new("123456789012");

    let err = resolve(&ws, &ws.repo, &creds, &stack("prod")).await.unwrap_err();
    match err {
        DeployError::Schema { violations, .. } => {
            let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
            assert_eq!(paths.len(), 2);
            assert!(paths.contains(&"/default/region"));
            assert!(paths.contains(&"/default/colour"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn working_dir_override_wins_over_git_root() {
    let ws = Workspace::new(None);
    ws.write_override(json!({ "region": "eu-west-1" }));
    let sub = ws.repo.join("service");
    std::fs::create_dir_all(&sub).unwrap();
    std::fs::write(sub.join(".deploy"), json!({ "region": "ca-central-1" }).to_string()).unwrap();
    let creds = StaticCredentials::new("123456789012");

    let context = resolve(&ws, &sub, &creds, &stack("prod")).await.unwrap();
    assert_eq!(context.region, "ca-central-1");

    let other = ws.repo.join("other");
    std::fs::create_dir_all(&other).unwrap();
    let context = resolve(&ws, &other, &creds, &stack("prod")).await.unwrap();
    assert_eq!(context.region, "eu-west-1");
}

#[tokio::test]
async fn discovered_template_and_stack_names() {
    let ws = Workspace::new(None);
    let template = ws.write_template("myrepo.template.json");
    let creds = StaticCredentials::new("123456789012");
    let flags = CliFlags {
        template: TemplateRequest::Discover,
        ..stack("myrepo-prod")
    };

    let context = resolve(&ws, &ws.repo, &creds, &flags).await.unwrap();
    assert_eq!(context.template, Some(template));
    assert_eq!(context.stack, "prod");
    assert_eq!(context.name, "prod");
    assert_eq!(context.full_stack_name(), "myrepo-prod");
}

#[tokio::test]
async fn explicit_template_prefixes_name() {
    let ws = Workspace::new(None);
    ws.write_template("batch.template.json");
    let creds = StaticCredentials::new("123456789012");
    let flags = CliFlags {
        template: TemplateRequest::Explicit(PathBuf::from("cloudformation/batch.template.json")),
        ..stack("prod")
    };

    let context = resolve(&ws, &ws.repo, &creds, &flags).await.unwrap();
    assert_eq!(context.subname, "batch-");
    assert_eq!(context.name, "batch-prod");
    assert_eq!(context.root_stack_name(), "myrepo-prod");
    assert_eq!(context.full_stack_name(), "myrepo-batch-prod");

    let flags = CliFlags {
        name: Some("myrepo-custom".into()),
        ..flags
    };
    let context = resolve(&ws, &ws.repo, &creds, &flags).await.unwrap();
    assert_eq!(context.name, "custom");
}

#[tokio::test]
async fn missing_template_is_reported() {
    let ws = Workspace::new(None);
    let creds = StaticCredentials::new("123456789012");
    let flags = CliFlags {
        template: TemplateRequest::Discover,
        ..stack("prod")
    };

    let err = resolve(&ws, &ws.repo, &creds, &flags).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Could not find CF Template in cloudformation/myrepo.template.js(on)"
    );
}

#[tokio::test]
async fn override_name_replaces_repo() {
    let ws = Workspace::new(None);
    ws.write_override(json!({ "name": "renamed" }));
    let creds = StaticCredentials::new("123456789012");

    let context = resolve(&ws, &ws.repo, &creds, &stack("renamed-prod")).await.unwrap();
    assert_eq!(context.repo, "renamed");
    assert_eq!(context.stack, "prod");
}

#[tokio::test]
async fn github_needs_an_owner() {
    let ws = Workspace::new(Some("https://gitlab.example.com/team/myrepo.git"));
    let creds = StaticCredentials::new("123456789012");
    let flags = CliFlags {
        github: Some("ghp_token".into()),
        ..stack("prod")
    };

    let err = resolve(&ws, &ws.repo, &creds, &flags).await.unwrap_err();
    assert!(matches!(err, DeployError::Git(_)));

    let flags = CliFlags {
        disable_github: true,
        ..flags
    };
    let context = resolve(&ws, &ws.repo, &creds, &flags).await.unwrap();
    assert!(context.owner.is_none());
    assert!(!context.github_enabled());
}

#[tokio::test]
async fn outside_a_repository_is_a_git_error() {
    let temp = TempDir::new().unwrap();
    let err = Git2Oracle::discover(temp.path()).err().unwrap();
    assert!(matches!(err, DeployError::Git(_)));
}
