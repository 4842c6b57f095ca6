use serde_json::{Value, json};
use tempfile::TempDir;

use deploy_core::commands::{InitOptions, init_profile};
use deploy_core::config::{DotDeploy, ProfileStore, ValidatedStore, load_override, load_profiles};
use deploy_core::error::DeployError;
use deploy_core::tags::Tag;

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn load_missing_store_returns_empty() {
    let temp = TempDir::new().unwrap();
    let store = load_profiles(&temp.path().join(".deployrc.json")).unwrap();
    assert!(store.is_empty());
}

#[test]
fn load_missing_override_returns_none() {
    let temp = TempDir::new().unwrap();
    assert!(load_override(temp.path(), temp.path()).unwrap().is_none());
}

#[test]
fn saved_store_uses_camel_case_keys() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join(".deployrc.json");

    init_profile(
        &path,
        InitOptions {
            profile: "default".into(),
            region: "us-west-2".into(),
            account_id: "123456789012".into(),
            access_key_id: "AKIAEXAMPLE".into(),
            secret_access_key: "secret".into(),
            github: Some("ghp_token".into()),
        },
    )
    .unwrap();

    assert_eq!(
        read_json(&path),
        json!({
            "default": {
                "region": "us-west-2",
                "github": "ghp_token",
                "accountId": "123456789012",
                "accessKeyId": "AKIAEXAMPLE",
                "secretAccessKey": "secret"
            }
        })
    );

    let store = load_profiles(&path).unwrap();
    assert_eq!(store.only(), Some("default"));
    assert_eq!(
        store.get("default").and_then(|p| p.region.as_deref()),
        Some("us-west-2")
    );
}

#[test]
fn init_keeps_other_profiles() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".deployrc.json");
    std::fs::write(
        &path,
        json!({ "staging": { "region": "eu-west-1", "tags": ["Owner"] } }).to_string(),
    )
    .unwrap();

    let report = init_profile(
        &path,
        InitOptions {
            profile: "production".into(),
            region: "us-east-1".into(),
            account_id: "123456789012".into(),
            access_key_id: "AKIAEXAMPLE".into(),
            secret_access_key: "secret".into(),
            github: None,
        },
    )
    .unwrap();
    assert!(report.created);

    let store = load_profiles(&path).unwrap();
    assert_eq!(store.names(), vec!["production", "staging"]);
    assert_eq!(
        store.get("staging").unwrap().tags,
        vec![Tag::Name("Owner".into())]
    );
}

#[test]
fn init_refuses_invalid_region() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".deployrc.json");

    let err = init_profile(
        &path,
        InitOptions {
            profile: "default".into(),
            region: "Not A Region".into(),
            account_id: "123456789012".into(),
            access_key_id: "AKIAEXAMPLE".into(),
            secret_access_key: "secret".into(),
            github: None,
        },
    )
    .unwrap_err();

    assert!(matches!(err, DeployError::Schema { .. }));
    assert!(!path.exists());
}

#[test]
fn override_with_artifacts_loads() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join(".deploy"),
        json!({
            "profile": "staging",
            "tags": [{ "Key": "Team", "Value": "data" }],
            "artifacts": { "docker": false, "s3": ["bucket/{{gitsha}}.zip"] }
        })
        .to_string(),
    )
    .unwrap();

    let dotdeploy = load_override(temp.path(), temp.path()).unwrap().unwrap();
    assert_eq!(dotdeploy.profile.as_deref(), Some("staging"));
    assert_eq!(dotdeploy.tags, vec![Tag::pair("Team", "data")]);
    assert!(dotdeploy.artifacts.docker.unwrap().is_disabled());
    assert_eq!(
        dotdeploy.artifacts.s3.unwrap().patterns(),
        vec!["bucket/{{gitsha}}.zip".to_string()]
    );
}

#[test]
fn override_violations_name_the_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".deploy");
    std::fs::write(&path, json!({ "artifacts": { "docker": true } }).to_string()).unwrap();

    let err = ValidatedStore::<DotDeploy>::new(&path).load().unwrap_err();
    let message = err.to_string();
    assert!(message.contains(".deploy does not conform to schema"));
    assert!(message.contains("/artifacts/docker"));
}

#[test]
fn save_rejects_invalid_documents_without_writing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".deployrc.json");
    let mut store = ProfileStore::new();
    store.upsert(
        "",
        deploy_core::config::Profile {
            region: Some("us-east-1".into()),
            ..Default::default()
        },
    );

    let err = ValidatedStore::<ProfileStore>::new(&path)
        .save(&store)
        .unwrap_err();
    assert!(err.to_string().contains("profile name must not be empty"));
    assert!(!path.exists());
}
