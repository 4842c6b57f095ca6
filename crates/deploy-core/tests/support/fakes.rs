use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use deploy_core::artifacts::{ArtifactOracle, ObjectHead};
use deploy_core::credentials::{AccessKeys, CredentialProvider};
use deploy_core::error::{DeployError, Result, StackError};
use deploy_core::stack::{StackManager, StackParameters};

/// Hands out fixed keys and counts how often it was asked.
pub struct StaticCredentials {
    pub account: String,
    pub materialized: AtomicU32,
    pub missing: bool,
}

impl StaticCredentials {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            materialized: AtomicU32::new(0),
            missing: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::new("000000000000")
        }
    }

    pub fn calls(&self) -> u32 {
        self.materialized.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn materialize(&self, profile: &str) -> Result<AccessKeys> {
        self.materialized.fetch_add(1, Ordering::SeqCst);
        if self.missing {
            return Err(DeployError::Credential {
                profile: profile.to_string(),
                reason: "no keys".to_string(),
            });
        }
        Ok(AccessKeys::new(format!("AKIA{}", profile.to_uppercase()), "secret"))
    }

    async fn account_id(&self, _profile: &str, _keys: &AccessKeys, _region: &str) -> Result<String> {
        Ok(self.account.clone())
    }
}

/// Image and object lookups that succeed from a configured poll onward.
#[derive(Default)]
pub struct ScriptedOracle {
    found_on: HashMap<String, u32>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedOracle {
    pub fn found_on(mut self, artifact: &str, poll: u32) -> Self {
        self.found_on.insert(artifact.to_string(), poll);
        self
    }

    pub fn calls(&self, artifact: &str) -> u32 {
        self.calls.lock().unwrap().get(artifact).copied().unwrap_or(0)
    }

    fn lookup(&self, artifact: String) -> bool {
        let mut calls = self.calls.lock().unwrap();
        let count = calls.entry(artifact.clone()).or_default();
        *count += 1;
        self.found_on.get(&artifact).is_some_and(|poll| *count >= *poll)
    }
}

#[async_trait]
impl ArtifactOracle for ScriptedOracle {
    async fn image_exists(&self, repository: &str, tag: &str) -> Result<bool> {
        Ok(self.lookup(format!("{}:{}", repository, tag)))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        Ok(if self.lookup(format!("{}/{}", bucket, key)) {
            ObjectHead::found(2048)
        } else {
            ObjectHead::missing()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCall {
    Create(String, PathBuf, StackParameters),
    Update(String, PathBuf, StackParameters),
    Delete(String),
    Cancel(String),
}

/// Records every call and answers with a preset result.
#[derive(Default)]
pub struct RecordingStackManager {
    pub calls: Mutex<Vec<StackCall>>,
    pub failure: Option<StackError>,
}

impl RecordingStackManager {
    pub fn failing(failure: StackError) -> Self {
        Self {
            failure: Some(failure),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<StackCall> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: StackCall) -> std::result::Result<(), StackError> {
        self.calls.lock().unwrap().push(call);
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StackManager for RecordingStackManager {
    async fn create(
        &self,
        name: &str,
        template: &Path,
        params: &StackParameters,
    ) -> std::result::Result<(), StackError> {
        self.answer(StackCall::Create(
            name.to_string(),
            template.to_path_buf(),
            params.clone(),
        ))
    }

    async fn update(
        &self,
        name: &str,
        template: &Path,
        params: &StackParameters,
    ) -> std::result::Result<(), StackError> {
        self.answer(StackCall::Update(
            name.to_string(),
            template.to_path_buf(),
            params.clone(),
        ))
    }

    async fn delete(&self, name: &str) -> std::result::Result<(), StackError> {
        self.answer(StackCall::Delete(name.to_string()))
    }

    async fn cancel(&self, name: &str) -> std::result::Result<(), StackError> {
        self.answer(StackCall::Cancel(name.to_string()))
    }
}
