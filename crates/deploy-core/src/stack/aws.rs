//! Stack manager backed by `aws cloudformation`.

use std::path::Path;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use super::{StackConfig, StackManager, StackParameters};
use crate::aws::{AwsCli, CliOutput};
use crate::error::StackError;

/// Largest template CloudFormation accepts inline.
const INLINE_TEMPLATE_LIMIT: u64 = 51_200;

const CAPABILITIES: [&str; 3] = [
    "CAPABILITY_IAM",
    "CAPABILITY_NAMED_IAM",
    "CAPABILITY_AUTO_EXPAND",
];

const NO_UPDATES: &str = "No updates are to be performed";

/// Drives CloudFormation through the `aws` CLI.
#[derive(Debug, Clone)]
pub struct AwsCliStackManager {
    config: StackConfig,
    cli: AwsCli,
}

impl AwsCliStackManager {
    pub fn new(config: StackConfig) -> Self {
        let cli = AwsCli::new(&config.region, config.credentials.clone());
        debug!(
            config_bucket = %config.config_bucket,
            template_bucket = %config.template_bucket,
            "stack manager configured"
        );
        Self { config, cli }
    }

    pub fn with_cli(config: StackConfig, cli: AwsCli) -> Self {
        Self { config, cli }
    }

    async fn run(&self, args: &[&str]) -> Result<CliOutput, StackError> {
        let output = self
            .cli
            .run(args)
            .await
            .map_err(|err| StackError::new(format!("failed to run aws: {}", err)))?;
        if output.success {
            Ok(output)
        } else {
            Err(StackError::new(output.stderr.clone()))
        }
    }

    /// `--template-body` for small templates, otherwise upload and use `--template-url`.
    async fn template_args(&self, stack: &str, template: &Path) -> Result<Vec<String>, StackError> {
        if template.extension().and_then(|e| e.to_str()) != Some("json") {
            return Err(StackError::new(format!(
                "{} is not a JSON template; render it to JSON before deploying",
                template.display()
            )));
        }

        let size = std::fs::metadata(template)
            .map_err(|err| StackError::new(format!("{}: {}", template.display(), err)))?
            .len();

        if size <= INLINE_TEMPLATE_LIMIT {
            return Ok(vec![
                "--template-body".to_string(),
                format!("file://{}", template.display()),
            ]);
        }

        let key = format!("{}-{}.json", stack, chrono::Utc::now().timestamp_millis());
        let destination = format!("s3://{}/{}", self.config.template_bucket, key);
        let source = template.display().to_string();
        info!("Uploading template to {}", destination);
        self.run(&["s3", "cp", &source, &destination]).await?;

        Ok(vec![
            "--template-url".to_string(),
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.config.template_bucket, self.config.region, key
            ),
        ])
    }

    async fn mutate(
        &self,
        action: &str,
        waiter: &str,
        name: &str,
        template: &Path,
        params: &StackParameters,
    ) -> Result<(), StackError> {
        let stack = self.config.stack_name(name);
        let mut args: Vec<String> = vec![
            "cloudformation".into(),
            action.into(),
            "--stack-name".into(),
            stack.clone(),
        ];
        args.extend(self.template_args(&stack, template).await?);
        args.push("--parameters".into());
        args.push(parameters_json(params));
        if !params.tags.is_empty() {
            args.push("--tags".into());
            args.push(tags_json(params));
        }
        args.push("--capabilities".into());
        args.extend(CAPABILITIES.iter().map(|c| c.to_string()));

        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        match self.run(&argv).await {
            Ok(_) => {}
            Err(err) if err.message.contains(NO_UPDATES) => {
                return Err(StackError::new(NO_UPDATES).with_change_set("UNAVAILABLE", "FAILED"));
            }
            Err(err) => return Err(err),
        }

        info!("Waiting for {} to finish", stack);
        self.run(&["cloudformation", "wait", waiter, "--stack-name", &stack])
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl StackManager for AwsCliStackManager {
    async fn create(
        &self,
        name: &str,
        template: &Path,
        params: &StackParameters,
    ) -> Result<(), StackError> {
        self.mutate("create-stack", "stack-create-complete", name, template, params)
            .await
    }

    async fn update(
        &self,
        name: &str,
        template: &Path,
        params: &StackParameters,
    ) -> Result<(), StackError> {
        self.mutate("update-stack", "stack-update-complete", name, template, params)
            .await
    }

    async fn delete(&self, name: &str) -> Result<(), StackError> {
        let stack = self.config.stack_name(name);
        self.run(&["cloudformation", "delete-stack", "--stack-name", &stack])
            .await?;
        info!("Waiting for {} to be deleted", stack);
        self.run(&[
            "cloudformation",
            "wait",
            "stack-delete-complete",
            "--stack-name",
            &stack,
        ])
        .await
        .map(|_| ())
    }

    async fn cancel(&self, name: &str) -> Result<(), StackError> {
        let stack = self.config.stack_name(name);
        self.run(&["cloudformation", "cancel-update-stack", "--stack-name", &stack])
            .await
            .map(|_| ())
    }
}

fn parameters_json(params: &StackParameters) -> String {
    let list: Vec<_> = params
        .parameters
        .iter()
        .map(|(key, value)| json!({ "ParameterKey": key, "ParameterValue": value }))
        .collect();
    serde_json::Value::Array(list).to_string()
}

fn tags_json(params: &StackParameters) -> String {
    let list: Vec<_> = params
        .tags
        .iter()
        .map(|(key, value)| json!({ "Key": key, "Value": value }))
        .collect();
    serde_json::Value::Array(list).to_string()
}
