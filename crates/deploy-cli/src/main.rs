//! Deploy - gated CloudFormation deployments
//!
//! Usage:
//!   deploy create <stack>   # Create a stack once artifacts exist
//!   deploy update <stack>   # Update a stack
//!   deploy delete <stack>   # Delete a stack
//!   deploy cancel <stack>   # Cancel an in-progress update
//!   deploy env              # Print AWS_* exports for the profile
//!   deploy init             # Add a profile to ~/.deployrc.json

mod interactive;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deploy_core::artifacts::{ArtifactGate, AwsCliOracle};
use deploy_core::commands::{MutateCommand, Mutation, env_exports, init_profile};
use deploy_core::config::default_store_path;
use deploy_core::context::{CliFlags, Context, ContextResolver};
use deploy_core::credentials::SharedCredentialsProvider;
use deploy_core::error::{Phase, PhaseError};
use deploy_core::git::Git2Oracle;
use deploy_core::release::{ReleaseController, StatusPolicy};
use deploy_core::stack::AwsCliStackManager;
use deploy_core::template::TemplateRequest;

use crate::interactive::{InitWizard, PrefilledInit, prompt_tag_values};

#[derive(Parser)]
#[command(name = "deploy", version)]
#[command(about = "Gate CloudFormation deployments on build artifacts and GitHub status", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Profile in ~/.deployrc.json
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Override the region to perform operations in
    #[arg(long, global = true)]
    region: Option<String>,

    /// GitHub token for deployment records
    #[arg(long, global = true, env = "DEPLOY_GITHUB_TOKEN", hide_env_values = true)]
    github: Option<String>,

    /// Do not create or update GitHub deployments
    #[arg(long = "no-github", global = true)]
    no_github: bool,

    /// Print the full error chain and debug logs
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new stack
    Create(MutateArgs),
    /// Update an existing stack of the current repo
    Update(MutateArgs),
    /// Delete a stack
    Delete(MutateArgs),
    /// Cancel an in-progress stack update
    Cancel(MutateArgs),
    /// Print AWS_ environment exports for the current shell
    Env,
    /// Setup a profile with AWS credentials
    Init,
}

#[derive(Args)]
struct MutateArgs {
    /// Stack to operate on, with or without the repo prefix
    stack: Option<String>,

    /// Override the stack name
    #[arg(long)]
    name: Option<String>,

    /// Template to deploy instead of cloudformation/<repo>.template.json
    #[arg(long, short)]
    template: Option<PathBuf>,

    /// Continue when GitHub status checks or deployment records fail
    #[arg(long, short)]
    force: bool,

    /// Seconds between GitHub status check polls
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    status_interval: u64,

    /// Minutes to wait for GitHub status checks
    #[arg(
        long,
        value_name = "MINUTES",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    status_timeout: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = cli.global.debug;
    init_tracing(debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if debug {
                eprintln!("{:?}", err);
            } else {
                eprintln!("{}", err);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        tracing_subscriber::EnvFilter::new("deploy_cli=debug,deploy_core=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "deploy_cli=info,deploy_core=info".into())
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let global = cli.global;
    match cli.command {
        Commands::Create(args) => run_mutation(Mutation::Create, &global, args).await,
        Commands::Update(args) => run_mutation(Mutation::Update, &global, args).await,
        Commands::Delete(args) => run_mutation(Mutation::Delete, &global, args).await,
        Commands::Cancel(args) => run_mutation(Mutation::Cancel, &global, args).await,
        Commands::Env => run_env(&global).await,
        Commands::Init => run_init(&global),
    }
}

async fn run_mutation(mutation: Mutation, global: &GlobalArgs, args: MutateArgs) -> Result<()> {
    if args.stack.is_none() && args.name.is_none() {
        anyhow::bail!("Stack name required: run deploy {} --help", mutation);
    }

    let template = if !mutation.deploys() {
        TemplateRequest::Skip
    } else {
        match args.template {
            Some(path) => TemplateRequest::Explicit(path),
            None => TemplateRequest::Discover,
        }
    };
    let flags = CliFlags {
        stack: args.stack,
        name: args.name,
        profile: global.profile.clone(),
        region: global.region.clone(),
        template,
        github: global.github.clone(),
        disable_github: global.no_github,
        force: args.force,
    };

    let mut context = resolve_context(&flags).await?;
    if mutation.deploys() {
        prompt_tag_values(&mut context.tags)?;
    }
    debug!(?context, "resolved context");
    info!(
        "[{}] {} {} at {}",
        context.profile,
        mutation,
        context.full_stack_name(),
        context.sha
    );

    let gate = ArtifactGate::new(AwsCliOracle::for_context(&context));
    let release = ReleaseController::new(&context)
        .map_err(|err| PhaseError::new(Phase::Deployment, err))?
        .with_policy(StatusPolicy {
            interval: Duration::from_secs(args.status_interval),
            timeout: Duration::from_secs(args.status_timeout.saturating_mul(60)),
        });
    let manager = AwsCliStackManager::new(context.stack_config());

    let report = MutateCommand::new(&context, &gate, &release, &manager)
        .run(mutation)
        .await?;

    if report.unchanged {
        println!("ok - {} {} (no changes)", report.mutation, report.stack);
    } else {
        println!("ok - {} {}", report.mutation, report.stack);
    }
    Ok(())
}

async fn run_env(global: &GlobalArgs) -> Result<()> {
    let flags = CliFlags {
        profile: global.profile.clone(),
        region: global.region.clone(),
        disable_github: true,
        ..Default::default()
    };
    let context = resolve_context(&flags).await?;

    for line in env_exports(&context) {
        println!("{}", line);
    }
    eprintln!("ok - [{}] environment configured", context.profile);
    Ok(())
}

fn run_init(global: &GlobalArgs) -> Result<()> {
    let mut wizard = InitWizard::new(PrefilledInit {
        profile: global.profile.clone(),
        region: global.region.clone(),
    });
    let options = wizard.collect()?;
    let report = init_profile(&default_store_path()?, options)?;

    let verb = if report.created { "added" } else { "updated" };
    println!(
        "ok - profile {} {} in {}",
        report.profile,
        verb,
        report.path.display()
    );
    Ok(())
}

async fn resolve_context(flags: &CliFlags) -> Result<Context, PhaseError> {
    resolve_in_current_dir(flags)
        .await
        .map_err(|err| PhaseError::new(Phase::Context, err))
}

async fn resolve_in_current_dir(flags: &CliFlags) -> deploy_core::error::Result<Context> {
    let working_dir = std::env::current_dir()?;
    let git = Git2Oracle::discover(&working_dir)?;
    let provider = SharedCredentialsProvider::new();
    let store_path = default_store_path()?;
    ContextResolver::new(&git, &provider, working_dir, store_path)
        .resolve(flags)
        .await
}
