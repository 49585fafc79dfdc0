// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use wml_connector::config::{self, Config};
use wml_connector::connector::{
    CloudConnector, Connector, Deployment, DeploymentSpace, JobSummary, ModelAsset, ModelType,
    Runtime, TShirtSize,
};
use wml_connector::job::{DataReference, Job, JobRequest};
use wml_connector::logging::init_logging;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.toml",
        global = true
    )]
    config: String,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get or create a deployment
    Deploy {
        /// Deployment (and model) name
        #[arg(long)]
        name: String,

        /// Deploy a constraint-programming model instead of a CPLEX one
        #[arg(long)]
        cpo: bool,

        /// Model archive to upload; without it an empty model is deployed
        #[arg(long, value_name = "FILE")]
        model: Option<PathBuf>,

        /// Runtime for an uploaded model, e.g. do_22.1
        #[arg(long)]
        runtime: Option<Runtime>,

        /// Model type for an uploaded model: cplex, cpo, opl or docplex
        #[arg(long = "type")]
        model_type: Option<ModelType>,

        #[arg(long, default_value = "S")]
        size: TShirtSize,

        #[arg(long, default_value_t = 1)]
        nodes: u32,
    },
    /// Submit model files to a deployment
    Solve {
        /// Deployment id
        #[arg(long, conflicts_with = "name")]
        deployment: Option<String>,

        /// Deployment name, created if missing
        #[arg(long)]
        name: Option<String>,

        /// Use a constraint-programming deployment when creating one by name
        #[arg(long)]
        cpo: bool,

        /// Poll until the job finishes
        #[arg(long)]
        wait: bool,

        /// Files sent inline as job inputs
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the spaces, and the models, deployments and jobs of the working space
    List,
    /// Delete every job, deployment and model in the working space
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };

    let _log_guard = init_logging(config.logging.as_ref(), cli.verbose)?;

    info!("Decision-optimization connector v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config);

    let connector = match connect(&config).await {
        Ok(connector) => connector,
        Err(e) => {
            error!("Failed to connect: {:#}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Deploy {
            name,
            cpo,
            model,
            runtime,
            model_type,
            size,
            nodes,
        } => {
            let model = model.map(|path| (path, runtime, model_type));
            deploy(&connector, &name, cpo, model, size, nodes).await
        }
        Commands::Solve {
            deployment,
            name,
            cpo,
            wait,
            files,
        } => solve(&connector, &config, deployment, name, cpo, wait, &files).await,
        Commands::List => list(&connector).await,
        Commands::Clean => clean(&connector).await,
    };

    connector.end().await;

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }

    Ok(())
}

async fn connect(config: &Config) -> Result<CloudConnector> {
    let credentials = config
        .credentials()
        .context("Invalid [credentials] section")?;
    let connector =
        CloudConnector::connect(Arc::new(credentials), config.connector_settings()).await?;
    let space_id = connector.space_id().await?;
    info!("Working in deployment space {}", space_id);
    Ok(connector)
}

async fn deploy(
    connector: &CloudConnector,
    name: &str,
    cpo: bool,
    model: Option<(PathBuf, Option<Runtime>, Option<ModelType>)>,
    size: TShirtSize,
    nodes: u32,
) -> Result<()> {
    let deployment_id = match model {
        None => connector.get_or_make_deployment(name, !cpo).await?,
        Some((path, runtime, model_type)) => {
            let model_type = model_type.unwrap_or(if cpo { ModelType::Cpo } else { ModelType::Cplex });
            let model_id = connector
                .create_new_model(
                    name,
                    runtime.unwrap_or_else(Runtime::latest),
                    model_type,
                    Some(path.as_path()),
                    None,
                )
                .await?;
            connector.deploy_model(name, &model_id, size, nodes).await?
        }
    };

    println!("{}", deployment_id);
    Ok(())
}

fn inline_input(path: &Path) -> Result<DataReference> {
    let id = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(DataReference::inline_bytes(id, content))
}

async fn solve(
    connector: &CloudConnector,
    config: &Config,
    deployment: Option<String>,
    name: Option<String>,
    cpo: bool,
    wait: bool,
    files: &[PathBuf],
) -> Result<()> {
    let deployment_id = match (deployment, name) {
        (Some(id), _) => id,
        (None, Some(name)) => connector.get_or_make_deployment(&name, !cpo).await?,
        (None, None) => anyhow::bail!("Either --deployment or --name is required"),
    };

    let request = files
        .iter()
        .map(|path| inline_input(path.as_path()))
        .try_fold(JobRequest::new(&deployment_id), |request, input| {
            input.map(|input| request.with_input(input))
        })?;

    let mut job = connector.create_and_run_job(&request).await?;
    println!("Job {} is {}", job.id(), job.state());

    if !wait {
        return Ok(());
    }

    let state = job.wait_for_completion(&config.polling).await?;
    print_outcome(job.as_ref());
    info!("Job {} finished as {}", job.id(), state);
    Ok(())
}

fn print_outcome(job: &dyn Job) {
    println!("Job {} is {}", job.id(), job.state());
    if let Some(status) = job.solve_status() {
        println!("Solve status: {}", status);
    }
    for (name, value) in job.kpis() {
        println!("KPI {} = {}", name, value);
    }
    if let Some(failure) = job.failure() {
        println!("{}", failure);
    }
    if let Some(log) = job.log() {
        println!("{}", log);
    }
}

#[derive(Serialize)]
struct SpaceListing {
    spaces: Vec<DeploymentSpace>,
    models: Vec<ModelAsset>,
    deployments: Vec<Deployment>,
    jobs: Vec<JobSummary>,
}

async fn list(connector: &CloudConnector) -> Result<()> {
    let listing = SpaceListing {
        spaces: connector.list_deployment_spaces().await?,
        models: connector.list_models().await?,
        deployments: connector.list_deployments().await?,
        jobs: connector.list_jobs().await?,
    };
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

async fn clean(connector: &CloudConnector) -> Result<()> {
    info!("Cleaning the working deployment space...");

    let report = connector.clean_space().await?;

    info!(
        "Deleted {} jobs, {} deployments and {} models",
        report.jobs, report.deployments, report.models
    );
    Ok(())
}
