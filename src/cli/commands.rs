use clap::{Parser, Subcommand};
use crate::cache::InMemoryPipelineCache;
use crate::cli::error::{user_error, validate_non_empty, validate_resource_id};
use crate::cli::output::{format_pipeline_summary, format_pipeline_table, format_project_table};
use crate::context::OpContext;
use crate::db::DbConfig;
use crate::error::StoreError;
use crate::models::{PipelineCreate, PipelineFind};
use crate::repo::{PipelineStore, ProjectRepo};
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pipestore")]
#[command(about = "Create and query pipelines")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Abort the operation after this many milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Project management commands
    Projects {
        #[command(subcommand)]
        subcommand: ProjectCommands,
    },
    /// Create a pipeline in a project
    Create {
        /// Owning project's resource id
        #[arg(long)]
        project: String,
        /// Pipeline name
        #[arg(long)]
        name: String,
        /// Id of the principal creating the pipeline
        #[arg(long)]
        creator: i64,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// List pipelines, newest first
    List {
        /// Only the pipeline with this id
        #[arg(long)]
        id: Option<i64>,
        /// Only pipelines of this project (resource id)
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long)]
        offset: Option<u64>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show a pipeline by id
    Show {
        id: i64,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a new project
    Add {
        /// Resource id used to reference the project (e.g., proj-a)
        resource_id: String,
        /// Display title, defaults to the resource id
        #[arg(long)]
        title: Option<String>,
    },
    /// List projects
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = DbConfig::load()?;
    let store = PipelineStore::open(&config, InMemoryPipelineCache::new())
        .context("Failed to connect to database")?;
    log::debug!("using database {}", config.data_location.display());

    let ctx = match cli.timeout_ms {
        Some(ms) => OpContext::with_timeout(Duration::from_millis(ms)),
        None => OpContext::new(),
    };

    match cli.command {
        Commands::Projects { subcommand } => store.with_conn(|conn| handle_projects(conn, subcommand)),
        Commands::Create { project, name, creator, json } => {
            handle_create(&store, &ctx, &project, &name, creator, json)
        }
        Commands::List { id, project, limit, offset, json } => {
            let find = PipelineFind { id, project_id: project, limit, offset };
            handle_list(&store, &ctx, &find, json)
        }
        Commands::Show { id, json } => handle_show(&store, &ctx, id, json),
    }
}

fn handle_projects(conn: &Connection, cmd: ProjectCommands) -> Result<()> {
    match cmd {
        ProjectCommands::Add { resource_id, title } => {
            if let Err(e) = validate_resource_id(&resource_id) {
                user_error(&e);
            }
            if ProjectRepo::get_by_resource_id(conn, &resource_id)?.is_some() {
                user_error(&format!("Project '{}' already exists", resource_id));
            }

            let title = title.unwrap_or_else(|| resource_id.clone());
            let project = ProjectRepo::create(conn, &resource_id, &title)?;
            println!("Created project '{}' (id: {})", project.resource_id, project.id);
            Ok(())
        }
        ProjectCommands::List { json } => {
            let projects = ProjectRepo::list(conn).context("Failed to list projects")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else {
                println!("{}", format_project_table(&projects));
            }
            Ok(())
        }
    }
}

fn handle_create(
    store: &PipelineStore<InMemoryPipelineCache>,
    ctx: &OpContext,
    project: &str,
    name: &str,
    creator: i64,
    json: bool,
) -> Result<()> {
    if let Err(e) = validate_resource_id(project) {
        user_error(&e);
    }
    if let Err(e) = validate_non_empty(name, "Pipeline name") {
        user_error(&e);
    }

    let pipeline = match store.create(ctx, &PipelineCreate::new(project, name), creator) {
        Ok(pipeline) => pipeline,
        Err(StoreError::EmptyRow { .. }) => {
            user_error(&format!("Project '{}' not found", project));
        }
        Err(err) => return Err(err).context("Failed to create pipeline"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&pipeline)?);
    } else {
        println!("Created pipeline {} '{}' in project '{}'", pipeline.id, pipeline.name, pipeline.project_id);
    }
    Ok(())
}

fn handle_list(
    store: &PipelineStore<InMemoryPipelineCache>,
    ctx: &OpContext,
    find: &PipelineFind,
    json: bool,
) -> Result<()> {
    let pipelines = store.list(ctx, find).context("Failed to list pipelines")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&pipelines)?);
    } else {
        println!("{}", format_pipeline_table(&pipelines));
    }
    Ok(())
}

fn handle_show(store: &PipelineStore<InMemoryPipelineCache>, ctx: &OpContext, id: i64, json: bool) -> Result<()> {
    let Some(pipeline) = store.get_by_id(ctx, id).context("Failed to get pipeline")? else {
        user_error(&format!("Pipeline {} not found", id));
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&pipeline)?);
    } else {
        println!("{}", format_pipeline_summary(&pipeline));
    }
    Ok(())
}

