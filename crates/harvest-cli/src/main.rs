//! Harvest CLI — run capability workflows from the command line.
//!
//! Reuses the same core orchestration (harvest-core) and server bootstrap
//! (harvest-server) that back the HTTP API.

use clap::{Parser, Subcommand};

use harvest_cli::commands;

/// Harvest: dependency-graph workflows over discovery, extraction and vision services
#[derive(Parser)]
#[command(name = "harvest", version, about = "Harvest CLI — capability workflow orchestration")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(long, env = "HARVEST_DB_PATH", default_value = "harvest.db", global = true)]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Harvest HTTP server
    Server {
        /// Host to bind to
        #[arg(long, env = "HARVEST_HOST", default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, env = "HARVEST_PORT", default_value_t = 8000)]
        port: u16,
    },

    /// Run or validate workflows
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Inspect stored workflow runs
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },

    /// List registered capabilities
    Capabilities {
        /// Probe each capability service's health endpoint
        #[arg(long)]
        health: bool,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Execute a workflow file (YAML, or JSON by extension)
    Run {
        /// Path to the workflow file
        file: String,
        /// Run independent steps of the same wave concurrently
        #[arg(long)]
        parallel: bool,
        /// Store the result in the run database
        #[arg(long)]
        persist: bool,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a workflow file without executing it
    Validate {
        /// Path to the workflow file
        file: String,
    },
    /// List the built-in workflow templates
    Templates,
    /// Run a built-in workflow template
    Template {
        /// Template name (see `harvest workflow templates`)
        name: String,
        /// Template parameter as KEY=VALUE; repeatable
        #[arg(long = "param", short = 'p', value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Run independent steps of the same wave concurrently
        #[arg(long)]
        parallel: bool,
        /// Store the result in the run database
        #[arg(long)]
        persist: bool,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RunsAction {
    /// List the most recent runs
    List {
        /// Maximum number of runs to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one run as JSON
    Get {
        /// Workflow run ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    // .env.local first so it wins over .env; neither overrides the real environment
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harvest_core=info,harvest_server=info,harvest_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Server { host, port } => commands::server::run(host, port, cli.db).await,

        Commands::Workflow { action } => match commands::init_state(&cli.db) {
            Ok(state) => match action {
                WorkflowAction::Run {
                    file,
                    parallel,
                    persist,
                    json,
                } => commands::workflow::run(&state, &file, parallel, persist, json)
                    .await
                    .map(|_| ()),
                WorkflowAction::Validate { file } => {
                    commands::workflow::validate(&state, &file).await
                }
                WorkflowAction::Templates => commands::workflow::list_templates(),
                WorkflowAction::Template {
                    name,
                    params,
                    parallel,
                    persist,
                    json,
                } => match commands::workflow::parse_params(&params) {
                    Ok(params) => commands::workflow::run_template(
                        &state, &name, &params, parallel, persist, json,
                    )
                    .await
                    .map(|_| ()),
                    Err(e) => Err(e),
                },
            },
            Err(e) => Err(e),
        },

        Commands::Runs { action } => match commands::init_state(&cli.db) {
            Ok(state) => match action {
                RunsAction::List { limit } => commands::runs::list(&state, limit).await,
                RunsAction::Get { id } => commands::runs::get(&state, &id).await,
            },
            Err(e) => Err(e),
        },

        Commands::Capabilities { health } => match commands::init_state(&cli.db) {
            Ok(state) => commands::capabilities::run(&state, health).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
