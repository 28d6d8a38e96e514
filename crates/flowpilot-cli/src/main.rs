//! Flowpilot CLI — run, validate and serve multi-step agent workflows.
//!
//! Reuses the same core domain logic (flowpilot-core) and server bootstrap
//! (flowpilot-server) that power the HTTP API.

use clap::{Parser, Subcommand};

use flowpilot_cli::commands::{self, StateOptions};

/// Flowpilot — Workflow execution engine for multi-step agent pipelines
#[derive(Parser)]
#[command(name = "flowpilot", version, about = "Flowpilot — workflow execution engine for multi-step agent pipelines")]
pub struct Cli {
    /// Caller identity recorded on created executions
    #[arg(long, global = true, env = "FLOWPILOT_USER")]
    user: Option<String>,

    /// Directory of YAML workflow definitions to preload
    #[arg(long, global = true, env = "FLOWPILOT_WORKFLOWS_DIR")]
    workflows_dir: Option<String>,

    /// Directory of YAML workflow templates to add to the catalog
    #[arg(long, global = true, env = "FLOWPILOT_TEMPLATES_DIR")]
    templates_dir: Option<String>,

    /// Fail steps whose input references a missing context key
    #[arg(long, global = true)]
    strict_templates: bool,

    /// API key for the Anthropic-compatible model API (enables model-backed agents)
    #[arg(long, global = true, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the model API
    #[arg(long, global = true, env = "ANTHROPIC_BASE_URL")]
    base_url: Option<String>,

    /// Model id used by model-backed agents
    #[arg(long, global = true, env = "ANTHROPIC_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Flowpilot HTTP server
    Server {
        /// Host to bind to
        #[arg(long, env = "FLOWPILOT_HOST", default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, env = "FLOWPILOT_PORT", default_value_t = 3220)]
        port: u16,
    },

    /// Run and validate YAML-defined workflows
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// List and run workflow templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Inspect agent types
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },

    /// Inspect and invoke tools
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Run a workflow from a YAML file
    Run {
        /// Path to the workflow YAML file
        file: String,
        /// Execution input as a JSON string
        #[arg(long)]
        input: Option<String>,
        /// Caller context entries (key=value, repeatable)
        #[arg(long = "context", short = 'c')]
        context: Vec<String>,
        /// Print the full execution record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a workflow YAML file without executing it
    Validate {
        /// Path to the workflow YAML file
        file: String,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// List available workflow templates
    List,
    /// Instantiate a template and run it
    Run {
        /// Template ID (e.g. "research-report")
        id: String,
        /// Template parameters (key=value, repeatable)
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
        /// Print the full execution record as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum AgentAction {
    /// List registered agent types
    Types,
}

#[derive(Subcommand)]
enum ToolAction {
    /// List registered tools
    List,
    /// Invoke a tool directly
    Run {
        /// Tool name
        name: String,
        /// Tool input as a JSON string
        #[arg(long, default_value = "{}")]
        input: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env / .env.local before clap reads env fallbacks
    let env_files = commands::load_dotenv(commands::DOTENV_FILES);

    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowpilot_core=warn,flowpilot_server=info,flowpilot_cli=info".into()),
        )
        .init();

    for filename in env_files {
        tracing::info!("Loaded environment from '{}'", filename);
    }

    let options = StateOptions {
        workflows_dir: cli.workflows_dir.clone(),
        templates_dir: cli.templates_dir.clone(),
        strict_templates: cli.strict_templates,
        model: commands::model_config(cli.api_key.clone(), cli.base_url.clone(), cli.model.clone()),
    };

    let result = match cli.command {
        Some(Commands::Server { host, port }) => commands::server::run(host, port, &options).await,
        Some(command) => match commands::init_state(&options).await {
            Ok(state) => match command {
                Commands::Workflow { action } => match action {
                    WorkflowAction::Run {
                        file,
                        input,
                        context,
                        json,
                    } => {
                        match (
                            commands::parse_json_arg(input.as_deref()),
                            commands::parse_key_values(&context),
                        ) {
                            (Ok(input), Ok(context)) => {
                                commands::workflow::run(&state, &file, input, context, cli.user, json).await
                            }
                            (Err(e), _) | (_, Err(e)) => Err(e),
                        }
                    }
                    WorkflowAction::Validate { file } => {
                        commands::workflow::validate(&state, &file).map(|_| ())
                    }
                },

                Commands::Template { action } => match action {
                    TemplateAction::List => commands::template::list(&state).await,
                    TemplateAction::Run { id, params, json } => {
                        match commands::parse_key_values(&params) {
                            Ok(params) => {
                                commands::template::run(&state, &id, &params, cli.user, json).await
                            }
                            Err(e) => Err(e),
                        }
                    }
                },

                Commands::Agent { action } => match action {
                    AgentAction::Types => commands::agent::list_types(&state).await,
                },

                Commands::Tool { action } => match action {
                    ToolAction::List => commands::tool::list(&state).await,
                    ToolAction::Run { name, input } => match commands::parse_json_arg(Some(&input)) {
                        Ok(input) => commands::tool::run(&state, &name, input).await,
                        Err(e) => Err(e),
                    },
                },

                Commands::Server { .. } => unreachable!("handled above"),
            },
            Err(e) => Err(e),
        },
        None => {
            // No subcommand — show help
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
