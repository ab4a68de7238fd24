use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lakeflow_core::config::AppConfig;
use lakeflow_engine::WorkflowStore;
use lakeflow_llm::{OpenAiClient, RetryingGenerator};
use lakeflow_steps::StepRegistry;
use lakeflow_synth::{
    DialogueValidator, MockCatalog, RuleValidator, SynthesisLoop, ToolCatalog, Validator,
};

#[derive(Parser)]
#[command(name = "lakeflow", version, about = "Workflow engine for data lake ingestion")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "lakeflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a registered workflow
    Run {
        /// Workflow name
        #[arg(default_value = "standard_lake_ingestion")]
        workflow: String,
        /// Free-form ingestion request
        #[arg(long, default_value = "")]
        user_input: String,
        /// Requesting user
        #[arg(long)]
        username: Option<String>,
        /// Source database name
        #[arg(long)]
        source_db: Option<String>,
        /// Source table name
        #[arg(long)]
        source_table: Option<String>,
    },
    /// Synthesize a workflow from a natural-language requirement
    Synthesize {
        /// The requirement text
        #[arg(trailing_var_arg = true, required = true)]
        requirement: Vec<String>,
        /// Acceptance criterion; may be given multiple times
        #[arg(long = "criterion")]
        criteria: Vec<String>,
        /// Use the batch round budget instead of the interactive one
        #[arg(long)]
        batch: bool,
        /// Validate with deterministic rules instead of the tool dialogue
        #[arg(long)]
        rules: bool,
    },
    /// Validate a workflow spec file against a requirement
    Validate {
        /// Path to a JSON workflow spec
        spec: PathBuf,
        /// The requirement text
        #[arg(trailing_var_arg = true, required = true)]
        requirement: Vec<String>,
        /// Acceptance criterion; may be given multiple times
        #[arg(long = "criterion")]
        criteria: Vec<String>,
    },
    /// List available step types
    Steps,
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lakeflow=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run {
            workflow,
            user_input,
            username,
            source_db,
            source_table,
        } => {
            let store = WorkflowStore::with_defaults(&config.executor).await?;

            let mut input = serde_json::Map::new();
            input.insert("user_input".into(), serde_json::json!(user_input));
            if let Some(username) = username {
                input.insert("username".into(), serde_json::json!(username));
            }
            if let Some(db) = source_db {
                input.insert("source_db".into(), serde_json::json!(db));
            }
            if let Some(table) = source_table {
                input.insert("source_table".into(), serde_json::json!(table));
            }

            let report = store
                .execute(&workflow, input, serde_json::Map::new())
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Synthesize {
            requirement,
            criteria,
            batch,
            rules,
        } => {
            let requirement = requirement.join(" ");
            let registry = StepRegistry::with_builtins();
            let definitions = registry.definitions();

            let generator =
                RetryingGenerator::new(OpenAiClient::new(config.model.clone()), &config.model);

            let validator: Box<dyn Validator> = if rules {
                Box::new(RuleValidator::from_registry(&registry))
            } else {
                let tools = ToolCatalog::with_builtins(Arc::new(MockCatalog::with_samples()));
                let dialogue_generator =
                    RetryingGenerator::new(OpenAiClient::new(config.model.clone()), &config.model);
                Box::new(DialogueValidator::new(
                    dialogue_generator,
                    tools,
                    config.validator.max_rounds,
                ))
            };

            let max_rounds = if batch {
                config.synthesis.batch_max_rounds
            } else {
                config.synthesis.max_rounds
            };

            let synth = SynthesisLoop::new(generator, validator, definitions, max_rounds);
            let outcome = synth.run(&requirement, &criteria).await;
            info!(
                accepted = outcome.accepted,
                rounds = outcome.iterations.len(),
                "synthesis finished"
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Validate {
            spec,
            requirement,
            criteria,
        } => {
            let requirement = requirement.join(" ");
            let content = std::fs::read_to_string(&spec)?;
            let spec: lakeflow_core::WorkflowSpec = serde_json::from_str(&content)?;

            let validator = RuleValidator::from_registry(&StepRegistry::with_builtins());
            let verdict = validator.validate(&spec, &requirement, &criteria);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        Commands::Steps => {
            let registry = StepRegistry::with_builtins();
            for def in registry.definitions() {
                println!("{:<28} [{}] {}", def.name, def.category, def.description);
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
