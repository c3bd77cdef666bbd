//! `flowrunner` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — parse a flow JSON file and check its run-after graph.
//! - `run`      — execute a flow with the no-op executor bound to every
//!                declared action type, printing the report as JSON.
//!
//! This binary is a reference host: real deployments wire their own action
//! registries and connector transports around the engine crate.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use actions::{ActionExecutor, ActionRegistry, NoopExecutor};
use engine::{build_graph, FlowDefinition, FlowRunner, FlowSettings, FlowStatus};
use expressions::ValueContainer;

#[derive(Parser)]
#[command(
    name = "flowrunner",
    about = "Declarative flow execution engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a flow definition JSON file.
    Validate {
        /// Path to the flow JSON file.
        path: PathBuf,
    },
    /// Run a flow once and print its report.
    Run {
        /// Path to the flow JSON file.
        path: PathBuf,
        /// Path to a JSON file holding the trigger value (defaults to null).
        #[arg(long)]
        trigger: Option<PathBuf>,
        /// Skip actions with unregistered types instead of failing the run.
        #[arg(long)]
        lenient: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let definition = load_definition(&path)?;
            match build_graph(&definition) {
                Ok(graph) => {
                    println!("flow is valid. execution order: {:?}", graph.order());
                }
                Err(e) => {
                    eprintln!("validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Run {
            path,
            trigger,
            lenient,
        } => {
            let definition = load_definition(&path)?;

            // Bind the no-op executor to every declared type so the flow's
            // control structure can be exercised without real connectors.
            let mut registry = ActionRegistry::new();
            for (_, action) in definition.actions.iter() {
                registry.register(action.action_type.clone(), |ctx| {
                    Box::new(NoopExecutor::new(ctx)) as Box<dyn ActionExecutor>
                });
            }

            let settings = if lenient {
                FlowSettings::lenient()
            } else {
                FlowSettings::default()
            };
            let mut runner = FlowRunner::new(registry, settings);
            runner.initialize_definition(definition)?;

            let trigger_value = match trigger {
                Some(trigger_path) => {
                    let content = std::fs::read_to_string(&trigger_path).with_context(|| {
                        format!("cannot read trigger file {}", trigger_path.display())
                    })?;
                    ValueContainer::from_json_str(&content)
                        .context("trigger file is not valid JSON")?
                }
                None => ValueContainer::Null,
            };

            let report = runner.trigger(trigger_value).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.status == FlowStatus::Failed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn load_definition(path: &PathBuf) -> anyhow::Result<FlowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read flow file {}", path.display()))?;
    FlowDefinition::parse(&content).context("flow document is invalid")
}
