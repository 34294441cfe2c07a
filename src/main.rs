use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use flowtoll::config::Config;
use flowtoll::engine::Executor;
use flowtoll::telemetry::{init_tracing, LogFormat};
use flowtoll::workflow::{
    merge_params, parse_cli_params, parse_workflow_file, render_plan, serialize_workflow,
    DefinitionFormat, WorkflowDefinition,
};
use flowtoll::Error;

#[derive(Parser)]
#[command(name = "flowtoll")]
#[command(about = "Declarative pay-per-execution workflow engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a workflow definition and list every problem found
    Validate {
        /// Path to a .yaml/.yml/.json definition
        file: PathBuf,
    },
    /// Show the order steps will run in
    Plan {
        file: PathBuf,
    },
    /// Run a workflow and print the result as JSON
    Run {
        file: PathBuf,
        /// JSON input data
        #[arg(short, long)]
        input: Option<String>,
        /// Input values (key=value), applied over --input
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Config file (defaults to ~/.config/flowtoll/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Abort the run after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Re-serialize a definition in the other syntax
    Convert {
        file: PathBuf,
        #[arg(long, value_enum)]
        to: OutputSyntax,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputSyntax {
    Yaml,
    Json,
}

impl From<OutputSyntax> for DefinitionFormat {
    fn from(syntax: OutputSyntax) -> Self {
        match syntax {
            OutputSyntax::Yaml => DefinitionFormat::Yaml,
            OutputSyntax::Json => DefinitionFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::from_env());

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { file } => cmd_validate(&file)?,
        Commands::Plan { file } => cmd_plan(&file)?,
        Commands::Run {
            file,
            input,
            params,
            config,
            timeout,
        } => cmd_run(&file, input.as_deref(), &params, config.as_deref(), timeout).await?,
        Commands::Convert { file, to } => cmd_convert(&file, to)?,
    }

    Ok(())
}

fn load(file: &Path) -> anyhow::Result<WorkflowDefinition> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    match parse_workflow_file(file) {
        Ok(workflow) => Ok(workflow),
        Err(Error::Validation(errors)) => {
            eprintln!("✗ {} is invalid:", file.display());
            for violation in &errors.violations {
                eprintln!("  - {}", violation.message);
            }
            anyhow::bail!("{} violation(s) found", errors.violations.len())
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_validate(file: &Path) -> anyhow::Result<()> {
    let workflow = load(file)?;

    println!("✓ Workflow '{}' is valid", workflow.name);
    println!();
    println!("  Version: {}", workflow.version);
    println!("  Steps: {} ({})", workflow.steps.len(), workflow.step_kinds().join(", "));
    println!("  Inputs: {}", workflow.inputs.len());
    println!(
        "  Base price: {} {}",
        workflow.pricing.base_price, workflow.pricing.currency
    );
    println!("  Creator share: {}%", workflow.creator.revenue_share);

    Ok(())
}

fn cmd_plan(file: &Path) -> anyhow::Result<()> {
    let workflow = load(file)?;
    println!("Execution plan for '{}':", workflow.name);
    println!();
    println!("{}", render_plan(&workflow));
    Ok(())
}

async fn cmd_run(
    file: &Path,
    input: Option<&str>,
    params: &[String],
    config_path: Option<&Path>,
    timeout: Option<u64>,
) -> anyhow::Result<()> {
    let workflow = load(file)?;

    let mut config = match config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load(),
    };
    if let Some(seconds) = timeout {
        config.engine.run_timeout_seconds = Some(seconds);
    }

    let base_input: serde_json::Value = match input {
        Some(raw) => serde_json::from_str(raw)?,
        None => serde_json::json!({}),
    };
    let input_value = merge_params(&base_input, &parse_cli_params(params)?);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, cancelling run");
            on_interrupt.cancel();
        }
    });

    info!("Running workflow '{}'", workflow.name);
    let executor = Executor::from_config(&config);

    let result = match executor
        .execute_with_cancel(&workflow, input_value, cancel)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_json())?);
            anyhow::bail!("Run did not start: {}", e);
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        anyhow::bail!(
            "Run failed at step '{}'",
            result.failed_step.as_deref().unwrap_or("?")
        );
    }

    Ok(())
}

fn cmd_convert(file: &Path, to: OutputSyntax) -> anyhow::Result<()> {
    let workflow = load(file)?;
    let text = serialize_workflow(&workflow, to.into())?;
    print!("{}", text);
    if !text.ends_with('\n') {
        println!();
    }
    Ok(())
}
