//! # sherlock
//!
//! Ask questions about a SQLite database in plain language. Wires settings,
//! telemetry, the completion client, the database and the pipeline together.

#![deny(unsafe_code)]

mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use sherlock_core::provider::CompletionProvider;
use sherlock_core::state::PipelineState;
use sherlock_engine::chart::ChartOptions;
use sherlock_engine::{ChatSession, Pipeline, PipelineConfig};
use sherlock_llm::{OpenAiConfig, OpenAiProvider, ReliableConfig, ReliableProvider};
use sherlock_settings::SherlockSettings;
use sherlock_store::{Database, Descriptions, SchemaContextProvider, SqliteQueryTool};
use sherlock_telemetry::{init_telemetry, TelemetryConfig};

/// Natural-language questions over a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "sherlock", version, about)]
struct Cli {
    /// Settings file (defaults to `~/.sherlock/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// SQLite database (overrides settings).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a single question.
    Ask {
        question: String,

        /// Write the chart PNG here when one is produced.
        #[arg(long)]
        chart_out: Option<PathBuf>,

        /// Print the SQL and the result rows.
        #[arg(long)]
        show_work: bool,

        /// Print the answer bundle as JSON.
        #[arg(long, conflicts_with = "show_work")]
        json: bool,
    },

    /// Interactive session. Earlier turns are visible to later questions.
    Chat {
        /// Directory for chart PNGs, one file per charted turn.
        #[arg(long)]
        chart_dir: Option<PathBuf>,

        #[arg(long)]
        show_work: bool,
    },

    /// Print the schema context given to the model.
    Schema {
        /// Print reconstructed DDL for one table instead.
        #[arg(long)]
        ddl: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => sherlock_settings::load_settings_from_path(path),
        None => sherlock_settings::load_settings(),
    }
    .context("failed to load settings")?;
    if let Some(db) = &cli.db {
        settings.database.path = db.display().to_string();
    }

    let telemetry = TelemetryConfig::from_names(
        &settings.logging.level,
        settings.logging.module_levels.clone(),
        settings.logging.json,
    )?;
    init_telemetry(&telemetry)?;

    let db_path = PathBuf::from(&settings.database.path);
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    let descriptions = Descriptions::load(Path::new(&settings.database.descriptions_path))
        .context("failed to load schema descriptions")?;
    let schema = SchemaContextProvider::new(db.clone(), descriptions);

    match cli.command {
        Command::Schema { ddl: Some(table) } => {
            println!("{}", db.table_ddl(&table)?);
        }
        Command::Schema { ddl: None } => {
            println!("{}", schema.describe_schema()?);
        }
        Command::Ask {
            question,
            chart_out,
            show_work,
            json,
        } => {
            let pipeline = build_pipeline(&settings, db, &schema)?;
            let state = pipeline.run(vec![sherlock_core::Message::user_text(question)]).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&state.bundle())?);
            } else {
                output::print_turn(&state, show_work);
            }
            if let Some(path) = chart_out {
                save_chart(&state, &path)?;
            }
        }
        Command::Chat { chart_dir, show_work } => {
            let pipeline = build_pipeline(&settings, db, &schema)?;
            chat(&pipeline, chart_dir.as_deref(), show_work).await?;
        }
    }

    Ok(())
}

fn build_pipeline(
    settings: &SherlockSettings,
    db: Database,
    schema: &SchemaContextProvider,
) -> Result<Pipeline> {
    let llm = &settings.llm;
    let api_key = std::env::var(&llm.api_key_env).ok().map(SecretString::from);
    if api_key.is_none() {
        warn!(
            var = %llm.api_key_env,
            "no API key in environment, requests are sent unauthenticated"
        );
    }

    let client = OpenAiProvider::new(OpenAiConfig {
        base_url: llm.base_url.clone(),
        model: llm.model.clone(),
        api_key,
    })?;
    let provider: Arc<dyn CompletionProvider> = Arc::new(ReliableProvider::new(
        client,
        ReliableConfig {
            attempt_timeout: Duration::from_millis(llm.timeout_ms),
            max_retries: llm.max_retries,
            base_delay: Duration::from_millis(llm.base_delay_ms),
            max_delay: Duration::from_millis(llm.max_delay_ms),
            ..Default::default()
        },
    ));
    info!(model = %llm.model, base_url = %llm.base_url, "completion client ready");

    let context = schema.describe_schema().context("failed to read database schema")?;
    let pipeline = Pipeline::new(
        provider,
        Arc::new(SqliteQueryTool::new(db)),
        &context,
        PipelineConfig {
            max_generation_attempts: settings.pipeline.max_generation_attempts,
            chart: ChartOptions {
                width: settings.chart.width,
                height: settings.chart.height,
            },
        },
    )?;
    Ok(pipeline)
}

async fn chat(pipeline: &Pipeline, chart_dir: Option<&Path>, show_work: bool) -> Result<()> {
    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut turn = 0usize;

    println!("Ask a question about the data. `/clear` forgets the conversation, `/quit` exits.");
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        match question {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        turn += 1;
        let state = session.ask(pipeline, question).await?;
        output::print_turn(&state, show_work);
        if let Some(dir) = chart_dir {
            if state.chart_artifact.is_some() {
                save_chart(&state, &dir.join(format!("turn-{turn}.png")))?;
            }
        }
    }
    Ok(())
}

fn save_chart(state: &PipelineState, path: &Path) -> Result<()> {
    match &state.chart_artifact {
        Some(chart) => {
            std::fs::write(path, chart.as_bytes())
                .with_context(|| format!("failed to write chart to {}", path.display()))?;
            println!("Chart saved to {}", path.display());
        }
        None => println!("No chart for this answer."),
    }
    Ok(())
}
