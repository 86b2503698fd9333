//! Command-line interface.
//!
//! `ask` runs one query through the pipeline and prints the reasoning chain,
//! the final answer, the similarity graph and the strongest path. `models`
//! lists what the Ollama server has installed.

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::Config;
use crate::ollama::OllamaClient;
use crate::pipeline::{PipelineState, ReasoningPipeline};

/// Step-by-step reasoning with a semantic graph over the steps.
#[derive(Parser, Debug)]
#[command(name = "reasoning-graph", version, about)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Ask a question and show the reasoning chain
    Ask {
        /// The question to reason about
        query: String,

        /// Chat model (defaults to OLLAMA_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Maximum tokens to generate (512, 1024, 2048, 4096 are typical)
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List models installed on the Ollama server
    Models,
}

/// How results are printed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// The full pipeline state as JSON
    Json,
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a CLI command.
pub async fn execute_command(command: Commands, config: &Config) -> CliResult {
    let client = match OllamaClient::new(&config.ollama, config.request.clone()) {
        Ok(c) => c,
        Err(e) => return CliResult::error(format!("Failed to create Ollama client: {}", e)),
    };

    match command {
        Commands::Ask {
            query,
            model,
            max_tokens,
            format,
        } => execute_ask(client, config, &query, model, max_tokens, format).await,
        Commands::Models => execute_models(&client).await,
    }
}

async fn execute_ask(
    client: OllamaClient,
    config: &Config,
    query: &str,
    model: Option<String>,
    max_tokens: Option<u32>,
    format: OutputFormat,
) -> CliResult {
    if query.trim().is_empty() {
        return CliResult::error("Query cannot be empty");
    }

    let client = match model {
        Some(m) => Arc::new(client.with_model(m)),
        None => Arc::new(client),
    };
    let mut pipeline = ReasoningPipeline::new(client.clone(), client, config);
    if let Some(max_tokens) = max_tokens.filter(|&n| n > 0) {
        pipeline = pipeline.with_max_tokens(max_tokens);
    }

    let state = match pipeline.run_to_completion(query).await {
        Ok(s) => s,
        Err(e) => return CliResult::error(format!("Reasoning failed: {}", e)),
    };

    match format {
        OutputFormat::Text => CliResult::success(render_text(&state)),
        OutputFormat::Json => match serde_json::to_string_pretty(&state) {
            Ok(json) => CliResult::success(json),
            Err(e) => CliResult::error(format!("Failed to serialize result: {}", e)),
        },
    }
}

async fn execute_models(client: &OllamaClient) -> CliResult {
    let models = client.available_models().await;
    CliResult::success(models.join("\n"))
}

/// Plain-text rendering of a finished run.
pub fn render_text(state: &PipelineState) -> String {
    let mut out = String::new();

    let reasoning = state.reasoning_steps();
    if !reasoning.is_empty() && state.answer.is_some() {
        let _ = writeln!(out, "Reasoning");
        let _ = writeln!(out, "=========");
        for timed in reasoning {
            let _ = writeln!(out, "\n{}\n{}", timed.step.title(), timed.step.content());
        }
        let _ = writeln!(out);
    }

    match (&state.answer, state.steps.last()) {
        (Some(answer), _) => {
            let _ = writeln!(out, "Final Answer");
            let _ = writeln!(out, "============");
            let _ = writeln!(out, "{}", answer.step.content());
        }
        (None, Some(last)) => {
            for timed in &state.steps[..state.steps.len() - 1] {
                let _ = writeln!(out, "{}\n{}\n", timed.step.title(), timed.step.content());
            }
            let _ = writeln!(out, "{}", last.step.content());
        }
        (None, None) => {
            let _ = writeln!(out, "No detailed reasoning steps were provided.");
        }
    }

    let _ = writeln!(
        out,
        "\nTotal thinking time: {:.2} seconds",
        state.total_thinking_time.as_secs_f64()
    );

    if state.truncated() {
        let _ = writeln!(
            out,
            "Warning: the response was truncated at the token limit. Consider increasing --max-tokens."
        );
    }

    let _ = writeln!(
        out,
        "\nGraph: {} nodes, {} edges",
        state.graph.node_count(),
        state.graph.edges().len()
    );
    for edge in state.graph.edges() {
        let _ = writeln!(out, "  {} -- {} ({:.2})", edge.from, edge.to, edge.weight);
    }

    let labels: Vec<&str> = state
        .strongest_path
        .nodes()
        .iter()
        .filter_map(|&id| state.graph.node(id).map(|n| n.label.as_str()))
        .collect();
    if labels.is_empty() {
        let _ = writeln!(out, "Strongest path: none");
    } else {
        let _ = writeln!(out, "Strongest path: {}", labels.join(" -> "));
    }

    out
}
