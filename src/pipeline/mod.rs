//! Query driver: completion → step parsing → similarity graph → strongest path.
//!
//! [`ReasoningPipeline::run`] exposes the run as a lazy stream of
//! [`PipelineState`]s. A query currently takes a single completion round, so
//! the stream yields exactly one state and that state is complete.

use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::completion::{
    CompletionBackend, CompletionOutcome, CompletionRequest, Message, RetryingCompletionClient,
    FINISH_REASON_LENGTH,
};
use crate::config::{Config, GenerationConfig, GraphConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{AppError, AppResult};
use crate::graph::{PathResult, PathScorer, ReasoningGraph, SimilarityGraphBuilder};
use crate::prompts::STEP_REASONING_PROMPT;
use crate::steps::{StepParser, StepRecord};

/// A step with its share of the completion time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedStep {
    /// The parsed step
    #[serde(flatten)]
    pub step: StepRecord,
    /// Time attributed to this step
    #[serde(with = "duration_secs")]
    pub thinking_time: Duration,
}

/// Everything produced for a query so far.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    /// Identifies the query in logs
    pub run_id: Uuid,
    /// Steps up to and including the first final step
    pub steps: Vec<TimedStep>,
    /// The final step, carrying the whole completion time
    pub answer: Option<TimedStep>,
    /// Wall time of the completion round
    #[serde(with = "duration_secs")]
    pub total_thinking_time: Duration,
    /// Finish reason of the last successful completion
    pub finish_reason: Option<String>,
    /// Completion attempts used
    pub attempts: u32,
    /// Similarity graph over the steps
    pub graph: ReasoningGraph,
    /// Strongest path from the first node to the last
    pub strongest_path: PathResult,
    /// No further states follow
    pub complete: bool,
}

impl PipelineState {
    /// Whether the model stopped at the token limit
    pub fn truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some(FINISH_REASON_LENGTH)
    }

    /// Steps before the final answer
    pub fn reasoning_steps(&self) -> &[TimedStep] {
        match self.steps.last() {
            Some(last) if last.step.is_final() => &self.steps[..self.steps.len() - 1],
            _ => &self.steps,
        }
    }
}

/// Runs one query end to end.
pub struct ReasoningPipeline {
    completion: RetryingCompletionClient,
    embedder: Arc<dyn EmbeddingProvider>,
    parser: StepParser,
    scorer: PathScorer,
    generation: GenerationConfig,
    graph_config: GraphConfig,
}

impl ReasoningPipeline {
    /// Create a pipeline from configuration and the two model seams
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &Config,
    ) -> Self {
        Self {
            completion: RetryingCompletionClient::new(backend, &config.request),
            embedder,
            parser: StepParser::new(),
            scorer: PathScorer::new(config.graph.path_cost),
            generation: config.generation.clone(),
            graph_config: config.graph.clone(),
        }
    }

    /// Override the completion token budget
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.generation.max_tokens = max_tokens;
        self
    }

    /// Messages sent for a query; earlier steps are echoed back as JSON records
    pub fn build_messages(query: &str, prior_steps: &[StepRecord]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(prior_steps.len() + 2);
        messages.push(Message::system(STEP_REASONING_PROMPT));
        messages.push(Message::user(query));
        messages.extend(prior_steps.iter().map(Message::assistant_step));
        messages
    }

    /// Lazily run the query, yielding pipeline states
    pub fn run<'a>(&'a self, query: &'a str) -> impl Stream<Item = AppResult<PipelineState>> + 'a {
        stream::once(self.run_round(query))
    }

    /// Run the query and return the last state
    pub async fn run_to_completion(&self, query: &str) -> AppResult<PipelineState> {
        let mut states = Box::pin(self.run(query));
        let mut last = None;
        while let Some(state) = states.next().await {
            last = Some(state?);
        }
        last.ok_or_else(|| AppError::Internal {
            message: "pipeline produced no state".to_string(),
        })
    }

    async fn run_round(&self, query: &str) -> AppResult<PipelineState> {
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, chars = query.len(), "Starting reasoning run");

        let request = CompletionRequest::new(
            Self::build_messages(query, &[]),
            self.generation.max_tokens,
        )
        .with_temperature(self.generation.temperature);

        let outcome = self.completion.complete(&request).await;
        let total_thinking_time = outcome.elapsed();
        let attempts = outcome.attempts();

        let (steps, finish_reason) = match outcome {
            CompletionOutcome::Completed {
                text,
                finish_reason,
                ..
            } => (self.parser.parse(&text), finish_reason),
            CompletionOutcome::Exhausted {
                error, attempts, ..
            } => {
                warn!(run_id = %run_id, attempts, error = %error, "Completion failed, emitting error step");
                let message = format!(
                    "Failed to generate step after {} attempts. Error: {}",
                    attempts, error
                );
                (vec![StepRecord::error(message)], None)
            }
        };

        if finish_reason.as_deref() == Some(FINISH_REASON_LENGTH) {
            warn!(
                run_id = %run_id,
                max_tokens = self.generation.max_tokens,
                "Response truncated at the token limit"
            );
        }

        let per_step = total_thinking_time / steps.len().max(1) as u32;
        let mut builder = SimilarityGraphBuilder::new(self.embedder.clone(), &self.graph_config);
        let mut timed = Vec::with_capacity(steps.len());
        let mut answer = None;
        let mut strongest_path = PathResult::NoPath;

        for step in steps {
            let node_id = builder.insert(&step).await?.id;
            timed.push(TimedStep {
                step: step.clone(),
                thinking_time: per_step,
            });

            if step.is_final() {
                let graph = builder.graph();
                if graph.node_count() > 1 {
                    strongest_path = self.scorer.strongest_path(graph, 1, node_id);
                }
                answer = Some(TimedStep {
                    step,
                    thinking_time: total_thinking_time,
                });
                break;
            }
        }

        let graph = builder.into_graph();
        info!(
            run_id = %run_id,
            steps = timed.len(),
            nodes = graph.node_count(),
            edges = graph.edges().len(),
            path = ?strongest_path.nodes(),
            thinking_ms = total_thinking_time.as_millis(),
            "Reasoning run finished"
        );

        Ok(PipelineState {
            run_id,
            steps: timed,
            answer,
            total_thinking_time,
            finish_reason,
            attempts,
            graph,
            strongest_path,
            complete: true,
        })
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionResponse, MessageRole};
    use crate::error::{EmbeddingError, EmbeddingResult, OllamaError, OllamaResult};
    use crate::steps::{StepRole, ERROR_TITLE};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedBackend {
        failures: u32,
        calls: AtomicU32,
        text: String,
        finish_reason: Option<String>,
    }

    impl ScriptedBackend {
        fn new(failures: u32, text: &str) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                text: text.to_string(),
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _request: &CompletionRequest) -> OllamaResult<CompletionResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(OllamaError::InvalidResponse {
                    message: "missing message.content".to_string(),
                });
            }
            Ok(CompletionResponse {
                text: self.text.clone(),
                finish_reason: self.finish_reason.clone(),
            })
        }
    }

    /// Embeds by counting a few keywords, enough to steer similarities.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            let count = |word: &str| text.matches(word).count() as f32;
            Ok(vec![count("apple"), count("pear"), count("plum"), 0.01])
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            Err(EmbeddingError::Empty { chars: text.len() })
        }
    }

    fn pipeline(
        backend: Arc<ScriptedBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> ReasoningPipeline {
        let config = Config {
            ollama: Default::default(),
            generation: GenerationConfig::default(),
            logging: crate::config::LoggingConfig {
                level: "debug".to_string(),
                format: crate::config::LogFormat::Pretty,
            },
            request: Default::default(),
            graph: GraphConfig::default(),
        };
        ReasoningPipeline::new(backend, embedder, &config)
    }

    #[test]
    fn test_build_messages() {
        let prior = vec![StepRecord::new("### Step 1: A", "B", StepRole::Continue)];
        let messages = ReasoningPipeline::build_messages("Why?", &prior);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1], Message::user("Why?"));
        assert_eq!(messages[2].role, MessageRole::Assistant);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_yields_single_complete_state() {
        let raw = "### Step 1: apple\napple apple\n\n### Step 2: pear\npear\n\n### Final Answer:\napple";
        let p = pipeline(ScriptedBackend::new(0, raw), Arc::new(KeywordEmbedder));

        let states: Vec<_> = p.run("fruit?").collect().await;
        assert_eq!(states.len(), 1);
        let state = states.into_iter().next().unwrap().unwrap();

        assert!(state.complete);
        assert_eq!(state.steps.len(), 3);
        assert_eq!(state.reasoning_steps().len(), 2);
        assert_eq!(state.answer.as_ref().unwrap().step.content(), "apple");
        assert_eq!(state.graph.node_count(), 3);
        assert_eq!(state.strongest_path.nodes(), &[1, 3]);
        assert!(state.graph.edge_between(1, 2).is_none());
        assert!(!state.truncated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_after_final_are_ignored() {
        let raw = "### Step 1: apple\napple\n### Final Answer:\napple\n### Step 9: plum\nplum";
        let p = pipeline(ScriptedBackend::new(0, raw), Arc::new(KeywordEmbedder));

        let state = p.run_to_completion("q").await.unwrap();
        assert_eq!(state.steps.len(), 2);
        assert_eq!(state.graph.node_count(), 2);
        assert!(state.answer.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_final_step_has_no_answer() {
        let raw = "### Step 1: apple\napple\n### Step 2: apple again\napple";
        let p = pipeline(ScriptedBackend::new(0, raw), Arc::new(KeywordEmbedder));

        let state = p.run_to_completion("q").await.unwrap();
        assert!(state.answer.is_none());
        assert_eq!(state.strongest_path, PathResult::NoPath);
        assert_eq!(state.reasoning_steps().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_fallback_step_skips_path() {
        let p = pipeline(
            ScriptedBackend::new(0, "Just 42."),
            Arc::new(KeywordEmbedder),
        );

        let state = p.run_to_completion("q").await.unwrap();
        assert_eq!(state.steps.len(), 1);
        assert_eq!(state.answer.as_ref().unwrap().step.role(), StepRole::Final);
        assert_eq!(state.strongest_path, PathResult::NoPath);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_completion_becomes_error_step() {
        let backend = ScriptedBackend::new(3, "unused");
        let p = pipeline(backend.clone(), Arc::new(KeywordEmbedder));

        let state = p.run_to_completion("q").await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(state.attempts, 3);
        assert_eq!(state.steps.len(), 1);

        let answer = state.answer.unwrap();
        assert_eq!(answer.step.title(), ERROR_TITLE);
        assert!(answer.step.is_final());
        assert!(answer
            .step
            .content()
            .starts_with("Failed to generate step after 3 attempts."));
        assert!(state.finish_reason.is_none());
        assert!(state.total_thinking_time >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let raw = "### Step 1: apple\napple\n### Final Answer:\napple";
        let backend = ScriptedBackend::new(2, raw);
        let p = pipeline(backend.clone(), Arc::new(KeywordEmbedder));

        let state = p.run_to_completion("q").await.unwrap();
        assert_eq!(state.attempts, 3);
        assert_eq!(state.steps.len(), 2);
        assert!(state.total_thinking_time >= Duration::from_secs(2));
        assert_eq!(state.strongest_path.nodes(), &[1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_truncation_is_surfaced() {
        let backend = Arc::new(ScriptedBackend {
            failures: 0,
            calls: AtomicU32::new(0),
            text: "### Step 1: apple\napple".to_string(),
            finish_reason: Some("length".to_string()),
        });
        let p = pipeline(backend, Arc::new(KeywordEmbedder));

        let state = p.run_to_completion("q").await.unwrap();
        assert!(state.truncated());
        assert_eq!(state.finish_reason.as_deref(), Some("length"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_embedding_failure_is_fatal() {
        let raw = "### Step 1: apple\napple\n### Final Answer:\napple";
        let p = pipeline(ScriptedBackend::new(0, raw), Arc::new(FailingEmbedder));

        let err = p.run_to_completion("q").await.unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_serializes() {
        let raw = "### Step 1: apple\napple\n### Final Answer:\napple";
        let p = pipeline(ScriptedBackend::new(0, raw), Arc::new(KeywordEmbedder));

        let state = p.run_to_completion("q").await.unwrap();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["steps"][0]["title"], "### Step 1: apple");
        assert_eq!(json["steps"][1]["role"], "final");
        assert_eq!(json["strongest_path"]["status"], "found");
        assert!(json["total_thinking_time"].is_number());
    }
}
