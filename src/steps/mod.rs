//! Reasoning step records and the parser that extracts them from model output.
//!
//! Models are prompted to answer with `### Step N: <title>` headings followed
//! by a `### Final Answer:` heading. [`StepParser`] splits raw completion text
//! at those markers and degrades to a single whole-text step when none are
//! present, so it never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;


/// Canonical heading prefix for step titles.
pub const HEADING_PREFIX: &str = "### ";

/// Text that marks the concluding step.
pub const FINAL_ANSWER_MARKER: &str = "Final Answer";

/// Title of the step produced when no markers are recognized.
pub const FALLBACK_TITLE: &str = "Response";

/// Title of the step produced when every completion attempt failed.
pub const ERROR_TITLE: &str = "Error";

// A marker starts a line and its title runs to the end of that line.
static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*((?:### )?(?:Step [1-9][0-9]*:|Final Answer:)[^\n]*)")
        .expect("step marker pattern is valid")
});

/// What the pipeline does after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    /// More reasoning follows.
    Continue,
    /// The concluding step; the pipeline stops here.
    Final,
}

/// One titled reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    title: String,
    content: String,
    role: StepRole,
}

impl StepRecord {
    /// Create a step, trimming title and content.
    pub fn new(title: impl AsRef<str>, content: impl AsRef<str>, role: StepRole) -> Self {
        Self {
            title: title.as_ref().trim().to_string(),
            content: content.as_ref().trim().to_string(),
            role,
        }
    }

    /// Synthetic terminal step describing a failure.
    pub fn error(message: impl AsRef<str>) -> Self {
        Self::new(ERROR_TITLE, message, StepRole::Final)
    }

    /// Step title as it appeared in the transcript (normalized).
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Step body.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Step role.
    pub fn role(&self) -> StepRole {
        self.role
    }

    /// Whether this is the concluding step.
    pub fn is_final(&self) -> bool {
        self.role == StepRole::Final
    }

    /// Title without the heading prefix, used as a graph label.
    pub fn label(&self) -> &str {
        self.title
            .strip_prefix(HEADING_PREFIX)
            .unwrap_or(&self.title)
            .trim()
    }

    /// Text submitted to the embedding provider.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.title, self.content)
    }
}

/// Splits raw model output into [`StepRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepParser;

impl StepParser {
    /// Create a parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse raw completion text into steps in source order.
    pub fn parse(&self, raw_text: &str) -> Vec<StepRecord> {
        let markers: Vec<_> = MARKER
            .captures_iter(raw_text)
            .filter_map(|caps| caps.get(1))
            .collect();

        let mut steps = Vec::with_capacity(markers.len());
        for (i, marker) in markers.iter().enumerate() {
            let body_end = markers
                .get(i + 1)
                .map(|next| next.start())
                .unwrap_or(raw_text.len());
            let title = marker.as_str().trim();
            let body = raw_text[marker.end()..body_end].trim();

            if body.is_empty() {
                debug!(title = %title, "Dropping step with empty body");
                continue;
            }

            steps.push(classify(title, body));
        }

        if steps.is_empty() {
            debug!(
                chars = raw_text.len(),
                "No step markers recognized, using whole response"
            );
            return vec![StepRecord::new(FALLBACK_TITLE, raw_text, StepRole::Final)];
        }

        debug!(steps = steps.len(), "Parsed reasoning steps");
        steps
    }
}

fn classify(title: &str, body: &str) -> StepRecord {
    let role = if title.contains(FINAL_ANSWER_MARKER) {
        StepRole::Final
    } else {
        StepRole::Continue
    };

    if title.starts_with(HEADING_PREFIX.trim_end()) {
        StepRecord::new(title, body, role)
    } else {
        StepRecord::new(format!("{}{}", HEADING_PREFIX, title), body, role)
    }
}
