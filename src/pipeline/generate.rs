//! Stage execution: call the text-generation capability with retry.
//!
//! This module is intentionally thin — all prompt engineering lives in
//! [`crate::prompts`] so it can change without touching retry or
//! error-handling logic here.
//!
//! ## Retry Strategy
//!
//! Rate-limit and 5xx errors from LLM APIs are transient and frequent.
//! Exponential backoff (`retry_backoff_ms * 2^attempt`) keeps the wait
//! sequence short: with 500 ms base and 3 retries it is 500 ms → 1 s → 2 s.
//! A stage that still fails after the last retry fails the whole slide —
//! the chain is all-or-nothing.

use crate::error::SlideError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// The named transformation stages a slide's note can pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// Brief spoken discussion of a plain note.
    Instruction,
    /// Spoken explanation of enriched reference content.
    Narrate,
    /// Study-aid question set, written back to the note.
    QuestionSet,
    /// SSML markup of a spoken transcript.
    Markup,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Instruction => "instruction",
            StageKind::Narrate => "narrate",
            StageKind::QuestionSet => "question-set",
            StageKind::Markup => "markup",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One named stage output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    pub stage: StageKind,
    pub text: String,
}

/// The text-generation capability, opaque to the pipeline.
///
/// The bundled implementation is [`LlmGenerator`]; tests substitute fakes.
/// Errors are plain detail strings — the stage runner attaches stage name
/// and retry count when it gives up.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        stage: StageKind,
        system_prompt: &str,
        content: &str,
    ) -> Result<String, String>;
}

/// [`TextGenerator`] backed by an `edgequake_llm` provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(
        &self,
        stage: StageKind,
        system_prompt: &str,
        content: &str,
    ) -> Result<String, String> {
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(content),
        ];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| e.to_string())?;

        debug!(
            "Stage {}: {} input tokens, {} output tokens",
            stage, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Run one stage with retry and exponential backoff.
///
/// Returns [`SlideError::Generation`] once all retries are exhausted; the
/// caller discards the slide's whole pipeline result in that case.
pub async fn run_stage(
    generator: &Arc<dyn TextGenerator>,
    stage: StageKind,
    system_prompt: &str,
    content: &str,
    max_retries: u32,
    retry_backoff_ms: u64,
) -> Result<StageOutput, SlideError> {
    let mut last_err: Option<String> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Stage {}: retry {}/{} after {}ms",
                stage, attempt, max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match generator.generate(stage, system_prompt, content).await {
            Ok(text) => {
                return Ok(StageOutput { stage, text });
            }
            Err(detail) => {
                warn!("Stage {}: attempt {} failed — {}", stage, attempt + 1, detail);
                last_err = Some(detail);
            }
        }
    }

    Err(SlideError::Generation {
        stage: stage.name().to_string(),
        retries: max_retries,
        detail: last_err.unwrap_or_else(|| "unknown error".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyGenerator {
        calls: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait]
    impl TextGenerator for FlakyGenerator {
        async fn generate(
            &self,
            _stage: StageKind,
            _system_prompt: &str,
            _content: &str,
        ) -> Result<String, String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.succeed_on {
                Ok(format!("output after {n} calls"))
            } else {
                Err("HTTP 429".to_string())
            }
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let gen: Arc<dyn TextGenerator> = Arc::new(FlakyGenerator {
            calls: AtomicU32::new(0),
            succeed_on: 3,
        });
        let out = run_stage(&gen, StageKind::Narrate, "sys", "content", 3, 1)
            .await
            .expect("should eventually succeed");
        assert_eq!(out.stage, StageKind::Narrate);
        assert!(out.text.contains("3 calls"));
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_stage() {
        let gen: Arc<dyn TextGenerator> = Arc::new(FlakyGenerator {
            calls: AtomicU32::new(0),
            succeed_on: u32::MAX,
        });
        let err = run_stage(&gen, StageKind::Markup, "sys", "content", 2, 1)
            .await
            .unwrap_err();
        match err {
            SlideError::Generation { stage, retries, detail } => {
                assert_eq!(stage, "markup");
                assert_eq!(retries, 2);
                assert!(detail.contains("429"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stage_names_are_kebab_case() {
        assert_eq!(StageKind::QuestionSet.name(), "question-set");
        assert_eq!(StageKind::Instruction.to_string(), "instruction");
    }
}
