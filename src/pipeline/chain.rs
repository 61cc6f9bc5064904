//! The classification-dependent stage chain for one slide.
//!
//! Two chain shapes exist, fixed by [`Classification`]:
//!
//! * **Reference** (note carries a URL and enrichment succeeded):
//!   narrate(note + page) and question-set(note + page). The narration
//!   feeds synthesis; the question set is written back to the note as a
//!   study aid.
//! * **Plain** (free text, or enrichment fell back): instruction(note),
//!   then markup(instruction output). The markup feeds synthesis and the
//!   note is cleared.
//!
//! Empty slides never reach this module.
//!
//! The chain is all-or-nothing per slide: the first stage error discards
//! everything and no partial note is written back.

use crate::config::NarrationConfig;
use crate::error::SlideError;
use crate::pipeline::generate::{run_stage, StageKind, StageOutput, TextGenerator};
use crate::pipeline::postprocess::clean_transcript;
use crate::prompts;
use std::sync::Arc;
use tracing::debug;

/// The ordered stage outputs produced for one slide, plus what goes where.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    /// Every stage output, in execution order.
    pub stages: Vec<StageOutput>,
    /// The cleaned transcript forwarded to synthesis.
    pub transcript: String,
    /// Replacement note text committed together with the artifact, if any.
    pub note_writeback: Option<String>,
}

/// Run the stage chain for one slide.
///
/// `enriched` is `Some` only when the note classified `HasReference` *and*
/// the fetch succeeded; a failed fetch falls back to the plain chain with
/// the original note, which is exactly passing `None` here.
pub async fn run_chain(
    generator: &Arc<dyn TextGenerator>,
    note: &str,
    enriched: Option<&str>,
    config: &NarrationConfig,
) -> Result<ChainOutput, SlideError> {
    match enriched {
        Some(page) => run_reference_chain(generator, note, page, config).await,
        None => run_plain_chain(generator, note, config).await,
    }
}

async fn run_reference_chain(
    generator: &Arc<dyn TextGenerator>,
    note: &str,
    page: &str,
    config: &NarrationConfig,
) -> Result<ChainOutput, SlideError> {
    let content = format!("{note}\n\n{page}");

    debug!("chain: narrate");
    let narrate = run_stage(
        generator,
        StageKind::Narrate,
        &prompts::for_stage(StageKind::Narrate, &config.voice),
        &content,
        config.max_retries,
        config.retry_backoff_ms,
    )
    .await?;

    debug!("chain: question-set");
    let questions = run_stage(
        generator,
        StageKind::QuestionSet,
        &prompts::for_stage(StageKind::QuestionSet, &config.voice),
        &content,
        config.max_retries,
        config.retry_backoff_ms,
    )
    .await?;

    let transcript = clean_transcript(&narrate.text);
    let note_writeback = Some(questions.text.clone());

    Ok(ChainOutput {
        stages: vec![narrate, questions],
        transcript,
        note_writeback,
    })
}

async fn run_plain_chain(
    generator: &Arc<dyn TextGenerator>,
    note: &str,
    config: &NarrationConfig,
) -> Result<ChainOutput, SlideError> {
    debug!("chain: instruction");
    let instruction = run_stage(
        generator,
        StageKind::Instruction,
        &prompts::for_stage(StageKind::Instruction, &config.voice),
        note,
        config.max_retries,
        config.retry_backoff_ms,
    )
    .await?;

    debug!("chain: markup");
    let markup = run_stage(
        generator,
        StageKind::Markup,
        &prompts::for_stage(StageKind::Markup, &config.voice),
        &instruction.text,
        config.max_retries,
        config.retry_backoff_ms,
    )
    .await?;

    let transcript = clean_transcript(&markup.text);

    Ok(ChainOutput {
        stages: vec![instruction, markup],
        // The narration replaces the draft note; nothing useful remains in it.
        note_writeback: Some(String::new()),
        transcript,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the stage name so tests can see which stages ran, in order.
    struct RecordingGenerator {
        calls: Mutex<Vec<StageKind>>,
        fail_on: Option<StageKind>,
    }

    impl RecordingGenerator {
        fn ok() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(stage: StageKind) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: Some(stage),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn generate(
            &self,
            stage: StageKind,
            _system_prompt: &str,
            content: &str,
        ) -> Result<String, String> {
            self.calls.lock().unwrap().push(stage);
            if self.fail_on == Some(stage) {
                return Err("model unavailable".to_string());
            }
            Ok(format!("[{stage}] {content}"))
        }
    }

    fn config() -> NarrationConfig {
        NarrationConfig::builder()
            .max_retries(0)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn plain_chain_runs_instruction_then_markup() {
        let gen = Arc::new(RecordingGenerator::ok());
        let generator: Arc<dyn TextGenerator> = gen.clone();

        let out = run_chain(&generator, "Explain caching.", None, &config())
            .await
            .unwrap();

        assert_eq!(
            *gen.calls.lock().unwrap(),
            vec![StageKind::Instruction, StageKind::Markup]
        );
        // Markup consumed the instruction output.
        assert!(out.transcript.starts_with("[markup] [instruction]"));
        assert_eq!(out.note_writeback.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn reference_chain_feeds_narration_to_synthesis() {
        let gen = Arc::new(RecordingGenerator::ok());
        let generator: Arc<dyn TextGenerator> = gen.clone();

        let out = run_chain(&generator, "see link", Some("page text"), &config())
            .await
            .unwrap();

        assert_eq!(
            *gen.calls.lock().unwrap(),
            vec![StageKind::Narrate, StageKind::QuestionSet]
        );
        assert!(out.transcript.starts_with("[narrate]"));
        assert!(out.transcript.contains("page text"));
        let writeback = out.note_writeback.unwrap();
        assert!(writeback.starts_with("[question-set]"));
    }

    #[tokio::test]
    async fn any_stage_failure_discards_the_chain() {
        let gen = Arc::new(RecordingGenerator::failing_on(StageKind::Markup));
        let generator: Arc<dyn TextGenerator> = gen.clone();

        let err = run_chain(&generator, "note", None, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, SlideError::Generation { .. }));
    }

    #[tokio::test]
    async fn question_failure_discards_the_narration_too() {
        let gen = Arc::new(RecordingGenerator::failing_on(StageKind::QuestionSet));
        let generator: Arc<dyn TextGenerator> = gen.clone();

        let err = run_chain(&generator, "note", Some("page"), &config())
            .await
            .unwrap_err();
        match err {
            SlideError::Generation { stage, .. } => assert_eq!(stage, "question-set"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
