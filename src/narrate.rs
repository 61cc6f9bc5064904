//! Narration entry points: orchestrate the per-slide pipeline over a deck.
//!
//! ## Processing model
//!
//! Slides are processed strictly in ascending order, one at a time. Each
//! slide runs the full classify → enrich → generate → synthesize → bind
//! sequence before the next slide starts, and the document is persisted
//! after every bound slide. A crash mid-run therefore loses at most the
//! slide in flight; everything before it is already on disk, and a
//! `resume = true` re-run picks up where the crash happened.
//!
//! Slide failures are contained: every error below the deck level is caught
//! at the per-slide boundary, recorded in the run output, and the next slide
//! proceeds.

use crate::binder::{bind_and_persist, SlideBinding};
use crate::config::{NarrationConfig, OutputSink};
use crate::deck::{DeckContainer, MediaArtifact};
use crate::error::{SlideError, SlidecastError};
use crate::output::{NarrationOutput, SlideResult};
use crate::pipeline::chain::{run_chain, ChainOutput};
use crate::pipeline::content::{classify, Classification};
use crate::pipeline::enrich::{HttpPageFetcher, PageFetcher};
use crate::pipeline::generate::{LlmGenerator, TextGenerator};
use crate::synthesis::{HttpSynthesisBackend, SpeechSynthesizer, SynthesisJobClient};
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Narrate a deck and write the updated document to `output_path`.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `deck`        — the deck container to read notes from and bind media to
/// * `output_path` — where the updated document is persisted after each slide
/// * `config`      — narration configuration
///
/// # Returns
/// `Ok(NarrationOutput)` on success, even if some slides failed
/// (check `output.stats().failed`).
///
/// # Errors
/// Returns `Err(SlidecastError)` only for fatal errors:
/// - No text-generation provider could be resolved
/// - Synthesis credentials missing (video sink) or no synthesizer (audio sink)
/// - The slide selection matches no slides
pub async fn narrate(
    deck: &mut dyn DeckContainer,
    output_path: impl AsRef<Path>,
    config: &NarrationConfig,
) -> Result<NarrationOutput, SlidecastError> {
    let output_path = output_path.as_ref();
    let total_start = Instant::now();
    info!("Starting narration run, output: {}", output_path.display());

    // ── Step 1: Compute slide selection ──────────────────────────────────
    let selected = config.slides.to_slide_numbers(deck.slide_count());
    if selected.is_empty() {
        return Err(SlidecastError::InvalidConfig(format!(
            "slide selection matches none of the deck's {} slides",
            deck.slide_count()
        )));
    }
    debug!("Selected {} of {} slides", selected.len(), deck.slide_count());

    // ── Step 2: Resolve collaborators ────────────────────────────────────
    let generator = resolve_generator(config).await?;
    let fetcher = resolve_fetcher(config)?;
    let sink = resolve_sink(config)?;

    let total = selected.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    // ── Step 3: Process slides in order ──────────────────────────────────
    let mut results = Vec::with_capacity(total);
    for (i, &slide_num) in selected.iter().enumerate() {
        let slide_start = Instant::now();
        let note = deck.note_text(slide_num).unwrap_or_default();
        let content = classify(&note);
        let kind = content.classification.kind().to_string();

        if config.resume
            && deck
                .slide(slide_num)
                .is_some_and(|s| s.artifact.is_some())
        {
            info!("Slide {}: existing artifact, skipping (resume)", slide_num);
            if let Some(ref cb) = config.progress_callback {
                cb.on_slide_skipped(slide_num, total, "existing artifact");
            }
            results.push(SlideResult {
                slide_num,
                content_kind: kind,
                job_id: None,
                duration_ms: 0,
                skipped: Some("existing artifact".into()),
                error: None,
            });
            continue;
        }

        if content.is_empty() {
            info!("Slide {}: empty note, skipping", slide_num);
            if let Some(ref cb) = config.progress_callback {
                cb.on_slide_skipped(slide_num, total, "empty note");
            }
            results.push(SlideResult {
                slide_num,
                content_kind: kind,
                job_id: None,
                duration_ms: 0,
                skipped: Some("empty note".into()),
                error: None,
            });
            continue;
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_slide_start(slide_num, total);
        }
        info!("Slide {} ({}/{}): {}", slide_num, i + 1, total, kind);

        let outcome =
            process_slide(deck, slide_num, &content.raw, &content.classification, &generator, &fetcher, &sink, output_path, config)
                .await;
        let duration_ms = slide_start.elapsed().as_millis() as u64;

        match outcome {
            Ok(job_id) => {
                info!("Slide {}: completed in {}ms", slide_num, duration_ms);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_slide_complete(slide_num, total, job_id.as_deref().unwrap_or(""));
                }
                results.push(SlideResult {
                    slide_num,
                    content_kind: kind,
                    job_id,
                    duration_ms,
                    skipped: None,
                    error: None,
                });
            }
            Err(e) => {
                warn!("Slide {}: failed ({}) — {}", slide_num, e.kind(), e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_slide_error(slide_num, total, &e.to_string());
                }
                results.push(SlideResult {
                    slide_num,
                    content_kind: kind,
                    job_id: job_id_of(&e),
                    duration_ms,
                    skipped: None,
                    error: Some(e),
                });
            }
        }
    }

    let completed = results.iter().filter(|r| r.is_completed()).count();
    info!(
        "Narration complete: {}/{} slides, {}ms total",
        completed,
        total,
        total_start.elapsed().as_millis()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, completed);
    }

    Ok(NarrationOutput {
        output_path: output_path.to_path_buf(),
        slides: results,
    })
}

/// Per-slide pipeline: enrich, generate, synthesize, bind, persist.
///
/// Any `Err` here leaves the slide exactly as it was; mutation happens only
/// inside [`bind_and_persist`], which rolls back on failure.
#[allow(clippy::too_many_arguments)]
async fn process_slide(
    deck: &mut dyn DeckContainer,
    slide_num: usize,
    note: &str,
    classification: &Classification,
    generator: &Arc<dyn TextGenerator>,
    fetcher: &Arc<dyn PageFetcher>,
    sink: &ResolvedSink,
    output_path: &Path,
    config: &NarrationConfig,
) -> Result<Option<String>, SlideError> {
    // Enrichment failure is non-fatal: fall back to the plain chain.
    let enriched = match classification {
        Classification::HasReference(url) => match fetcher.fetch_and_extract(url).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Slide {}: enrichment failed, falling back to plain text — {}", slide_num, e);
                None
            }
        },
        _ => None,
    };

    let chain: ChainOutput = run_chain(generator, note, enriched.as_deref(), config).await?;
    debug!(
        "Slide {}: transcript ready ({} chars, {} stages)",
        slide_num,
        chain.transcript.len(),
        chain.stages.len()
    );

    let (job_id, artifact, auto_play) = match sink {
        ResolvedSink::Video(client) => {
            let (job, artifact) = client.run(&chain.transcript, config).await?;
            (Some(job.id), artifact, true)
        }
        ResolvedSink::Audio(speech) => {
            let artifact = synthesize_audio(speech, slide_num, &chain.transcript, config).await?;
            (None, artifact, false)
        }
    };

    let binding = SlideBinding {
        slide_num,
        artifact: &artifact,
        note_writeback: chain.note_writeback.as_deref(),
        geometry: config.geometry,
        auto_play,
    };
    bind_and_persist(deck, &binding, output_path)?;

    Ok(job_id)
}

async fn synthesize_audio(
    speech: &Arc<dyn SpeechSynthesizer>,
    slide_num: usize,
    transcript: &str,
    config: &NarrationConfig,
) -> Result<MediaArtifact, SlideError> {
    let name = format!("slide-{slide_num}");
    let dest = config.media_dir.join(format!("{name}.mp3"));
    speech.synthesize(transcript, &config.voice, &dest).await?;

    let len = std::fs::metadata(&dest)
        .map_err(|e| SlideError::Download {
            job_id: name.clone(),
            reason: format!("synthesized file unreadable: {e}"),
        })?
        .len();
    Ok(MediaArtifact {
        path: dest,
        mime: "audio/mpeg".to_string(),
        len,
    })
}

fn job_id_of(e: &SlideError) -> Option<String> {
    match e {
        SlideError::Submission { job_id, .. }
        | SlideError::StatusQuery { job_id, .. }
        | SlideError::NotReady { job_id, .. }
        | SlideError::SynthesisFailed { job_id }
        | SlideError::Timeout { job_id, .. }
        | SlideError::Download { job_id, .. } => Some(job_id.clone()),
        _ => None,
    }
}

// ── Inspection ───────────────────────────────────────────────────────────

/// Per-slide summary produced by [`inspect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideInfo {
    pub number: usize,
    pub title: String,
    pub content_kind: String,
    pub note_chars: usize,
    pub has_artifact: bool,
}

/// What a deck contains, without running any pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckSummary {
    pub slide_count: usize,
    pub slides: Vec<SlideInfo>,
}

/// Summarise a deck's notes without narrating.
///
/// Does not require a provider, credentials, or network access.
pub fn inspect(deck: &dyn DeckContainer) -> DeckSummary {
    let slides = (1..=deck.slide_count())
        .map(|n| {
            let note = deck.note_text(n).unwrap_or_default();
            let content = classify(&note);
            SlideInfo {
                number: n,
                title: deck.slide(n).map(|s| s.title.clone()).unwrap_or_default(),
                content_kind: content.classification.kind().to_string(),
                note_chars: note.chars().count(),
                has_artifact: deck.slide(n).is_some_and(|s| s.artifact.is_some()),
            }
        })
        .collect();
    DeckSummary {
        slide_count: deck.slide_count(),
        slides,
    }
}

// ── Collaborator resolution ──────────────────────────────────────────────

enum ResolvedSink {
    Video(SynthesisJobClient),
    Audio(Arc<dyn SpeechSynthesizer>),
}

/// Instantiate a named provider with the given model.
fn create_text_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, SlidecastError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SlidecastError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the text generator, from most-specific to least-specific.
///
/// The fallback chain lets library users and CLI users each set exactly as
/// much or as little as they need:
///
/// 1. **Pre-built generator** (`config.generator`) — the caller supplied the
///    whole capability; used as-is. This is also the test seam.
///
/// 2. **Pre-built provider** (`config.provider`) — wrapped in the bundled
///    [`LlmGenerator`] with the configured sampling options.
///
/// 3. **Named provider + model** (`config.provider_name`) — instantiated via
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key (`OPENAI_API_KEY`, etc.) from the environment.
///
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`) —
///    both env vars set means the provider and model were chosen at the
///    execution environment level. Checked before full auto-detection so the
///    model choice is honoured even when multiple API keys are present.
///
/// 5. **Full auto-detection** (`ProviderFactory::from_env`) — the factory
///    scans all known API key variables and picks the first available
///    provider, preferring OpenAI when its key is set.
async fn resolve_generator(
    config: &NarrationConfig,
) -> Result<Arc<dyn TextGenerator>, SlidecastError> {
    // 1) User-provided generator takes priority
    if let Some(ref generator) = config.generator {
        return Ok(Arc::clone(generator));
    }

    let wrap = |provider: Arc<dyn LLMProvider>| -> Arc<dyn TextGenerator> {
        Arc::new(LlmGenerator::new(provider, config.temperature, config.max_tokens))
    };

    // 2) User-provided provider
    if let Some(ref provider) = config.provider {
        return Ok(wrap(Arc::clone(provider)));
    }

    // 3) Provider name + model
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return Ok(wrap(create_text_provider(name, model)?));
    }

    // 4) Auto-detect from environment; honour EDGEQUAKE_LLM_PROVIDER +
    //    EDGEQUAKE_MODEL when both are set
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return Ok(wrap(create_text_provider(&prov, &model)?));
        }
    }

    // Prefer OpenAI explicitly when an OpenAI API key is present, so users
    // with multiple provider keys get a stable default.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return Ok(wrap(create_text_provider("openai", model)?));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SlidecastError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(wrap(llm_provider))
}

fn resolve_fetcher(config: &NarrationConfig) -> Result<Arc<dyn PageFetcher>, SlidecastError> {
    if let Some(ref fetcher) = config.fetcher {
        return Ok(Arc::clone(fetcher));
    }
    let fetcher = HttpPageFetcher::new(config.fetch_timeout_secs)
        .map_err(|e| SlidecastError::Internal(e.to_string()))?;
    Ok(Arc::new(fetcher))
}

fn resolve_sink(config: &NarrationConfig) -> Result<ResolvedSink, SlidecastError> {
    match config.sink {
        OutputSink::Video => {
            let backend = if let Some(ref backend) = config.synthesis_backend {
                Arc::clone(backend)
            } else {
                let region = config.region.as_deref().ok_or_else(|| {
                    SlidecastError::SynthesisNotConfigured("no region".to_string())
                })?;
                let key = config.subscription_key.as_deref().ok_or_else(|| {
                    SlidecastError::SynthesisNotConfigured("no subscription key".to_string())
                })?;
                let backend = HttpSynthesisBackend::new(region, key, config.api_timeout_secs)
                    .map_err(|e| SlidecastError::Internal(e.to_string()))?;
                Arc::new(backend) as Arc<dyn crate::synthesis::SynthesisBackend>
            };
            Ok(ResolvedSink::Video(SynthesisJobClient::new(backend, config)))
        }
        OutputSink::Audio => {
            let speech = config
                .speech
                .as_ref()
                .ok_or(SlidecastError::SpeechSynthesizerMissing)?;
            Ok(ResolvedSink::Audio(Arc::clone(speech)))
        }
    }
}
