//! Error types for the slidecast library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SlidecastError`] — **Fatal**: the run cannot proceed at all (deck file
//!   unreadable, invalid configuration, no text-generation provider).
//!   Returned as `Err(SlidecastError)` from the top-level entry points.
//!
//! * [`SlideError`] — **Non-fatal**: a single slide failed (enrichment fetch,
//!   generation stage, synthesis job, persist) but the remaining slides are
//!   still worth processing. Stored inside [`crate::output::SlideResult`] so
//!   callers can inspect partial success rather than losing the whole deck to
//!   one bad slide.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! slide failure, log and continue, or collect everything for the end-of-run
//! report.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slidecast library.
///
/// Slide-level failures use [`SlideError`] and are stored in
/// [`crate::output::SlideResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum SlidecastError {
    /// Deck manifest was not found at the given path.
    #[error("Deck file not found: '{path}'\nCheck the path exists and is readable.")]
    DeckNotFound { path: PathBuf },

    /// The deck file exists but could not be opened or parsed.
    #[error("Failed to open deck '{path}': {detail}")]
    DeckOpenFailed { path: PathBuf, detail: String },

    /// The configured text-generation provider is not initialised
    /// (missing API key etc.).
    #[error("Text-generation provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Audio sink selected but no speech synthesizer supplied.
    #[error("Output sink is 'audio' but no speech synthesizer was configured")]
    SpeechSynthesizerMissing,

    /// Synthesis credentials (region / subscription key) are absent.
    #[error("Batch synthesis is not configured: {0}\nSet SPEECH_REGION and SPEECH_API_KEY, or supply them in the configuration.")]
    SynthesisNotConfigured(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single slide.
///
/// Caught at the orchestrator's per-slide boundary, logged with the slide
/// index, and recorded in [`crate::output::SlideResult`]. The run continues
/// with the next slide.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideError {
    /// Enrichment fetch failed (network, non-2xx, or unparsable content).
    ///
    /// Non-fatal even to the slide: the pipeline falls back to the PlainText
    /// chain using only the original note text.
    #[error("Fetch failed for '{url}': {reason}")]
    Fetch { url: String, reason: String },

    /// A generation stage failed after all retries. Rate limits and timeouts
    /// land here too; the slide's whole chain is discarded either way.
    #[error("Stage '{stage}' failed after {retries} retries: {detail}")]
    Generation {
        stage: String,
        retries: u32,
        detail: String,
    },

    /// The synthesis service rejected the job creation request (HTTP ≥ 400).
    /// A job id that failed to submit is never polled.
    #[error("Job {job_id}: submission rejected: {detail}")]
    Submission { job_id: String, detail: String },

    /// A status query for a submitted job failed at the transport level.
    #[error("Job {job_id}: status query failed: {detail}")]
    StatusQuery { job_id: String, detail: String },

    /// `fetch_result` was called before the job was observed Succeeded.
    /// This is a contract violation by the caller, not a remote failure.
    #[error("Job {job_id}: result requested while status is {status}")]
    NotReady { job_id: String, status: String },

    /// The job reached the terminal Failed state.
    #[error("Job {job_id}: batch synthesis failed")]
    SynthesisFailed { job_id: String },

    /// The job did not reach a terminal state within the polling ceiling.
    #[error("Job {job_id}: no terminal state after {attempts} polls")]
    Timeout { job_id: String, attempts: u32 },

    /// Artifact download failed or could not be written to disk.
    #[error("Job {job_id}: artifact download failed: {reason}")]
    Download { job_id: String, reason: String },

    /// Deck persist failed after the slide was mutated; the in-memory change
    /// was rolled back and the slide is reported not-completed.
    #[error("Persist failed for slide {slide}: {detail}")]
    Persist { slide: usize, detail: String },
}

impl SlideError {
    /// Short machine-friendly tag for log lines and the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            SlideError::Fetch { .. } => "fetch",
            SlideError::Generation { .. } => "generation",
            SlideError::Submission { .. } => "submission",
            SlideError::StatusQuery { .. } => "status-query",
            SlideError::NotReady { .. } => "not-ready",
            SlideError::SynthesisFailed { .. } => "synthesis-failed",
            SlideError::Timeout { .. } => "timeout",
            SlideError::Download { .. } => "download",
            SlideError::Persist { .. } => "persist",
        }
    }
}
