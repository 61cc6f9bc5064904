//! # slidecast
//!
//! Turn slide-deck speaker notes into narrated media using LLMs and batch
//! avatar synthesis.
//!
//! ## Why this crate?
//!
//! Recording narration for a deck by hand is slow and unrepeatable: every
//! content tweak means re-recording the affected slides. This crate treats
//! each slide's speaker note as the source of truth, generates a spoken
//! transcript from it (optionally enriched with the web page the note
//! references), renders the transcript through a remote talking-avatar
//! service, and binds the resulting video back onto the slide. Re-running
//! after an edit re-narrates only what you select.
//!
//! ## Pipeline Overview
//!
//! ```text
//! deck (per slide, in order)
//!  │
//!  ├─ 1. Classify   empty / plain text / has-reference (first URL)
//!  ├─ 2. Enrich     fetch referenced page, extract readable content
//!  ├─ 3. Generate   LLM stage chain → spoken transcript (+ note write-back)
//!  ├─ 4. Synthesize remote batch job: submit → poll → download video
//!  ├─ 5. Bind       attach media + note write-back, one commit per slide
//!  └─ 6. Persist    document written after every bound slide
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slidecast::{narrate, JsonDeck, NarrationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // LLM provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY;
//!     // synthesis credentials from SPEECH_REGION / SPEECH_API_KEY.
//!     let mut deck = JsonDeck::open("deck.json")?;
//!     let config = NarrationConfig::from_env().build()?;
//!     let output = narrate(&mut deck, "deck.narrated.json", &config).await?;
//!     eprintln!("{}", output.report());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slidecast` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! slidecast = { version = "0.3", default-features = false }
//! ```
//!
//! ## Failure model
//!
//! Fatal problems (unreadable deck, no provider, missing credentials) abort
//! the run with [`SlidecastError`]. Everything below that — a dead link, a
//! rate-limited model, a failed render — is a [`SlideError`] contained to
//! its slide; the run continues and the per-slide outcome lands in
//! [`NarrationOutput`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod binder;
pub mod config;
pub mod deck;
pub mod error;
pub mod narrate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod synthesis;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    NarrationConfig, NarrationConfigBuilder, OutputSink, PlacementGeometry, SlideSelection,
    VideoCrop,
};
pub use deck::{ArtifactRef, DeckContainer, DeckError, JsonDeck, MediaArtifact, Slide};
pub use error::{SlideError, SlidecastError};
pub use narrate::{inspect, narrate, DeckSummary, SlideInfo};
pub use output::{NarrationOutput, NarrationStats, SlideResult};
pub use pipeline::content::{classify, Classification, NoteContent};
pub use pipeline::enrich::PageFetcher;
pub use pipeline::generate::{StageKind, TextGenerator};
pub use progress::{NarrationProgressCallback, NoopProgressCallback};
pub use synthesis::{
    JobStatus, SpeechSynthesizer, SynthesisBackend, SynthesisJob, SynthesisJobClient,
};
