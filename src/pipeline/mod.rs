//! The per-slide content pipeline.
//!
//! Each non-empty slide note flows through these steps, in order:
//!
//! ```text
//! note ──> content::classify ──┬─ HasReference ─> enrich::fetch ─┐
//!                              │        (fallback on failure)    │
//!                              └─ PlainText ─────────────────────┤
//!                                                                ▼
//!                                              chain::run_chain (generate)
//!                                                                │
//!                                              postprocess::clean_transcript
//!                                                                ▼
//!                                                     transcript for synthesis
//! ```
//!
//! Everything downstream of the transcript (job submission, polling,
//! download, binding) lives in [`crate::synthesis`] and [`crate::binder`].

pub mod chain;
pub mod content;
pub mod enrich;
pub mod generate;
pub mod postprocess;
