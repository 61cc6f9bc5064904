//! Run results: per-slide outcomes and the end-of-run report.
//!
//! A narration run never throws away partial success. Every selected slide
//! produces exactly one [`SlideResult`] — completed, skipped, or failed —
//! and the whole set travels back to the caller in [`NarrationOutput`].
//! Failed slides keep their [`SlideError`] so callers can retry selectively
//! instead of re-running the deck.

use crate::error::SlideError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome for one selected slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideResult {
    /// 1-based slide number.
    pub slide_num: usize,
    /// Content classification tag ("empty", "plain-text", "has-reference").
    pub content_kind: String,
    /// Synthesis job id, when a job was submitted for this slide.
    pub job_id: Option<String>,
    /// Wall-clock time spent on this slide.
    pub duration_ms: u64,
    /// Skip reason; `Some` means no pipeline ran for this slide.
    pub skipped: Option<String>,
    /// Error that failed the slide, if any.
    pub error: Option<SlideError>,
}

impl SlideResult {
    /// Media bound and document persisted for this slide.
    pub fn is_completed(&self) -> bool {
        self.error.is_none() && self.skipped.is_none()
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate counters over one run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NarrationStats {
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationOutput {
    /// Where the narrated document was written.
    pub output_path: PathBuf,
    /// One result per selected slide, in processing order.
    pub slides: Vec<SlideResult>,
}

impl NarrationOutput {
    pub fn stats(&self) -> NarrationStats {
        let mut stats = NarrationStats {
            total: self.slides.len(),
            ..Default::default()
        };
        for slide in &self.slides {
            stats.total_duration_ms += slide.duration_ms;
            if slide.is_completed() {
                stats.completed += 1;
            } else if slide.is_skipped() {
                stats.skipped += 1;
            } else {
                stats.failed += 1;
            }
        }
        stats
    }

    /// Slide numbers that completed.
    pub fn completed_slides(&self) -> Vec<usize> {
        self.slides
            .iter()
            .filter(|s| s.is_completed())
            .map(|s| s.slide_num)
            .collect()
    }

    /// Slide numbers that failed, with their errors.
    pub fn failed_slides(&self) -> Vec<(usize, &SlideError)> {
        self.slides
            .iter()
            .filter_map(|s| s.error.as_ref().map(|e| (s.slide_num, e)))
            .collect()
    }

    /// Human-readable end-of-run summary, one line per non-completed slide.
    pub fn report(&self) -> String {
        let stats = self.stats();
        let mut out = format!(
            "Narrated {}/{} slides ({} skipped, {} failed) in {:.1}s\n",
            stats.completed,
            stats.total,
            stats.skipped,
            stats.failed,
            stats.total_duration_ms as f64 / 1000.0
        );
        for slide in &self.slides {
            if let Some(reason) = &slide.skipped {
                out.push_str(&format!("  slide {}: skipped ({})\n", slide.slide_num, reason));
            } else if let Some(error) = &slide.error {
                out.push_str(&format!("  slide {}: FAILED: {}\n", slide.slide_num, error));
            }
        }
        out
    }
}
