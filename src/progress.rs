//! Progress-callback trait for per-slide narration events.
//!
//! Inject an [`Arc<dyn NarrationProgressCallback>`] via
//! [`crate::config::NarrationConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline processes each slide.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a WebSocket, a database record,
//! or a terminal progress bar — without the library knowing anything about how
//! the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use slidecast::{NarrationProgressCallback, NarrationConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl NarrationProgressCallback for CountingCallback {
//!     fn on_slide_complete(&self, slide_num: usize, total_slides: usize, job_id: &str) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("Slide {}/{} done (job {})", slide_num, total_slides, job_id);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = NarrationConfig::builder()
//!     .progress_callback(counter as Arc<dyn NarrationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the narration pipeline as it processes each slide.
///
/// Slides are processed strictly in order, so events for slide `n` always
/// arrive before events for slide `n + 1`. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait NarrationProgressCallback: Send + Sync {
    /// Called once before any slide is processed.
    ///
    /// # Arguments
    /// * `total_slides` — number of slides selected for this run
    fn on_run_start(&self, total_slides: usize) {
        let _ = total_slides;
    }

    /// Called just before a slide's pipeline begins.
    ///
    /// # Arguments
    /// * `slide_num`    — 1-indexed slide number
    /// * `total_slides` — slides selected for this run
    fn on_slide_start(&self, slide_num: usize, total_slides: usize) {
        let _ = (slide_num, total_slides);
    }

    /// Called when a slide is skipped (empty note, or resume found an
    /// existing artifact).
    ///
    /// # Arguments
    /// * `slide_num`    — 1-indexed slide number
    /// * `total_slides` — slides selected for this run
    /// * `reason`       — short human-readable skip reason
    fn on_slide_skipped(&self, slide_num: usize, total_slides: usize, reason: &str) {
        let _ = (slide_num, total_slides, reason);
    }

    /// Called when a slide completes: media bound and document persisted.
    ///
    /// # Arguments
    /// * `slide_num`    — 1-indexed slide number
    /// * `total_slides` — slides selected for this run
    /// * `job_id`       — synthesis job id, empty for audio-sink runs
    fn on_slide_complete(&self, slide_num: usize, total_slides: usize, job_id: &str) {
        let _ = (slide_num, total_slides, job_id);
    }

    /// Called when a slide fails at any pipeline step.
    ///
    /// # Arguments
    /// * `slide_num`    — 1-indexed slide number
    /// * `total_slides` — slides selected for this run
    /// * `error`        — human-readable error description
    fn on_slide_error(&self, slide_num: usize, total_slides: usize, error: &str) {
        let _ = (slide_num, total_slides, error);
    }

    /// Called once after all selected slides have been attempted.
    ///
    /// # Arguments
    /// * `total_slides`  — slides selected for this run
    /// * `success_count` — slides that completed without error
    fn on_run_complete(&self, total_slides: usize, success_count: usize) {
        let _ = (total_slides, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl NarrationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::NarrationConfig`].
pub type ProgressCallback = Arc<dyn NarrationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: Arc<AtomicUsize>,
        completes: Arc<AtomicUsize>,
        skips: Arc<AtomicUsize>,
        errors: Arc<AtomicUsize>,
        completed_total: Arc<AtomicUsize>,
    }

    impl NarrationProgressCallback for TrackingCallback {
        fn on_slide_start(&self, _slide_num: usize, _total_slides: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_skipped(&self, _slide_num: usize, _total_slides: usize, _reason: &str) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_complete(&self, _slide_num: usize, _total_slides: usize, _job_id: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_error(&self, _slide_num: usize, _total_slides: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, _total_slides: usize, success_count: usize) {
            self.completed_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(5);
        cb.on_slide_start(1, 5);
        cb.on_slide_skipped(2, 5, "empty note");
        cb.on_slide_complete(1, 5, "job-1");
        cb.on_slide_error(3, 5, "some error");
        cb.on_run_complete(5, 3);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: Arc::new(AtomicUsize::new(0)),
            completes: Arc::new(AtomicUsize::new(0)),
            skips: Arc::new(AtomicUsize::new(0)),
            errors: Arc::new(AtomicUsize::new(0)),
            completed_total: Arc::new(AtomicUsize::new(0)),
        };

        tracker.on_run_start(4);
        tracker.on_slide_start(1, 4);
        tracker.on_slide_complete(1, 4, "job-a");
        tracker.on_slide_skipped(2, 4, "empty note");
        tracker.on_slide_start(3, 4);
        tracker.on_slide_error(3, 4, "synthesis failed");
        tracker.on_slide_start(4, 4);
        tracker.on_slide_complete(4, 4, "job-b");
        tracker.on_run_complete(4, 2);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_total.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn NarrationProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
        cb.on_slide_start(1, 10);
        cb.on_slide_complete(1, 10, "job-x");
    }
}
