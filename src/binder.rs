//! Binding: commit one slide's media and note write-back as a unit.
//!
//! The commit order is fixed: snapshot the slide, apply the note write-back,
//! attach the media reference, persist the whole document. If persist fails
//! the snapshot is restored, so a later slide (or a resumed run) never sees
//! a half-committed slide in memory. Artifacts already on disk are left
//! alone; an unreferenced media file is harmless, a dangling reference is
//! not.

use crate::config::PlacementGeometry;
use crate::deck::{DeckContainer, MediaArtifact};
use crate::error::SlideError;
use std::path::Path;
use tracing::{debug, error};

/// What to commit for one slide.
#[derive(Debug)]
pub struct SlideBinding<'a> {
    /// 1-based slide number.
    pub slide_num: usize,
    /// Media file to reference from the slide.
    pub artifact: &'a MediaArtifact,
    /// Replacement note text; `None` leaves the note untouched.
    pub note_writeback: Option<&'a str>,
    /// Placement of the media on the slide.
    pub geometry: PlacementGeometry,
    /// Start playback automatically (videos yes, audio no).
    pub auto_play: bool,
}

/// Apply a binding and persist the document to `output_path`.
///
/// Returns [`SlideError::Persist`] on any failure; in-memory state is rolled
/// back to the pre-bind snapshot first.
pub fn bind_and_persist(
    deck: &mut dyn DeckContainer,
    binding: &SlideBinding<'_>,
    output_path: &Path,
) -> Result<(), SlideError> {
    let n = binding.slide_num;
    let snapshot = deck.snapshot_slide(n).ok_or_else(|| SlideError::Persist {
        slide: n,
        detail: format!("no slide {n} in deck"),
    })?;

    let applied = apply(deck, binding, output_path);
    if let Err(e) = applied {
        error!("Slide {}: bind failed, rolling back: {}", n, e);
        // Restore can only fail if the slide vanished, which a container
        // must not do mid-run.
        if let Err(restore_err) = deck.restore_slide(n, snapshot) {
            error!("Slide {}: rollback itself failed: {}", n, restore_err);
        }
        return Err(e);
    }

    debug!("Slide {}: bound {} and persisted", n, binding.artifact.path.display());
    Ok(())
}

fn apply(
    deck: &mut dyn DeckContainer,
    binding: &SlideBinding<'_>,
    output_path: &Path,
) -> Result<(), SlideError> {
    let n = binding.slide_num;

    if let Some(text) = binding.note_writeback {
        deck.set_note_text(n, text).map_err(|e| SlideError::Persist {
            slide: n,
            detail: e.to_string(),
        })?;
    }

    deck.attach_media(n, binding.artifact, &binding.geometry, binding.auto_play)
        .map_err(|e| SlideError::Persist {
            slide: n,
            detail: e.to_string(),
        })?;

    deck.persist(output_path).map_err(|e| SlideError::Persist {
        slide: n,
        detail: e.to_string(),
    })
}
