//! The deck container seam: slides, artifacts, and the persistence contract.
//!
//! The core pipeline never manipulates a presentation file's binary layout.
//! It talks to a [`DeckContainer`] — list slides, read/write one note, attach
//! one media reference, persist the whole document. Any real container format
//! (PPTX via an external library, a database-backed deck, …) plugs in behind
//! this trait; the crate ships [`JsonDeck`], a JSON-manifest container used by
//! the CLI and the test suite.
//!
//! ## Commit support
//!
//! Binding an artifact and persisting the document must behave as one logical
//! commit. `snapshot_slide` / `restore_slide` give the binder a way to roll an
//! in-memory slide back when persist fails, so a failed attempt never leaks
//! into later slides or later runs.

use crate::config::PlacementGeometry;
use crate::error::SlidecastError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Error raised by deck container operations.
#[derive(Debug, Error)]
pub enum DeckError {
    /// Slide number outside 1..=slide_count.
    #[error("no slide {number} in deck")]
    NoSuchSlide { number: usize },

    /// Persist or other container I/O failed.
    #[error("deck I/O failed: {0}")]
    Io(String),
}

/// A media reference embedded on a slide.
///
/// Created at bind time; the slide owns it from then on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Local path of the media file.
    pub path: PathBuf,
    /// Mime type, e.g. "video/mp4" or "audio/mpeg".
    pub mime: String,
    /// Start playback automatically when the slide is shown.
    pub auto_play: bool,
    /// Placement on the slide.
    pub geometry: PlacementGeometry,
}

/// One slide: 1-based ordinal, optional speaker note, optional bound media.
///
/// Owned exclusively by its deck container; mutated only through the
/// container's methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based ordinal, stable within one document.
    pub number: usize,
    /// Slide title, empty if the slide has none.
    #[serde(default)]
    pub title: String,
    /// Speaker-notes text; `None` and `Some("")` both classify Empty.
    #[serde(default)]
    pub note: Option<String>,
    /// Bound media artifact, if a previous run committed one.
    #[serde(default)]
    pub artifact: Option<ArtifactRef>,
}

/// A downloaded or synthesized media blob on disk.
///
/// Owned by the binder until embedded; ownership transfers to the slide as an
/// [`ArtifactRef`] at bind time.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaArtifact {
    /// Local path the full media body was written to.
    pub path: PathBuf,
    /// Mime type of the media.
    pub mime: String,
    /// Size in bytes.
    pub len: u64,
}

/// The external deck-container collaborator.
pub trait DeckContainer: Send {
    /// Number of slides in the document.
    fn slide_count(&self) -> usize;

    /// Borrow a slide by 1-based number.
    fn slide(&self, number: usize) -> Option<&Slide>;

    /// Read a slide's note text. `None` when the slide has no note frame.
    fn note_text(&self, number: usize) -> Option<String>;

    /// Replace a slide's note text.
    fn set_note_text(&mut self, number: usize, text: &str) -> Result<(), DeckError>;

    /// Embed a media reference on a slide.
    fn attach_media(
        &mut self,
        number: usize,
        artifact: &MediaArtifact,
        geometry: &PlacementGeometry,
        auto_play: bool,
    ) -> Result<(), DeckError>;

    /// Clone a slide's current state for later rollback.
    fn snapshot_slide(&self, number: usize) -> Option<Slide>;

    /// Restore a slide to a previously snapshotted state.
    fn restore_slide(&mut self, number: usize, snapshot: Slide) -> Result<(), DeckError>;

    /// Write the whole document to `path`. Must not expose a partial file.
    fn persist(&mut self, path: &Path) -> Result<(), DeckError>;
}

/// A deck backed by a JSON manifest on disk.
///
/// This is deliberately the simplest possible container: a slide list with
/// notes and artifact references, persisted atomically (sibling temp file +
/// rename). It exists so the CLI and tests have a real `DeckContainer`
/// without dragging in a presentation-format library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonDeck {
    pub slides: Vec<Slide>,
}

impl JsonDeck {
    /// Build a deck from note strings, numbering slides from 1.
    pub fn from_notes<S: Into<String>>(notes: impl IntoIterator<Item = S>) -> Self {
        let slides = notes
            .into_iter()
            .enumerate()
            .map(|(i, note)| Slide {
                number: i + 1,
                title: String::new(),
                note: Some(note.into()),
                artifact: None,
            })
            .collect();
        Self { slides }
    }

    /// Open a deck manifest from disk.
    ///
    /// This is the run's only fatal I/O: an unreadable input document aborts
    /// the whole run.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SlidecastError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SlidecastError::DeckNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|e| SlidecastError::DeckOpenFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let mut deck: JsonDeck =
            serde_json::from_str(&raw).map_err(|e| SlidecastError::DeckOpenFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        // Renumber defensively; the ordinal is positional.
        for (i, slide) in deck.slides.iter_mut().enumerate() {
            slide.number = i + 1;
        }
        debug!("Opened deck with {} slides: {}", deck.slides.len(), path.display());
        Ok(deck)
    }

    fn slide_mut(&mut self, number: usize) -> Result<&mut Slide, DeckError> {
        self.slides
            .get_mut(number.wrapping_sub(1))
            .ok_or(DeckError::NoSuchSlide { number })
    }
}

impl DeckContainer for JsonDeck {
    fn slide_count(&self) -> usize {
        self.slides.len()
    }

    fn slide(&self, number: usize) -> Option<&Slide> {
        self.slides.get(number.wrapping_sub(1))
    }

    fn note_text(&self, number: usize) -> Option<String> {
        self.slide(number).and_then(|s| s.note.clone())
    }

    fn set_note_text(&mut self, number: usize, text: &str) -> Result<(), DeckError> {
        self.slide_mut(number)?.note = Some(text.to_string());
        Ok(())
    }

    fn attach_media(
        &mut self,
        number: usize,
        artifact: &MediaArtifact,
        geometry: &PlacementGeometry,
        auto_play: bool,
    ) -> Result<(), DeckError> {
        let slide = self.slide_mut(number)?;
        slide.artifact = Some(ArtifactRef {
            path: artifact.path.clone(),
            mime: artifact.mime.clone(),
            auto_play,
            geometry: *geometry,
        });
        Ok(())
    }

    fn snapshot_slide(&self, number: usize) -> Option<Slide> {
        self.slide(number).cloned()
    }

    fn restore_slide(&mut self, number: usize, snapshot: Slide) -> Result<(), DeckError> {
        *self.slide_mut(number)? = snapshot;
        Ok(())
    }

    fn persist(&mut self, path: &Path) -> Result<(), DeckError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| DeckError::Io(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DeckError::Io(e.to_string()))?;
            }
        }

        // Atomic write: sibling temp file, then rename.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| DeckError::Io(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| DeckError::Io(e.to_string()))?;
        Ok(())
    }
}
