//! End-to-end narration runs against fake collaborators.
//!
//! Everything network-shaped (LLM, page fetch, batch synthesis) is replaced
//! by scripted fakes injected through the config seams, so these tests
//! exercise the real orchestrator, chain, binder, and deck persistence.

use async_trait::async_trait;
use slidecast::pipeline::enrich::PageFetcher;
use slidecast::synthesis::{RemoteJobStatus, SynthesisPayload};
use slidecast::{
    narrate, DeckContainer, JobStatus, JsonDeck, NarrationConfig, SlideError, StageKind,
    SynthesisBackend, TextGenerator,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────

/// Records every (slide content, stage) call; fails when the content
/// contains the configured marker.
struct ScriptedGenerator {
    calls: Mutex<Vec<(StageKind, String)>>,
    fail_marker: Option<String>,
}

impl ScriptedGenerator {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_marker: None,
        })
    }

    fn failing_on(marker: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_marker: Some(marker.to_string()),
        })
    }

    fn stages(&self) -> Vec<StageKind> {
        self.calls.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        stage: StageKind,
        _system_prompt: &str,
        content: &str,
    ) -> Result<String, String> {
        self.calls
            .lock()
            .unwrap()
            .push((stage, content.to_string()));
        if let Some(marker) = &self.fail_marker {
            if content.contains(marker) {
                return Err("model refused".to_string());
            }
        }
        Ok(format!("[{stage}] {content}"))
    }
}

struct FakeFetcher {
    page: Result<String, ()>,
    calls: AtomicU32,
}

impl FakeFetcher {
    fn serving(page: &str) -> Arc<Self> {
        Arc::new(Self {
            page: Ok(page.to_string()),
            calls: AtomicU32::new(0),
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            page: Err(()),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch_and_extract(&self, url: &str) -> Result<String, SlideError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.page {
            Ok(page) => Ok(page.clone()),
            Err(()) => Err(SlideError::Fetch {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

/// Backend that reports Running `running_polls` times per job, then
/// Succeeded with a result URL.
struct FakeBackend {
    submissions: Mutex<Vec<(String, SynthesisPayload)>>,
    running_polls: u32,
    polls_for_current: AtomicU32,
    downloads: AtomicU32,
}

impl FakeBackend {
    fn new(running_polls: u32) -> Arc<Self> {
        Arc::new(Self {
            submissions: Mutex::new(Vec::new()),
            running_polls,
            polls_for_current: AtomicU32::new(0),
            downloads: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl SynthesisBackend for FakeBackend {
    async fn submit(&self, job_id: &str, payload: &SynthesisPayload) -> Result<(), SlideError> {
        self.polls_for_current.store(0, Ordering::SeqCst);
        self.submissions
            .lock()
            .unwrap()
            .push((job_id.to_string(), payload.clone()));
        Ok(())
    }

    async fn status(&self, _job_id: &str) -> Result<RemoteJobStatus, SlideError> {
        let n = self.polls_for_current.fetch_add(1, Ordering::SeqCst);
        if n < self.running_polls {
            Ok(RemoteJobStatus {
                status: JobStatus::Running,
                result_url: None,
            })
        } else {
            Ok(RemoteJobStatus {
                status: JobStatus::Succeeded,
                result_url: Some("https://results.example/video".to_string()),
            })
        }
    }

    async fn download(&self, _job_id: &str, _url: &str) -> Result<Vec<u8>, SlideError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(b"rendered video".to_vec())
    }
}

fn base_config(
    media_dir: &std::path::Path,
    generator: Arc<ScriptedGenerator>,
    fetcher: Arc<FakeFetcher>,
    backend: Arc<FakeBackend>,
) -> NarrationConfig {
    NarrationConfig::builder()
        .generator(generator as Arc<dyn TextGenerator>)
        .fetcher(fetcher as Arc<dyn PageFetcher>)
        .synthesis_backend(backend as Arc<dyn SynthesisBackend>)
        .media_dir(media_dir)
        .poll_interval_secs(0)
        .max_retries(0)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn plain_note_is_narrated_and_bound() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("deck.narrated.json");
    let mut deck = JsonDeck::from_notes(["Explain the borrow checker."]);

    let generator = ScriptedGenerator::ok();
    let fetcher = FakeFetcher::broken();
    let backend = FakeBackend::new(2);
    let config = base_config(dir.path(), generator.clone(), fetcher.clone(), backend.clone());

    let output = narrate(&mut deck, &out, &config).await.unwrap();

    // Plain chain: instruction, then markup over the instruction output.
    assert_eq!(generator.stages(), vec![StageKind::Instruction, StageKind::Markup]);
    // No URL in the note, so enrichment never runs.
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

    // Exactly one job: submitted, polled through Running to Succeeded, downloaded.
    assert_eq!(backend.submissions.lock().unwrap().len(), 1);
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 1);

    let stats = output.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);
    let result = &output.slides[0];
    assert_eq!(result.content_kind, "plain-text");
    let job_id = result.job_id.as_ref().unwrap();

    // The video landed in media_dir under the job id.
    let video = dir.path().join(format!("{job_id}.mp4"));
    assert!(video.exists());

    // The persisted deck carries the artifact and a cleared note.
    let persisted = JsonDeck::open(&out).unwrap();
    let slide = persisted.slide(1).unwrap();
    let artifact = slide.artifact.as_ref().unwrap();
    assert_eq!(artifact.path, video);
    assert_eq!(artifact.mime, "video/mp4");
    assert!(artifact.auto_play);
    assert_eq!(slide.note.as_deref(), Some(""));
}

#[tokio::test]
async fn referenced_note_gains_questions_from_the_page() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("deck.narrated.json");
    let mut deck = JsonDeck::from_notes(["see https://docs.example/ownership"]);

    let generator = ScriptedGenerator::ok();
    let fetcher = FakeFetcher::serving("# Ownership\n\nEvery value has an owner.");
    let backend = FakeBackend::new(0);
    let config = base_config(dir.path(), generator.clone(), fetcher.clone(), backend.clone());

    let output = narrate(&mut deck, &out, &config).await.unwrap();
    assert_eq!(output.stats().completed, 1);

    // Reference chain: narrate then question-set, both over note + page.
    assert_eq!(generator.stages(), vec![StageKind::Narrate, StageKind::QuestionSet]);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    let calls = generator.calls.lock().unwrap();
    assert!(calls[0].1.contains("Every value has an owner."));
    assert!(calls[0].1.contains("see https://docs.example/ownership"));

    // The question-set output replaced the note; the transcript fed synthesis.
    let persisted = JsonDeck::open(&out).unwrap();
    let note = persisted.note_text(1).unwrap();
    assert!(note.starts_with("[question-set]"));
    let payload = &backend.submissions.lock().unwrap()[0].1;
    assert!(payload.inputs[0].content.starts_with("[narrate]"));
}

#[tokio::test]
async fn dead_link_falls_back_to_the_plain_chain() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("deck.narrated.json");
    let mut deck = JsonDeck::from_notes(["read https://gone.example/404 carefully"]);

    let generator = ScriptedGenerator::ok();
    let fetcher = FakeFetcher::broken();
    let backend = FakeBackend::new(0);
    let config = base_config(dir.path(), generator.clone(), fetcher.clone(), backend.clone());

    let output = narrate(&mut deck, &out, &config).await.unwrap();

    // Fetch was attempted, failed, and the slide still completed via the
    // plain chain over the original note text.
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(generator.stages(), vec![StageKind::Instruction, StageKind::Markup]);
    assert_eq!(output.stats().completed, 1);
    assert_eq!(output.slides[0].content_kind, "has-reference");
}

#[tokio::test]
async fn one_failed_slide_does_not_poison_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("deck.narrated.json");
    let mut deck = JsonDeck::from_notes([
        "First slide, fine.",
        "Second slide BREAKS the model.",
        "Third slide, fine too.",
    ]);

    let generator = ScriptedGenerator::failing_on("BREAKS");
    let fetcher = FakeFetcher::broken();
    let backend = FakeBackend::new(0);
    let config = base_config(dir.path(), generator, fetcher, backend.clone());

    let output = narrate(&mut deck, &out, &config).await.unwrap();

    let stats = output.stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.failed, 1);
    assert!(matches!(
        output.slides[1].error,
        Some(SlideError::Generation { .. })
    ));
    assert_eq!(output.completed_slides(), vec![1, 3]);

    // Only the two good slides submitted jobs.
    assert_eq!(backend.submissions.lock().unwrap().len(), 2);

    // The persisted deck keeps slide 1's artifact and leaves slide 2 untouched.
    let persisted = JsonDeck::open(&out).unwrap();
    assert!(persisted.slide(1).unwrap().artifact.is_some());
    let failed = persisted.slide(2).unwrap();
    assert!(failed.artifact.is_none());
    assert_eq!(failed.note.as_deref(), Some("Second slide BREAKS the model."));
    assert!(persisted.slide(3).unwrap().artifact.is_some());
}

#[tokio::test]
async fn empty_slides_are_skipped_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("deck.narrated.json");
    let mut deck = JsonDeck::from_notes(["Something to say.", "   \n  ", "More to say."]);

    let generator = ScriptedGenerator::ok();
    let fetcher = FakeFetcher::broken();
    let backend = FakeBackend::new(0);
    let config = base_config(dir.path(), generator, fetcher, backend.clone());

    let output = narrate(&mut deck, &out, &config).await.unwrap();

    let stats = output.stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(output.slides[1].skipped.as_deref(), Some("empty note"));
    assert_eq!(backend.submissions.lock().unwrap().len(), 2);

    // The empty slide's note survives byte-for-byte, no artifact appears.
    let persisted = JsonDeck::open(&out).unwrap();
    let empty = persisted.slide(2).unwrap();
    assert_eq!(empty.note.as_deref(), Some("   \n  "));
    assert!(empty.artifact.is_none());
}

#[tokio::test]
async fn resume_skips_slides_with_bound_media() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("deck.narrated.json");
    let mut deck = JsonDeck::from_notes(["Already narrated.", "Not yet."]);

    // First pass: narrate slide 1 only.
    {
        let generator = ScriptedGenerator::ok();
        let fetcher = FakeFetcher::broken();
        let backend = FakeBackend::new(0);
        let mut config =
            base_config(dir.path(), generator, fetcher, backend);
        config.slides = slidecast::SlideSelection::Single(1);
        narrate(&mut deck, &out, &config).await.unwrap();
    }
    assert!(deck.slide(1).unwrap().artifact.is_some());

    // Second pass over the whole deck with resume: only slide 2 runs.
    let generator = ScriptedGenerator::ok();
    let fetcher = FakeFetcher::broken();
    let backend = FakeBackend::new(0);
    let mut config = base_config(dir.path(), generator, fetcher, backend.clone());
    config.resume = true;

    let output = narrate(&mut deck, &out, &config).await.unwrap();

    assert_eq!(output.slides[0].skipped.as_deref(), Some("existing artifact"));
    assert!(output.slides[1].is_completed());
    assert_eq!(backend.submissions.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn persist_failure_rolls_back_and_run_continues() {
    // A deck whose persist fails on the first attempt only: slide 1 fails
    // its commit and is rolled back, slide 2 commits normally.
    struct FlakyPersistDeck {
        inner: JsonDeck,
        failures_left: u32,
    }

    impl DeckContainer for FlakyPersistDeck {
        fn slide_count(&self) -> usize {
            self.inner.slide_count()
        }
        fn slide(&self, n: usize) -> Option<&slidecast::Slide> {
            self.inner.slide(n)
        }
        fn note_text(&self, n: usize) -> Option<String> {
            self.inner.note_text(n)
        }
        fn set_note_text(&mut self, n: usize, text: &str) -> Result<(), slidecast::DeckError> {
            self.inner.set_note_text(n, text)
        }
        fn attach_media(
            &mut self,
            n: usize,
            artifact: &slidecast::MediaArtifact,
            geometry: &slidecast::PlacementGeometry,
            auto_play: bool,
        ) -> Result<(), slidecast::DeckError> {
            self.inner.attach_media(n, artifact, geometry, auto_play)
        }
        fn snapshot_slide(&self, n: usize) -> Option<slidecast::Slide> {
            self.inner.snapshot_slide(n)
        }
        fn restore_slide(
            &mut self,
            n: usize,
            snapshot: slidecast::Slide,
        ) -> Result<(), slidecast::DeckError> {
            self.inner.restore_slide(n, snapshot)
        }
        fn persist(&mut self, path: &std::path::Path) -> Result<(), slidecast::DeckError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(slidecast::DeckError::Io("disk full".into()));
            }
            self.inner.persist(path)
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("deck.narrated.json");
    let mut deck = FlakyPersistDeck {
        inner: JsonDeck::from_notes(["First.", "Second."]),
        failures_left: 1,
    };

    let generator = ScriptedGenerator::ok();
    let fetcher = FakeFetcher::broken();
    let backend = FakeBackend::new(0);
    let config = base_config(dir.path(), generator, fetcher, backend);

    let output = narrate(&mut deck, &out, &config).await.unwrap();

    assert!(matches!(
        output.slides[0].error,
        Some(SlideError::Persist { slide: 1, .. })
    ));
    assert!(output.slides[1].is_completed());

    // Slide 1 was rolled back in memory; slide 2 committed.
    assert_eq!(deck.note_text(1).as_deref(), Some("First."));
    assert!(deck.slide(1).unwrap().artifact.is_none());
    assert!(deck.slide(2).unwrap().artifact.is_some());
}

#[tokio::test]
async fn selection_limits_the_run_to_named_slides() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("deck.narrated.json");
    let mut deck = JsonDeck::from_notes(["one", "two", "three", "four"]);

    let generator = ScriptedGenerator::ok();
    let fetcher = FakeFetcher::broken();
    let backend = FakeBackend::new(0);
    let mut config = base_config(dir.path(), generator, fetcher, backend.clone());
    config.slides = slidecast::SlideSelection::Set(vec![4, 2]);

    let output = narrate(&mut deck, &out, &config).await.unwrap();

    // Processed in ascending order regardless of the set's order.
    let nums: Vec<usize> = output.slides.iter().map(|s| s.slide_num).collect();
    assert_eq!(nums, vec![2, 4]);
    assert_eq!(backend.submissions.lock().unwrap().len(), 2);

    let persisted = JsonDeck::open(&out).unwrap();
    assert!(persisted.slide(1).unwrap().artifact.is_none());
    assert!(persisted.slide(2).unwrap().artifact.is_some());
    assert!(persisted.slide(3).unwrap().artifact.is_none());
    assert!(persisted.slide(4).unwrap().artifact.is_some());
}

#[tokio::test]
async fn audio_sink_uses_the_injected_synthesizer() {
    use slidecast::{OutputSink, SpeechSynthesizer};

    struct FakeSpeech {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSpeech {
        async fn synthesize(
            &self,
            _transcript: &str,
            _voice: &str,
            dest: &std::path::Path,
        ) -> Result<(), SlideError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(dest, b"audio bytes").map_err(|e| SlideError::Download {
                job_id: String::new(),
                reason: e.to_string(),
            })
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("deck.narrated.json");
    let mut deck = JsonDeck::from_notes(["Say this aloud."]);

    let speech = Arc::new(FakeSpeech {
        calls: AtomicU32::new(0),
    });
    let generator = ScriptedGenerator::ok();
    let config = NarrationConfig::builder()
        .generator(generator as Arc<dyn TextGenerator>)
        .speech(speech.clone() as Arc<dyn SpeechSynthesizer>)
        .sink(OutputSink::Audio)
        .media_dir(dir.path())
        .max_retries(0)
        .build()
        .unwrap();

    let output = narrate(&mut deck, &out, &config).await.unwrap();

    assert_eq!(speech.calls.load(Ordering::SeqCst), 1);
    assert_eq!(output.stats().completed, 1);
    assert!(output.slides[0].job_id.is_none());

    let persisted = JsonDeck::open(&out).unwrap();
    let artifact = persisted.slide(1).unwrap().artifact.clone().unwrap();
    assert_eq!(artifact.mime, "audio/mpeg");
    assert!(!artifact.auto_play);
    assert_eq!(artifact.path.file_name().unwrap(), "slide-1.mp3");
    assert!(PathBuf::from(&artifact.path).exists());
}
