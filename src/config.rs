//! Configuration types for a narration run.
//!
//! All run behaviour is controlled through [`NarrationConfig`], built via its
//! [`NarrationConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across calls, log them, and diff two runs to
//! understand why their outputs differ.
//!
//! Credentials (speech region, subscription key) are read from the process
//! environment exactly once, in [`NarrationConfig::from_env`], at startup.
//! Business logic only ever sees the struct.

use crate::error::SlidecastError;
use crate::pipeline::enrich::PageFetcher;
use crate::pipeline::generate::TextGenerator;
use crate::progress::ProgressCallback;
use crate::synthesis::{SpeechSynthesizer, SynthesisBackend};
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one narration run.
///
/// Built via [`NarrationConfig::builder()`] or [`NarrationConfig::from_env()`].
///
/// # Example
/// ```rust
/// use slidecast::NarrationConfig;
///
/// let config = NarrationConfig::builder()
///     .region("westeurope")
///     .subscription_key("secret")
///     .voice("en-US-JennyMultilingualNeural")
///     .poll_interval_secs(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct NarrationConfig {
    /// Speech service region, e.g. "westeurope". Required for the bundled
    /// HTTP synthesis backend; unused when a custom backend is injected.
    pub region: Option<String>,

    /// Speech service subscription key (`Ocp-Apim-Subscription-Key` header).
    pub subscription_key: Option<String>,

    /// Neural voice used for synthesis. Default: "en-US-JennyMultilingualNeural".
    pub voice: String,

    /// Talking-avatar character. Default: "Lisa".
    pub avatar_character: String,

    /// Avatar style; required by the service for prebuilt avatars.
    /// Default: "casual-sitting".
    pub avatar_style: Option<String>,

    /// Whether the avatar is a customized one (changes the request shape:
    /// customized avatars take a crop and transparent background instead of
    /// a style). Default: false.
    pub avatar_customized: bool,

    /// Container format of the rendered video. Default: "mp4".
    pub video_format: String,

    /// Video codec. Default: "h264".
    pub video_codec: String,

    /// Background colour in RGBA, or "transparent". Default: "#FFFFFFFF".
    pub background_color: String,

    /// Optional crop window applied by the renderer.
    pub video_crop: Option<VideoCrop>,

    /// Where the bound media lands on each slide. Constant per document.
    pub geometry: PlacementGeometry,

    /// Directory where downloaded/synthesized media files are written.
    /// Default: current directory.
    pub media_dir: PathBuf,

    /// Which slides to process. Default: all.
    pub slides: SlideSelection,

    /// Video (remote batch job) or audio (local speech synthesizer) output.
    /// Default: video.
    pub sink: OutputSink,

    /// Seconds to sleep between job status polls. Default: 5.
    ///
    /// The service paces the job externally; polling faster buys nothing and
    /// trips rate limits. Tests set this to 0.
    pub poll_interval_secs: u64,

    /// Maximum number of status polls before the job is abandoned with a
    /// `Timeout` error. Default: 120 (10 minutes at the default interval).
    ///
    /// Without a ceiling a stuck remote job would block the run forever.
    pub max_poll_attempts: u32,

    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "azure"). If None along with
    /// `provider`, auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed text generator. Takes precedence over `provider`;
    /// this is the seam tests use to avoid live API calls.
    pub generator: Option<Arc<dyn TextGenerator>>,

    /// Page fetcher for note enrichment. Default: HTTP fetcher with
    /// main-content extraction.
    pub fetcher: Option<Arc<dyn PageFetcher>>,

    /// Synthesis backend. Default: the HTTP batch-synthesis client built from
    /// `region` + `subscription_key`.
    pub synthesis_backend: Option<Arc<dyn SynthesisBackend>>,

    /// Speech synthesizer for the audio sink. There is no bundled network
    /// implementation; audio runs require one to be supplied.
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,

    /// Optional per-slide progress callback (drives the CLI progress bar).
    pub progress_callback: Option<ProgressCallback>,

    /// Sampling temperature for generation stages. Default: 0.8.
    pub temperature: f32,

    /// Maximum tokens per generation stage. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts per generation stage on transient failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles each attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Enrichment fetch timeout in seconds. Default: 30.
    pub fetch_timeout_secs: u64,

    /// Per-HTTP-call timeout for the synthesis endpoint in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Skip slides that already carry a bound artifact (resume a partial
    /// run). Default: false.
    pub resume: bool,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            region: None,
            subscription_key: None,
            voice: "en-US-JennyMultilingualNeural".to_string(),
            avatar_character: "Lisa".to_string(),
            avatar_style: Some("casual-sitting".to_string()),
            avatar_customized: false,
            video_format: "mp4".to_string(),
            video_codec: "h264".to_string(),
            background_color: "#FFFFFFFF".to_string(),
            video_crop: None,
            geometry: PlacementGeometry::default(),
            media_dir: PathBuf::from("."),
            slides: SlideSelection::default(),
            sink: OutputSink::default(),
            poll_interval_secs: 5,
            max_poll_attempts: 120,
            model: None,
            provider_name: None,
            provider: None,
            generator: None,
            fetcher: None,
            synthesis_backend: None,
            speech: None,
            progress_callback: None,
            temperature: 0.8,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            fetch_timeout_secs: 30,
            api_timeout_secs: 60,
            resume: false,
        }
    }
}

impl fmt::Debug for NarrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarrationConfig")
            .field("region", &self.region)
            .field("subscription_key", &self.subscription_key.as_ref().map(|_| "<redacted>"))
            .field("voice", &self.voice)
            .field("avatar_character", &self.avatar_character)
            .field("avatar_style", &self.avatar_style)
            .field("avatar_customized", &self.avatar_customized)
            .field("video_format", &self.video_format)
            .field("video_codec", &self.video_codec)
            .field("background_color", &self.background_color)
            .field("video_crop", &self.video_crop)
            .field("geometry", &self.geometry)
            .field("media_dir", &self.media_dir)
            .field("slides", &self.slides)
            .field("sink", &self.sink)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("generator", &self.generator.as_ref().map(|_| "<dyn TextGenerator>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("resume", &self.resume)
            .finish()
    }
}

impl NarrationConfig {
    /// Create a new builder for `NarrationConfig`.
    pub fn builder() -> NarrationConfigBuilder {
        NarrationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a configuration seeded from the process environment.
    ///
    /// Reads `SPEECH_REGION` and `SPEECH_API_KEY` here, once; nothing else in
    /// the crate touches the environment for synthesis credentials.
    pub fn from_env() -> NarrationConfigBuilder {
        let mut builder = Self::builder();
        if let Ok(region) = std::env::var("SPEECH_REGION") {
            if !region.is_empty() {
                builder = builder.region(region);
            }
        }
        if let Ok(key) = std::env::var("SPEECH_API_KEY") {
            if !key.is_empty() {
                builder = builder.subscription_key(key);
            }
        }
        builder
    }
}

/// Builder for [`NarrationConfig`].
#[derive(Debug)]
pub struct NarrationConfigBuilder {
    config: NarrationConfig,
}

impl NarrationConfigBuilder {
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    pub fn subscription_key(mut self, key: impl Into<String>) -> Self {
        self.config.subscription_key = Some(key.into());
        self
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.config.voice = voice.into();
        self
    }

    pub fn avatar_character(mut self, character: impl Into<String>) -> Self {
        self.config.avatar_character = character.into();
        self
    }

    pub fn avatar_style(mut self, style: impl Into<String>) -> Self {
        self.config.avatar_style = Some(style.into());
        self
    }

    pub fn avatar_customized(mut self, v: bool) -> Self {
        self.config.avatar_customized = v;
        self
    }

    pub fn video_format(mut self, format: impl Into<String>) -> Self {
        self.config.video_format = format.into();
        self
    }

    pub fn background_color(mut self, color: impl Into<String>) -> Self {
        self.config.background_color = color.into();
        self
    }

    pub fn video_crop(mut self, crop: VideoCrop) -> Self {
        self.config.video_crop = Some(crop);
        self
    }

    pub fn geometry(mut self, geometry: PlacementGeometry) -> Self {
        self.config.geometry = geometry;
        self
    }

    pub fn media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.media_dir = dir.into();
        self
    }

    pub fn slides(mut self, selection: SlideSelection) -> Self {
        self.config.slides = selection;
        self
    }

    pub fn sink(mut self, sink: OutputSink) -> Self {
        self.config.sink = sink;
        self
    }

    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval_secs = secs;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.max_poll_attempts = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.config.fetcher = Some(fetcher);
        self
    }

    pub fn synthesis_backend(mut self, backend: Arc<dyn SynthesisBackend>) -> Self {
        self.config.synthesis_backend = Some(backend);
        self
    }

    pub fn speech(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.config.speech = Some(synthesizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn resume(mut self, v: bool) -> Self {
        self.config.resume = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NarrationConfig, SlidecastError> {
        let c = &self.config;
        if c.max_poll_attempts == 0 {
            return Err(SlidecastError::InvalidConfig(
                "max_poll_attempts must be ≥ 1".into(),
            ));
        }
        if c.voice.trim().is_empty() {
            return Err(SlidecastError::InvalidConfig("voice must not be empty".into()));
        }
        match c.video_format.as_str() {
            "mp4" | "webm" => {}
            other => {
                return Err(SlidecastError::InvalidConfig(format!(
                    "video_format must be mp4 or webm, got '{other}'"
                )))
            }
        }
        Ok(self.config)
    }
}

// ── Enums & geometry ─────────────────────────────────────────────────────

/// Which output the run produces for each slide.
///
/// Both sinks share the same content pipeline; they differ only in the final
/// synthesis step and the attached artifact's mime type. One orchestrator,
/// parameterized here, instead of near-identical copies per media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputSink {
    /// Talking-avatar video rendered by the remote batch-synthesis service.
    #[default]
    Video,
    /// Audio rendered by a caller-supplied [`SpeechSynthesizer`].
    Audio,
}

/// Specifies which slides of the deck to process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum SlideSelection {
    /// Process all slides (default).
    #[default]
    All,
    /// Process a single slide (1-indexed).
    Single(usize),
    /// Process a contiguous range of slides (1-indexed, inclusive).
    Range(usize, usize),
    /// Process specific slides (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl SlideSelection {
    /// Expand the selection into a sorted, deduplicated list of 1-based
    /// slide numbers. Out-of-range entries are dropped.
    pub fn to_slide_numbers(&self, total_slides: usize) -> Vec<usize> {
        let mut numbers: Vec<usize> = match self {
            SlideSelection::All => (1..=total_slides).collect(),
            SlideSelection::Single(n) => {
                if *n >= 1 && *n <= total_slides {
                    vec![*n]
                } else {
                    vec![]
                }
            }
            SlideSelection::Range(start, end) => {
                let s = (*start).max(1);
                let e = (*end).min(total_slides);
                (s..=e).collect()
            }
            SlideSelection::Set(slides) => slides
                .iter()
                .filter(|&&n| n >= 1 && n <= total_slides)
                .copied()
                .collect(),
        };
        numbers.sort_unstable();
        numbers.dedup();
        numbers
    }
}

/// Where a bound artifact lands on its slide, in centimetres.
///
/// Constant per document; the defaults match a 16:9 layout with the video
/// tucked into the lower-right quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementGeometry {
    pub left_cm: f64,
    pub top_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

impl Default for PlacementGeometry {
    fn default() -> Self {
        Self {
            left_cm: 20.28,
            top_cm: 11.41,
            width_cm: 13.59,
            height_cm: 7.64,
        }
    }
}

/// One corner of a crop window, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropPoint {
    pub x: u32,
    pub y: u32,
}

/// Crop window applied by the video renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCrop {
    pub top_left: CropPoint,
    pub bottom_right: CropPoint,
}
