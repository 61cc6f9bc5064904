//! CLI binary for slidecast.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `NarrationConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use slidecast::{
    inspect, narrate, JsonDeck, NarrationConfig, NarrationProgressCallback, OutputSink,
    SlideSelection,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-slide log
/// lines using [indicatif]. Slides are processed strictly in order, so no
/// out-of-order bookkeeping is needed.
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_run_start` (called before any slides are processed).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening deck…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Narrating");
    }
}

impl NarrationProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_slides: usize) {
        self.activate_bar(total_slides);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting narration of {total_slides} slides…"))
        ));
    }

    fn on_slide_start(&self, slide_num: usize, _total: usize) {
        // Synthesis dominates the wall clock, so the message names the phase.
        self.bar
            .set_message(format!("slide {slide_num} (generating + rendering)"));
    }

    fn on_slide_skipped(&self, slide_num: usize, total: usize, reason: &str) {
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            dim("↷"),
            slide_num,
            total,
            dim(&format!("skipped ({reason})")),
        ));
        self.bar.inc(1);
    }

    fn on_slide_complete(&self, slide_num: usize, total: usize, job_id: &str) {
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            green("✓"),
            slide_num,
            total,
            dim(&format!("job {job_id}")),
        ));
        self.bar.inc(1);
    }

    fn on_slide_error(&self, slide_num: usize, total: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            red("✗"),
            slide_num,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_slides: usize, success_count: usize) {
        let rest = total_slides.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if rest == 0 {
            eprintln!(
                "{} {} slides narrated successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} slides narrated  ({} skipped or failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_slides,
                rest,
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Narrate a whole deck (credentials from environment)
  slidecast deck.json -o deck.narrated.json

  # Only slides 3 through 7
  slidecast --slides 3-7 deck.json -o out.json

  # Different voice and avatar
  slidecast --voice en-US-AndrewNeural --avatar Harry deck.json -o out.json

  # Use a specific LLM
  slidecast --model gpt-4.1 --provider openai deck.json -o out.json

  # Resume a partial run (slides with media already bound are skipped)
  slidecast --resume deck.narrated.json -o deck.narrated.json

  # Inspect a deck's notes (no API keys needed)
  slidecast --inspect-only deck.json

  # JSON run report
  slidecast --json deck.json -o out.json > report.json

ENVIRONMENT VARIABLES:
  SPEECH_REGION           Speech service region (e.g. westeurope)
  SPEECH_API_KEY          Speech service subscription key
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override LLM provider (openai, anthropic, ollama, …)
  EDGEQUAKE_MODEL         Override LLM model ID

SETUP:
  1. Set credentials:  export OPENAI_API_KEY=sk-...
                       export SPEECH_REGION=westeurope
                       export SPEECH_API_KEY=...
  2. Narrate:          slidecast deck.json -o deck.narrated.json

  Videos are downloaded next to the deck (see --media-dir) and referenced
  from the slides; the document is persisted after every completed slide,
  so an interrupted run can be resumed with --resume.
"#;

/// Narrate slide decks with LLM-generated transcripts and avatar videos.
#[derive(Parser, Debug)]
#[command(
    name = "slidecast",
    version,
    about = "Narrate slide decks with LLM-generated transcripts and avatar videos",
    long_about = "Generate spoken narration for each slide's speaker notes using an LLM, \
render it through a remote batch avatar-synthesis service, and bind the resulting video \
back onto the slide. Notes that reference a URL are enriched with the page's readable \
content and gain a study-aid question set.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Deck manifest to narrate (JSON).
    input: PathBuf,

    /// Write the narrated deck to this file. Default: <input>.narrated.json.
    #[arg(short, long, env = "SLIDECAST_OUTPUT")]
    output: Option<PathBuf>,

    /// Slide selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "SLIDECAST_SLIDES", default_value = "all")]
    slides: String,

    /// Neural voice for synthesis.
    #[arg(long, env = "SLIDECAST_VOICE", default_value = "en-US-JennyMultilingualNeural")]
    voice: String,

    /// Talking-avatar character.
    #[arg(long, env = "SLIDECAST_AVATAR", default_value = "Lisa")]
    avatar: String,

    /// Avatar style (prebuilt avatars).
    #[arg(long, env = "SLIDECAST_AVATAR_STYLE", default_value = "casual-sitting")]
    avatar_style: String,

    /// Speech service region.
    #[arg(long, env = "SPEECH_REGION")]
    region: Option<String>,

    /// Speech service subscription key.
    #[arg(long, env = "SPEECH_API_KEY", hide_env_values = true)]
    key: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-nano, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Directory for downloaded media files.
    #[arg(long, env = "SLIDECAST_MEDIA_DIR", default_value = ".")]
    media_dir: PathBuf,

    /// Seconds between synthesis-job status polls.
    #[arg(long, env = "SLIDECAST_POLL_INTERVAL", default_value_t = 5)]
    poll_interval: u64,

    /// Maximum status polls per job before giving up.
    #[arg(long, env = "SLIDECAST_MAX_POLLS", default_value_t = 120,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_polls: u32,

    /// Max LLM output tokens per stage.
    #[arg(long, env = "SLIDECAST_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SLIDECAST_TEMPERATURE", default_value_t = 0.8)]
    temperature: f32,

    /// Retries per generation stage on LLM failure.
    #[arg(long, env = "SLIDECAST_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Enrichment page-fetch timeout in seconds.
    #[arg(long, env = "SLIDECAST_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Per-call synthesis API timeout in seconds.
    #[arg(long, env = "SLIDECAST_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Skip slides that already carry a bound media artifact.
    #[arg(long, env = "SLIDECAST_RESUME")]
    resume: bool,

    /// Output the structured run report (JSON) instead of the text summary.
    #[arg(long, env = "SLIDECAST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SLIDECAST_NO_PROGRESS")]
    no_progress: bool,

    /// Print the deck summary only, no narration.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SLIDECAST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SLIDECAST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let deck = JsonDeck::open(&cli.input).context("Failed to open deck")?;
        let summary = inspect(&deck);

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
            );
        } else {
            println!("Deck:    {}", cli.input.display());
            println!("Slides:  {}", summary.slide_count);
            for slide in &summary.slides {
                println!(
                    "  slide {:>3}  {:<13}  {:>5} chars{}{}",
                    slide.number,
                    slide.content_kind,
                    slide.note_chars,
                    if slide.has_artifact { "  [media]" } else { "" },
                    if slide.title.is_empty() {
                        String::new()
                    } else {
                        format!("  {}", slide.title)
                    },
                );
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn NarrationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("narrated.json"));

    // ── Run narration ────────────────────────────────────────────────────
    let mut deck = JsonDeck::open(&cli.input).context("Failed to open deck")?;
    let output = narrate(&mut deck, &output_path, &config)
        .await
        .context("Narration failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = output.stats();
        eprint!("{}", output.report());
        eprintln!(
            "{}  →  {}",
            if stats.failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&output_path.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `NarrationConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<Arc<dyn NarrationProgressCallback>>,
) -> Result<NarrationConfig> {
    let slides = parse_slides(&cli.slides)?;

    let mut builder = NarrationConfig::builder()
        .voice(&cli.voice)
        .avatar_character(&cli.avatar)
        .avatar_style(&cli.avatar_style)
        .slides(slides)
        .sink(OutputSink::Video)
        .media_dir(&cli.media_dir)
        .poll_interval_secs(cli.poll_interval)
        .max_poll_attempts(cli.max_polls)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .fetch_timeout_secs(cli.fetch_timeout)
        .api_timeout_secs(cli.api_timeout)
        .resume(cli.resume);

    if let Some(ref region) = cli.region {
        builder = builder.region(region);
    }
    if let Some(ref key) = cli.key {
        builder = builder.subscription_key(key);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    // Apply fields the builder wraps in Some() unconditionally.
    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();

    Ok(config)
}

/// Parse `--slides` string into `SlideSelection`.
fn parse_slides(s: &str) -> Result<SlideSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(SlideSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start slide in range")?;
        let end: usize = end.trim().parse().context("Invalid end slide in range")?;

        if start < 1 {
            anyhow::bail!("Slides are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid slide range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(SlideSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let slides: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid slide number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        for &p in &slides {
            if p < 1 {
                anyhow::bail!("Slides are 1-indexed, minimum is 1 (got {})", p);
            }
        }

        return Ok(SlideSelection::Set(slides));
    }

    // Single slide: "5"
    let slide: usize = s.parse().context("Invalid slide number")?;
    if slide < 1 {
        anyhow::bail!("Slides are 1-indexed, minimum is 1 (got {})", slide);
    }

    Ok(SlideSelection::Single(slide))
}
