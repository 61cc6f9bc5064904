//! Remote batch video synthesis: submit, poll, download.
//!
//! The avatar rendering service works asynchronously. A job is created with
//! `PUT .../avatar/batchsyntheses/{jobId}`, progresses remotely through
//! `Submitted`/`Running`, and ends in exactly one of two terminal states:
//! `Succeeded` (with a result URL) or `Failed`. The client here owns the
//! full lifecycle:
//!
//! 1. [`SynthesisJobClient::submit`] — fresh job id, payload from the run
//!    configuration, one PUT. A rejected submission is never polled.
//! 2. [`SynthesisJobClient::wait`] — fixed-interval polling with a hard
//!    ceiling; a stuck job surfaces as [`SlideError::Timeout`] instead of
//!    hanging the run.
//! 3. [`SynthesisJobClient::download`] — result bytes to
//!    `{media_dir}/{job_id}.{ext}`, written atomically.
//!
//! The HTTP transport sits behind [`SynthesisBackend`] so the state machine
//! can be driven by fakes in tests.

use crate::config::{NarrationConfig, VideoCrop};
use crate::deck::MediaArtifact;
use crate::error::SlideError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Service API version, pinned. Bump deliberately, with a re-test.
pub const API_VERSION: &str = "2024-04-15-preview";

// ── Job model ────────────────────────────────────────────────────────────

/// Lifecycle state of a batch synthesis job.
///
/// `Succeeded` and `Failed` are terminal: once observed, the job's state
/// never changes again and no further status queries are made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Accepted by the service, not yet running.
    Submitted,
    /// Rendering in progress.
    Running,
    /// Rendering finished; a result URL is available.
    Succeeded,
    /// Rendering failed remotely. The job id stays valid for diagnostics.
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Map the service's status string. Unknown in-flight states are treated
    /// as `Running` so a service-side vocabulary addition does not break
    /// polling.
    pub fn from_remote(s: &str) -> Self {
        match s {
            "NotStarted" | "Submitted" => JobStatus::Submitted,
            "Succeeded" => JobStatus::Succeeded,
            "Failed" => JobStatus::Failed,
            _ => JobStatus::Running,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "Submitted",
            JobStatus::Running => "Running",
            JobStatus::Succeeded => "Succeeded",
            JobStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted synthesis job tracked by the client.
#[derive(Debug, Clone)]
pub struct SynthesisJob {
    pub id: String,
    /// The transcript this job was created with.
    pub transcript: String,
    pub status: JobStatus,
    /// Result URL, populated once the service reports `Succeeded`.
    pub result_url: Option<String>,
}

/// One status observation from the service.
#[derive(Debug, Clone)]
pub struct RemoteJobStatus {
    pub status: JobStatus,
    pub result_url: Option<String>,
}

// ── Request payload ──────────────────────────────────────────────────────

/// Wire payload for job creation. Field names follow the service schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisPayload {
    pub synthesis_config: SynthesisVoice,
    pub input_kind: String,
    pub inputs: Vec<SynthesisInput>,
    pub avatar_config: AvatarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisVoice {
    pub voice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisInput {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarConfig {
    pub customized: bool,
    pub talking_avatar_character: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talking_avatar_style: Option<String>,
    pub video_format: String,
    pub video_codec: String,
    pub subtitle_type: String,
    pub background_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_crop: Option<VideoCrop>,
}

/// Build the job-creation payload from the run configuration and a cleaned
/// transcript. SSML transcripts pass through unchanged; the service accepts
/// them under `plainText` input kind when wrapped in `<speak>`.
pub fn build_payload(transcript: &str, config: &NarrationConfig) -> SynthesisPayload {
    SynthesisPayload {
        synthesis_config: SynthesisVoice {
            voice: config.voice.clone(),
        },
        input_kind: "plainText".to_string(),
        inputs: vec![SynthesisInput {
            content: transcript.to_string(),
        }],
        avatar_config: AvatarConfig {
            customized: config.avatar_customized,
            talking_avatar_character: config.avatar_character.clone(),
            talking_avatar_style: config.avatar_style.clone(),
            video_format: config.video_format.clone(),
            video_codec: config.video_codec.clone(),
            subtitle_type: "soft_embedded".to_string(),
            background_color: config.background_color.clone(),
            video_crop: config.video_crop,
        },
    }
}

// ── Transport seam ───────────────────────────────────────────────────────

/// Raw service transport. The bundled implementation is
/// [`HttpSynthesisBackend`]; tests drive the state machine with fakes.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Create the job. Must fail with [`SlideError::Submission`] when the
    /// service rejects the request.
    async fn submit(&self, job_id: &str, payload: &SynthesisPayload) -> Result<(), SlideError>;

    /// Query the job's current state.
    async fn status(&self, job_id: &str) -> Result<RemoteJobStatus, SlideError>;

    /// Fetch the rendered artifact bytes from the result URL.
    async fn download(&self, job_id: &str, url: &str) -> Result<Vec<u8>, SlideError>;
}

/// HTTP transport against the batch synthesis endpoint.
pub struct HttpSynthesisBackend {
    client: reqwest::Client,
    region: String,
    subscription_key: String,
}

/// Status response body; only the fields the client reads.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    outputs: Option<StatusOutputs>,
}

#[derive(Debug, Deserialize)]
struct StatusOutputs {
    #[serde(default)]
    result: Option<String>,
}

impl HttpSynthesisBackend {
    pub fn new(
        region: impl Into<String>,
        subscription_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, SlideError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SlideError::Submission {
                job_id: String::new(),
                detail: format!("client construction failed: {e}"),
            })?;
        Ok(Self {
            client,
            region: region.into(),
            subscription_key: subscription_key.into(),
        })
    }

    fn job_url(&self, job_id: &str) -> String {
        format!(
            "https://{}.api.cognitive.microsoft.com/avatar/batchsyntheses/{}?api-version={}",
            self.region, job_id, API_VERSION
        )
    }
}

#[async_trait]
impl SynthesisBackend for HttpSynthesisBackend {
    async fn submit(&self, job_id: &str, payload: &SynthesisPayload) -> Result<(), SlideError> {
        let response = self
            .client
            .put(self.job_url(job_id))
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| SlideError::Submission {
                job_id: job_id.to_string(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(SlideError::Submission {
                job_id: job_id.to_string(),
                detail: format!("HTTP {status}: {body}"),
            });
        }
        Ok(())
    }

    async fn status(&self, job_id: &str) -> Result<RemoteJobStatus, SlideError> {
        let response = self
            .client
            .get(self.job_url(job_id))
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .send()
            .await
            .map_err(|e| SlideError::StatusQuery {
                job_id: job_id.to_string(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlideError::StatusQuery {
                job_id: job_id.to_string(),
                detail: format!("HTTP {status}"),
            });
        }

        let body: StatusResponse =
            response.json().await.map_err(|e| SlideError::StatusQuery {
                job_id: job_id.to_string(),
                detail: format!("unparsable status body: {e}"),
            })?;

        Ok(RemoteJobStatus {
            status: JobStatus::from_remote(&body.status),
            result_url: body.outputs.and_then(|o| o.result),
        })
    }

    async fn download(&self, job_id: &str, url: &str) -> Result<Vec<u8>, SlideError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SlideError::Download {
                job_id: job_id.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SlideError::Download {
                job_id: job_id.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| SlideError::Download {
            job_id: job_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

// ── Client state machine ─────────────────────────────────────────────────

/// Drives one job per slide through its full lifecycle.
pub struct SynthesisJobClient {
    backend: Arc<dyn SynthesisBackend>,
    poll_interval_secs: u64,
    max_poll_attempts: u32,
    media_dir: PathBuf,
}

impl SynthesisJobClient {
    pub fn new(backend: Arc<dyn SynthesisBackend>, config: &NarrationConfig) -> Self {
        Self {
            backend,
            poll_interval_secs: config.poll_interval_secs,
            max_poll_attempts: config.max_poll_attempts,
            media_dir: config.media_dir.clone(),
        }
    }

    /// Submit a new job for the transcript. Every submission gets a fresh
    /// UUID so re-running a slide never collides with an earlier job.
    pub async fn submit(
        &self,
        transcript: &str,
        config: &NarrationConfig,
    ) -> Result<SynthesisJob, SlideError> {
        let job_id = Uuid::new_v4().to_string();
        let payload = build_payload(transcript, config);

        info!("Job {}: submitting batch synthesis", job_id);
        self.backend.submit(&job_id, &payload).await?;

        Ok(SynthesisJob {
            id: job_id,
            transcript: transcript.to_string(),
            status: JobStatus::Submitted,
            result_url: None,
        })
    }

    /// One status poll. A job already in a terminal state is not re-queried.
    pub async fn poll(&self, job: &mut SynthesisJob) -> Result<JobStatus, SlideError> {
        if job.status.is_terminal() {
            return Ok(job.status);
        }

        let remote = self.backend.status(&job.id).await?;
        debug!("Job {}: status {}", job.id, remote.status);

        job.status = remote.status;
        if remote.result_url.is_some() {
            job.result_url = remote.result_url;
        }
        Ok(job.status)
    }

    /// Poll until the job reaches a terminal state, sleeping the configured
    /// interval between polls. Gives up with [`SlideError::Timeout`] after
    /// `max_poll_attempts` polls; the remote job is left as-is.
    pub async fn wait(&self, job: &mut SynthesisJob) -> Result<JobStatus, SlideError> {
        for attempt in 1..=self.max_poll_attempts {
            let status = self.poll(job).await?;
            if status.is_terminal() {
                info!("Job {}: terminal state {} after {} polls", job.id, status, attempt);
                return Ok(status);
            }
            sleep(Duration::from_secs(self.poll_interval_secs)).await;
        }

        warn!(
            "Job {}: still {} after {} polls, giving up",
            job.id, job.status, self.max_poll_attempts
        );
        Err(SlideError::Timeout {
            job_id: job.id.clone(),
            attempts: self.max_poll_attempts,
        })
    }

    /// The result URL of a succeeded job. Any other state is an error:
    /// `Failed` maps to [`SlideError::SynthesisFailed`], non-terminal states
    /// to [`SlideError::NotReady`].
    pub fn fetch_result(&self, job: &SynthesisJob) -> Result<String, SlideError> {
        match job.status {
            JobStatus::Succeeded => {
                job.result_url.clone().ok_or_else(|| SlideError::Download {
                    job_id: job.id.clone(),
                    reason: "service reported success without a result URL".to_string(),
                })
            }
            JobStatus::Failed => Err(SlideError::SynthesisFailed {
                job_id: job.id.clone(),
            }),
            other => Err(SlideError::NotReady {
                job_id: job.id.clone(),
                status: other.to_string(),
            }),
        }
    }

    /// Download the rendered artifact to `{media_dir}/{job_id}.{ext}`.
    ///
    /// Bytes land in a `.part` file first and are renamed into place, so a
    /// crashed download never leaves a plausible-looking truncated video.
    pub async fn download(
        &self,
        job: &SynthesisJob,
        extension: &str,
    ) -> Result<MediaArtifact, SlideError> {
        let url = self.fetch_result(job)?;
        let bytes = self.backend.download(&job.id, &url).await?;

        let dest = self.media_dir.join(format!("{}.{}", job.id, extension));
        write_artifact(&dest, &bytes).map_err(|e| SlideError::Download {
            job_id: job.id.clone(),
            reason: format!("write to '{}' failed: {}", dest.display(), e),
        })?;

        info!("Job {}: saved {} bytes to {}", job.id, bytes.len(), dest.display());
        Ok(MediaArtifact {
            path: dest,
            mime: mime_for_extension(extension),
            len: bytes.len() as u64,
        })
    }

    /// Full lifecycle for one transcript: submit, wait, download.
    pub async fn run(
        &self,
        transcript: &str,
        config: &NarrationConfig,
    ) -> Result<(SynthesisJob, MediaArtifact), SlideError> {
        let mut job = self.submit(transcript, config).await?;
        self.wait(&mut job).await?;
        let artifact = self.download(&job, &config.video_format).await?;
        Ok((job, artifact))
    }
}

fn write_artifact(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = dest.with_extension("part");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, dest)?;
    Ok(())
}

fn mime_for_extension(ext: &str) -> String {
    match ext {
        "mp4" => "video/mp4".to_string(),
        "webm" => "video/webm".to_string(),
        "mp3" => "audio/mpeg".to_string(),
        "wav" => "audio/wav".to_string(),
        other => format!("application/octet-stream; ext={other}"),
    }
}

// ── Audio sink ───────────────────────────────────────────────────────────

/// Local speech synthesis for the audio output sink.
///
/// The crate ships no network implementation; callers plug in their own
/// (an SDK binding, a local TTS engine) and the orchestrator treats the
/// produced file exactly like a downloaded video.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `transcript` with `voice` into an audio file at `dest`.
    async fn synthesize(&self, transcript: &str, voice: &str, dest: &Path)
        -> Result<(), SlideError>;
}
