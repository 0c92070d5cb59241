use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use crate::db::operations::content;
use crate::db::Database;
use crate::services::{word_store, ServiceError, ServiceResult};

const DEFAULT_ENDPOINT: &str = "https://api.minimax.chat/v1/t2a_v2";
const DEFAULT_MODEL: &str = "speech-02-hd";
const DEFAULT_VOICE_ID: &str = "English_Gentle-voiced_man";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_BATCH_CONCURRENCY: usize = 4;
const MAX_FILENAME_CHARS: usize = 50;

pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;
pub const AUDIO_FORMATS: [&str; 4] = ["mp3", "wav", "flac", "pcm"];

/// MiniMax system voice selectable through a short locale key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice {
    pub key: &'static str,
    pub voice_id: &'static str,
    pub language_boost: &'static str,
    pub description: &'static str,
}

pub static VOICE_OPTIONS: [Voice; 6] = [
    Voice {
        key: "en-US-female",
        voice_id: "English_Graceful_Lady",
        language_boost: "English",
        description: "en US female",
    },
    Voice {
        key: "en-US-male",
        voice_id: DEFAULT_VOICE_ID,
        language_boost: "English",
        description: "en US male",
    },
    Voice {
        key: "en-GB-female",
        voice_id: "English_Wiselady",
        language_boost: "English",
        description: "en GB female",
    },
    Voice {
        key: "en-GB-male",
        voice_id: "English_expressive_narrator",
        language_boost: "English",
        description: "en GB male",
    },
    Voice {
        key: "zh-CN-female",
        voice_id: "female-shaonv",
        language_boost: "Chinese",
        description: "zh CN female",
    },
    Voice {
        key: "zh-CN-male",
        voice_id: "male-qn-qingse",
        language_boost: "Chinese",
        description: "zh CN male",
    },
];

static DEFAULT_VOICE: &Voice = &VOICE_OPTIONS[1];

#[derive(Debug, Clone, PartialEq)]
pub enum TtsProviderType {
    Minimax,
    Mock,
    None,
}

impl TtsProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsProviderType::Minimax => "minimax",
            TtsProviderType::Mock => "mock",
            TtsProviderType::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub provider: TtsProviderType,
    pub group_id: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub batch_concurrency: usize,
    pub audio_dir: PathBuf,
}

impl TtsConfig {
    pub fn from_env(audio_dir: PathBuf) -> Self {
        let provider = match env_string("TTS_PROVIDER").as_deref() {
            Some("minimax") => TtsProviderType::Minimax,
            Some("mock") => TtsProviderType::Mock,
            _ => TtsProviderType::None,
        };

        Self {
            provider,
            group_id: env_string("MINIMAX_GROUP_ID"),
            api_key: env_string("MINIMAX_API_KEY"),
            endpoint: env_string("TTS_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: env_string("TTS_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_millis(env_u64("TTS_TIMEOUT_MS").unwrap_or(DEFAULT_TIMEOUT_MS)),
            max_retries: env_u64("TTS_MAX_RETRIES")
                .map(|v| v.clamp(1, 10) as u32)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            retry_delay: Duration::from_millis(
                env_u64("TTS_RETRY_DELAY_MS").unwrap_or(DEFAULT_RETRY_DELAY_MS),
            ),
            batch_concurrency: env_u64("TTS_BATCH_CONCURRENCY")
                .map(|v| v.clamp(1, 32) as usize)
                .unwrap_or(DEFAULT_BATCH_CONCURRENCY),
            audio_dir,
        }
    }

    /// In-process provider returning synthetic audio. Used by tests.
    pub fn mock(audio_dir: PathBuf) -> Self {
        Self {
            provider: TtsProviderType::Mock,
            group_id: None,
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: 1,
            retry_delay: Duration::ZERO,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            audio_dir,
        }
    }
}

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("TTS not configured: {0}")]
    NotConfigured(&'static str),
    #[error("TTS rate limited")]
    RateLimited,
    #[error("TTS authentication failed")]
    AuthFailed,
    #[error("TTS request timed out")]
    Timeout,
    #[error("TTS provider error: {0}")]
    Provider(String),
    #[error("invalid audio payload: {0}")]
    InvalidAudio(String),
    #[error("audio file error: {0}")]
    Io(#[from] std::io::Error),
}

impl TtsError {
    fn is_retryable(&self) -> bool {
        matches!(self, TtsError::RateLimited | TtsError::Timeout | TtsError::Provider(_))
    }
}

impl From<reqwest::Error> for TtsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Provider(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisOptions {
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            voice: None,
            speed: default_speed(),
            format: default_format(),
        }
    }
}

fn default_speed() -> f64 {
    0.8
}

fn default_format() -> String {
    "mp3".to_string()
}

impl SynthesisOptions {
    pub fn validate(&self) -> ServiceResult<()> {
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(ServiceError::validation("语速必须在 0.5 到 2.0 之间"));
        }
        if !AUDIO_FORMATS.contains(&self.format.as_str()) {
            return Err(ServiceError::validation("不支持的音频格式"));
        }
        Ok(())
    }

    pub fn content_type(&self) -> &'static str {
        match self.format.as_str() {
            "wav" => "audio/wav",
            "flac" => "audio/flac",
            "pcm" => "application/octet-stream",
            _ => "audio/mpeg",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceOption {
    pub key: &'static str,
    pub voice_id: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub word_id: i64,
    pub word: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub generated: usize,
    pub existing: usize,
    pub failed: Vec<BatchFailure>,
}

enum ItemOutcome {
    Generated,
    Existing,
    Failed(BatchFailure),
}

#[derive(Debug, Deserialize)]
struct MinimaxResponse {
    data: Option<MinimaxAudio>,
    base_resp: Option<MinimaxBaseResp>,
}

#[derive(Debug, Deserialize)]
struct MinimaxAudio {
    audio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MinimaxBaseResp {
    status_code: Option<i64>,
    status_msg: Option<String>,
}

#[derive(Clone)]
pub struct TtsService {
    config: TtsConfig,
    client: reqwest::Client,
}

impl TtsService {
    pub fn new(config: TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn config(&self) -> &TtsConfig {
        &self.config
    }

    pub fn is_available(&self) -> bool {
        match self.config.provider {
            TtsProviderType::Minimax => {
                self.config.api_key.as_deref().is_some_and(|v| !v.trim().is_empty())
                    && self.config.group_id.as_deref().is_some_and(|v| !v.trim().is_empty())
            }
            TtsProviderType::Mock => true,
            TtsProviderType::None => false,
        }
    }

    pub fn voices(&self) -> Vec<VoiceOption> {
        VOICE_OPTIONS
            .iter()
            .map(|voice| VoiceOption {
                key: voice.key,
                voice_id: voice.voice_id,
                description: voice.description,
            })
            .collect()
    }

    /// Synthesizes `text`, retrying transient failures with a fixed delay.
    pub async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<Vec<u8>, TtsError> {
        let voice = resolve_voice(options.voice.as_deref());
        let attempts = self.config.max_retries.max(1);
        let mut last_error: Option<TtsError> = None;

        for attempt in 1..=attempts {
            match self.synthesize_once(text, voice, options).await {
                Ok(audio) => return Ok(audio),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!(attempt, max = attempts, error = %err, "TTS request failed, retrying");
                    last_error = Some(err);
                    sleep(self.config.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or(TtsError::Provider("no attempts made".to_string())))
    }

    async fn synthesize_once(
        &self,
        text: &str,
        voice: &Voice,
        options: &SynthesisOptions,
    ) -> Result<Vec<u8>, TtsError> {
        match self.config.provider {
            TtsProviderType::None => Err(TtsError::NotConfigured("TTS_PROVIDER")),
            TtsProviderType::Mock => {
                Ok(format!("MOCK-AUDIO:{}:{}:{text}", voice.voice_id, options.format).into_bytes())
            }
            TtsProviderType::Minimax => self.minimax_request(text, voice, options).await,
        }
    }

    async fn minimax_request(
        &self,
        text: &str,
        voice: &Voice,
        options: &SynthesisOptions,
    ) -> Result<Vec<u8>, TtsError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(TtsError::NotConfigured("MINIMAX_API_KEY"))?;
        let group_id = self
            .config
            .group_id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(TtsError::NotConfigured("MINIMAX_GROUP_ID"))?;

        let payload = serde_json::json!({
            "model": self.config.model,
            "text": text,
            "timber_weights": [{ "voice_id": voice.voice_id, "weight": 1 }],
            "voice_setting": {
                "voice_id": "",
                "speed": options.speed,
                "pitch": 0,
                "vol": 1,
                "emotion": "neutral",
                "latex_read": false
            },
            "audio_setting": {
                "sample_rate": 32000,
                "bitrate": 128000,
                "format": options.format,
                "channel": 1
            },
            "language_boost": voice.language_boost
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[("GroupId", group_id)])
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TtsError::RateLimited);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TtsError::AuthFailed);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Provider(format!("HTTP {status}: {body}")));
        }

        let body: MinimaxResponse = response
            .json()
            .await
            .map_err(|e| TtsError::InvalidAudio(e.to_string()))?;
        match body.data.and_then(|d| d.audio).filter(|a| !a.is_empty()) {
            Some(audio) => decode_audio_hex(&audio),
            None => {
                let detail = body
                    .base_resp
                    .map(|r| format!("{} {}", r.status_code.unwrap_or_default(), r.status_msg.unwrap_or_default()))
                    .unwrap_or_default();
                Err(TtsError::Provider(format!("no audio in response {}", detail.trim())))
            }
        }
    }

    /// Writes audio for every word not already on disk. Individual failures
    /// are reported and never abort the batch.
    pub async fn generate_batch(
        &self,
        dir: &Path,
        words: Vec<(i64, String)>,
        options: &SynthesisOptions,
    ) -> Result<BatchReport, TtsError> {
        tokio::fs::create_dir_all(dir).await?;

        let outcomes: Vec<ItemOutcome> = stream::iter(words)
            .map(|(word_id, word)| async move {
                let path = dir.join(audio_filename(word_id, &word, &options.format));
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return ItemOutcome::Existing;
                }
                let written = match self.synthesize(&word, options).await {
                    Ok(audio) => tokio::fs::write(&path, audio).await.map_err(TtsError::from),
                    Err(err) => Err(err),
                };
                match written {
                    Ok(()) => ItemOutcome::Generated,
                    Err(err) => {
                        warn!(word_id, word = %word, error = %err, "audio generation failed");
                        ItemOutcome::Failed(BatchFailure {
                            word_id,
                            word,
                            reason: err.to_string(),
                        })
                    }
                }
            })
            .buffer_unordered(self.config.batch_concurrency.max(1))
            .collect()
            .await;

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                ItemOutcome::Generated => report.generated += 1,
                ItemOutcome::Existing => report.existing += 1,
                ItemOutcome::Failed(failure) => report.failed.push(failure),
            }
        }
        Ok(report)
    }
}

/// Generates audio files for every word in a list under `<audio_dir>/list_<id>/`.
pub async fn generate_list_audio(
    db: &Database,
    tts: &TtsService,
    list_id: i64,
    options: &SynthesisOptions,
) -> ServiceResult<BatchReport> {
    options.validate()?;
    word_store::get_list(db, list_id).await?;
    if !tts.is_available() {
        return Err(TtsError::NotConfigured("TTS_PROVIDER").into());
    }

    let words: Vec<(i64, String)> = content::list_entries(db.pool(), list_id, false)
        .await?
        .into_iter()
        .map(|entry| (entry.word.id, entry.word.word))
        .collect();
    let dir = tts.config().audio_dir.join(format!("list_{list_id}"));
    let report = tts.generate_batch(&dir, words, options).await?;

    tracing::info!(
        list_id,
        generated = report.generated,
        existing = report.existing,
        failed = report.failed.len(),
        "list audio generation finished"
    );
    Ok(report)
}

/// Maps a voice key (or a catalogue voice id) onto a MiniMax voice.
/// Unknown values fall back to the default voice.
pub fn resolve_voice(key: Option<&str>) -> &'static Voice {
    let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
        return DEFAULT_VOICE;
    };
    match VOICE_OPTIONS
        .iter()
        .find(|voice| voice.key == key || voice.voice_id == key)
    {
        Some(voice) => voice,
        None => {
            warn!(voice = key, "unknown voice, using default");
            DEFAULT_VOICE
        }
    }
}

/// Decodes the provider's hex audio, which may arrive percent-encoded.
pub fn decode_audio_hex(raw: &str) -> Result<Vec<u8>, TtsError> {
    let hex_text = if raw.contains('%') {
        urlencoding::decode(raw)
            .map_err(|e| TtsError::InvalidAudio(e.to_string()))?
            .into_owned()
    } else {
        raw.to_string()
    };
    let audio = hex::decode(hex_text.trim()).map_err(|e| TtsError::InvalidAudio(e.to_string()))?;
    if audio.is_empty() {
        return Err(TtsError::InvalidAudio("empty audio".to_string()));
    }
    Ok(audio)
}

/// Filesystem-safe name: alphanumerics plus `_`, `-`; everything else
/// becomes `_`. Capped at 50 characters.
pub fn safe_filename(text: &str) -> String {
    let name: String = text
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .take(MAX_FILENAME_CHARS)
        .collect();
    if name.is_empty() {
        "audio".to_string()
    } else {
        name
    }
}

/// `<word_id>_<safe word>.<format>`; the id keeps words that sanitize to the
/// same name apart.
pub fn audio_filename(word_id: i64, word: &str, format: &str) -> String {
    format!("{word_id}_{}.{format}", safe_filename(word))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}
