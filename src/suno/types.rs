//! Suno API wire types and signal normalization
//!
//! Everything the remote service serializes lives here, together with the
//! translation into the crate's normalized `TaskSignal` shape. The two
//! delivery channels (push callbacks and polled snapshots) use different
//! vocabularies and inconsistent key casing; none of that leaks past this
//! module.

use crate::domain::{SignalKind, TaskSignal, TrackVariant};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

/// Envelope code the API uses for success, regardless of HTTP status
pub const SUNO_SUCCESS_CODE: i64 = 200;

/// Simple-mode prompt ceiling in characters
pub const MAX_PROMPT_CHARS: usize = 500;

/// Custom-mode title ceiling in characters
pub const MAX_TITLE_CHARS: usize = 80;

/// Model versions accepted by the generation API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SunoModel {
    #[serde(rename = "V3_5")]
    V3_5,
    #[serde(rename = "V4")]
    V4,
    #[serde(rename = "V4_5")]
    V4_5,
    #[serde(rename = "V4_5PLUS")]
    V4_5Plus,
    #[default]
    #[serde(rename = "V5")]
    V5,
}

impl SunoModel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SunoModel::V3_5 => "V3_5",
            SunoModel::V4 => "V4",
            SunoModel::V4_5 => "V4_5",
            SunoModel::V4_5Plus => "V4_5PLUS",
            SunoModel::V5 => "V5",
        }
    }
}

impl FromStr for SunoModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "V3_5" => Ok(SunoModel::V3_5),
            "V4" => Ok(SunoModel::V4),
            "V4_5" => Ok(SunoModel::V4_5),
            "V4_5PLUS" => Ok(SunoModel::V4_5Plus),
            "V5" => Ok(SunoModel::V5),
            other => Err(format!("Unknown Suno model: {}", other)),
        }
    }
}

impl std::fmt::Display for SunoModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested vocal gender for generated vocals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VocalGender {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
}

/// Task creation request, discriminated by `custom_mode`.
///
/// Simple mode sends only a free-text prompt; custom mode sends style and
/// title (plus lyrics via `prompt` unless instrumental). The serialized
/// form is camelCase per the remote contract.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTaskRequest {
    pub custom_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub instrumental: bool,
    pub model: SunoModel,
    pub call_back_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocal_gender: Option<VocalGender>,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_weight: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weirdness_constraint: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_weight: Option<f64>,
}

impl GenerateTaskRequest {
    /// Mode-dependent presence and ceiling checks. The weight ranges are
    /// covered by the `Validate` derive; everything conditional lives here.
    pub fn validate_mode_fields(&self) -> std::result::Result<(), AppError> {
        fn filled(value: &Option<String>) -> bool {
            value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
        }

        if self.custom_mode {
            if !filled(&self.style) {
                return Err(AppError::Validation(
                    "style is required in custom mode".to_string(),
                ));
            }
            if !filled(&self.title) {
                return Err(AppError::Validation(
                    "title is required in custom mode".to_string(),
                ));
            }
            if let Some(title) = &self.title {
                if title.chars().count() > MAX_TITLE_CHARS {
                    return Err(AppError::Validation(format!(
                        "title must be at most {} characters",
                        MAX_TITLE_CHARS
                    )));
                }
            }
            if !self.instrumental && !filled(&self.prompt) {
                return Err(AppError::Validation(
                    "prompt is required in custom mode unless the track is instrumental"
                        .to_string(),
                ));
            }
        } else {
            if !filled(&self.prompt) {
                return Err(AppError::Validation(
                    "prompt is required in simple mode".to_string(),
                ));
            }
            if let Some(prompt) = &self.prompt {
                if prompt.chars().count() > MAX_PROMPT_CHARS {
                    return Err(AppError::Validation(format!(
                        "prompt must be at most {} characters",
                        MAX_PROMPT_CHARS
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Response envelope the API wraps every reply in
#[derive(Debug, Clone, Deserialize)]
pub struct SunoEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<T>,
}

/// Payload of a successful task creation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTask {
    pub task_id: String,
}

/// One produced variant as the remote service serializes it. Lyrics arrive
/// keyed `prompt` on the callback channel and `lyrics` on the poll channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteTrackData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl From<RemoteTrackData> for TrackVariant {
    fn from(data: RemoteTrackData) -> Self {
        TrackVariant {
            audio_url: data.audio_url,
            image_url: data.image_url,
            title: data.title,
            lyrics: data.lyrics.or(data.prompt),
            duration: data.duration,
            tags: data.tags,
        }
    }
}

/// Push delivery body. Key casing is inconsistent on the wire
/// (`callbackType` next to `task_id`); kept verbatim here.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEnvelope {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<CallbackData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackData {
    #[serde(rename = "callbackType", default)]
    pub callback_type: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<RemoteTrackData>>,
}

/// Poll reply body for `generate/record-info`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskStatusData {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(rename = "callbackType", default)]
    pub callback_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub data: Option<Vec<RemoteTrackData>>,
}

/// The gateway's view of one remote task after a poll
#[derive(Debug, Clone, Default)]
pub struct RemoteTaskSnapshot {
    pub remote_task_id: String,
    /// Raw remote status text: `status`, falling back to `callbackType`
    pub status_text: Option<String>,
    pub variants: Vec<RemoteTrackData>,
    pub progress: Option<f64>,
}

impl RemoteTaskSnapshot {
    pub(crate) fn from_status(remote_task_id: &str, data: TaskStatusData) -> Self {
        Self {
            remote_task_id: data
                .task_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| remote_task_id.to_string()),
            status_text: data.status.or(data.callback_type),
            variants: data.data.unwrap_or_default(),
            progress: data.progress,
        }
    }

    /// Translate one polled snapshot into the normalized signal shape.
    ///
    /// A variant carrying a non-empty audio URL marks the task complete
    /// even when the status text still says otherwise.
    pub fn into_signal(self) -> TaskSignal {
        let variants: Vec<TrackVariant> =
            self.variants.into_iter().map(TrackVariant::from).collect();
        let status_text = self.status_text.unwrap_or_default();
        let has_delivered_audio = variants.iter().any(TrackVariant::has_audio);

        let kind = if is_failure_text(&status_text) {
            SignalKind::Error
        } else if (is_complete_text(&status_text) && !variants.is_empty()) || has_delivered_audio {
            SignalKind::Complete
        } else {
            SignalKind::Progress
        };

        TaskSignal {
            remote_task_id: self.remote_task_id,
            kind,
            variants,
            progress: self.progress,
        }
    }
}

impl CallbackEnvelope {
    /// Translate one push delivery into the normalized signal shape.
    /// Returns `None` when the payload carries no task id to key on.
    pub fn into_signal(self) -> Option<TaskSignal> {
        let data = self.data?;
        let remote_task_id = data.task_id.filter(|id| !id.is_empty())?;
        let variants: Vec<TrackVariant> = data
            .data
            .unwrap_or_default()
            .into_iter()
            .map(TrackVariant::from)
            .collect();
        let callback_type = data.callback_type.unwrap_or_default();

        let kind = if self.code != SUNO_SUCCESS_CODE || is_failure_text(&callback_type) {
            SignalKind::Error
        } else if is_complete_text(&callback_type) && !variants.is_empty() {
            SignalKind::Complete
        } else {
            // "first" and "text" deliveries, plus anything unrecognized
            SignalKind::Progress
        };

        Some(TaskSignal {
            remote_task_id,
            kind,
            variants,
            progress: None,
        })
    }
}

/// Failure vocabulary across both channels ("error", "failed",
/// "CREATE_TASK_FAILED", "SENSITIVE_WORD_ERROR", ...)
fn is_failure_text(text: &str) -> bool {
    let t = text.to_ascii_lowercase();
    t == "error"
        || t == "failed"
        || t == "callback_exception"
        || t.ends_with("_failed")
        || t.ends_with("_error")
}

/// Completion vocabulary: "complete" on the callback channel, "SUCCESS" on
/// the poll channel. Staged variants like "FIRST_SUCCESS" stay progress.
fn is_complete_text(text: &str) -> bool {
    let t = text.to_ascii_lowercase();
    t == "complete" || t == "success"
}
