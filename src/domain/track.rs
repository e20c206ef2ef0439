//! Track domain models
//!
//! A `Track` is one music-generation job from submission to completion,
//! keyed locally by `id` and remotely by `remote_task_id`. Its status moves
//! only forward through the lattice `pending → generating → {complete,
//! failed}`; the reconciler enforces that ordering.

use crate::domain::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle status of a generation job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TrackStatus {
    #[default]
    Pending,
    Generating,
    Complete,
    Failed,
}

impl TrackStatus {
    /// Terminal statuses never change again
    pub const fn is_terminal(&self) -> bool {
        matches!(self, TrackStatus::Complete | TrackStatus::Failed)
    }

    /// Forward-only lattice check. A pending job may jump straight to a
    /// terminal state when the first signal we see is already final.
    pub const fn can_advance_to(self, target: TrackStatus) -> bool {
        match (self, target) {
            (TrackStatus::Pending, TrackStatus::Generating)
            | (TrackStatus::Pending, TrackStatus::Complete)
            | (TrackStatus::Pending, TrackStatus::Failed)
            | (TrackStatus::Generating, TrackStatus::Complete)
            | (TrackStatus::Generating, TrackStatus::Failed) => true,
            _ => false,
        }
    }

    /// Stable label used in storage and logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Pending => "pending",
            TrackStatus::Generating => "generating",
            TrackStatus::Complete => "complete",
            TrackStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A music generation job and its produced artifact
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub id: StringUuid,
    pub owner_id: StringUuid,
    /// The generation service's job key; exactly one record per value
    pub remote_task_id: String,
    pub status: TrackStatus,
    pub title: String,
    pub description: Option<String>,
    pub lyrics: Option<String>,
    pub tags: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub instrumental: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Track {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            owner_id: StringUuid::new_v4(),
            remote_task_id: String::new(),
            status: TrackStatus::Pending,
            title: String::new(),
            description: None,
            lyrics: None,
            tags: None,
            audio_url: None,
            image_url: None,
            duration_seconds: None,
            instrumental: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for inserting a new track record
#[derive(Debug, Clone)]
pub struct CreateTrackInput {
    pub owner_id: StringUuid,
    pub remote_task_id: String,
    pub title: String,
    pub description: Option<String>,
    pub lyrics: Option<String>,
    pub tags: Option<String>,
    pub instrumental: bool,
}

/// Fully merged field values produced by the reconciler, applied in a single
/// conditional write guarded by the status the reconciler read.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPatch {
    pub status: TrackStatus,
    pub title: String,
    pub lyrics: Option<String>,
    pub tags: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub duration_seconds: Option<i32>,
}

impl TrackPatch {
    /// Patch that only moves the status, keeping every stored field
    pub fn status_only(track: &Track, status: TrackStatus) -> Self {
        Self {
            status,
            title: track.title.clone(),
            lyrics: track.lyrics.clone(),
            tags: track.tags.clone(),
            audio_url: track.audio_url.clone(),
            image_url: track.image_url.clone(),
            duration_seconds: track.duration_seconds,
        }
    }

    /// True when applying this patch would leave the record as it is
    pub fn is_noop_for(&self, track: &Track) -> bool {
        self.status == track.status
            && self.title == track.title
            && self.lyrics == track.lyrics
            && self.tags == track.tags
            && self.audio_url == track.audio_url
            && self.image_url == track.image_url
            && self.duration_seconds == track.duration_seconds
    }
}

/// Lyrics split into labeled sections for display
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricsSections {
    pub verse: Vec<String>,
    pub chorus: Vec<String>,
}

/// Split raw lyrics into verse/chorus buckets by their `[Verse]` /
/// `[Chorus]` markers (case-insensitive). Lines before any marker count as
/// verse; an unrecognized marker line (e.g. `[Bridge]`) is skipped while
/// the lines after it stay in the current section.
pub fn parse_lyrics(raw: &str) -> LyricsSections {
    let mut sections = LyricsSections::default();
    let mut in_chorus = false;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let lowered = trimmed.to_lowercase();
        if lowered.contains("[verse]") {
            in_chorus = false;
            continue;
        }
        if lowered.contains("[chorus]") {
            in_chorus = true;
            continue;
        }
        if trimmed.starts_with('[') {
            continue;
        }

        if in_chorus {
            sections.chorus.push(trimmed.to_string());
        } else {
            sections.verse.push(trimmed.to_string());
        }
    }

    sections
}

/// Format whole seconds as `MM:SS`
pub fn format_duration(seconds: i32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS` (UTC)
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Display form of a track for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: StringUuid,
    pub remote_task_id: String,
    pub title: String,
    pub description: Option<String>,
    pub lyrics: LyricsSections,
    pub status: TrackStatus,
    pub tags: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub duration: Option<String>,
    pub created_at: String,
}

impl From<Track> for TrackSummary {
    fn from(track: Track) -> Self {
        Self {
            id: track.id,
            remote_task_id: track.remote_task_id,
            title: track.title,
            description: track.description,
            lyrics: parse_lyrics(track.lyrics.as_deref().unwrap_or_default()),
            status: track.status,
            tags: track.tags,
            audio_url: track.audio_url,
            image_url: track.image_url,
            duration: track.duration_seconds.map(format_duration),
            created_at: format_timestamp(track.created_at),
        }
    }
}
