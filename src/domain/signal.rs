//! Normalized lifecycle signals
//!
//! The generation service reports progress through two channels with
//! different vocabularies (push callbacks and polled snapshots). Both are
//! translated at the gateway boundary into this one shape, so the
//! reconciler is written once against it.

use serde::{Deserialize, Serialize};

/// What kind of lifecycle report a signal carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// The task is queued or generating; variants may carry early previews
    Progress,
    /// The task finished and at least one variant was produced
    Complete,
    /// The remote service reported the task as failed
    Error,
}

/// One produced audio variant carried by a signal. Every field is optional;
/// the merge step only takes non-empty values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackVariant {
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub lyrics: Option<String>,
    /// Fractional seconds as reported by the remote service
    pub duration: Option<f64>,
    pub tags: Option<String>,
}

impl TrackVariant {
    /// True when the variant carries a usable audio URL
    pub fn has_audio(&self) -> bool {
        self.audio_url
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false)
    }
}

/// One normalized status report about a remote task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSignal {
    pub remote_task_id: String,
    pub kind: SignalKind,
    pub variants: Vec<TrackVariant>,
    /// Remote progress percentage, when the poll channel reports one
    pub progress: Option<f64>,
}

impl TaskSignal {
    pub fn new(remote_task_id: impl Into<String>, kind: SignalKind) -> Self {
        Self {
            remote_task_id: remote_task_id.into(),
            kind,
            variants: Vec::new(),
            progress: None,
        }
    }

    /// The variant whose fields get merged into the record
    pub fn first_variant(&self) -> Option<&TrackVariant> {
        self.variants.first()
    }
}
