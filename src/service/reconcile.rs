//! Track lifecycle reconciliation
//!
//! Progress reports for one generation job arrive over two independent
//! channels (push callbacks from the generation service and our own status
//! polls). Both are normalized into `TaskSignal` before they get here, so
//! the merge logic below is written once and does not care which channel a
//! signal came from. Signals may be duplicated, partial, or out of order;
//! the stored status only ever moves forward.

use crate::domain::{SignalKind, TaskSignal, Track, TrackPatch, TrackStatus, TrackVariant};
use crate::error::Result;
use crate::repository::TrackRepository;
use std::sync::Arc;

/// What applying one signal did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record was advanced or enriched; carries the resulting status
    Applied(TrackStatus),
    /// The signal carried nothing the record does not already have
    Unchanged(TrackStatus),
    /// A concurrent signal advanced the record between our read and write
    Superseded,
    /// No record matches the remote task id
    UnknownTask,
}

impl ReconcileOutcome {
    pub fn status(&self) -> Option<TrackStatus> {
        match self {
            Self::Applied(status) | Self::Unchanged(status) => Some(*status),
            Self::Superseded | Self::UnknownTask => None,
        }
    }
}

/// Merge one signal into the current record, yielding the patch to write.
///
/// Returns `None` when the signal changes nothing: the record is already
/// terminal (terminal wins, late or contradictory signals are no-ops), or
/// the signal repeats what is stored.
pub fn merge_signal(current: &Track, signal: &TaskSignal) -> Option<TrackPatch> {
    if current.status.is_terminal() {
        return None;
    }

    let patch = match signal.kind {
        SignalKind::Error => TrackPatch::status_only(current, TrackStatus::Failed),
        SignalKind::Complete => {
            let mut patch = TrackPatch::status_only(current, TrackStatus::Complete);
            if let Some(variant) = signal.first_variant() {
                fill_from_variant(&mut patch, variant);
            }
            patch
        }
        SignalKind::Progress => {
            // A progress report never finishes a track, but the first one
            // moves it out of pending, and any attached variant (preview
            // URLs from "first"/"text" callbacks) fills empty fields early.
            let status = if current.status == TrackStatus::Pending {
                TrackStatus::Generating
            } else {
                current.status
            };
            let mut patch = TrackPatch::status_only(current, status);
            if let Some(variant) = signal.first_variant() {
                fill_from_variant(&mut patch, variant);
            }
            patch
        }
    };

    if patch.is_noop_for(current) {
        return None;
    }

    Some(patch)
}

/// Fill-don't-clobber: a non-empty incoming value overwrites, an empty or
/// missing one leaves the stored value alone. Durations arrive as fractional
/// seconds and are rounded here.
fn fill_from_variant(patch: &mut TrackPatch, variant: &TrackVariant) {
    if let Some(title) = filled(&variant.title) {
        patch.title = title.to_string();
    }
    if let Some(lyrics) = filled(&variant.lyrics) {
        patch.lyrics = Some(lyrics.to_string());
    }
    if let Some(tags) = filled(&variant.tags) {
        patch.tags = Some(tags.to_string());
    }
    if let Some(audio_url) = filled(&variant.audio_url) {
        patch.audio_url = Some(audio_url.to_string());
    }
    if let Some(image_url) = filled(&variant.image_url) {
        patch.image_url = Some(image_url.to_string());
    }
    if let Some(duration) = variant.duration {
        patch.duration_seconds = Some(duration.round() as i32);
    }
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Drives `merge_signal` against the store: read the record, merge pure,
/// write once behind a status guard. A lost guard means a concurrent signal
/// already carried the record forward; the losing write is dropped, never
/// retried.
pub struct Reconciler<R: TrackRepository> {
    track_repo: Arc<R>,
}

impl<R: TrackRepository> Clone for Reconciler<R> {
    fn clone(&self) -> Self {
        Self {
            track_repo: Arc::clone(&self.track_repo),
        }
    }
}

impl<R: TrackRepository> Reconciler<R> {
    pub fn new(track_repo: Arc<R>) -> Self {
        Self { track_repo }
    }

    pub async fn apply(&self, signal: &TaskSignal) -> Result<ReconcileOutcome> {
        let track = match self
            .track_repo
            .find_by_remote_task_id(&signal.remote_task_id)
            .await?
        {
            Some(track) => track,
            None => {
                tracing::warn!(
                    "Dropping signal for unknown remote task {}",
                    signal.remote_task_id
                );
                return Ok(ReconcileOutcome::UnknownTask);
            }
        };

        let patch = match merge_signal(&track, signal) {
            Some(patch) => patch,
            None => return Ok(ReconcileOutcome::Unchanged(track.status)),
        };

        let target = patch.status;
        let applied = self
            .track_repo
            .apply_patch(track.id, track.status, &patch)
            .await?;

        if applied {
            tracing::info!(
                "Reconciled remote task {}: {} -> {}",
                signal.remote_task_id,
                track.status,
                target
            );
            Ok(ReconcileOutcome::Applied(target))
        } else {
            tracing::debug!(
                "Signal for remote task {} superseded by a concurrent write",
                signal.remote_task_id
            );
            Ok(ReconcileOutcome::Superseded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::track::MockTrackRepository;
    use mockall::predicate::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn pending_track() -> Track {
        Track {
            remote_task_id: "T1".to_string(),
            status: TrackStatus::Pending,
            title: "Untitled".to_string(),
            ..Track::default()
        }
    }

    fn full_variant() -> TrackVariant {
        TrackVariant {
            audio_url: Some("https://cdn.example.com/a.mp3".to_string()),
            image_url: Some("https://cdn.example.com/a.jpg".to_string()),
            title: Some("Neon Rain".to_string()),
            lyrics: Some("[Verse]\nfirst line".to_string()),
            duration: Some(153.4),
            tags: Some("synthwave, rain".to_string()),
        }
    }

    fn signal(kind: SignalKind, variants: Vec<TrackVariant>) -> TaskSignal {
        TaskSignal {
            variants,
            ..TaskSignal::new("T1", kind)
        }
    }

    #[rstest]
    #[case(TrackStatus::Complete)]
    #[case(TrackStatus::Failed)]
    fn terminal_record_ignores_every_signal(#[case] status: TrackStatus) {
        let track = Track {
            status,
            ..pending_track()
        };

        for kind in [SignalKind::Progress, SignalKind::Complete, SignalKind::Error] {
            assert_eq!(merge_signal(&track, &signal(kind, vec![full_variant()])), None);
        }
    }

    #[test]
    fn error_signal_marks_failed_without_enrichment() {
        let mut track = pending_track();
        track.audio_url = Some("https://cdn.example.com/stream.mp3".to_string());

        let patch = merge_signal(&track, &signal(SignalKind::Error, vec![full_variant()]))
            .expect("error signal on a pending track must patch");

        assert_eq!(patch.status, TrackStatus::Failed);
        // stored fields ride along untouched
        assert_eq!(patch.title, "Untitled");
        assert_eq!(
            patch.audio_url,
            Some("https://cdn.example.com/stream.mp3".to_string())
        );
        assert_eq!(patch.duration_seconds, None);
    }

    #[test]
    fn complete_signal_fills_all_fields() {
        let track = Track {
            status: TrackStatus::Generating,
            ..pending_track()
        };

        let patch = merge_signal(&track, &signal(SignalKind::Complete, vec![full_variant()]))
            .expect("complete signal must patch");

        assert_eq!(patch.status, TrackStatus::Complete);
        assert_eq!(patch.title, "Neon Rain");
        assert_eq!(patch.lyrics, Some("[Verse]\nfirst line".to_string()));
        assert_eq!(patch.tags, Some("synthwave, rain".to_string()));
        assert_eq!(
            patch.audio_url,
            Some("https://cdn.example.com/a.mp3".to_string())
        );
        assert_eq!(
            patch.image_url,
            Some("https://cdn.example.com/a.jpg".to_string())
        );
        assert_eq!(patch.duration_seconds, Some(153));
    }

    #[rstest]
    #[case(153.4, 153)]
    #[case(153.5, 154)]
    #[case(0.4, 0)]
    #[case(240.0, 240)]
    fn duration_rounds_to_whole_seconds(#[case] raw: f64, #[case] stored: i32) {
        let variant = TrackVariant {
            duration: Some(raw),
            ..TrackVariant::default()
        };

        let patch = merge_signal(
            &pending_track(),
            &signal(SignalKind::Complete, vec![variant]),
        )
        .unwrap();

        assert_eq!(patch.duration_seconds, Some(stored));
    }

    #[test]
    fn empty_incoming_values_never_clobber_stored_ones() {
        let mut track = pending_track();
        track.status = TrackStatus::Generating;
        track.title = "My Song".to_string();
        track.lyrics = Some("stored lyrics".to_string());
        track.image_url = Some("https://cdn.example.com/early.jpg".to_string());

        let variant = TrackVariant {
            audio_url: Some("https://cdn.example.com/final.mp3".to_string()),
            image_url: Some("   ".to_string()),
            title: None,
            lyrics: Some(String::new()),
            duration: Some(90.0),
            tags: None,
        };

        let patch = merge_signal(&track, &signal(SignalKind::Complete, vec![variant])).unwrap();

        assert_eq!(patch.title, "My Song");
        assert_eq!(patch.lyrics, Some("stored lyrics".to_string()));
        assert_eq!(
            patch.image_url,
            Some("https://cdn.example.com/early.jpg".to_string())
        );
        assert_eq!(
            patch.audio_url,
            Some("https://cdn.example.com/final.mp3".to_string())
        );
        assert_eq!(patch.duration_seconds, Some(90));
    }

    #[test]
    fn complete_signal_without_variant_still_moves_status() {
        let patch = merge_signal(&pending_track(), &signal(SignalKind::Complete, vec![]))
            .expect("status change alone is a patch");

        assert_eq!(patch.status, TrackStatus::Complete);
        assert_eq!(patch.audio_url, None);
    }

    #[test]
    fn progress_signal_moves_pending_to_generating() {
        let patch = merge_signal(&pending_track(), &signal(SignalKind::Progress, vec![]))
            .expect("first progress report must patch");

        assert_eq!(patch.status, TrackStatus::Generating);
    }

    #[test]
    fn repeated_progress_without_news_is_a_noop() {
        let track = Track {
            status: TrackStatus::Generating,
            ..pending_track()
        };

        assert_eq!(merge_signal(&track, &signal(SignalKind::Progress, vec![])), None);
    }

    #[test]
    fn progress_variant_enriches_without_completing() {
        let track = Track {
            status: TrackStatus::Generating,
            ..pending_track()
        };
        let variant = TrackVariant {
            audio_url: Some("https://cdn.example.com/stream.mp3".to_string()),
            title: Some("Neon Rain".to_string()),
            ..TrackVariant::default()
        };

        let patch = merge_signal(&track, &signal(SignalKind::Progress, vec![variant])).unwrap();

        assert_eq!(patch.status, TrackStatus::Generating);
        assert_eq!(patch.title, "Neon Rain");
        assert_eq!(
            patch.audio_url,
            Some("https://cdn.example.com/stream.mp3".to_string())
        );
    }

    #[test]
    fn progress_variant_matching_stored_fields_is_a_noop() {
        let mut track = pending_track();
        track.status = TrackStatus::Generating;
        track.title = "Neon Rain".to_string();
        track.audio_url = Some("https://cdn.example.com/stream.mp3".to_string());

        let variant = TrackVariant {
            audio_url: Some("https://cdn.example.com/stream.mp3".to_string()),
            title: Some("Neon Rain".to_string()),
            ..TrackVariant::default()
        };

        assert_eq!(
            merge_signal(&track, &signal(SignalKind::Progress, vec![variant])),
            None
        );
    }

    #[tokio::test]
    async fn apply_reports_unknown_task_without_writing() {
        let mut repo = MockTrackRepository::new();
        repo.expect_find_by_remote_task_id()
            .with(eq("T1"))
            .returning(|_| Ok(None));
        // no expect_apply_patch: any write attempt would panic the mock

        let reconciler = Reconciler::new(Arc::new(repo));
        let outcome = reconciler
            .apply(&signal(SignalKind::Complete, vec![full_variant()]))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::UnknownTask);
        assert_eq!(outcome.status(), None);
    }

    #[tokio::test]
    async fn apply_advances_pending_on_progress() {
        let mut repo = MockTrackRepository::new();
        let track = pending_track();
        let id = track.id;

        repo.expect_find_by_remote_task_id()
            .with(eq("T1"))
            .returning(move |_| Ok(Some(track.clone())));
        repo.expect_apply_patch()
            .withf(move |patch_id, expected, patch| {
                *patch_id == id
                    && *expected == TrackStatus::Pending
                    && patch.status == TrackStatus::Generating
            })
            .returning(|_, _, _| Ok(true));

        let reconciler = Reconciler::new(Arc::new(repo));
        let outcome = reconciler
            .apply(&signal(SignalKind::Progress, vec![]))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Applied(TrackStatus::Generating));
        assert_eq!(outcome.status(), Some(TrackStatus::Generating));
    }

    #[tokio::test]
    async fn apply_leaves_terminal_records_alone() {
        let mut repo = MockTrackRepository::new();
        let track = Track {
            status: TrackStatus::Complete,
            ..pending_track()
        };

        repo.expect_find_by_remote_task_id()
            .returning(move |_| Ok(Some(track.clone())));

        let reconciler = Reconciler::new(Arc::new(repo));
        let outcome = reconciler
            .apply(&signal(SignalKind::Error, vec![]))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Unchanged(TrackStatus::Complete));
    }

    #[tokio::test]
    async fn apply_reports_superseded_when_the_guard_fails() {
        let mut repo = MockTrackRepository::new();

        repo.expect_find_by_remote_task_id()
            .returning(|_| Ok(Some(pending_track())));
        repo.expect_apply_patch().returning(|_, _, _| Ok(false));

        let reconciler = Reconciler::new(Arc::new(repo));
        let outcome = reconciler
            .apply(&signal(SignalKind::Complete, vec![full_variant()]))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Superseded);
        assert_eq!(outcome.status(), None);
    }
}
