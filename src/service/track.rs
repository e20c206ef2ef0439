//! Music generation business logic

use crate::config::Config;
use crate::domain::{
    CreateTrackInput, SignalKind, StringUuid, TaskSignal, Track, TrackStatus, TrackSummary,
};
use crate::error::{AppError, Result};
use crate::repository::TrackRepository;
use crate::service::reconcile::{ReconcileOutcome, Reconciler};
use crate::suno::{CallbackEnvelope, GenerateTaskRequest, SunoClient, SunoModel, VocalGender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Consumer-facing generation request: the mode flag plus the knobs the
/// generation service accepts. Mode-dependent requirements are validated
/// by the gateway before any remote call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateMusicRequest {
    #[serde(default)]
    pub custom_mode: bool,
    pub prompt: Option<String>,
    pub style: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub instrumental: bool,
    pub model: Option<SunoModel>,
    pub persona_id: Option<String>,
    pub negative_tags: Option<String>,
    pub vocal_gender: Option<VocalGender>,
    pub style_weight: Option<f64>,
    pub weirdness_constraint: Option<f64>,
    pub audio_weight: Option<f64>,
}

/// Creation acknowledgement returned to the consumer
#[derive(Debug, Clone, Serialize)]
pub struct CreatedTrack {
    pub task_id: String,
    pub track_id: StringUuid,
    pub status: TrackStatus,
}

/// Merged status answered by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TrackStatusView {
    pub status: TrackStatus,
    pub title: String,
    pub lyrics: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub duration_seconds: Option<i32>,
    /// Remote progress percentage; absent when answered from the store
    pub progress: Option<f64>,
}

impl TrackStatusView {
    fn from_track(track: Track, progress: Option<f64>) -> Self {
        Self {
            status: track.status,
            title: track.title,
            lyrics: track.lyrics,
            audio_url: track.audio_url,
            image_url: track.image_url,
            duration_seconds: track.duration_seconds,
            progress,
        }
    }
}

pub struct TrackService<R: TrackRepository> {
    track_repo: Arc<R>,
    suno: Arc<SunoClient>,
    reconciler: Reconciler<R>,
    callback_url: String,
    default_model: SunoModel,
}

impl<R: TrackRepository> TrackService<R> {
    pub fn new(track_repo: Arc<R>, suno: Arc<SunoClient>, config: &Config) -> Self {
        let default_model = match config.suno.default_model.parse() {
            Ok(model) => model,
            Err(err) => {
                tracing::warn!("{}; falling back to {}", err, SunoModel::default());
                SunoModel::default()
            }
        };

        Self {
            reconciler: Reconciler::new(Arc::clone(&track_repo)),
            track_repo,
            suno,
            callback_url: config.callback_url(),
            default_model,
        }
    }

    /// Create a remote generation task, then record it locally as pending.
    /// Nothing is inserted when the remote call fails.
    pub async fn create_track(
        &self,
        owner_id: StringUuid,
        request: GenerateMusicRequest,
    ) -> Result<CreatedTrack> {
        let task_request = self.build_task_request(&request);
        let remote_task_id = self.suno.create_task(&task_request).await?;

        let input = CreateTrackInput {
            owner_id,
            remote_task_id: remote_task_id.clone(),
            title: request
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            description: request.prompt.clone(),
            lyrics: request.prompt.clone(),
            tags: request.style.clone(),
            instrumental: request.instrumental,
        };
        let track = self.track_repo.insert(&input).await?;

        tracing::info!(
            "Created track {} for remote task {}",
            track.id,
            remote_task_id
        );

        Ok(CreatedTrack {
            task_id: remote_task_id,
            track_id: track.id,
            status: track.status,
        })
    }

    fn build_task_request(&self, request: &GenerateMusicRequest) -> GenerateTaskRequest {
        let mut task = GenerateTaskRequest {
            custom_mode: request.custom_mode,
            prompt: request.prompt.clone(),
            style: None,
            title: None,
            instrumental: request.instrumental,
            model: request.model.unwrap_or(self.default_model),
            call_back_url: self.callback_url.clone(),
            persona_id: None,
            negative_tags: None,
            vocal_gender: None,
            style_weight: None,
            weirdness_constraint: None,
            audio_weight: None,
        };

        // Style, title and the tuning knobs only exist in custom mode; an
        // instrumental custom track sends no lyrics either.
        if request.custom_mode {
            task.style = request.style.clone();
            task.title = request.title.clone();
            task.persona_id = request.persona_id.clone();
            task.negative_tags = request.negative_tags.clone();
            task.vocal_gender = request.vocal_gender;
            task.style_weight = request.style_weight;
            task.weirdness_constraint = request.weirdness_constraint;
            task.audio_weight = request.audio_weight;
            if request.instrumental {
                task.prompt = None;
            }
        }

        task
    }

    /// Merged status for one remote task. Terminal records answer from the
    /// store without a remote call; live ones trigger an on-demand poll whose
    /// result is reconciled before answering.
    pub async fn get_status(
        &self,
        owner_id: StringUuid,
        remote_task_id: &str,
    ) -> Result<TrackStatusView> {
        let track = self
            .track_repo
            .find_by_remote_task_id(remote_task_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Track not found".to_string()))?;

        if track.owner_id != owner_id {
            return Err(AppError::Forbidden(
                "Cannot view another user's track".to_string(),
            ));
        }

        if track.status.is_terminal() {
            return Ok(TrackStatusView::from_track(track, None));
        }

        let snapshot = match self.suno.query_task(remote_task_id).await {
            Ok(snapshot) => snapshot,
            Err(AppError::RemoteService(msg)) => {
                // The remote reported the task itself as failed; record that
                // before surfacing the failure
                let signal = TaskSignal::new(remote_task_id, SignalKind::Error);
                if let Err(err) = self.reconciler.apply(&signal).await {
                    tracing::error!(
                        "Failed to record remote failure for task {}: {}",
                        remote_task_id,
                        err
                    );
                }
                return Err(AppError::RemoteService(msg));
            }
            Err(err) => return Err(err),
        };

        let progress = snapshot.progress;
        self.reconciler.apply(&snapshot.into_signal()).await?;

        let merged = self
            .track_repo
            .find_by_remote_task_id(remote_task_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Track not found".to_string()))?;

        Ok(TrackStatusView::from_track(merged, progress))
    }

    /// The owner's tracks in display form, newest first
    pub async fn list_tracks(&self, owner_id: StringUuid) -> Result<Vec<TrackSummary>> {
        let tracks = self.track_repo.list_by_owner(owner_id).await?;
        Ok(tracks.into_iter().map(TrackSummary::from).collect())
    }

    /// Feed one push delivery through the reconciler. Returns `BadRequest`
    /// only when the payload carries no task id to key on.
    pub async fn ingest_callback(&self, envelope: CallbackEnvelope) -> Result<ReconcileOutcome> {
        let signal = envelope.into_signal().ok_or_else(|| {
            AppError::BadRequest("Callback payload carries no task id".to_string())
        })?;

        tracing::debug!(
            "Ingesting {:?} callback for remote task {}",
            signal.kind,
            signal.remote_task_id
        );

        self.reconciler.apply(&signal).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, JwtConfig, PollerConfig, SunoConfig};
    use crate::repository::track::MockTrackRepository;
    use mockall::predicate::*;
    use pretty_assertions::assert_eq;

    // Points the gateway at a closed port; tests that reach the network
    // fail with RemoteUnavailable instead of hanging.
    fn test_config() -> Config {
        Config {
            http_host: "127.0.0.1".to_string(),
            http_port: 8080,
            http_request_timeout_secs: 30,
            public_base_url: "http://localhost:8080".to_string(),
            database: DatabaseConfig {
                url: "mysql://localhost/test".to_string(),
                max_connections: 10,
                min_connections: 2,
            },
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                issuer: "test".to_string(),
                access_token_ttl_secs: 3600,
            },
            suno: SunoConfig {
                api_base_url: "http://127.0.0.1:9/api/v1".to_string(),
                api_key: "test-key".to_string(),
                default_model: "V4_5".to_string(),
                request_timeout_secs: 1,
            },
            poller: PollerConfig::default(),
        }
    }

    fn test_service(repo: MockTrackRepository) -> TrackService<MockTrackRepository> {
        let config = test_config();
        let suno = Arc::new(SunoClient::new(config.suno.clone()));
        TrackService::new(Arc::new(repo), suno, &config)
    }

    fn simple_request(prompt: &str) -> GenerateMusicRequest {
        GenerateMusicRequest {
            prompt: Some(prompt.to_string()),
            ..GenerateMusicRequest::default()
        }
    }

    #[test]
    fn test_build_simple_mode_request() {
        let service = test_service(MockTrackRepository::new());
        let mut request = simple_request("a quiet piano piece");
        request.style = Some("ignored".to_string());
        request.title = Some("ignored".to_string());
        request.style_weight = Some(0.5);

        let task = service.build_task_request(&request);

        assert!(!task.custom_mode);
        assert_eq!(task.prompt.as_deref(), Some("a quiet piano piece"));
        assert_eq!(task.style, None);
        assert_eq!(task.title, None);
        assert_eq!(task.style_weight, None);
        assert_eq!(task.model, SunoModel::V4_5);
        assert_eq!(
            task.call_back_url,
            "http://localhost:8080/api/v1/music/callback"
        );
    }

    #[test]
    fn test_build_custom_mode_request() {
        let service = test_service(MockTrackRepository::new());
        let request = GenerateMusicRequest {
            custom_mode: true,
            prompt: Some("[Verse]\nNeon rain".to_string()),
            style: Some("synthwave".to_string()),
            title: Some("Night Drive".to_string()),
            model: Some(SunoModel::V5),
            negative_tags: Some("metal".to_string()),
            vocal_gender: Some(VocalGender::Female),
            style_weight: Some(0.61),
            ..GenerateMusicRequest::default()
        };

        let task = service.build_task_request(&request);

        assert!(task.custom_mode);
        assert_eq!(task.style.as_deref(), Some("synthwave"));
        assert_eq!(task.title.as_deref(), Some("Night Drive"));
        assert_eq!(task.prompt.as_deref(), Some("[Verse]\nNeon rain"));
        assert_eq!(task.negative_tags.as_deref(), Some("metal"));
        assert_eq!(task.vocal_gender, Some(VocalGender::Female));
        assert_eq!(task.style_weight, Some(0.61));
        assert_eq!(task.model, SunoModel::V5);
    }

    #[test]
    fn test_build_instrumental_custom_request_drops_lyrics() {
        let service = test_service(MockTrackRepository::new());
        let request = GenerateMusicRequest {
            custom_mode: true,
            instrumental: true,
            prompt: Some("leftover lyrics".to_string()),
            style: Some("lofi".to_string()),
            title: Some("Rainy Loop".to_string()),
            ..GenerateMusicRequest::default()
        };

        let task = service.build_task_request(&request);

        assert!(task.instrumental);
        assert_eq!(task.prompt, None);
    }

    #[tokio::test]
    async fn test_create_track_validation_failure_inserts_nothing() {
        // no expectations set: any repository call panics the mock
        let service = test_service(MockTrackRepository::new());
        let request = GenerateMusicRequest {
            custom_mode: true,
            ..GenerateMusicRequest::default()
        };

        let result = service.create_track(StringUuid::new_v4(), request).await;
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_track_remote_failure_inserts_nothing() {
        let service = test_service(MockTrackRepository::new());

        let result = service
            .create_track(StringUuid::new_v4(), simple_request("a song"))
            .await;
        assert!(matches!(
            result.unwrap_err(),
            AppError::RemoteUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_get_status_not_found() {
        let mut repo = MockTrackRepository::new();
        repo.expect_find_by_remote_task_id()
            .with(eq("T404"))
            .returning(|_| Ok(None));

        let service = test_service(repo);
        let result = service.get_status(StringUuid::new_v4(), "T404").await;

        assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_status_rejects_other_owner() {
        let mut repo = MockTrackRepository::new();
        let other_owner = StringUuid::new_v4();

        repo.expect_find_by_remote_task_id().returning(move |_| {
            Ok(Some(Track {
                owner_id: other_owner,
                remote_task_id: "T1".to_string(),
                ..Track::default()
            }))
        });

        let service = test_service(repo);
        let result = service.get_status(StringUuid::new_v4(), "T1").await;

        assert!(matches!(result.unwrap_err(), AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_get_status_terminal_answers_from_store() {
        let mut repo = MockTrackRepository::new();
        let owner_id = StringUuid::new_v4();

        repo.expect_find_by_remote_task_id().returning(move |_| {
            Ok(Some(Track {
                owner_id,
                remote_task_id: "T1".to_string(),
                status: TrackStatus::Complete,
                title: "Neon Rain".to_string(),
                audio_url: Some("https://cdn.example.com/a.mp3".to_string()),
                duration_seconds: Some(153),
                ..Track::default()
            }))
        });

        // the gateway points at a closed port: a remote call would error
        let service = test_service(repo);
        let view = service.get_status(owner_id, "T1").await.unwrap();

        assert_eq!(view.status, TrackStatus::Complete);
        assert_eq!(view.title, "Neon Rain");
        assert_eq!(view.duration_seconds, Some(153));
        assert_eq!(view.progress, None);
    }

    #[tokio::test]
    async fn test_get_status_transport_failure_leaves_record_alone() {
        let mut repo = MockTrackRepository::new();
        let owner_id = StringUuid::new_v4();

        repo.expect_find_by_remote_task_id().returning(move |_| {
            Ok(Some(Track {
                owner_id,
                remote_task_id: "T1".to_string(),
                status: TrackStatus::Generating,
                ..Track::default()
            }))
        });
        // no expect_apply_patch: an unreachable remote must not mark failed

        let service = test_service(repo);
        let result = service.get_status(owner_id, "T1").await;

        assert!(matches!(
            result.unwrap_err(),
            AppError::RemoteUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_list_tracks_maps_to_summaries() {
        let mut repo = MockTrackRepository::new();
        let owner_id = StringUuid::new_v4();

        repo.expect_list_by_owner()
            .with(eq(owner_id))
            .returning(|_| {
                Ok(vec![Track {
                    remote_task_id: "T1".to_string(),
                    title: "Neon Rain".to_string(),
                    status: TrackStatus::Complete,
                    duration_seconds: Some(153),
                    ..Track::default()
                }])
            });

        let service = test_service(repo);
        let summaries = service.list_tracks(owner_id).await.unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].title, "Neon Rain");
        assert_eq!(summaries[0].duration.as_deref(), Some("02:33"));
    }

    #[tokio::test]
    async fn test_ingest_callback_without_task_id() {
        let service = test_service(MockTrackRepository::new());
        let envelope: CallbackEnvelope =
            serde_json::from_str(r#"{"code": 200, "msg": "ok"}"#).unwrap();

        let result = service.ingest_callback(envelope).await;
        assert!(matches!(result.unwrap_err(), AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_ingest_callback_applies_signal() {
        let mut repo = MockTrackRepository::new();
        let track = Track {
            remote_task_id: "T1".to_string(),
            status: TrackStatus::Pending,
            ..Track::default()
        };

        repo.expect_find_by_remote_task_id()
            .with(eq("T1"))
            .returning(move |_| Ok(Some(track.clone())));
        repo.expect_apply_patch()
            .withf(|_, expected, patch| {
                *expected == TrackStatus::Pending && patch.status == TrackStatus::Generating
            })
            .returning(|_, _, _| Ok(true));

        let service = test_service(repo);
        let envelope: CallbackEnvelope = serde_json::from_str(
            r#"{"code": 200, "msg": "ok", "data": {"callbackType": "first", "task_id": "T1", "data": []}}"#,
        )
        .unwrap();

        let outcome = service.ingest_callback(envelope).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied(TrackStatus::Generating));
    }
}
