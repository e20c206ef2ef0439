//! Track repository

use crate::domain::{CreateTrackInput, StringUuid, Track, TrackPatch, TrackStatus};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackRepository: Send + Sync {
    async fn insert(&self, input: &CreateTrackInput) -> Result<Track>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Track>>;
    async fn find_by_remote_task_id(&self, remote_task_id: &str) -> Result<Option<Track>>;

    /// All tracks of one owner, newest first
    async fn list_by_owner(&self, owner_id: StringUuid) -> Result<Vec<Track>>;

    /// Conditionally apply a reconciler patch. The write lands only while
    /// the stored status still equals `expected_status`; `false` means a
    /// concurrent signal advanced the record first and nothing was changed.
    async fn apply_patch(
        &self,
        id: StringUuid,
        expected_status: TrackStatus,
        patch: &TrackPatch,
    ) -> Result<bool>;
}

pub struct TrackRepositoryImpl {
    pool: MySqlPool,
}

impl TrackRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackRepository for TrackRepositoryImpl {
    async fn insert(&self, input: &CreateTrackInput) -> Result<Track> {
        let id = StringUuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO music_tracks (id, owner_id, remote_task_id, status, title,
                                      description, lyrics, tags, instrumental,
                                      created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(input.owner_id)
        .bind(&input.remote_task_id)
        .bind(TrackStatus::Pending)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.lyrics)
        .bind(&input.tags)
        .bind(input.instrumental)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create track")))
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Track>> {
        let track = sqlx::query_as::<_, Track>(
            r#"
            SELECT id, owner_id, remote_task_id, status, title, description, lyrics,
                   tags, audio_url, image_url, duration_seconds, instrumental,
                   created_at, updated_at
            FROM music_tracks
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(track)
    }

    async fn find_by_remote_task_id(&self, remote_task_id: &str) -> Result<Option<Track>> {
        let track = sqlx::query_as::<_, Track>(
            r#"
            SELECT id, owner_id, remote_task_id, status, title, description, lyrics,
                   tags, audio_url, image_url, duration_seconds, instrumental,
                   created_at, updated_at
            FROM music_tracks
            WHERE remote_task_id = ?
            "#,
        )
        .bind(remote_task_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(track)
    }

    async fn list_by_owner(&self, owner_id: StringUuid) -> Result<Vec<Track>> {
        let tracks = sqlx::query_as::<_, Track>(
            r#"
            SELECT id, owner_id, remote_task_id, status, title, description, lyrics,
                   tags, audio_url, image_url, duration_seconds, instrumental,
                   created_at, updated_at
            FROM music_tracks
            WHERE owner_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tracks)
    }

    async fn apply_patch(
        &self,
        id: StringUuid,
        expected_status: TrackStatus,
        patch: &TrackPatch,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE music_tracks
            SET status = ?, title = ?, lyrics = ?, tags = ?, audio_url = ?,
                image_url = ?, duration_seconds = ?, updated_at = NOW()
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(patch.status)
        .bind(&patch.title)
        .bind(&patch.lyrics)
        .bind(&patch.tags)
        .bind(&patch.audio_url)
        .bind(&patch.image_url)
        .bind(patch.duration_seconds)
        .bind(id)
        .bind(expected_status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
