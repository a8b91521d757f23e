use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use uuid::Uuid;

use crate::error_handling::types::QueueError;
use crate::geo::GeoPoint;
use crate::queue::queue_trait::ArtifactQueue;
use crate::queue::types::{AudioNote, CaptureArtifact, SyncStatus};

// Internal row mapping to avoid manual try_get
#[derive(Debug, sqlx::FromRow)]
struct ArtifactRow {
    id: String,
    case_id: String,
    session_id: String,
    captured_at: String,
    session_offset_secs: f64,
    lat: Option<f64>,
    lng: Option<f64>,
    annotation: String,
    suggested_annotation: Option<String>,
    sync_status: String,
    payload: Vec<u8>,
}

impl ArtifactRow {
    fn into_artifact(self) -> Result<CaptureArtifact, QueueError> {
        let location = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        };
        Ok(CaptureArtifact {
            id: Uuid::parse_str(&self.id).map_err(|_| QueueError::ReadFailed)?,
            session_id: Uuid::parse_str(&self.session_id).map_err(|_| QueueError::ReadFailed)?,
            case_id: self.case_id,
            payload: self.payload,
            captured_at: DateTime::parse_from_rfc3339(&self.captured_at)
                .map_err(|_| QueueError::ReadFailed)?
                .with_timezone(&Utc),
            session_offset_secs: self.session_offset_secs,
            location,
            annotation: self.annotation,
            suggested_annotation: self.suggested_annotation,
            sync_status: SyncStatus::parse(&self.sync_status),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AudioNoteRow {
    case_id: String,
    session_id: String,
    started_at: String,
    duration_secs: f64,
    transcript: Option<String>,
    payload: Vec<u8>,
}

impl AudioNoteRow {
    fn into_note(self) -> Result<AudioNote, QueueError> {
        Ok(AudioNote {
            session_id: Uuid::parse_str(&self.session_id).map_err(|_| QueueError::ReadFailed)?,
            case_id: self.case_id,
            payload: self.payload,
            started_at: DateTime::parse_from_rfc3339(&self.started_at)
                .map_err(|_| QueueError::ReadFailed)?
                .with_timezone(&Utc),
            duration_secs: self.duration_secs,
            transcript: self.transcript,
        })
    }
}

/// SQLite-backed durable queue.
///
/// Tables are namespaced with a `satchel_` prefix so the store can share a
/// database file with unrelated application state. WAL journaling keeps
/// shutter-path writes short.
pub struct SqliteArtifactQueue {
    pool: SqlitePool,
}

impl SqliteArtifactQueue {
    /// Default database filename inside the configured storage directory.
    const DEFAULT_DB_FILE: &'static str = "satchel.sqlite3";

    /// Opens (or creates) the queue database inside `storage_dir`.
    pub async fn open<P: AsRef<Path>>(storage_dir: P) -> Result<Self, QueueError> {
        let dir = storage_dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            error!("Failed to create storage dir {}: {}", dir.display(), e);
            QueueError::WriteFailed
        })?;
        let path = dir.join(Self::DEFAULT_DB_FILE);
        let options = SqliteConnectOptions::from_str("sqlite://")
            .map_err(|_| QueueError::ConnectionFailed)?
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to open queue db {}: {}", path.display(), e);
                QueueError::ConnectionFailed
            })?;
        let queue = Self { pool };
        queue.run_migrations().await?;
        info!("Durable artifact queue at {}", path.display());
        Ok(queue)
    }

    /// In-memory database, useful for tests. Not durable.
    pub async fn open_in_memory() -> Result<Self, QueueError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|_| QueueError::ConnectionFailed)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|_| QueueError::ConnectionFailed)?;
        let queue = Self { pool };
        queue.run_migrations().await?;
        Ok(queue)
    }

    async fn run_migrations(&self) -> Result<(), QueueError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS satchel_artifacts (
                id TEXT PRIMARY KEY,
                case_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                captured_at TEXT NOT NULL,
                session_offset_secs REAL NOT NULL,
                lat REAL,
                lng REAL,
                annotation TEXT NOT NULL,
                suggested_annotation TEXT,
                sync_status TEXT NOT NULL,
                payload BLOB NOT NULL,
                position INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Queue migration failed: {}", e);
            QueueError::WriteFailed
        })?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_satchel_artifacts_case
             ON satchel_artifacts(case_id, position);",
        )
        .execute(&self.pool)
        .await
        .map_err(|_| QueueError::WriteFailed)?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS satchel_audio_notes (
                case_id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                duration_secs REAL NOT NULL,
                transcript TEXT,
                payload BLOB NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|_| QueueError::WriteFailed)?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactQueue for SqliteArtifactQueue {
    async fn save(&self, case_id: &str, artifact: &CaptureArtifact) -> Result<(), QueueError> {
        sqlx::query(
            "INSERT INTO satchel_artifacts
               (id, case_id, session_id, captured_at, session_offset_secs,
                lat, lng, annotation, suggested_annotation, sync_status, payload, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
               (SELECT COALESCE(MAX(position) + 1, 0) FROM satchel_artifacts WHERE case_id = ?2))
             ON CONFLICT(id) DO UPDATE SET
               lat = excluded.lat,
               lng = excluded.lng,
               annotation = excluded.annotation,
               suggested_annotation = excluded.suggested_annotation,
               sync_status = excluded.sync_status",
        )
        .bind(artifact.id.to_string())
        .bind(case_id)
        .bind(artifact.session_id.to_string())
        .bind(artifact.captured_at.to_rfc3339())
        .bind(artifact.session_offset_secs)
        .bind(artifact.location.map(|p| p.lat))
        .bind(artifact.location.map(|p| p.lng))
        .bind(&artifact.annotation)
        .bind(artifact.suggested_annotation.clone())
        .bind(artifact.sync_status.as_str())
        .bind(&artifact.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to save artifact {}: {}", artifact.id, e);
            QueueError::WriteFailed
        })?;
        debug!("Queued artifact {} for case {}", artifact.id, case_id);
        Ok(())
    }

    async fn list(&self, case_id: &str) -> Result<Vec<CaptureArtifact>, QueueError> {
        let rows: Vec<ArtifactRow> = sqlx::query_as(
            "SELECT id, case_id, session_id, captured_at, session_offset_secs,
                    lat, lng, annotation, suggested_annotation, sync_status, payload
             FROM satchel_artifacts WHERE case_id = ?1 ORDER BY position ASC",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list artifacts for case {}: {}", case_id, e);
            QueueError::ReadFailed
        })?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.into_artifact()?);
        }
        Ok(out)
    }

    async fn delete(&self, case_id: &str, artifact_id: Uuid) -> Result<(), QueueError> {
        let result = sqlx::query(
            "DELETE FROM satchel_artifacts WHERE case_id = ?1 AND id = ?2",
        )
        .bind(case_id)
        .bind(artifact_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|_| QueueError::WriteFailed)?;
        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound);
        }
        debug!("Deleted artifact {} from case {}", artifact_id, case_id);
        Ok(())
    }

    async fn clear(&self, case_id: &str) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM satchel_artifacts WHERE case_id = ?1")
            .bind(case_id)
            .execute(&self.pool)
            .await
            .map_err(|_| QueueError::WriteFailed)?;
        info!("Cleared queued artifacts for case {}", case_id);
        Ok(())
    }

    async fn cases_with_pending(&self) -> Result<Vec<String>, QueueError> {
        let cases: Vec<String> = sqlx::query_scalar(
            "SELECT case_id FROM satchel_artifacts
             UNION SELECT case_id FROM satchel_audio_notes
             ORDER BY case_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|_| QueueError::ReadFailed)?;
        Ok(cases)
    }

    async fn save_audio_note(&self, note: &AudioNote) -> Result<(), QueueError> {
        sqlx::query(
            "INSERT INTO satchel_audio_notes
               (case_id, session_id, started_at, duration_secs, transcript, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(case_id) DO UPDATE SET
               session_id = excluded.session_id,
               started_at = excluded.started_at,
               duration_secs = excluded.duration_secs,
               transcript = excluded.transcript,
               payload = excluded.payload",
        )
        .bind(&note.case_id)
        .bind(note.session_id.to_string())
        .bind(note.started_at.to_rfc3339())
        .bind(note.duration_secs)
        .bind(note.transcript.clone())
        .bind(&note.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to save audio note for case {}: {}", note.case_id, e);
            QueueError::WriteFailed
        })?;
        Ok(())
    }

    async fn load_audio_note(&self, case_id: &str) -> Result<Option<AudioNote>, QueueError> {
        let row: Option<AudioNoteRow> = sqlx::query_as(
            "SELECT case_id, session_id, started_at, duration_secs, transcript, payload
             FROM satchel_audio_notes WHERE case_id = ?1",
        )
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|_| QueueError::ReadFailed)?;
        row.map(AudioNoteRow::into_note).transpose()
    }

    async fn delete_audio_note(&self, case_id: &str) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM satchel_audio_notes WHERE case_id = ?1")
            .bind(case_id)
            .execute(&self.pool)
            .await
            .map_err(|_| QueueError::WriteFailed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(case_id: &str, session_id: Uuid, payload: &[u8]) -> CaptureArtifact {
        CaptureArtifact::new(session_id, case_id, payload.to_vec(), 0.0)
    }

    #[tokio::test]
    async fn test_save_list_roundtrip_preserves_metadata() {
        let queue = SqliteArtifactQueue::open_in_memory().await.unwrap();
        let session_id = Uuid::new_v4();
        let mut a = artifact("C1", session_id, b"jpeg-bytes");
        a.annotation = "north wall".into();
        a.suggested_annotation = Some("wall, exterior".into());
        a.location = Some(GeoPoint { lat: 46.5, lng: 6.6 });
        queue.save("C1", &a).await.unwrap();

        let listed = queue.list("C1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, a.id);
        assert_eq!(listed[0].payload, b"jpeg-bytes");
        assert_eq!(listed[0].annotation, "north wall");
        assert_eq!(listed[0].suggested_annotation.as_deref(), Some("wall, exterior"));
        assert_eq!(listed[0].location, a.location);
        assert_eq!(listed[0].sync_status, SyncStatus::Pending);
    }

    #[tokio::test]
    async fn test_list_keeps_capture_order() {
        let queue = SqliteArtifactQueue::open_in_memory().await.unwrap();
        let session_id = Uuid::new_v4();
        let a1 = artifact("C1", session_id, b"one");
        let a2 = artifact("C1", session_id, b"two");
        let a3 = artifact("C1", session_id, b"three");
        queue.save("C1", &a1).await.unwrap();
        queue.save("C1", &a2).await.unwrap();
        queue.save("C1", &a3).await.unwrap();

        let ids: Vec<Uuid> = queue.list("C1").await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![a1.id, a2.id, a3.id]);
    }

    #[tokio::test]
    async fn test_save_is_an_upsert() {
        let queue = SqliteArtifactQueue::open_in_memory().await.unwrap();
        let mut a = artifact("C1", Uuid::new_v4(), b"img");
        queue.save("C1", &a).await.unwrap();
        a.annotation = "edited".into();
        a.sync_status = SyncStatus::Failed;
        queue.save("C1", &a).await.unwrap();

        let listed = queue.list("C1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].annotation, "edited");
        assert_eq!(listed[0].sync_status, SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one() {
        let queue = SqliteArtifactQueue::open_in_memory().await.unwrap();
        let session_id = Uuid::new_v4();
        let a1 = artifact("C1", session_id, b"one");
        let a2 = artifact("C1", session_id, b"two");
        queue.save("C1", &a1).await.unwrap();
        queue.save("C1", &a2).await.unwrap();

        queue.delete("C1", a1.id).await.unwrap();
        let listed = queue.list("C1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, a2.id);

        let missing = queue.delete("C1", a1.id).await;
        assert!(matches!(missing, Err(QueueError::NotFound)));
    }

    #[tokio::test]
    async fn test_cases_with_pending_and_clear() {
        let queue = SqliteArtifactQueue::open_in_memory().await.unwrap();
        queue.save("C1", &artifact("C1", Uuid::new_v4(), b"x")).await.unwrap();
        queue.save("C2", &artifact("C2", Uuid::new_v4(), b"y")).await.unwrap();

        let mut cases = queue.cases_with_pending().await.unwrap();
        cases.sort();
        assert_eq!(cases, vec!["C1".to_string(), "C2".to_string()]);

        queue.clear("C1").await.unwrap();
        assert_eq!(queue.cases_with_pending().await.unwrap(), vec!["C2".to_string()]);
        assert!(queue.list("C1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audio_note_roundtrip() {
        let queue = SqliteArtifactQueue::open_in_memory().await.unwrap();
        let note = AudioNote {
            session_id: Uuid::new_v4(),
            case_id: "C1".into(),
            payload: b"opus-bytes".to_vec(),
            started_at: Utc::now(),
            duration_secs: 12.5,
            transcript: None,
        };
        queue.save_audio_note(&note).await.unwrap();

        let loaded = queue.load_audio_note("C1").await.unwrap().unwrap();
        assert_eq!(loaded.session_id, note.session_id);
        assert_eq!(loaded.payload, note.payload);
        assert_eq!(loaded.duration_secs, 12.5);

        assert_eq!(queue.cases_with_pending().await.unwrap(), vec!["C1".to_string()]);
        queue.delete_audio_note("C1").await.unwrap();
        assert!(queue.load_audio_note("C1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let session_id = Uuid::new_v4();
        let a = artifact("C9", session_id, b"persisted");
        {
            let queue = SqliteArtifactQueue::open(dir.path()).await.unwrap();
            queue.save("C9", &a).await.unwrap();
        }
        let reopened = SqliteArtifactQueue::open(dir.path()).await.unwrap();
        let listed = reopened.list("C9").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, a.id);
        assert_eq!(listed[0].payload, b"persisted");
    }
}
