use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error_handling::types::QueueError;
use crate::queue::queue_trait::ArtifactQueue;
use crate::queue::types::{AudioNote, CaptureArtifact};

/// In-memory queue. Implements the same interface as the SQLite store but
/// offers no durability, so it is only suitable for tests and previews.
#[derive(Default)]
pub struct MemoryArtifactQueue {
    artifacts: Mutex<HashMap<String, Vec<CaptureArtifact>>>,
    audio_notes: Mutex<HashMap<String, AudioNote>>,
}

impl MemoryArtifactQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactQueue for MemoryArtifactQueue {
    async fn save(&self, case_id: &str, artifact: &CaptureArtifact) -> Result<(), QueueError> {
        let mut map = self.artifacts.lock().map_err(|_| QueueError::WriteFailed)?;
        let entries = map.entry(case_id.to_string()).or_default();
        match entries.iter_mut().find(|a| a.id == artifact.id) {
            Some(existing) => *existing = artifact.clone(),
            None => entries.push(artifact.clone()),
        }
        Ok(())
    }

    async fn list(&self, case_id: &str) -> Result<Vec<CaptureArtifact>, QueueError> {
        let map = self.artifacts.lock().map_err(|_| QueueError::ReadFailed)?;
        Ok(map.get(case_id).cloned().unwrap_or_default())
    }

    async fn delete(&self, case_id: &str, artifact_id: Uuid) -> Result<(), QueueError> {
        let mut map = self.artifacts.lock().map_err(|_| QueueError::WriteFailed)?;
        let entries = map.get_mut(case_id).ok_or(QueueError::NotFound)?;
        let before = entries.len();
        entries.retain(|a| a.id != artifact_id);
        if entries.len() == before {
            return Err(QueueError::NotFound);
        }
        if entries.is_empty() {
            map.remove(case_id);
        }
        Ok(())
    }

    async fn clear(&self, case_id: &str) -> Result<(), QueueError> {
        let mut map = self.artifacts.lock().map_err(|_| QueueError::WriteFailed)?;
        map.remove(case_id);
        Ok(())
    }

    async fn cases_with_pending(&self) -> Result<Vec<String>, QueueError> {
        let map = self.artifacts.lock().map_err(|_| QueueError::ReadFailed)?;
        let notes = self.audio_notes.lock().map_err(|_| QueueError::ReadFailed)?;
        let mut cases: Vec<String> = map
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.clone())
            .chain(notes.keys().cloned())
            .collect();
        cases.sort();
        cases.dedup();
        Ok(cases)
    }

    async fn save_audio_note(&self, note: &AudioNote) -> Result<(), QueueError> {
        let mut notes = self.audio_notes.lock().map_err(|_| QueueError::WriteFailed)?;
        notes.insert(note.case_id.clone(), note.clone());
        Ok(())
    }

    async fn load_audio_note(&self, case_id: &str) -> Result<Option<AudioNote>, QueueError> {
        let notes = self.audio_notes.lock().map_err(|_| QueueError::ReadFailed)?;
        Ok(notes.get(case_id).cloned())
    }

    async fn delete_audio_note(&self, case_id: &str) -> Result<(), QueueError> {
        let mut notes = self.audio_notes.lock().map_err(|_| QueueError::WriteFailed)?;
        notes.remove(case_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_queue_upsert_and_order() {
        let queue = MemoryArtifactQueue::new();
        let session_id = Uuid::new_v4();
        let mut a1 = CaptureArtifact::new(session_id, "C1", b"one".to_vec(), 0.0);
        let a2 = CaptureArtifact::new(session_id, "C1", b"two".to_vec(), 1.0);
        queue.save("C1", &a1).await.unwrap();
        queue.save("C1", &a2).await.unwrap();

        a1.annotation = "edited".into();
        queue.save("C1", &a1).await.unwrap();

        let listed = queue.list("C1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a1.id);
        assert_eq!(listed[0].annotation, "edited");
        assert_eq!(listed[1].id, a2.id);
    }

    #[tokio::test]
    async fn test_memory_queue_delete_missing_is_not_found() {
        let queue = MemoryArtifactQueue::new();
        let res = queue.delete("C1", Uuid::new_v4()).await;
        assert!(matches!(res, Err(QueueError::NotFound)));
    }
}
