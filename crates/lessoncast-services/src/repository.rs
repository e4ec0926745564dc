use async_trait::async_trait;
use lessoncast_core::{AppError, LessonId, VideoAsset};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage of the one video asset each lesson may hold.
#[async_trait]
pub trait VideoAssetRepository: Send + Sync {
    async fn get(&self, lesson_id: LessonId) -> Result<Option<VideoAsset>, AppError>;

    /// Insert or replace the lesson's asset.
    async fn save(&self, asset: VideoAsset) -> Result<(), AppError>;

    /// Replace the stored asset only while it still refers to the same object key.
    ///
    /// Returns `false` when a newer upload has taken its place.
    async fn save_if_current(&self, asset: VideoAsset) -> Result<bool, AppError>;

    async fn remove(&self, lesson_id: LessonId) -> Result<Option<VideoAsset>, AppError>;
}

#[derive(Debug, Default)]
pub struct InMemoryVideoAssetRepository {
    assets: RwLock<HashMap<LessonId, VideoAsset>>,
}

impl InMemoryVideoAssetRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoAssetRepository for InMemoryVideoAssetRepository {
    async fn get(&self, lesson_id: LessonId) -> Result<Option<VideoAsset>, AppError> {
        Ok(self.assets.read().await.get(&lesson_id).cloned())
    }

    async fn save(&self, asset: VideoAsset) -> Result<(), AppError> {
        self.assets.write().await.insert(asset.lesson_id, asset);
        Ok(())
    }

    async fn save_if_current(&self, asset: VideoAsset) -> Result<bool, AppError> {
        let mut assets = self.assets.write().await;
        match assets.get(&asset.lesson_id) {
            Some(stored) if stored.object_key == asset.object_key => {
                assets.insert(asset.lesson_id, asset);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, lesson_id: LessonId) -> Result<Option<VideoAsset>, AppError> {
        Ok(self.assets.write().await.remove(&lesson_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessoncast_core::VideoStatus;

    #[tokio::test]
    async fn test_save_if_current_rejects_superseded_asset() {
        let repo = InMemoryVideoAssetRepository::new();
        let old = VideoAsset::uploaded(1, "lessons/1/old.mp4".to_string(), 10);
        repo.save(old.clone()).await.unwrap();
        repo.save(VideoAsset::uploaded(1, "lessons/1/new.mp4".to_string(), 20))
            .await
            .unwrap();

        let mut stale = old;
        stale.mark_processing().unwrap();
        assert!(!repo.save_if_current(stale).await.unwrap());

        let stored = repo.get(1).await.unwrap().unwrap();
        assert_eq!(stored.object_key.as_deref(), Some("lessons/1/new.mp4"));
        assert_eq!(stored.status, VideoStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_save_if_current_requires_existing_asset() {
        let repo = InMemoryVideoAssetRepository::new();
        let asset = VideoAsset::uploaded(2, "lessons/2/a.mp4".to_string(), 5);
        assert!(!repo.save_if_current(asset.clone()).await.unwrap());

        repo.save(asset.clone()).await.unwrap();
        let mut processing = asset;
        processing.mark_processing().unwrap();
        assert!(repo.save_if_current(processing).await.unwrap());
        assert_eq!(
            repo.get(2).await.unwrap().unwrap().status,
            VideoStatus::Processing
        );
    }

    #[tokio::test]
    async fn test_remove() {
        let repo = InMemoryVideoAssetRepository::new();
        repo.save(VideoAsset::uploaded(3, "k".to_string(), 1)).await.unwrap();
        assert!(repo.remove(3).await.unwrap().is_some());
        assert!(repo.remove(3).await.unwrap().is_none());
    }
}
