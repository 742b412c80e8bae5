use crate::store::{read_json_or, write_json, Admitted};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRecord {
    #[serde(default)]
    pub following: Vec<String>,
    #[serde(default)]
    pub followers: Vec<String>,
}

/// The follow graph is split across two per-user files that must stay
/// symmetric. Both sides are rewritten on every change; if the second write
/// fails the first is rolled back so the graph never ends up one-sided.
pub struct FollowStorage {
    root: PathBuf,
    lock: RwLock<()>,
}

impl FollowStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        self.root
            .join("user-follows")
            .join(format!("{}.json", user_id))
    }

    pub async fn get(&self, user_id: &str) -> FollowRecord {
        let _guard = self.lock.read().await;
        read_json_or(&self.path_for(user_id), FollowRecord::default())
    }

    pub async fn follow(&self, follower_id: &str, target_id: &str) -> Result<Admitted<()>> {
        if follower_id == target_id {
            return Ok(Err("You cannot follow yourself".to_string()));
        }

        let _guard = self.lock.write().await;
        let follower_path = self.path_for(follower_id);
        let target_path = self.path_for(target_id);

        let mut follower_record: FollowRecord = read_json_or(&follower_path, FollowRecord::default());
        let mut target_record: FollowRecord = read_json_or(&target_path, FollowRecord::default());
        let follower_before = follower_record.clone();

        if !follower_record.following.iter().any(|id| id == target_id) {
            follower_record.following.push(target_id.to_string());
        }
        if !target_record.followers.iter().any(|id| id == follower_id) {
            target_record.followers.push(follower_id.to_string());
        }

        write_json(&follower_path, &follower_record)?;
        if let Err(e) = write_json(&target_path, &target_record) {
            if let Err(rollback) = write_json(&follower_path, &follower_before) {
                tracing::error!(
                    "Follow graph left asymmetric for {} -> {}: {}",
                    follower_id,
                    target_id,
                    rollback
                );
            }
            return Err(e);
        }
        Ok(Ok(()))
    }

    pub async fn unfollow(&self, follower_id: &str, target_id: &str) -> Result<Admitted<()>> {
        if follower_id == target_id {
            return Ok(Err("You cannot unfollow yourself".to_string()));
        }

        let _guard = self.lock.write().await;
        let follower_path = self.path_for(follower_id);
        let target_path = self.path_for(target_id);

        let mut follower_record: FollowRecord = read_json_or(&follower_path, FollowRecord::default());
        let mut target_record: FollowRecord = read_json_or(&target_path, FollowRecord::default());
        let follower_before = follower_record.clone();

        follower_record.following.retain(|id| id != target_id);
        target_record.followers.retain(|id| id != follower_id);

        write_json(&follower_path, &follower_record)?;
        if let Err(e) = write_json(&target_path, &target_record) {
            if let Err(rollback) = write_json(&follower_path, &follower_before) {
                tracing::error!(
                    "Follow graph left asymmetric for {} -> {}: {}",
                    follower_id,
                    target_id,
                    rollback
                );
            }
            return Err(e);
        }
        Ok(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn follow_updates_both_sides() {
        let dir = TempDir::new().unwrap();
        let storage = FollowStorage::new(dir.path());

        storage.follow("a", "b").await.unwrap().unwrap();

        assert_eq!(storage.get("a").await.following, vec!["b".to_string()]);
        assert_eq!(storage.get("b").await.followers, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn follow_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let storage = FollowStorage::new(dir.path());

        storage.follow("a", "b").await.unwrap().unwrap();
        storage.follow("a", "b").await.unwrap().unwrap();

        assert_eq!(storage.get("a").await.following.len(), 1);
        assert_eq!(storage.get("b").await.followers.len(), 1);
    }

    #[tokio::test]
    async fn follow_then_unfollow_restores_both_records_exactly() {
        let dir = TempDir::new().unwrap();
        let storage = FollowStorage::new(dir.path());

        // Pre-existing edges that must survive the round trip.
        storage.follow("a", "c").await.unwrap().unwrap();
        storage.follow("d", "b").await.unwrap().unwrap();
        let a_before = storage.get("a").await;
        let b_before = storage.get("b").await;

        storage.follow("a", "b").await.unwrap().unwrap();
        storage.unfollow("a", "b").await.unwrap().unwrap();

        assert_eq!(storage.get("a").await, a_before);
        assert_eq!(storage.get("b").await, b_before);
    }

    #[tokio::test]
    async fn self_follow_is_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = FollowStorage::new(dir.path());
        assert!(storage.follow("a", "a").await.unwrap().is_err());
    }
}
