use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Domain-level admission result: `Err` carries a message meant for the
/// caller's `{success:false}` envelope, never an I/O failure.
pub type Admitted<T> = std::result::Result<T, String>;

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Reads a JSON file, returning `default` when the file is absent.
/// A present-but-malformed file is logged and also falls back to `default`.
pub fn read_json_or<T: DeserializeOwned>(path: &Path, default: T) -> T {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return default,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            return default;
        }
    };

    match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Malformed JSON in {}, using default: {}", path.display(), e);
            default
        }
    }
}

/// Like [`read_json_or`] but for stores where absence and corruption both
/// mean "no record": returns `None` in either case, logging only corruption.
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
            }
            return None;
        }
    };

    match serde_json::from_str(&data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Malformed JSON in {}, skipping: {}", path.display(), e);
            None
        }
    }
}

/// Serializes `value` as pretty-printed JSON and overwrites `path`,
/// creating parent directories first.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).context("Failed to serialize record")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// A keyed collection persisted as a single JSON array file.
///
/// Every operation is a full read-modify-write cycle; the lock is held
/// across the cycle so two handlers cannot interleave on the same file.
pub struct JsonCollection<T> {
    path: PathBuf,
    key_of: fn(&T) -> String,
    lock: RwLock<()>,
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn new(path: PathBuf, key_of: fn(&T) -> String) -> Self {
        Self {
            path,
            key_of,
            lock: RwLock::new(()),
        }
    }

    pub async fn list(&self) -> Vec<T> {
        let _guard = self.lock.read().await;
        read_json_or(&self.path, Vec::new())
    }

    pub async fn find(&self, key: &str) -> Option<T> {
        self.list()
            .await
            .into_iter()
            .find(|item| (self.key_of)(item) == key)
    }

    pub async fn insert(&self, item: T) -> Result<T> {
        let _guard = self.lock.write().await;
        let mut items: Vec<T> = read_json_or(&self.path, Vec::new());
        items.push(item.clone());
        write_json(&self.path, &items)?;
        Ok(item)
    }

    /// Inserts `item` only if `admit` accepts it against the current
    /// contents; the check runs under the write lock.
    pub async fn insert_if<F>(&self, item: T, admit: F) -> Result<Admitted<T>>
    where
        F: FnOnce(&[T], &T) -> Admitted<()>,
    {
        let _guard = self.lock.write().await;
        let mut items: Vec<T> = read_json_or(&self.path, Vec::new());
        if let Err(message) = admit(&items, &item) {
            return Ok(Err(message));
        }
        items.push(item.clone());
        write_json(&self.path, &items)?;
        Ok(Ok(item))
    }

    /// Applies `apply` to the record with the given key and persists the
    /// collection. Returns `None` when no record matches.
    pub async fn update_with<F>(&self, key: &str, apply: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut T),
    {
        let _guard = self.lock.write().await;
        let mut items: Vec<T> = read_json_or(&self.path, Vec::new());

        let index = match items.iter().position(|item| (self.key_of)(item) == key) {
            Some(index) => index,
            None => return Ok(None),
        };

        apply(&mut items[index]);
        let updated = items[index].clone();
        write_json(&self.path, &items)?;
        Ok(Some(updated))
    }

    /// Removes the record with the given key. Returns `false` (and leaves
    /// the file untouched) when no record matches.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.write().await;
        let mut items: Vec<T> = read_json_or(&self.path, Vec::new());
        let before = items.len();
        items.retain(|item| (self.key_of)(item) != key);
        if items.len() == before {
            return Ok(false);
        }
        write_json(&self.path, &items)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        id: String,
        label: String,
    }

    fn collection(dir: &TempDir) -> JsonCollection<Entry> {
        JsonCollection::new(dir.path().join("entries.json"), |entry: &Entry| {
            entry.id.clone()
        })
    }

    #[test]
    fn read_missing_file_returns_default() {
        let dir = TempDir::new().unwrap();
        let value: Vec<Entry> = read_json_or(&dir.path().join("nope.json"), Vec::new());
        assert!(value.is_empty());
    }

    #[test]
    fn read_malformed_file_returns_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let value: Vec<Entry> = read_json_or(&path, Vec::new());
        assert!(value.is_empty());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/entry.json");
        let entry = Entry {
            id: "e1".to_string(),
            label: "hello".to_string(),
        };
        write_json(&path, &entry).unwrap();
        let loaded: Option<Entry> = read_json_opt(&path);
        assert_eq!(loaded, Some(entry));
    }

    #[tokio::test]
    async fn remove_absent_key_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let coll = collection(&dir);
        coll.insert(Entry {
            id: "e1".to_string(),
            label: "one".to_string(),
        })
        .await
        .unwrap();

        let before = std::fs::read_to_string(dir.path().join("entries.json")).unwrap();
        assert!(!coll.remove("missing").await.unwrap());
        let after = std::fs::read_to_string(dir.path().join("entries.json")).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn update_missing_key_reports_not_found() {
        let dir = TempDir::new().unwrap();
        let coll = collection(&dir);
        let updated = coll
            .update_with("missing", |entry| entry.label = "x".to_string())
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn insert_if_rejection_does_not_persist() {
        let dir = TempDir::new().unwrap();
        let coll = collection(&dir);
        let outcome = coll
            .insert_if(
                Entry {
                    id: "e1".to_string(),
                    label: "one".to_string(),
                },
                |_, _| Err("rejected".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(outcome.unwrap_err(), "rejected");
        assert!(coll.list().await.is_empty());
    }
}
