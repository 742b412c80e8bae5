use crate::models::{Bookmark, Notebook};
use crate::store::{read_json_or, write_json, Admitted};
use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// All of a user's notebooks live in one file, so deleting a notebook and
/// its bookmark list is a single write.
pub struct NotebookStorage {
    root: PathBuf,
    lock: RwLock<()>,
}

impl NotebookStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    fn notebooks_path(&self, user_id: &str) -> PathBuf {
        self.root
            .join("user-notebooks")
            .join(user_id)
            .join("notebooks.json")
    }

    pub async fn list(&self, user_id: &str) -> Vec<Notebook> {
        let _guard = self.lock.read().await;
        read_json_or(&self.notebooks_path(user_id), Vec::new())
    }

    pub async fn create(&self, user_id: &str, name: String) -> Result<Admitted<Notebook>> {
        let _guard = self.lock.write().await;
        let path = self.notebooks_path(user_id);
        let mut notebooks: Vec<Notebook> = read_json_or(&path, Vec::new());

        if notebooks
            .iter()
            .any(|notebook| notebook.name.eq_ignore_ascii_case(&name))
        {
            return Ok(Err(format!("A notebook named \"{}\" already exists", name)));
        }

        let notebook = Notebook::new(name);
        notebooks.push(notebook.clone());
        write_json(&path, &notebooks)?;
        Ok(Ok(notebook))
    }

    pub async fn rename(
        &self,
        user_id: &str,
        notebook_id: &str,
        new_name: String,
    ) -> Result<Admitted<Notebook>> {
        let _guard = self.lock.write().await;
        let path = self.notebooks_path(user_id);
        let mut notebooks: Vec<Notebook> = read_json_or(&path, Vec::new());

        if notebooks
            .iter()
            .any(|notebook| notebook.id != notebook_id && notebook.name.eq_ignore_ascii_case(&new_name))
        {
            return Ok(Err(format!("A notebook named \"{}\" already exists", new_name)));
        }

        let notebook = match notebooks.iter_mut().find(|notebook| notebook.id == notebook_id) {
            Some(notebook) => notebook,
            None => return Ok(Err("Notebook not found".to_string())),
        };
        notebook.name = new_name;
        let updated = notebook.clone();
        write_json(&path, &notebooks)?;
        Ok(Ok(updated))
    }

    pub async fn delete(&self, user_id: &str, notebook_id: &str) -> Result<bool> {
        let _guard = self.lock.write().await;
        let path = self.notebooks_path(user_id);
        let mut notebooks: Vec<Notebook> = read_json_or(&path, Vec::new());
        let before = notebooks.len();
        notebooks.retain(|notebook| notebook.id != notebook_id);
        if notebooks.len() == before {
            return Ok(false);
        }
        write_json(&path, &notebooks)?;
        Ok(true)
    }

    /// Adds a bookmark, unique per (notebook, question). Re-adding the same
    /// question updates its tags and timestamp instead of duplicating.
    pub async fn add_bookmark(
        &self,
        user_id: &str,
        notebook_id: &str,
        question_id: String,
        subject: String,
        lesson: String,
        tags: Vec<String>,
    ) -> Result<Admitted<Bookmark>> {
        let _guard = self.lock.write().await;
        let path = self.notebooks_path(user_id);
        let mut notebooks: Vec<Notebook> = read_json_or(&path, Vec::new());

        let notebook = match notebooks.iter_mut().find(|notebook| notebook.id == notebook_id) {
            Some(notebook) => notebook,
            None => return Ok(Err("Notebook not found".to_string())),
        };

        let bookmark = match notebook
            .bookmarks
            .iter_mut()
            .find(|bookmark| bookmark.question_id == question_id)
        {
            Some(existing) => {
                existing.tags = tags;
                existing.added_at = Utc::now();
                existing.clone()
            }
            None => {
                let bookmark = Bookmark {
                    question_id,
                    subject,
                    lesson,
                    tags,
                    added_at: Utc::now(),
                };
                notebook.bookmarks.push(bookmark.clone());
                bookmark
            }
        };

        write_json(&path, &notebooks)?;
        Ok(Ok(bookmark))
    }

    pub async fn update_bookmark_tags(
        &self,
        user_id: &str,
        notebook_id: &str,
        question_id: &str,
        tags: Vec<String>,
    ) -> Result<Admitted<Bookmark>> {
        let _guard = self.lock.write().await;
        let path = self.notebooks_path(user_id);
        let mut notebooks: Vec<Notebook> = read_json_or(&path, Vec::new());

        let notebook = match notebooks.iter_mut().find(|notebook| notebook.id == notebook_id) {
            Some(notebook) => notebook,
            None => return Ok(Err("Notebook not found".to_string())),
        };
        let bookmark = match notebook
            .bookmarks
            .iter_mut()
            .find(|bookmark| bookmark.question_id == question_id)
        {
            Some(bookmark) => bookmark,
            None => return Ok(Err("Bookmark not found".to_string())),
        };

        bookmark.tags = tags;
        bookmark.added_at = Utc::now();
        let updated = bookmark.clone();
        write_json(&path, &notebooks)?;
        Ok(Ok(updated))
    }

    pub async fn remove_bookmark(
        &self,
        user_id: &str,
        notebook_id: &str,
        question_id: &str,
    ) -> Result<bool> {
        let _guard = self.lock.write().await;
        let path = self.notebooks_path(user_id);
        let mut notebooks: Vec<Notebook> = read_json_or(&path, Vec::new());

        let notebook = match notebooks.iter_mut().find(|notebook| notebook.id == notebook_id) {
            Some(notebook) => notebook,
            None => return Ok(false),
        };
        let before = notebook.bookmarks.len();
        notebook
            .bookmarks
            .retain(|bookmark| bookmark.question_id != question_id);
        if notebook.bookmarks.len() == before {
            return Ok(false);
        }
        write_json(&path, &notebooks)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn listing_without_any_notebooks_is_empty() {
        let dir = TempDir::new().unwrap();
        let storage = NotebookStorage::new(dir.path());
        assert!(storage.list("u1").await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let storage = NotebookStorage::new(dir.path());

        storage
            .create("u1", "Physics Mistakes".to_string())
            .await
            .unwrap()
            .unwrap();
        let second = storage
            .create("u1", "physics mistakes".to_string())
            .await
            .unwrap();
        assert!(second.is_err());

        // Same name under a different user is fine.
        let other_user = storage
            .create("u2", "Physics Mistakes".to_string())
            .await
            .unwrap();
        assert!(other_user.is_ok());
    }

    #[tokio::test]
    async fn bookmark_scenario_round_trips() {
        let dir = TempDir::new().unwrap();
        let storage = NotebookStorage::new(dir.path());

        let notebook = storage
            .create("u1", "Physics Mistakes".to_string())
            .await
            .unwrap()
            .unwrap();
        storage
            .add_bookmark(
                "u1",
                &notebook.id,
                "Q_123".to_string(),
                "Physics".to_string(),
                "Kinematics".to_string(),
                vec!["revise".to_string()],
            )
            .await
            .unwrap()
            .unwrap();

        let notebooks = storage.list("u1").await;
        assert_eq!(notebooks.len(), 1);
        assert_eq!(notebooks[0].name, "Physics Mistakes");
        assert_eq!(notebooks[0].bookmarks.len(), 1);
        assert_eq!(notebooks[0].bookmarks[0].question_id, "Q_123");
        assert_eq!(notebooks[0].bookmarks[0].tags, vec!["revise".to_string()]);
    }

    #[tokio::test]
    async fn readding_a_question_updates_instead_of_duplicating() {
        let dir = TempDir::new().unwrap();
        let storage = NotebookStorage::new(dir.path());
        let notebook = storage
            .create("u1", "Mistakes".to_string())
            .await
            .unwrap()
            .unwrap();

        for tags in [vec!["revise".to_string()], vec!["hard".to_string()]] {
            storage
                .add_bookmark(
                    "u1",
                    &notebook.id,
                    "Q_1".to_string(),
                    "Physics".to_string(),
                    "Optics".to_string(),
                    tags,
                )
                .await
                .unwrap()
                .unwrap();
        }

        let notebooks = storage.list("u1").await;
        assert_eq!(notebooks[0].bookmarks.len(), 1);
        assert_eq!(notebooks[0].bookmarks[0].tags, vec!["hard".to_string()]);
    }

    #[tokio::test]
    async fn deleting_a_notebook_cascades_to_its_bookmarks() {
        let dir = TempDir::new().unwrap();
        let storage = NotebookStorage::new(dir.path());
        let notebook = storage
            .create("u1", "Mistakes".to_string())
            .await
            .unwrap()
            .unwrap();
        storage
            .add_bookmark(
                "u1",
                &notebook.id,
                "Q_1".to_string(),
                "Physics".to_string(),
                "Optics".to_string(),
                Vec::new(),
            )
            .await
            .unwrap()
            .unwrap();

        assert!(storage.delete("u1", &notebook.id).await.unwrap());
        assert!(storage.list("u1").await.is_empty());
        assert!(!storage.delete("u1", &notebook.id).await.unwrap());
    }
}
