use crate::models::{BankQuestion, PyqInfo, QuestionContent};
use crate::store::{read_json_opt, write_json, Admitted};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug)]
pub struct NewBankQuestion {
    pub subject: String,
    pub lesson: String,
    pub question: QuestionContent,
    pub options: Vec<String>,
    pub correct_option: u8,
    pub explanation: Option<QuestionContent>,
    pub pyq: Option<PyqInfo>,
}

#[derive(Debug, Default)]
pub struct BankQuestionUpdate {
    pub question: Option<QuestionContent>,
    pub options: Option<Vec<String>>,
    pub correct_option: Option<u8>,
    pub explanation: Option<QuestionContent>,
    pub pyq: Option<PyqInfo>,
}

/// One JSON file per question under
/// `question_bank/{subject}/{lesson}/questions/`, with binary images stored
/// beside them under `images/`. Records hold bare image filenames only.
pub struct QuestionBank {
    root: PathBuf,
    lock: RwLock<()>,
}

impl QuestionBank {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    fn lesson_dir(&self, subject: &str, lesson: &str) -> PathBuf {
        self.root.join("question_bank").join(subject).join(lesson)
    }

    fn questions_dir(&self, subject: &str, lesson: &str) -> PathBuf {
        self.lesson_dir(subject, lesson).join("questions")
    }

    fn images_dir(&self, subject: &str, lesson: &str) -> PathBuf {
        self.lesson_dir(subject, lesson).join("images")
    }

    fn question_path(&self, subject: &str, lesson: &str, id: &str) -> PathBuf {
        self.questions_dir(subject, lesson).join(format!("{}.json", id))
    }

    pub async fn add(&self, new: NewBankQuestion) -> Result<Admitted<BankQuestion>> {
        if let Err(message) = validate_segments(&new.subject, &new.lesson) {
            return Ok(Err(message));
        }
        if new.options.len() != 4 {
            return Ok(Err("A question needs exactly four options".to_string()));
        }
        if new.correct_option > 3 {
            return Ok(Err("correctOption must be between 0 and 3".to_string()));
        }

        let _guard = self.lock.write().await;
        let question = BankQuestion {
            id: format!("q_{}", Uuid::new_v4().simple()),
            subject: new.subject,
            lesson: new.lesson,
            question: new.question,
            options: new.options,
            correct_option: new.correct_option,
            explanation: new.explanation,
            pyq: new.pyq,
            created_at: Utc::now(),
            updated_at: None,
        };
        let path = self.question_path(&question.subject, &question.lesson, &question.id);
        write_json(&path, &question)?;
        Ok(Ok(question))
    }

    pub async fn get(&self, subject: &str, lesson: &str, id: &str) -> Option<BankQuestion> {
        if validate_segments(subject, lesson).is_err() {
            return None;
        }
        let _guard = self.lock.read().await;
        read_json_opt(&self.question_path(subject, lesson, id))
    }

    /// All questions of a lesson, oldest first. Unparseable files are
    /// logged and skipped.
    pub async fn list(&self, subject: &str, lesson: &str) -> Vec<BankQuestion> {
        if validate_segments(subject, lesson).is_err() {
            return Vec::new();
        }
        let _guard = self.lock.read().await;
        let mut questions = Vec::new();

        let entries = match fs::read_dir(self.questions_dir(subject, lesson)) {
            Ok(entries) => entries,
            Err(_) => return questions,
        };
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(question) = read_json_opt::<BankQuestion>(&path) {
                questions.push(question);
            }
        }

        questions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        questions
    }

    pub async fn update(
        &self,
        subject: &str,
        lesson: &str,
        id: &str,
        update: BankQuestionUpdate,
    ) -> Result<Admitted<BankQuestion>> {
        if let Err(message) = validate_segments(subject, lesson) {
            return Ok(Err(message));
        }
        if let Some(ref options) = update.options {
            if options.len() != 4 {
                return Ok(Err("A question needs exactly four options".to_string()));
            }
        }
        if matches!(update.correct_option, Some(option) if option > 3) {
            return Ok(Err("correctOption must be between 0 and 3".to_string()));
        }

        let _guard = self.lock.write().await;
        let path = self.question_path(subject, lesson, id);
        let mut question: BankQuestion = match read_json_opt(&path) {
            Some(question) => question,
            None => return Ok(Err("Question not found".to_string())),
        };

        if let Some(content) = update.question {
            question.question = content;
        }
        if let Some(options) = update.options {
            question.options = options;
        }
        if let Some(correct_option) = update.correct_option {
            question.correct_option = correct_option;
        }
        if let Some(explanation) = update.explanation {
            question.explanation = Some(explanation);
        }
        if let Some(pyq) = update.pyq {
            question.pyq = Some(pyq);
        }
        question.updated_at = Some(Utc::now());

        write_json(&path, &question)?;
        Ok(Ok(question))
    }

    pub async fn delete(&self, subject: &str, lesson: &str, id: &str) -> Result<bool> {
        if validate_segments(subject, lesson).is_err() {
            return Ok(false);
        }
        let _guard = self.lock.write().await;
        let path = self.question_path(subject, lesson, id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("Failed to delete {}", path.display()))?;
        Ok(true)
    }

    /// Stores image bytes as `{prefix}_{timestamp}_{hash6}.{ext}` and
    /// returns the bare filename for the question record.
    pub async fn save_image(
        &self,
        subject: &str,
        lesson: &str,
        prefix: &str,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<Admitted<String>> {
        if let Err(message) = validate_segments(subject, lesson) {
            return Ok(Err(message));
        }
        // The prefix becomes part of a filename joined under images_dir;
        // hold it to the same character set as the path segments.
        if !is_safe_segment(prefix) {
            return Ok(Err(
                "Image prefix may only contain letters, digits, spaces, '-' and '_'".to_string(),
            ));
        }
        if bytes.is_empty() {
            return Ok(Err("Image data is empty".to_string()));
        }

        let mut ext = Path::new(original_filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("png")
            .to_lowercase();
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            ext = "png".to_string();
        }

        let digest = hex::encode(Sha256::digest(bytes));
        let hash6 = &digest[..6];
        let filename = format!(
            "{}_{}_{}.{}",
            prefix,
            Utc::now().timestamp_millis(),
            hash6,
            ext
        );

        let _guard = self.lock.write().await;
        let path = self.images_dir(subject, lesson).join(&filename);
        crate::store::ensure_parent_dir(&path)?;
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(Ok(filename))
    }

    /// Deterministic daily selection: the same date always yields the same
    /// questions for a lesson. No per-user state.
    pub async fn daily_practice(
        &self,
        subject: &str,
        lesson: &str,
        date: NaiveDate,
        limit: usize,
    ) -> Vec<BankQuestion> {
        let mut questions = self.list(subject, lesson).await;
        if questions.is_empty() || limit == 0 {
            return Vec::new();
        }
        questions.sort_by(|a, b| a.id.cmp(&b.id));
        let start = date.num_days_from_ce() as usize % questions.len();
        questions.rotate_left(start);
        questions.truncate(limit);
        questions
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
}

/// Subject and lesson names become path segments; keep them to a safe
/// character set so a crafted name cannot escape the data directory.
fn validate_segments(subject: &str, lesson: &str) -> Admitted<()> {
    if is_safe_segment(subject) && is_safe_segment(lesson) {
        Ok(())
    } else {
        Err("Subject and lesson names may only contain letters, digits, spaces, '-' and '_'".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_question(subject: &str, lesson: &str, text: &str) -> NewBankQuestion {
        NewBankQuestion {
            subject: subject.to_string(),
            lesson: lesson.to_string(),
            question: QuestionContent::Text(text.to_string()),
            options: vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                "d".to_string(),
            ],
            correct_option: 2,
            explanation: None,
            pyq: None,
        }
    }

    #[tokio::test]
    async fn added_question_reads_back_identically() {
        let dir = TempDir::new().unwrap();
        let bank = QuestionBank::new(dir.path());

        let question = bank
            .add(new_question("Physics", "Optics", "What is focal length?"))
            .await
            .unwrap()
            .unwrap();
        let loaded = bank
            .get("Physics", "Optics", &question.id)
            .await
            .expect("question should exist");

        assert_eq!(
            serde_json::to_value(&question).unwrap(),
            serde_json::to_value(&loaded).unwrap()
        );
    }

    #[tokio::test]
    async fn wrong_option_count_is_rejected() {
        let dir = TempDir::new().unwrap();
        let bank = QuestionBank::new(dir.path());
        let mut draft = new_question("Physics", "Optics", "q");
        draft.options.pop();
        assert!(bank.add(draft).await.unwrap().is_err());
    }

    #[tokio::test]
    async fn path_escaping_segments_are_rejected() {
        let dir = TempDir::new().unwrap();
        let bank = QuestionBank::new(dir.path());
        let draft = new_question("../outside", "Optics", "q");
        assert!(bank.add(draft).await.unwrap().is_err());
        assert!(bank.get("..", "Optics", "q_x").await.is_none());
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields_and_bumps_timestamp() {
        let dir = TempDir::new().unwrap();
        let bank = QuestionBank::new(dir.path());
        let question = bank
            .add(new_question("Physics", "Optics", "original"))
            .await
            .unwrap()
            .unwrap();

        let updated = bank
            .update(
                "Physics",
                "Optics",
                &question.id,
                BankQuestionUpdate {
                    correct_option: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.correct_option, 0);
        assert_eq!(updated.options, question.options);
        assert!(matches!(updated.question, QuestionContent::Text(ref t) if t == "original"));
        assert!(updated.updated_at.is_some());
    }

    #[tokio::test]
    async fn image_filename_follows_the_convention() {
        let dir = TempDir::new().unwrap();
        let bank = QuestionBank::new(dir.path());

        let filename = bank
            .save_image("Physics", "Optics", "question", "diagram.PNG", b"fake-bytes")
            .await
            .unwrap()
            .unwrap();

        assert!(filename.starts_with("question_"));
        assert!(filename.ends_with(".png"));
        let parts: Vec<&str> = filename
            .trim_end_matches(".png")
            .splitn(3, '_')
            .collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 6);
        assert!(dir
            .path()
            .join("question_bank/Physics/Optics/images")
            .join(&filename)
            .exists());
    }

    #[tokio::test]
    async fn path_escaping_image_prefix_is_rejected() {
        let dir = TempDir::new().unwrap();
        let bank = QuestionBank::new(dir.path());

        let outcome = bank
            .save_image(
                "Physics",
                "Optics",
                "../../../../evil",
                "diagram.png",
                b"fake-bytes",
            )
            .await
            .unwrap();
        assert!(outcome.is_err());
        // Nothing may have been written anywhere under the data dir.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn daily_practice_is_deterministic_per_date() {
        let dir = TempDir::new().unwrap();
        let bank = QuestionBank::new(dir.path());
        for i in 0..5 {
            bank.add(new_question("Physics", "Optics", &format!("q{}", i)))
                .await
                .unwrap()
                .unwrap();
        }

        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let first = bank.daily_practice("Physics", "Optics", date, 3).await;
        let second = bank.daily_practice("Physics", "Optics", date, 3).await;
        assert_eq!(first.len(), 3);
        let ids = |qs: &[BankQuestion]| qs.iter().map(|q| q.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));

        let other = bank
            .daily_practice(
                "Physics",
                "Optics",
                NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
                3,
            )
            .await;
        assert_ne!(ids(&first), ids(&other));
    }
}
