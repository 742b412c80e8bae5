use crate::config::TEST_CODE_ATTEMPTS;
use crate::models::{GeneratedTest, TestQuestion, TestType};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use rand::Rng;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::store::{read_json_opt, write_json, Admitted};

const TEST_DIRS: [TestType; 2] = [TestType::Chapterwise, TestType::FullLength];

#[derive(Debug)]
pub enum NewGeneratedTest {
    Chapterwise {
        subject: String,
        lesson: String,
        questions: Vec<TestQuestion>,
    },
    FullLength {
        stream: String,
        subjects: BTreeMap<String, Vec<TestQuestion>>,
    },
}

/// Generated tests, one JSON file per test under
/// `test_pages/{chapterwise|full_length}/{code}.json`. There is no index;
/// lookup probes each directory in a fixed order.
pub struct TestStorage {
    root: PathBuf,
    lock: RwLock<()>,
}

impl TestStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    fn dir_for(&self, test_type: TestType) -> PathBuf {
        self.root.join("test_pages").join(test_type.dir_name())
    }

    fn path_for(&self, test_type: TestType, code: &str) -> PathBuf {
        self.dir_for(test_type).join(format!("{}.json", code))
    }

    fn locate(&self, code: &str) -> Option<(TestType, PathBuf)> {
        for test_type in TEST_DIRS {
            let path = self.path_for(test_type, code);
            if path.exists() {
                return Some((test_type, path));
            }
        }
        None
    }

    pub async fn create(&self, draft: NewGeneratedTest) -> Result<GeneratedTest> {
        let _guard = self.lock.write().await;

        let mut code = generate_test_code();
        let mut attempts = 1;
        while self.locate(&code).is_some() {
            if attempts >= TEST_CODE_ATTEMPTS {
                bail!("Could not allocate a unique test code");
            }
            code = generate_test_code();
            attempts += 1;
        }

        let (test_type, test) = match draft {
            NewGeneratedTest::Chapterwise {
                subject,
                lesson,
                questions,
            } => (
                TestType::Chapterwise,
                GeneratedTest {
                    code: code.clone(),
                    test_type: Some(TestType::Chapterwise),
                    subject: Some(subject),
                    lesson: Some(lesson),
                    stream: None,
                    questions,
                    subjects: BTreeMap::new(),
                    created_at: Utc::now(),
                    updated_at: None,
                },
            ),
            NewGeneratedTest::FullLength { stream, subjects } => (
                TestType::FullLength,
                GeneratedTest {
                    code: code.clone(),
                    test_type: Some(TestType::FullLength),
                    subject: None,
                    lesson: None,
                    stream: Some(stream),
                    questions: Vec::new(),
                    subjects,
                    created_at: Utc::now(),
                    updated_at: None,
                },
            ),
        };

        write_json(&self.path_for(test_type, &code), &test)?;
        Ok(test)
    }

    /// Probes chapterwise then full_length; the stored record may predate
    /// the `testType` field, in which case it is inferred from the
    /// directory the file was found in.
    pub async fn get_by_code(&self, code: &str) -> Option<GeneratedTest> {
        let _guard = self.lock.read().await;
        let (test_type, path) = self.locate(code)?;
        let mut test: GeneratedTest = read_json_opt(&path)?;
        if test.test_type.is_none() {
            test.test_type = Some(test_type);
        }
        Some(test)
    }

    /// Every test from both directories, newest first. Unparseable files
    /// are logged and skipped rather than failing the listing.
    pub async fn list_all(&self) -> Vec<GeneratedTest> {
        let _guard = self.lock.read().await;
        let mut tests = Vec::new();

        for test_type in TEST_DIRS {
            let dir = self.dir_for(test_type);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries.filter_map(|entry| entry.ok()) {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                if let Some(mut test) = read_json_opt::<GeneratedTest>(&path) {
                    if test.test_type.is_none() {
                        test.test_type = Some(test_type);
                    }
                    tests.push(test);
                }
            }
        }

        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tests
    }

    /// Replaces question content. Subject/stream/type are immutable after
    /// creation, and content must match the test's shape.
    pub async fn update_content(
        &self,
        code: &str,
        questions: Option<Vec<TestQuestion>>,
        subjects: Option<BTreeMap<String, Vec<TestQuestion>>>,
    ) -> Result<Admitted<GeneratedTest>> {
        let _guard = self.lock.write().await;
        let (test_type, path) = match self.locate(code) {
            Some(found) => found,
            None => return Ok(Err("Test not found".to_string())),
        };
        let mut test: GeneratedTest = match read_json_opt(&path) {
            Some(test) => test,
            None => return Ok(Err("Test not found".to_string())),
        };
        if test.test_type.is_none() {
            test.test_type = Some(test_type);
        }

        match test_type {
            TestType::Chapterwise => {
                if subjects.is_some() {
                    return Ok(Err(
                        "A chapterwise test carries a flat question list".to_string()
                    ));
                }
                if let Some(questions) = questions {
                    test.questions = questions;
                }
            }
            TestType::FullLength => {
                if questions.is_some() {
                    return Ok(Err(
                        "A full-length test carries per-subject question lists".to_string(),
                    ));
                }
                if let Some(subjects) = subjects {
                    test.subjects = subjects;
                }
            }
        }

        test.updated_at = Some(Utc::now());
        write_json(&path, &test)?;
        Ok(Ok(test))
    }

    pub async fn delete(&self, code: &str) -> Result<bool> {
        let _guard = self.lock.write().await;
        let (_, path) = match self.locate(code) {
            Some(found) => found,
            None => return Ok(false),
        };
        fs::remove_file(&path).with_context(|| format!("Failed to delete {}", path.display()))?;
        Ok(true)
    }
}

const TEST_CODE_LENGTH: usize = 8;
const TEST_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn generate_test_code() -> String {
    let mut rng = rand::thread_rng();
    (0..TEST_CODE_LENGTH)
        .map(|_| TEST_CODE_ALPHABET[rng.gen_range(0..TEST_CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn question(text: &str) -> TestQuestion {
        TestQuestion {
            question: text.to_string(),
            options: vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                "d".to_string(),
            ],
            correct_option: 0,
            explanation: None,
            question_id: None,
        }
    }

    #[tokio::test]
    async fn created_test_is_found_by_code() {
        let dir = TempDir::new().unwrap();
        let storage = TestStorage::new(dir.path());

        let test = storage
            .create(NewGeneratedTest::Chapterwise {
                subject: "Physics".to_string(),
                lesson: "Optics".to_string(),
                questions: vec![question("q1")],
            })
            .await
            .unwrap();

        assert_eq!(test.code.len(), TEST_CODE_LENGTH);
        let found = storage.get_by_code(&test.code).await.unwrap();
        assert_eq!(found.test_type, Some(TestType::Chapterwise));
        assert_eq!(found.subject.as_deref(), Some("Physics"));
        assert_eq!(found.questions.len(), 1);
    }

    #[tokio::test]
    async fn test_type_is_inferred_from_directory_for_legacy_records() {
        let dir = TempDir::new().unwrap();
        let storage = TestStorage::new(dir.path());

        // A legacy full-length record that never stored its testType.
        let legacy = json!({
            "code": "AB12CD34",
            "stream": "engineering",
            "subjects": { "Physics": [] },
            "createdAt": "2024-05-01T10:00:00Z"
        });
        let path = dir
            .path()
            .join("test_pages/full_length/AB12CD34.json");
        write_json(&path, &legacy).unwrap();

        let found = storage.get_by_code("AB12CD34").await.unwrap();
        assert_eq!(found.test_type, Some(TestType::FullLength));
        assert_eq!(found.stream.as_deref(), Some("engineering"));
    }

    #[tokio::test]
    async fn list_all_skips_malformed_files_and_sorts_newest_first() {
        let dir = TempDir::new().unwrap();
        let storage = TestStorage::new(dir.path());

        let older = storage
            .create(NewGeneratedTest::Chapterwise {
                subject: "Physics".to_string(),
                lesson: "Optics".to_string(),
                questions: Vec::new(),
            })
            .await
            .unwrap();
        let newer = storage
            .create(NewGeneratedTest::FullLength {
                stream: "medical".to_string(),
                subjects: BTreeMap::new(),
            })
            .await
            .unwrap();

        std::fs::write(
            dir.path().join("test_pages/chapterwise/BROKEN01.json"),
            "{oops",
        )
        .unwrap();

        let tests = storage.list_all().await;
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].code, newer.code);
        assert_eq!(tests[1].code, older.code);
    }

    #[tokio::test]
    async fn content_update_respects_test_shape() {
        let dir = TempDir::new().unwrap();
        let storage = TestStorage::new(dir.path());
        let test = storage
            .create(NewGeneratedTest::Chapterwise {
                subject: "Physics".to_string(),
                lesson: "Optics".to_string(),
                questions: Vec::new(),
            })
            .await
            .unwrap();

        let rejected = storage
            .update_content(&test.code, None, Some(BTreeMap::new()))
            .await
            .unwrap();
        assert!(rejected.is_err());

        let updated = storage
            .update_content(&test.code, Some(vec![question("q1")]), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.questions.len(), 1);
        assert!(updated.updated_at.is_some());
        // Identity fields survive content updates untouched.
        assert_eq!(updated.subject.as_deref(), Some("Physics"));
    }

    #[tokio::test]
    async fn delete_reports_false_for_unknown_code() {
        let dir = TempDir::new().unwrap();
        let storage = TestStorage::new(dir.path());
        assert!(!storage.delete("NOPE0000").await.unwrap());
    }
}
