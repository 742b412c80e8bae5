use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Response envelope shared by every action endpoint. Expected failures
/// (not found, duplicates, validation) come back as `success:false` with a
/// message; exceptions are reserved for truly unexpected I/O errors.
#[derive(Debug, Serialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ActionResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
}

impl Notebook {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            created_at: Utc::now(),
            bookmarks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub question_id: String,
    pub subject: String,
    pub lesson: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    Chapterwise,
    FullLength,
}

impl TestType {
    pub fn dir_name(&self) -> &'static str {
        match self {
            TestType::Chapterwise => "chapterwise",
            TestType::FullLength => "full_length",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
}

/// A generated test definition, one JSON file per test. `test_type` is
/// optional in the stored shape because older records omit it; readers
/// back-fill it from the directory the file was found in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTest {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_type: Option<TestType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(default)]
    pub questions: Vec<TestQuestion>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subjects: BTreeMap<String, Vec<TestQuestion>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum QuestionContent {
    Text(String),
    /// Bare filename, resolved against the lesson's `images/` directory.
    Image(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyqInfo {
    pub exam: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankQuestion {
    pub id: String,
    pub subject: String,
    pub lesson: String,
    pub question: QuestionContent,
    pub options: Vec<String>,
    pub correct_option: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<QuestionContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pyq: Option<PyqInfo>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralOffer {
    pub id: String,
    pub code: String,
    pub title: String,
    pub bonus_days: i64,
    pub discount_percent: u8,
    pub starts_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReferralOffer {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && self.starts_at <= now && self.ends_at.map_or(true, |ends| ends > now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSettings {
    pub registration_open: bool,
    pub maintenance_mode: bool,
    pub support_email: String,
    pub daily_practice_limit: usize,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            registration_open: true,
            maintenance_mode: false,
            support_email: "support@examprep.app".to_string(),
            daily_practice_limit: crate::config::DEFAULT_DAILY_PRACTICE_LIMIT,
        }
    }
}
