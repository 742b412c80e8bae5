use crate::config::OTP_TTL_MINUTES;
use crate::store::{Admitted, JsonCollection};
use crate::user_models::{PlanTier, Role, Subscription, User};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

pub struct UserStorage {
    users: JsonCollection<User>,
}

impl UserStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            users: JsonCollection::new(data_dir.join("users.json"), |user: &User| user.id.clone()),
        }
    }

    pub async fn create_user(&self, user: User) -> Result<Admitted<User>> {
        self.users
            .insert_if(user, |existing, candidate| {
                if existing
                    .iter()
                    .any(|u| u.email.eq_ignore_ascii_case(&candidate.email))
                {
                    return Err("An account with this email already exists".to_string());
                }
                Ok(())
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Option<User> {
        self.users.find(id).await
    }

    pub async fn get_by_email(&self, email: &str) -> Option<User> {
        self.users
            .list()
            .await
            .into_iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
    }

    pub async fn list(&self) -> Vec<User> {
        self.users.list().await
    }

    pub async fn update_profile(
        &self,
        id: &str,
        name: Option<String>,
        phone: Option<String>,
    ) -> Result<Option<User>> {
        self.users
            .update_with(id, |user| {
                if let Some(name) = name {
                    user.name = name;
                }
                if let Some(phone) = phone {
                    user.phone = Some(phone);
                }
                user.updated_at = Utc::now();
            })
            .await
    }

    pub async fn set_role(&self, id: &str, role: Role) -> Result<Option<User>> {
        self.users
            .update_with(id, |user| {
                user.role = role;
                user.updated_at = Utc::now();
            })
            .await
    }

    pub async fn set_subscription(&self, id: &str, subscription: Subscription) -> Result<Option<User>> {
        self.users
            .update_with(id, |user| {
                user.subscription = subscription;
                user.updated_at = Utc::now();
            })
            .await
    }

    pub async fn set_password_hash(&self, id: &str, password_hash: String) -> Result<Option<User>> {
        self.users
            .update_with(id, |user| {
                user.password_hash = password_hash;
                user.updated_at = Utc::now();
            })
            .await
    }

    /// Grants `bonus_days` of paid access, stacking on top of a still-valid
    /// expiry. Free accounts are lifted to Pro.
    pub async fn extend_subscription(&self, id: &str, bonus_days: i64) -> Result<Option<User>> {
        self.users
            .update_with(id, |user| {
                let now = Utc::now();
                let base = match user.subscription.expires_at {
                    Some(expiry) if expiry > now => expiry,
                    _ => now,
                };
                user.subscription.expires_at = Some(base + Duration::days(bonus_days));
                if user.subscription.plan == PlanTier::Free {
                    user.subscription.plan = PlanTier::Pro;
                }
                user.updated_at = now;
            })
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.users.remove(id).await
    }
}

struct OtpEntry {
    code: String,
    expires_at: DateTime<Utc>,
}

/// In-memory one-time-password cache for password resets. Passed into
/// handlers explicitly so tests can isolate instances; never a process-wide
/// global.
pub struct OtpCache {
    entries: RwLock<HashMap<String, OtpEntry>>,
}

impl OtpCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Issues a fresh 6-digit code for the address, replacing any prior one.
    pub async fn issue(&self, email: &str) -> String {
        let code = generate_otp();
        let mut entries = self.entries.write().await;
        entries.insert(
            email.to_lowercase(),
            OtpEntry {
                code: code.clone(),
                expires_at: Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
            },
        );
        code
    }

    /// Verifies and consumes the code; a used or expired code never
    /// verifies twice.
    pub async fn consume(&self, email: &str, code: &str) -> bool {
        let key = email.to_lowercase();
        let mut entries = self.entries.write().await;
        let valid = match entries.get(&key) {
            Some(entry) => entry.code == code && entry.expires_at > Utc::now(),
            None => false,
        };
        if valid {
            entries.remove(&key);
        }
        valid
    }
}

fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_user(email: &str) -> User {
        User::new(
            "Asha".to_string(),
            email.to_string(),
            Some("5550100".to_string()),
            "not-a-real-hash".to_string(),
        )
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let storage = UserStorage::new(dir.path());

        let first = storage.create_user(sample_user("a@b.com")).await.unwrap();
        assert!(first.is_ok());

        let second = storage.create_user(sample_user("A@B.COM")).await.unwrap();
        assert_eq!(
            second.unwrap_err(),
            "An account with this email already exists"
        );
        assert_eq!(storage.list().await.len(), 1);
    }

    #[tokio::test]
    async fn profile_update_merges_partially_and_bumps_timestamp() {
        let dir = TempDir::new().unwrap();
        let storage = UserStorage::new(dir.path());
        let user = storage
            .create_user(sample_user("a@b.com"))
            .await
            .unwrap()
            .unwrap();

        let updated = storage
            .update_profile(&user.id, Some("Asha K".to_string()), None)
            .await
            .unwrap()
            .expect("user should exist");

        assert_eq!(updated.name, "Asha K");
        assert_eq!(updated.phone, user.phone);
        assert_eq!(updated.email, user.email);
        assert_eq!(updated.password_hash, user.password_hash);
        assert_eq!(updated.referral_code, user.referral_code);
        assert_eq!(updated.created_at, user.created_at);
        assert!(updated.updated_at >= user.updated_at);

        // Everything except name/updatedAt is identical on disk too.
        let on_disk = storage.get(&user.id).await.unwrap();
        let mut before = serde_json::to_value(&user).unwrap();
        let mut after = serde_json::to_value(&on_disk).unwrap();
        for doc in [&mut before, &mut after] {
            let obj = doc.as_object_mut().unwrap();
            obj.remove("name");
            obj.remove("updatedAt");
        }
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn delete_missing_user_reports_false() {
        let dir = TempDir::new().unwrap();
        let storage = UserStorage::new(dir.path());
        assert!(!storage.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn extend_subscription_lifts_free_to_pro() {
        let dir = TempDir::new().unwrap();
        let storage = UserStorage::new(dir.path());
        let user = storage
            .create_user(sample_user("a@b.com"))
            .await
            .unwrap()
            .unwrap();

        let updated = storage
            .extend_subscription(&user.id, 30)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.subscription.plan, PlanTier::Pro);
        let expiry = updated.subscription.expires_at.unwrap();
        assert!(expiry > Utc::now() + Duration::days(29));
    }

    #[tokio::test]
    async fn otp_is_single_use() {
        let cache = OtpCache::new();
        let code = cache.issue("a@b.com").await;
        assert!(!cache.consume("a@b.com", "not-a-code").await);
        assert!(cache.consume("A@B.com", &code).await);
        assert!(!cache.consume("a@b.com", &code).await);
    }
}
