use crate::models::{PlatformSettings, ReferralOffer};
use crate::store::{read_json_or, write_json, Admitted, JsonCollection};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct NewReferralOffer {
    pub code: String,
    pub title: String,
    pub bonus_days: i64,
    pub discount_percent: u8,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Default)]
pub struct ReferralOfferUpdate {
    pub title: Option<String>,
    pub bonus_days: Option<i64>,
    pub discount_percent: Option<u8>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub active: Option<bool>,
}

pub struct OfferStorage {
    offers: JsonCollection<ReferralOffer>,
}

impl OfferStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            offers: JsonCollection::new(
                data_dir.join("referral-offers.json"),
                |offer: &ReferralOffer| offer.id.clone(),
            ),
        }
    }

    pub async fn list(&self) -> Vec<ReferralOffer> {
        self.offers.list().await
    }

    pub async fn get(&self, id: &str) -> Option<ReferralOffer> {
        self.offers.find(id).await
    }

    pub async fn active_now(&self) -> Vec<ReferralOffer> {
        let now = Utc::now();
        self.offers
            .list()
            .await
            .into_iter()
            .filter(|offer| offer.is_live(now))
            .collect()
    }

    /// Finds a live offer by its redemption code, case-insensitively.
    pub async fn find_live_by_code(&self, code: &str) -> Option<ReferralOffer> {
        let now = Utc::now();
        self.offers
            .list()
            .await
            .into_iter()
            .find(|offer| offer.is_live(now) && offer.code.eq_ignore_ascii_case(code))
    }

    pub async fn create(&self, new: NewReferralOffer) -> Result<Admitted<ReferralOffer>> {
        let offer = ReferralOffer {
            id: Uuid::new_v4().to_string(),
            code: new.code,
            title: new.title,
            bonus_days: new.bonus_days,
            discount_percent: new.discount_percent,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            active: new.active,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.offers
            .insert_if(offer, |existing, candidate| {
                if candidate.code.trim().is_empty() {
                    return Err("Offer code cannot be empty".to_string());
                }
                if candidate.bonus_days < 0 {
                    return Err("bonusDays cannot be negative".to_string());
                }
                if candidate.discount_percent > 100 {
                    return Err("Discount cannot exceed 100 percent".to_string());
                }
                if existing
                    .iter()
                    .any(|offer| offer.code.eq_ignore_ascii_case(&candidate.code))
                {
                    return Err("An offer with this code already exists".to_string());
                }
                Ok(())
            })
            .await
    }

    pub async fn update(
        &self,
        id: &str,
        update: ReferralOfferUpdate,
    ) -> Result<Admitted<ReferralOffer>> {
        if matches!(update.bonus_days, Some(days) if days < 0) {
            return Ok(Err("bonusDays cannot be negative".to_string()));
        }
        if matches!(update.discount_percent, Some(percent) if percent > 100) {
            return Ok(Err("Discount cannot exceed 100 percent".to_string()));
        }

        let updated = self
            .offers
            .update_with(id, |offer| {
                if let Some(title) = update.title {
                    offer.title = title;
                }
                if let Some(bonus_days) = update.bonus_days {
                    offer.bonus_days = bonus_days;
                }
                if let Some(discount_percent) = update.discount_percent {
                    offer.discount_percent = discount_percent;
                }
                if let Some(starts_at) = update.starts_at {
                    offer.starts_at = starts_at;
                }
                if let Some(ends_at) = update.ends_at {
                    offer.ends_at = Some(ends_at);
                }
                if let Some(active) = update.active {
                    offer.active = active;
                }
                offer.updated_at = Some(Utc::now());
            })
            .await?;

        match updated {
            Some(offer) => Ok(Ok(offer)),
            None => Ok(Err("Offer not found".to_string())),
        }
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.offers.remove(id).await
    }
}

/// Global singleton record with full-replace-on-update semantics.
pub struct SettingsStorage {
    path: PathBuf,
    lock: RwLock<()>,
}

impl SettingsStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("platform-settings.json"),
            lock: RwLock::new(()),
        }
    }

    pub async fn get(&self) -> PlatformSettings {
        let _guard = self.lock.read().await;
        read_json_or(&self.path, PlatformSettings::default())
    }

    pub async fn replace(&self, settings: PlatformSettings) -> Result<PlatformSettings> {
        let _guard = self.lock.write().await;
        write_json(&self.path, &settings)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn offer(code: &str, starts_in_days: i64, ends_in_days: Option<i64>) -> NewReferralOffer {
        NewReferralOffer {
            code: code.to_string(),
            title: format!("{} offer", code),
            bonus_days: 7,
            discount_percent: 20,
            starts_at: Utc::now() + Duration::days(starts_in_days),
            ends_at: ends_in_days.map(|days| Utc::now() + Duration::days(days)),
            active: true,
        }
    }

    #[tokio::test]
    async fn active_now_applies_the_date_window() {
        let dir = TempDir::new().unwrap();
        let storage = OfferStorage::new(dir.path());

        storage.create(offer("LIVE", -1, Some(1))).await.unwrap().unwrap();
        storage.create(offer("FUTURE", 1, None)).await.unwrap().unwrap();
        storage.create(offer("EXPIRED", -10, Some(-1))).await.unwrap().unwrap();

        let live = storage.active_now().await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].code, "LIVE");
        assert!(storage.find_live_by_code("live").await.is_some());
        assert!(storage.find_live_by_code("FUTURE").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_offer_code_is_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = OfferStorage::new(dir.path());
        storage.create(offer("WELCOME", -1, None)).await.unwrap().unwrap();
        assert!(storage
            .create(offer("welcome", -1, None))
            .await
            .unwrap()
            .is_err());
    }

    #[tokio::test]
    async fn negative_bonus_days_are_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = OfferStorage::new(dir.path());

        let mut draft = offer("BAD", -1, None);
        draft.bonus_days = -30;
        assert!(storage.create(draft).await.unwrap().is_err());

        let created = storage
            .create(offer("GOOD", -1, None))
            .await
            .unwrap()
            .unwrap();
        let rejected = storage
            .update(
                &created.id,
                ReferralOfferUpdate {
                    bonus_days: Some(-5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(rejected.is_err());
        assert_eq!(storage.get(&created.id).await.unwrap().bonus_days, 7);
    }

    #[tokio::test]
    async fn settings_default_until_replaced() {
        let dir = TempDir::new().unwrap();
        let storage = SettingsStorage::new(dir.path());

        let initial = storage.get().await;
        assert!(initial.registration_open);

        let mut changed = initial.clone();
        changed.maintenance_mode = true;
        changed.daily_practice_limit = 5;
        storage.replace(changed.clone()).await.unwrap();

        let loaded = storage.get().await;
        assert!(loaded.maintenance_mode);
        assert_eq!(loaded.daily_practice_limit, 5);
    }
}
