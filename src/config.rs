use std::env;
use std::path::PathBuf;

/// Base directory for all JSON stores (from DATA_DIR env var, default "data").
pub fn data_dir() -> PathBuf {
    PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

pub const DEFAULT_PORT: u16 = 3000;

pub fn bind_addr() -> String {
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    format!("0.0.0.0:{}", port)
}

/// Minutes a password-reset OTP stays valid.
pub const OTP_TTL_MINUTES: i64 = 10;

/// Attempts to allocate a unique test code before giving up.
pub const TEST_CODE_ATTEMPTS: usize = 16;

/// Fallback question count for daily practice when platform settings are absent.
pub const DEFAULT_DAILY_PRACTICE_LIMIT: usize = 10;

/// Subscription days granted when a personal referral code is redeemed and
/// no scheduled offer overrides it.
pub const DEFAULT_REFERRAL_BONUS_DAYS: i64 = 7;
