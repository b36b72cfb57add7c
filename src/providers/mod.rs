pub mod fantasy;
pub mod league;

use std::time::Duration;

use chrono::Utc;

use crate::config::PROVIDER_TIMEOUT_SECS;
use crate::error::Result;

/// HTTP client shared by both adapters. Retry policy, if any, belongs to the
/// provider side; the sync core never retries on its own.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
        .build()?)
}

/// Providers are inconsistent about numeric encoding: the same field may
/// arrive as a JSON number or a quoted string.
pub fn val_i64(v: &serde_json::Value, key: &str) -> Option<i64> {
    v.get(key).and_then(|x| {
        x.as_i64()
            .or_else(|| x.as_f64().map(|f| f as i64))
            .or_else(|| x.as_str().and_then(|s| s.trim().parse().ok()))
    })
}

pub fn val_str(v: &serde_json::Value, key: &str) -> Option<String> {
    v.get(key).and_then(|x| x.as_str()).map(str::to_string)
}

pub fn val_bool(v: &serde_json::Value, key: &str) -> bool {
    v.get(key).and_then(|x| x.as_bool()).unwrap_or(false)
}

/// Today as `YYYY-MM-DD` (UTC). Used to key daily valuation snapshots.
pub fn today_iso() -> String {
    Utc::now().date_naive().to_string()
}
