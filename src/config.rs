use std::path::PathBuf;

use serde::Deserialize;

/// Per-key staleness windows, in seconds. Registrations get a shorter window
/// than missions because user actions change them far more often.
#[derive(Debug, Clone, Deserialize)]
pub struct CachePolicy {
    pub missions_stale_secs: u64,
    pub registrations_stale_secs: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            missions_stale_secs: 60,
            registrations_stale_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub base_url: String,
    pub cache: CachePolicy,
    /// Extra transport attempts after a network-level failure.
    pub retry_attempts: u32,
    /// Directory holding the persisted session blob.
    pub session_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url =
            std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".into());
        let cache = CachePolicy {
            missions_stale_secs: env_u64("MISSIONS_STALE_SECS", 60),
            registrations_stale_secs: env_u64("REGISTRATIONS_STALE_SECS", 30),
        };
        let retry_attempts = std::env::var("API_RETRY_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);
        let session_dir = std::env::var("SESSION_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("ecoaction"));
        Ok(Self {
            base_url,
            cache,
            retry_attempts,
            session_dir,
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
