use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, resolved once at startup from the environment.
///
/// Anything sensitive (storage locations, endpoints) arrives through here;
/// nothing is read from ambient globals after startup and no credential is
/// ever compiled in.
#[derive(Clone, Debug)]
pub struct Config {
    pub data: PathBuf,
    pub port: u16,
    /// Maximum embedding distance for a probe to count as the same identity.
    /// Model- and normalization-dependent; tune per deployment.
    pub match_threshold: f32,
    pub extract_timeout: Duration,
    pub storage_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let data = env::var("ROSTRO_DATA").unwrap_or_else(|_| "/rostro-data".to_string());
        let port = env::var("ROSTRO_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(9172);
        let match_threshold = env::var("ROSTRO_MATCH_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.7);
        let extract_timeout_ms = env::var("ROSTRO_EXTRACT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30_000);
        let storage_timeout_ms = env::var("ROSTRO_STORAGE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000);
        Self {
            data: PathBuf::from(data),
            port,
            match_threshold,
            extract_timeout: Duration::from_millis(extract_timeout_ms),
            storage_timeout: Duration::from_millis(storage_timeout_ms),
        }
    }
}
