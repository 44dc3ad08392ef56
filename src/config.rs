//! Runtime configuration: data directory and environment-driven knobs.
//!
//! Everything here resolves once at startup. `.env` files are honored via
//! dotenvy, matching how the external-service credentials are usually kept.

use std::path::PathBuf;

pub const ENV_DATA_DIR: &str = "MISEARCH_DATA_DIR";

/// Platform data dir holding the persisted catalog and index artifacts,
/// overridable via `MISEARCH_DATA_DIR`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = dotenvy::var(ENV_DATA_DIR) {
        return PathBuf::from(dir);
    }
    directories::ProjectDirs::from("com", "media-intent-search", "media-intent-search")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".misearch"))
}

/// Load a `.env` file when present; missing files are not an error.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}
