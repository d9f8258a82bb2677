use chrono::Duration;
use rocket::figment::Figment;
use serde::Deserialize;

/// Process configuration, read from the `newsroom` table of Rocket's figment
/// (the `[default.newsroom]` section of Rocket.toml).
/// Anything that should be editable at runtime lives in the settings table instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    pub session_lifetime_secs: i64,
    pub upload_dir: String,
    pub upload_max_bytes: u64,
    pub upload_allowed_types: Vec<String>,
    /// Take the client address from proxy headers. Only enable behind a
    /// reverse proxy that overwrites them; otherwise the socket peer is used.
    pub trust_proxy_headers: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: "website/db/newsroom.db".to_string(),
            session_lifetime_secs: 3600,
            upload_dir: "website/uploads".to_string(),
            upload_max_bytes: 5 * 1024 * 1024,
            upload_allowed_types: ["jpg", "jpeg", "png", "gif", "pdf"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trust_proxy_headers: false,
        }
    }
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> Self {
        match figment.extract_inner::<AppConfig>("newsroom") {
            Ok(config) => config,
            Err(e) => {
                log::warn!("No usable [newsroom] config ({}), using defaults", e);
                AppConfig::default()
            }
        }
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::seconds(self.session_lifetime_secs.max(1))
    }
}
