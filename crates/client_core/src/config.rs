use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use tracing::warn;

pub const SETTINGS_FILE: &str = "storefront.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClientSettings {
    /// Base every endpoint is resolved against, e.g. `http://host/api/`.
    pub api_url: String,
    pub state_database_url: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8443/api/".into(),
            state_database_url: "sqlite://./data/storefront_client.db".into(),
        }
    }
}

/// Defaults, then `storefront.toml`, then environment variables.
pub fn load_settings() -> ClientSettings {
    let mut settings = load_settings_from(Path::new(SETTINGS_FILE));

    if let Ok(v) = std::env::var("API_URL") {
        settings.api_url = v;
    }
    if let Ok(v) = std::env::var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Ok(v) = std::env::var("CLIENT_DATABASE_URL") {
        settings.state_database_url = v;
    }
    if let Ok(v) = std::env::var("APP__CLIENT_DATABASE_URL") {
        settings.state_database_url = v;
    }

    settings
}

pub fn load_settings_from(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();

    let Ok(raw) = fs::read_to_string(path) else {
        return settings;
    };
    match toml::from_str::<HashMap<String, String>>(&raw) {
        Ok(file_cfg) => {
            if let Some(v) = file_cfg.get("api_url") {
                settings.api_url = v.clone();
            }
            if let Some(v) = file_cfg.get("state_database_url") {
                settings.state_database_url = v.clone();
            }
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring unreadable settings file");
        }
    }

    settings
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_file(tag: &str, contents: &str) -> std::path::PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("storefront_settings_{tag}_{suffix}.toml"));
        fs::write(&path, contents).expect("write settings");
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = load_settings_from(Path::new("/definitely/not/here/storefront.toml"));
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let path = temp_file(
            "override",
            "api_url = \"https://shop.example.com/api/\"\nstate_database_url = \"sqlite::memory:\"\n",
        );
        let settings = load_settings_from(&path);
        assert_eq!(settings.api_url, "https://shop.example.com/api/");
        assert_eq!(settings.state_database_url, "sqlite::memory:");
        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn malformed_file_is_ignored() {
        let path = temp_file("malformed", "api_url = [not valid");
        let settings = load_settings_from(&path);
        assert_eq!(settings, ClientSettings::default());
        fs::remove_file(path).expect("cleanup");
    }
}
