use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use server_api::password::{DEFAULT_COST, MAX_COST, MIN_COST};
use tracing::warn;

pub const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub token_secret: String,
    pub token_ttl_seconds: i64,
    /// Browser origin allowed to call the API with credentials.
    pub frontend_url: Option<String>,
    /// bcrypt work factor, 4..=31.
    pub password_cost: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8443".into(),
            database_url: "sqlite://./data/storefront.db".into(),
            token_secret: "devsecret".into(),
            token_ttl_seconds: 3600,
            frontend_url: None,
            password_cost: DEFAULT_COST,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = load_settings_from(Path::new(SETTINGS_FILE));

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Ok(v) = std::env::var("TOKEN_SECRET") {
        settings.token_secret = v;
    }
    if let Ok(v) = std::env::var("APP__TOKEN_SECRET") {
        settings.token_secret = v;
    }

    if let Ok(v) = std::env::var("APP__TOKEN_TTL_SECONDS") {
        apply_ttl(&mut settings, &v);
    }

    if let Ok(v) = std::env::var("APP__PASSWORD_COST") {
        apply_password_cost(&mut settings, &v);
    }

    if let Ok(v) = std::env::var("FRONTEND_URL") {
        settings.frontend_url = Some(v);
    }
    if let Ok(v) = std::env::var("APP__FRONTEND_URL") {
        settings.frontend_url = Some(v);
    }

    settings
}

pub fn load_settings_from(path: &Path) -> Settings {
    let mut settings = Settings::default();

    let Ok(raw) = fs::read_to_string(path) else {
        return settings;
    };
    let file_cfg = match toml::from_str::<HashMap<String, String>>(&raw) {
        Ok(file_cfg) => file_cfg,
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring unreadable settings file");
            return settings;
        }
    };

    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("token_secret") {
        settings.token_secret = v.clone();
    }
    if let Some(v) = file_cfg.get("token_ttl_seconds") {
        apply_ttl(&mut settings, v);
    }
    if let Some(v) = file_cfg.get("frontend_url") {
        settings.frontend_url = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("password_cost") {
        apply_password_cost(&mut settings, v);
    }

    settings
}

fn apply_ttl(settings: &mut Settings, raw: &str) {
    match raw.trim().parse::<i64>() {
        Ok(parsed) if parsed > 0 => settings.token_ttl_seconds = parsed,
        _ => warn!(value = raw, "ignoring invalid token ttl"),
    }
}

fn apply_password_cost(settings: &mut Settings, raw: &str) {
    match raw.trim().parse::<u32>() {
        Ok(parsed) if (MIN_COST..=MAX_COST).contains(&parsed) => settings.password_cost = parsed,
        _ => warn!(value = raw, "ignoring invalid password cost"),
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
