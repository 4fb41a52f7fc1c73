use std::{collections::HashMap, fs};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub snapshot_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8443".into(),
            database_url: "sqlite://./data/meeting.db".into(),
            snapshot_path: "./data/snapshot.json".into(),
        }
    }
}

/// Defaults, overridden by `server.toml` if present, overridden by
/// environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("bind_addr") {
                settings.server_bind = v.clone();
            }
            if let Some(v) = file_cfg.get("database_url") {
                settings.database_url = v.clone();
            }
            if let Some(v) = file_cfg.get("snapshot_path") {
                settings.snapshot_path = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("SNAPSHOT_PATH") {
        settings.snapshot_path = v;
    }

    settings
}
