use std::{fs, path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Argentina::Buenos_Aires;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: Option<PathBuf>,
    pub timezone: String,
    pub refresh_hour: u32,
    pub refresh_on_startup: bool,
    pub adapter_timeout_secs: u64,
    pub serpapi_key: Option<String>,
    pub cinema_titles: Vec<String>,
    pub llm_endpoint: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            data_dir: None,
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            refresh_hour: 3,
            refresh_on_startup: true,
            adapter_timeout_secs: 60,
            serpapi_key: None,
            cinema_titles: Vec::new(),
            llm_endpoint: "http://127.0.0.1:1234/v1".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            llm_api_key: None,
            llm_temperature: 0.7,
            llm_max_tokens: 1024,
        }
    }
}

impl AppConfig {
    /// `config.json` from the data root (if present), then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = read_config(&utils::config_path())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(bind) = get("CARTELERA_BIND") {
            self.bind_addr = bind;
        } else if let Some(port) = get("PORT") {
            self.bind_addr = format!("0.0.0.0:{port}");
        }
        if let Some(dir) = get("CARTELERA_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(tz) = get("CARTELERA_TZ") {
            self.timezone = tz;
        }
        if let Some(hour) = get("CARTELERA_REFRESH_HOUR").and_then(|v| v.parse::<u32>().ok()) {
            self.refresh_hour = hour;
        }
        if let Some(flag) = get("CARTELERA_REFRESH_ON_STARTUP") {
            self.refresh_on_startup = !matches!(flag.to_lowercase().as_str(), "0" | "false" | "no");
        }
        if let Some(secs) =
            get("CARTELERA_ADAPTER_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok())
        {
            self.adapter_timeout_secs = secs;
        }
        if let Some(key) = get("SERPAPI_KEY") {
            self.serpapi_key = Some(key);
        }
        if let Some(titles) = get("CARTELERA_CINEMA_TITLES") {
            self.cinema_titles = titles
                .split(',')
                .map(|title| title.trim().to_string())
                .filter(|title| !title.is_empty())
                .collect();
        }
        if let Some(endpoint) = get("LLM_ENDPOINT") {
            self.llm_endpoint = endpoint;
        }
        if let Some(model) = get("LLM_MODEL") {
            self.llm_model = model;
        }
        if let Some(key) = get("LLM_API_KEY") {
            self.llm_api_key = Some(key);
        }
        if let Some(temperature) = get("LLM_TEMPERATURE").and_then(|v| v.parse::<f32>().ok()) {
            self.llm_temperature = temperature;
        }
        if let Some(max_tokens) = get("LLM_MAX_TOKENS").and_then(|v| v.parse::<u32>().ok()) {
            self.llm_max_tokens = max_tokens;
        }
    }

    /// Unknown zone names fall back to Buenos Aires.
    pub fn tz(&self) -> Tz {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(err) => {
                warn!(timezone = %self.timezone, "unknown timezone, using default: {err}");
                DEFAULT_TIMEZONE
            }
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(utils::default_data_root)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs.max(1))
    }
}

fn read_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("unable to read config {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("invalid config json in {}", path.display()))
}
