use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::models::ModelSpec;

fn default_backend_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_status_timeout_secs() -> u64 {
    5
}

fn default_warmup_prompt() -> String {
    "Hello".to_string()
}

fn default_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new(
            "deepseek-r1:7b",
            "16GB",
            "Balanced performance, suitable for most systems",
        ),
        ModelSpec::new(
            "deepseek-r1:8b",
            "24GB",
            "Enhanced capabilities, recommended for mid-range systems",
        ),
        ModelSpec::new(
            "deepseek-r1:14b",
            "32GB",
            "Best performance, requires high-end hardware",
        ),
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the inference backend, without a trailing `/api`.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound for a whole backend call, including model downloads.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_status_timeout_secs")]
    pub status_timeout_secs: u64,
    #[serde(default = "default_warmup_prompt")]
    pub warmup_prompt: String,
    /// Forwarded verbatim as the backend `options` object on every generation.
    #[serde(default)]
    pub generate_options: BTreeMap<String, serde_json::Value>,
    #[serde(default = "default_models")]
    pub models: Vec<ModelSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            status_timeout_secs: default_status_timeout_secs(),
            warmup_prompt: default_warmup_prompt(),
            generate_options: BTreeMap::new(),
            models: default_models(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    /// The configured generation options as a JSON object, or `None` when empty.
    pub fn generate_options_json(&self) -> Option<serde_json::Value> {
        if self.generate_options.is_empty() {
            return None;
        }
        let map: serde_json::Map<String, serde_json::Value> = self
            .generate_options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Some(serde_json::Value::Object(map))
    }

    pub fn find_model(&self, name: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.name == name)
    }
}
