// src/config/oracle.rs
use serde::Deserialize;
use std::env;

fn default_provider() -> String {
    "ollama".into()
}
fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    11434
}
fn default_model() -> String {
    "qwen3:8b".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key() -> String {
    "ENV".into()
}
fn default_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// "ollama" | "openai" | "disabled" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Ollama host and port.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI-compatible API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Optional per-day call limit.
    #[serde(default)]
    pub daily_limit: Option<u32>,
    /// HTTP-level timeout of one completion call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            host: default_host(),
            port: default_port(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: default_api_key(),
            daily_limit: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl OracleConfig {
    pub fn ollama_base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    /// Resolve the API key, following the "ENV" indirection.
    pub fn resolve_api_key(&self) -> anyhow::Result<String> {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))
        } else {
            Ok(self.api_key.clone())
        }
    }

    /// Apply OLLAMA_HOST / OLLAMA_PORT / OLLAMA_MODEL overrides.
    pub(crate) fn apply_env(&mut self) {
        if let Ok(h) = env::var("OLLAMA_HOST") {
            if !h.trim().is_empty() {
                self.host = h.trim().to_string();
            }
        }
        if let Some(p) = env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.trim().parse::<u16>().ok())
        {
            self.port = p;
        }
        if let Ok(m) = env::var("OLLAMA_MODEL") {
            if !m.trim().is_empty() {
                self.model = m.trim().to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_url_accepts_bare_host_or_scheme() {
        let mut c = OracleConfig::default();
        assert_eq!(c.ollama_base_url(), "http://localhost:11434");
        c.host = "http://gpu-box/".into();
        c.port = 8080;
        assert_eq!(c.ollama_base_url(), "http://gpu-box:8080");
    }

    #[test]
    fn literal_api_key_is_used_as_is() {
        let c = OracleConfig {
            api_key: "sk-test".into(),
            ..OracleConfig::default()
        };
        assert_eq!(c.resolve_api_key().unwrap(), "sk-test");
    }
}
