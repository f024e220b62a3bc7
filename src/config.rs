use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3001/api";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_DEDUPE_MS: u64 = 2000;

/// Effective daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    /// True when the base URL came from the environment; persisted settings
    /// must not override it.
    pub api_base_url_from_env: bool,
    pub http_timeout: Duration,
    pub dedupe_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_base_url_from_env: false,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            dedupe_window: Duration::from_millis(DEFAULT_DEDUPE_MS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        let base = ["COBRANZA_API_BASE_URL", "API_BASE_URL"]
            .iter()
            .filter_map(|k| lookup(k))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty());
        if let Some(base) = base {
            cfg.api_base_url = normalize_base_url(&base);
            cfg.api_base_url_from_env = true;
        }

        if let Some(secs) = parse_u64_var(&lookup, "COBRANZA_HTTP_TIMEOUT_SECS") {
            cfg.http_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_u64_var(&lookup, "COBRANZA_DEDUPE_MS") {
            cfg.dedupe_window = Duration::from_millis(ms);
        }
        cfg
    }

    /// Apply a base URL persisted in the workspace. Env configuration wins.
    pub fn apply_persisted_base_url(&mut self, url: &str) -> bool {
        if self.api_base_url_from_env || url.trim().is_empty() {
            return false;
        }
        self.api_base_url = normalize_base_url(url);
        true
    }
}

fn parse_u64_var<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable numeric setting");
            None
        }
    }
}

pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
