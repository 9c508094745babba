use std::env;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const API_URL: &str = "RELAY_API_URL";
    pub const API_KEY: &str = "RELAY_API_KEY";
    pub const MODEL: &str = "RELAY_MODEL";
    pub const SYSTEM_PROMPT: &str = "RELAY_SYSTEM_PROMPT";
    pub const TOOLS_ENABLED: &str = "RELAY_TOOLS_ENABLED";
    pub const POLL_INTERVAL_MS: &str = "RELAY_POLL_INTERVAL_MS";
    pub const EGEST_LIMIT: &str = "RELAY_EGEST_LIMIT";
    pub const TEMPERATURE: &str = "RELAY_TEMPERATURE";
    pub const TOOL_CALL_TEMPERATURE: &str = "RELAY_TOOL_CALL_TEMPERATURE";
    pub const MAX_TOKENS: &str = "RELAY_MAX_TOKENS";
    pub const MEDIA_DIR: &str = "RELAY_MEDIA_DIR";
}

/// Default values
pub mod defaults {
    pub const API_URL: &str = "https://api.openai.com/v1/chat/completions";
    pub const POLL_INTERVAL_MS: u64 = 250;
    pub const EGEST_LIMIT: usize = 3500;
    pub const TEMPERATURE: f64 = 0.7;
    /// Low temperature for the tool-selection round; argument generation
    /// wants near-deterministic output even when chat does not.
    pub const TOOL_CALL_TEMPERATURE: f64 = 0.1;
    pub const MAX_TOKENS: u32 = 1024;
    pub const MEDIA_DIR: &str = "/tmp/relay_media";
}

/// Runtime configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub tools_enabled: bool,
    /// Sleep between queue polls in the router worker.
    pub poll_interval_ms: u64,
    /// Maximum characters per egested block.
    pub egest_limit: usize,
    /// Creative temperature for normal replies.
    pub temperature: f64,
    /// Temperature for the tool-selection round.
    pub tool_call_temperature: f64,
    pub max_tokens: u32,
    pub media_dir: String,
}

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("[CONFIG] Invalid value for {}: '{}', using default", var, raw);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let tools_enabled = env::var(env_vars::TOOLS_ENABLED)
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        Config {
            api_url: env::var(env_vars::API_URL)
                .unwrap_or_else(|_| defaults::API_URL.to_string()),
            api_key: env::var(env_vars::API_KEY).unwrap_or_default(),
            model: env::var(env_vars::MODEL).ok().filter(|m| !m.is_empty()),
            system_prompt: env::var(env_vars::SYSTEM_PROMPT).ok().filter(|p| !p.is_empty()),
            tools_enabled,
            poll_interval_ms: parse_or(env_vars::POLL_INTERVAL_MS, defaults::POLL_INTERVAL_MS),
            egest_limit: parse_or(env_vars::EGEST_LIMIT, defaults::EGEST_LIMIT),
            temperature: parse_or(env_vars::TEMPERATURE, defaults::TEMPERATURE),
            tool_call_temperature: parse_or(
                env_vars::TOOL_CALL_TEMPERATURE,
                defaults::TOOL_CALL_TEMPERATURE,
            ),
            max_tokens: parse_or(env_vars::MAX_TOKENS, defaults::MAX_TOKENS),
            media_dir: env::var(env_vars::MEDIA_DIR)
                .unwrap_or_else(|_| defaults::MEDIA_DIR.to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: defaults::API_URL.to_string(),
            api_key: String::new(),
            model: None,
            system_prompt: None,
            tools_enabled: true,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            egest_limit: defaults::EGEST_LIMIT,
            temperature: defaults::TEMPERATURE,
            tool_call_temperature: defaults::TOOL_CALL_TEMPERATURE,
            max_tokens: defaults::MAX_TOKENS,
            media_dir: defaults::MEDIA_DIR.to_string(),
        }
    }
}
