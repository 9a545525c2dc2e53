//! Typed configuration, loaded from the environment (with an optional `.env`
//! file). Missing required settings are fatal at startup, before any engine
//! component is constructed.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, weather::Units, Result};

pub const DEFAULT_MAX_POST_LENGTH: usize = 500;
pub const DEFAULT_AUTO_TIMES: &str = "12:00";
pub const DEFAULT_RECONNECT_WAIT: Duration = Duration::from_secs(5);
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECAP_LOG_LINES: usize = 20;

#[derive(Clone, Debug)]
pub struct Config {
    // Connection
    pub instance_url: String,
    pub access_token: String,

    // Posting
    pub max_post_length: usize,
    pub auto_post: bool,
    /// Minute-granularity trigger times, e.g. `["12:00", "18:30"]`.
    pub auto_times: Vec<String>,

    // Stream resilience
    pub reconnect_wait: Duration,
    pub reconnect_attempts: u32,

    // Operator console
    pub command_prefix: String,
    pub recap_lines: usize,

    // Files (journal, watermark) live here, named after the bot's handle
    // once connected.
    pub data_dir: PathBuf,

    // Weather (optional)
    pub weather_api_key: Option<String>,
    pub weather_city: String,
    pub weather_units: Units,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let instance_url = env_str("GIBBER_INSTANCE_URL").unwrap_or_default();
        if instance_url.trim().is_empty() {
            return Err(Error::Config(
                "GIBBER_INSTANCE_URL environment variable is required".to_string(),
            ));
        }

        let access_token = env_str("GIBBER_ACCESS_TOKEN").unwrap_or_default();
        if access_token.trim().is_empty() {
            return Err(Error::Config(
                "GIBBER_ACCESS_TOKEN environment variable is required".to_string(),
            ));
        }

        let max_post_length = env_usize("GIBBER_MAX_POST_LENGTH").unwrap_or(DEFAULT_MAX_POST_LENGTH);
        let auto_post = env_bool("GIBBER_AUTO_POST").unwrap_or(true);
        let auto_times = parse_csv(
            &env_str("GIBBER_AUTO_TIMES").unwrap_or_else(|| DEFAULT_AUTO_TIMES.to_string()),
        );

        let reconnect_wait = env_u64("GIBBER_RECONNECT_WAIT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RECONNECT_WAIT);
        let reconnect_attempts =
            env_u32("GIBBER_RECONNECT_ATTEMPTS").unwrap_or(DEFAULT_RECONNECT_ATTEMPTS);

        let command_prefix = env_str("GIBBER_COMMAND_PREFIX").unwrap_or_else(|| "/".to_string());
        let recap_lines = env_usize("GIBBER_RECAP_LINES").unwrap_or(RECAP_LOG_LINES);

        let data_dir = env_str("GIBBER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&data_dir)?;

        let weather_api_key = env_str("GIBBER_WEATHER_API_KEY").and_then(non_empty);
        let weather_city = env_str("GIBBER_WEATHER_CITY").unwrap_or_default();
        let weather_units = env_str("GIBBER_WEATHER_UNITS")
            .as_deref()
            .and_then(Units::parse)
            .unwrap_or(Units::Metric);

        Ok(Self {
            instance_url,
            access_token,
            max_post_length,
            auto_post,
            auto_times,
            reconnect_wait,
            reconnect_attempts,
            command_prefix,
            recap_lines,
            data_dir,
            weather_api_key,
            weather_city,
            weather_units,
        })
    }
}

/// Minimal `.env` loader: `KEY=VALUE` lines, `#` comments, no interpolation.
/// Values already present in the environment win.
fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if env::var_os(key).is_none() {
            env::set_var(key, value);
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key)?.trim().parse().ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key)?.trim().parse().ok()
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key)?.trim().parse().ok()
}

fn env_bool(key: &str) -> Option<bool> {
    match env_str(key)?.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn parse_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
impl Config {
    /// A config suitable for unit tests; no environment access.
    pub fn for_tests() -> Self {
        Self {
            instance_url: "https://example.social".to_string(),
            access_token: "secret".to_string(),
            max_post_length: DEFAULT_MAX_POST_LENGTH,
            auto_post: true,
            auto_times: vec!["12:00".to_string()],
            reconnect_wait: DEFAULT_RECONNECT_WAIT,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            command_prefix: "/".to_string(),
            recap_lines: RECAP_LOG_LINES,
            data_dir: PathBuf::from("."),
            weather_api_key: None,
            weather_city: String::new(),
            weather_units: Units::Metric,
        }
    }
}
