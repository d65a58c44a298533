use std::env;
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use url::Url;

pub const SERVICE_NAME: &str = "iretro-server";

const DEFAULT_UPSTREAM_BASE_URL: &str = "https://jiosaavn-api-privatecvc2.vercel.app";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub upstream_base_url: String,
    pub upstream_timeout: Duration,
    pub search_limit: u32,
    pub stream_connect_timeout: Duration,
    pub stream_idle_timeout: Duration,
    pub web_path: String,
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            upstream_timeout: Duration::from_secs(15),
            search_limit: 20,
            stream_connect_timeout: Duration::from_secs(15),
            stream_idle_timeout: Duration::from_secs(30),
            web_path: "../web".to_string(),
            log_level: LevelFilter::Info,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unset or unparsable
    /// values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let upstream_base_url = lookup("UPSTREAM_BASE_URL")
            .filter(|value| Url::parse(value).is_ok())
            .unwrap_or(defaults.upstream_base_url)
            .trim_end_matches('/')
            .to_string();

        Self {
            api_host: lookup("API_HOST").unwrap_or(defaults.api_host),
            api_port: parse_or(lookup("PORT"), defaults.api_port),
            upstream_base_url,
            upstream_timeout: secs_or(lookup("UPSTREAM_TIMEOUT_SECS"), defaults.upstream_timeout),
            search_limit: parse_or(lookup("SEARCH_LIMIT"), defaults.search_limit),
            stream_connect_timeout: secs_or(
                lookup("STREAM_CONNECT_TIMEOUT_SECS"),
                defaults.stream_connect_timeout,
            ),
            stream_idle_timeout: secs_or(
                lookup("STREAM_IDLE_TIMEOUT_SECS"),
                defaults.stream_idle_timeout,
            ),
            web_path: lookup("WEB_PATH").unwrap_or(defaults.web_path),
            log_level: parse_or(lookup("LOG_LEVEL"), defaults.log_level),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn secs_or(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}
