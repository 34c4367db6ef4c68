use crate::rate_limiter::{RateLimit, RateLimitConfig};
use std::{env, path::PathBuf, time::Duration};

pub const API_TITLE: &str = "Valorant Esports API";
pub const API_DESCRIPTION: &str = "An Unofficial REST API for [vlr.gg](https://www.vlr.gg/), a site for Valorant Esports match and news coverage. Made by [axsddlr](https://github.com/axsddlr)";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub cors_origins: Vec<String>,
    pub static_dir: PathBuf,
    pub docs: DocsConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub enum LogFormat {
    Text,
    Json,
}

/// Where the documentation page lives and how its buffered rewrite is bounded.
#[derive(Debug, Clone)]
pub struct DocsConfig {
    pub title: String,
    pub docs_path: String,
    pub openapi_path: String,
    pub favicon_path: String,
    pub max_body_bytes: usize,
    pub read_timeout: Duration,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            title: API_TITLE.to_string(),
            docs_path: "/docs".to_string(),
            openapi_path: "/openapi.json".to_string(),
            favicon_path: "/favicon.svg".to_string(),
            max_body_bytes: 5 * 1024 * 1024,
            read_timeout: Duration::from_secs(10),
        }
    }
}

impl DocsConfig {
    /// The Swagger UI index page; `/` redirects here.
    pub fn docs_index(&self) -> String {
        format!("{}/", self.docs_path.trim_end_matches('/'))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            log_level: "vlr_web_api=info,tower_http=info".to_string(),
            log_format: LogFormat::Text,
            cors_origins: vec!["*".to_string()],
            static_dir: PathBuf::from("static"),
            docs: DocsConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("VLR_HOST") {
            config.host = host;
        }

        if let Ok(port_str) = env::var("VLR_PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                config.port = port;
            } else {
                eprintln!(
                    "Warning: Invalid VLR_PORT value '{}', using default {}",
                    port_str, config.port
                );
            }
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            config.log_level = log_level;
        } else if let Ok(log_level) = env::var("VLR_LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(log_format) = env::var("VLR_LOG_FORMAT") {
            config.log_format = match log_format.to_lowercase().as_str() {
                "text" | "plain" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    eprintln!(
                        "Warning: Invalid VLR_LOG_FORMAT value '{}', using default text",
                        log_format
                    );
                    LogFormat::Text
                }
            };
        }

        if let Ok(cors_origins) = env::var("VLR_CORS_ORIGINS") {
            config.cors_origins = cors_origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(static_dir) = env::var("VLR_STATIC_DIR") {
            config.static_dir = PathBuf::from(static_dir);
        }

        // Rate limiting configuration
        if let Ok(limit_str) = env::var("VLR_RATE_LIMIT") {
            match limit_str.parse::<RateLimit>() {
                Ok(limit) => config.rate_limit.limit = limit,
                Err(e) => eprintln!(
                    "Warning: Invalid VLR_RATE_LIMIT value '{}' ({}), using default {}",
                    limit_str, e, config.rate_limit.limit
                ),
            }
        }

        if let Ok(cleanup_str) = env::var("VLR_RATE_LIMIT_CLEANUP_INTERVAL_SECONDS") {
            if let Ok(cleanup) = cleanup_str.parse::<u64>() {
                config.rate_limit.cleanup_interval_seconds = cleanup;
            } else {
                eprintln!(
                    "Warning: Invalid VLR_RATE_LIMIT_CLEANUP_INTERVAL_SECONDS value '{}', using default {}",
                    cleanup_str, config.rate_limit.cleanup_interval_seconds
                );
            }
        }

        if let Ok(trust_str) = env::var("VLR_TRUST_PROXY_HEADERS") {
            match trust_str.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.rate_limit.trust_proxy_headers = true,
                "0" | "false" | "no" | "off" => config.rate_limit.trust_proxy_headers = false,
                _ => eprintln!(
                    "Warning: Invalid VLR_TRUST_PROXY_HEADERS value '{}', using default {}",
                    trust_str, config.rate_limit.trust_proxy_headers
                ),
            }
        }

        // Documentation page rewrite bounds
        if let Ok(max_str) = env::var("VLR_DOCS_MAX_BODY_BYTES") {
            if let Ok(max) = max_str.parse::<usize>() {
                config.docs.max_body_bytes = max;
            } else {
                eprintln!(
                    "Warning: Invalid VLR_DOCS_MAX_BODY_BYTES value '{}', using default {}",
                    max_str, config.docs.max_body_bytes
                );
            }
        }

        if let Ok(timeout_str) = env::var("VLR_DOCS_READ_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout_str.parse::<u64>() {
                config.docs.read_timeout = Duration::from_secs(timeout);
            } else {
                eprintln!(
                    "Warning: Invalid VLR_DOCS_READ_TIMEOUT_SECONDS value '{}', using default {:?}",
                    timeout_str, config.docs.read_timeout
                );
            }
        }

        config
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn server_url(&self) -> String {
        if self.port == 80 {
            format!("http://{}", self.host)
        } else if self.port == 443 {
            format!("https://{}", self.host)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    pub fn favicon_file(&self) -> PathBuf {
        self.static_dir.join("favicon.svg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.log_level, "vlr_web_api=info,tower_http=info");
        assert!(matches!(config.log_format, LogFormat::Text));
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.favicon_file(), PathBuf::from("static/favicon.svg"));
        assert_eq!(config.docs.title, "Valorant Esports API");
        assert!(!config.rate_limit.trust_proxy_headers);
    }

    #[test]
    fn test_bind_address() {
        let config = Config {
            host: "localhost".to_string(),
            port: 3000,
            ..Default::default()
        };
        assert_eq!(config.bind_address(), "localhost:3000");
    }

    #[test]
    fn test_server_url() {
        let config = Config {
            host: "example.com".to_string(),
            port: 3001,
            ..Default::default()
        };
        assert_eq!(config.server_url(), "http://example.com:3001");

        let config_80 = Config {
            host: "example.com".to_string(),
            port: 80,
            ..Default::default()
        };
        assert_eq!(config_80.server_url(), "http://example.com");

        let config_443 = Config {
            host: "example.com".to_string(),
            port: 443,
            ..Default::default()
        };
        assert_eq!(config_443.server_url(), "https://example.com");
    }

    #[test]
    fn test_docs_index_has_single_trailing_slash() {
        let docs = DocsConfig {
            docs_path: "/docs/".to_string(),
            ..Default::default()
        };
        assert_eq!(docs.docs_index(), "/docs/");
        assert_eq!(DocsConfig::default().docs_index(), "/docs/");
    }

    #[test]
    fn test_config_from_env() {
        let keys = [
            "VLR_HOST",
            "VLR_PORT",
            "VLR_LOG_LEVEL",
            "VLR_LOG_FORMAT",
            "VLR_CORS_ORIGINS",
            "VLR_STATIC_DIR",
            "VLR_RATE_LIMIT",
            "VLR_TRUST_PROXY_HEADERS",
            "VLR_DOCS_MAX_BODY_BYTES",
            "VLR_DOCS_READ_TIMEOUT_SECONDS",
        ];
        // Save original values
        let originals: Vec<_> = keys.iter().map(|k| (*k, env::var(k).ok())).collect();

        unsafe {
            // Set test values
            env::set_var("VLR_HOST", "test.example.com");
            env::set_var("VLR_PORT", "9000");
            env::set_var("VLR_LOG_LEVEL", "info");
            env::set_var("VLR_LOG_FORMAT", "json");
            env::set_var("VLR_CORS_ORIGINS", "https://example.com,https://test.com");
            env::set_var("VLR_STATIC_DIR", "/srv/static");
            env::set_var("VLR_RATE_LIMIT", "5/minute");
            env::set_var("VLR_TRUST_PROXY_HEADERS", "true");
            env::set_var("VLR_DOCS_MAX_BODY_BYTES", "1024");
            env::set_var("VLR_DOCS_READ_TIMEOUT_SECONDS", "2");
        }

        let config = Config::from_env();

        assert_eq!(config.host, "test.example.com");
        assert_eq!(config.port, 9000);
        if env::var("RUST_LOG").is_err() {
            assert_eq!(config.log_level, "info");
        }
        assert!(matches!(config.log_format, LogFormat::Json));
        assert_eq!(
            config.cors_origins,
            vec!["https://example.com", "https://test.com"]
        );
        assert_eq!(config.static_dir, PathBuf::from("/srv/static"));
        assert_eq!(config.rate_limit.limit.requests, 5);
        assert_eq!(config.rate_limit.limit.window, Duration::from_secs(60));
        assert!(config.rate_limit.trust_proxy_headers);
        assert_eq!(config.docs.max_body_bytes, 1024);
        assert_eq!(config.docs.read_timeout, Duration::from_secs(2));

        unsafe {
            // Restore original values
            for (key, value) in originals {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
