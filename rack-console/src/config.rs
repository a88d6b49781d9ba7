//! Console configuration

use rack_client::ClientConfig;
use std::path::PathBuf;

use crate::session::SessionOptions;

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Mirror directory (env: RACK_DATA_DIR)
    pub data_dir: PathBuf,
    /// Rolling log files go here when set (env: LOG_DIR)
    pub log_dir: Option<PathBuf>,
    /// Default filter when RUST_LOG is unset (env: LOG_LEVEL)
    pub log_level: String,
    /// JSON log lines (env: LOG_JSON)
    pub log_json: bool,
    /// env: FALLBACK_ADMIN_ON_UNRESOLVED
    pub fallback_admin_on_unresolved: bool,
    /// Optional startup sign-in (env: RACK_LOGIN_EMAIL / RACK_LOGIN_PASSWORD)
    pub login: Option<(String, String)>,
    pub client: ClientConfig,
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

impl ConsoleConfig {
    pub fn from_env() -> Self {
        let login = match (
            std::env::var("RACK_LOGIN_EMAIL").ok().filter(|s| !s.is_empty()),
            std::env::var("RACK_LOGIN_PASSWORD").ok(),
        ) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        };

        Self {
            data_dir: std::env::var("RACK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            log_dir: std::env::var("LOG_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            log_level: std::env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "rack_console=info,rack_client=info".into()),
            log_json: env_bool("LOG_JSON", false),
            fallback_admin_on_unresolved: env_bool("FALLBACK_ADMIN_ON_UNRESOLVED", true),
            login,
            client: ClientConfig::from_env(),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            fallback_admin_on_unresolved: self.fallback_admin_on_unresolved,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_bool_parsing() {
        // SAFETY: test-local variable names
        unsafe {
            std::env::set_var("RACK_TEST_FLAG_ON", "Yes");
            std::env::set_var("RACK_TEST_FLAG_OFF", "0");
            std::env::set_var("RACK_TEST_FLAG_BAD", "maybe");
        }
        assert!(env_bool("RACK_TEST_FLAG_ON", false));
        assert!(!env_bool("RACK_TEST_FLAG_OFF", true));
        assert!(env_bool("RACK_TEST_FLAG_BAD", true));
        assert!(!env_bool("RACK_TEST_FLAG_UNSET", false));
    }
}
