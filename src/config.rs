//! Configuration stored in `~/.invox/config.json`.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Client configuration for the sync core and its HTTP gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the invoice backend, e.g. `https://api.invox.example`.
    pub backend_url: String,
    /// Account the backend scopes this session to.
    pub account_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub retry_max_attempts: u32,
}

fn default_page_size() -> u32 {
    20
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

/// Canonical config file path (`~/.invox/config.json`).
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".invox").join("config.json"))
}

/// Load configuration from `~/.invox/config.json`.
pub fn load_config() -> Result<Config, String> {
    let path = config_path()?;
    if !path.exists() {
        return Err(format!(
            "Config file not found at {}. Create it with: {{ \"backendUrl\": \"https://...\", \"accountRef\": \"acct-...\" }}",
            path.display()
        ));
    }

    let content =
        fs::read_to_string(&path).map_err(|e| format!("Failed to read config: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Write configuration back to disk, creating `~/.invox/` if needed.
pub fn save_config(config: &Config) -> Result<(), String> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "backendUrl": "https://api.example", "accountRef": "acct-1" }"#,
        )
        .unwrap();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.retry_max_attempts, 3);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn round_trips_camel_case() {
        let config = Config {
            backend_url: "https://api.example".into(),
            account_ref: "acct-1".into(),
            api_token: Some("tok".into()),
            page_size: 50,
            request_timeout_secs: 10,
            retry_max_attempts: 5,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["backendUrl"], "https://api.example");
        assert_eq!(json["pageSize"], 50);

        let back: Config = serde_json::from_value(json).unwrap();
        assert_eq!(back.page_size, 50);
        assert_eq!(back.api_token.as_deref(), Some("tok"));
    }
}
