use std::env;
use std::path::PathBuf;

/// Configuration for the HA process log.
///
/// One instance per durable store; the writer reads it once at construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding process log files (default: `.ha-log/` in current directory)
    pub log_dir: PathBuf,

    /// Fsync the log file when a write set is sealed (default: true)
    pub sync_on_seal: bool,

    /// Log filter: a level such as "info" or a full `RUST_LOG` style directive
    pub log_level: String,

    /// Output format for the CLI: "human" (default) or "json"
    pub output_format: String,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        let log_dir = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".ha-log");

        Config {
            log_dir,
            sync_on_seal: true,
            log_level: "info".to_string(),
            output_format: "human".to_string(),
        }
    }

    /// Create config with custom log directory
    pub fn with_log_dir(log_dir: PathBuf) -> Self {
        Config {
            log_dir,
            ..Config::new()
        }
    }

    pub fn get_log_dir(&self) -> &PathBuf {
        &self.log_dir
    }

    pub fn set_log_dir(&mut self, dir: PathBuf) {
        self.log_dir = dir;
    }

    pub fn get_output_format(&self) -> &str {
        &self.output_format
    }

    /// Set output format ("human" or "json")
    pub fn set_output_format(&mut self, format: String) {
        self.output_format = format;
    }

    pub fn get_log_level(&self) -> &str {
        &self.log_level
    }

    pub fn set_log_level(&mut self, level: String) {
        self.log_level = level;
    }

    /// Load config from environment variables
    ///
    /// Environment variables:
    /// - `HA_LOG_DIR`: override log directory
    /// - `HA_LOG_SYNC_ON_SEAL`: "true"/"false" (also "1"/"0")
    /// - `HA_LOG_LEVEL`: log filter
    /// - `HA_LOG_OUTPUT_FORMAT`: "human" or "json"
    pub fn from_env() -> Self {
        let mut config = Config::new();

        if let Ok(dir) = env::var("HA_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if let Ok(sync) = env::var("HA_LOG_SYNC_ON_SEAL") {
            if let Some(flag) = parse_flag(&sync) {
                config.sync_on_seal = flag;
            }
        }

        if let Ok(level) = env::var("HA_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(format) = env::var("HA_LOG_OUTPUT_FORMAT") {
            config.output_format = format;
        }

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();
        assert_eq!(config.output_format, "human");
        assert_eq!(config.log_level, "info");
        assert!(config.sync_on_seal);
        assert!(config.log_dir.ends_with(".ha-log"));
    }

    #[test]
    fn test_with_log_dir_keeps_other_defaults() {
        let config = Config::with_log_dir(PathBuf::from("/var/lib/ha"));
        assert_eq!(config.get_log_dir(), &PathBuf::from("/var/lib/ha"));
        assert!(config.sync_on_seal);
    }

    #[test]
    fn test_config_setters() {
        let mut config = Config::new();
        config.set_output_format("json".to_string());
        assert_eq!(config.get_output_format(), "json");

        config.set_log_level("debug".to_string());
        assert_eq!(config.get_log_level(), "debug");
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
