use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // External classifier
    pub classifier_script: String,
    pub classifier_bin: String,
    pub classifier_timeout_secs: u64,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            classifier_script: required_env("CLASSIFIER_SCRIPT"),
            classifier_bin: env::var("CLASSIFIER_BIN").unwrap_or_else(|_| "python3".to_string()),
            classifier_timeout_secs: env::var("CLASSIFIER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("CLASSIFIER_TIMEOUT_SECS must be a number"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
