use std::env;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub fcm: FcmConfig,
    pub events: EventsConfig,
    pub reminders: ReminderConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Emit logs as JSON lines instead of human-readable text.
    /// Read from env var `LOG_FORMAT` ("json" enables it).
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    /// Path to the Google service-account JSON used to mint access tokens.
    pub credentials_file: String,
    /// Overrides the `project_id` found in the credentials file.
    pub project_id: Option<String>,
    pub api_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Shared secret for HMAC-signed event deliveries. `None` disables verification.
    pub webhook_secret: Option<String>,
    /// Maximum number of student records loaded per page during a class announcement.
    pub student_page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    /// Whether the in-process reminder sweep worker runs.
    pub enabled: bool,
    /// Seconds between two sweeps.
    pub interval_seconds: u64,
    /// Size of the look-ahead window in seconds.
    pub lookahead_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Offset from UTC applied when rendering class times into notification text.
    pub utc_offset_minutes: i32,
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_or("PORT", 8080u16)?,
                json_logs: env::var("LOG_FORMAT")
                    .map(|v| v.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/app.db".to_string()),
                max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5u32)?,
            },
            fcm: FcmConfig {
                credentials_file: env::var("FCM_CREDENTIALS_FILE")
                    .map_err(|_| ConfigError::MissingEnv("FCM_CREDENTIALS_FILE".to_string()))?,
                project_id: env::var("FCM_PROJECT_ID").ok().filter(|v| !v.is_empty()),
                api_base_url: env::var("FCM_API_BASE_URL")
                    .unwrap_or_else(|_| "https://fcm.googleapis.com".to_string()),
            },
            events: EventsConfig {
                webhook_secret: env::var("EVENT_WEBHOOK_SECRET")
                    .ok()
                    .filter(|v| !v.is_empty()),
                student_page_size: parse_or("STUDENT_PAGE_SIZE", 500u32)?,
            },
            reminders: ReminderConfig {
                enabled: parse_flag("REMINDER_ENABLED", true),
                interval_seconds: parse_or("REMINDER_INTERVAL_SECONDS", 60u64)?,
                lookahead_seconds: parse_or("REMINDER_LOOKAHEAD_SECONDS", 300i64)?,
            },
            display: DisplayConfig {
                utc_offset_minutes: parse_or("DISPLAY_UTC_OFFSET_MINUTES", 0i32)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reminders.interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "REMINDER_INTERVAL_SECONDS".to_string(),
            ));
        }
        // Reminder bodies state the look-ahead in whole minutes.
        if self.reminders.lookahead_seconds <= 0 || self.reminders.lookahead_seconds % 60 != 0 {
            return Err(ConfigError::InvalidValue(
                "REMINDER_LOOKAHEAD_SECONDS".to_string(),
            ));
        }
        if self.events.student_page_size == 0 {
            return Err(ConfigError::InvalidValue("STUDENT_PAGE_SIZE".to_string()));
        }
        // chrono::FixedOffset accepts strictly less than one day.
        if self.display.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidValue(
                "DISPLAY_UTC_OFFSET_MINUTES".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                json_logs: false,
            },
            database: DatabaseConfig {
                url: "sqlite://data/app.db".to_string(),
                max_connections: 5,
            },
            fcm: FcmConfig {
                credentials_file: String::new(),
                project_id: None,
                api_base_url: "https://fcm.googleapis.com".to_string(),
            },
            events: EventsConfig {
                webhook_secret: None,
                student_page_size: 500,
            },
            reminders: ReminderConfig {
                enabled: true,
                interval_seconds: 60,
                lookahead_seconds: 300,
            },
            display: DisplayConfig {
                utc_offset_minutes: 0,
            },
        }
    }
}
