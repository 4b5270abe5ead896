//! Server configuration from the environment.
//!
//! ```bash
//! # Collaborators
//! ROTA_DIRECTORY_PATH=/etc/rota/directory.json
//!
//! # Notifications
//! ROTA_NOTIFY_CHANNELS=in_app,email   # default: in_app
//! ROTA_OUTBOX_POLL_MS=500
//! ROTA_OUTBOX_BATCH=50
//!
//! # Email provider: Resend
//! ROTA_EMAIL_PROVIDER=resend
//! RESEND_API_KEY=re_...
//!
//! # Email provider: SMTP
//! ROTA_EMAIL_PROVIDER=smtp
//! SMTP_HOST=smtp.example.com
//! SMTP_PORT=587
//! SMTP_USERNAME=user@example.com
//! SMTP_PASSWORD=app_password
//! SMTP_USE_TLS=true
//!
//! # Sender
//! ROTA_EMAIL_FROM=invites@example.com
//! ROTA_EMAIL_FROM_NAME="Rota"
//! ```

use rota_notify::Channel;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_POLL_MS: u64 = 500;
const DEFAULT_BATCH: usize = 50;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// JSON file with users, connections and targets. Empty directory when unset.
    pub directory_path: Option<PathBuf>,
    pub channels: Vec<Channel>,
    pub outbox_poll: Duration,
    pub outbox_batch: usize,
    pub email: Option<EmailConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            directory_path: None,
            channels: vec![Channel::InApp],
            outbox_poll: Duration::from_millis(DEFAULT_POLL_MS),
            outbox_batch: DEFAULT_BATCH,
            email: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub provider: EmailProviderConfig,
    pub from_address: String,
    pub from_name: Option<String>,
}

#[derive(Debug, Clone)]
pub enum EmailProviderConfig {
    Resend {
        #[allow(dead_code)] // Used when email-resend feature is enabled
        api_key: String,
    },
    Smtp {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        use_tls: bool,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Email notifications are enabled but no email provider is configured")]
    EmailChannelWithoutProvider,

    #[error("Invalid email provider: {0}. Expected 'resend' or 'smtp'")]
    InvalidProvider(String),

    #[error("Invalid notification channel: {0}. Expected 'in_app' or 'email'")]
    InvalidChannel(String),

    #[error("ROTA_NOTIFY_CHANNELS is set but names no channel")]
    NoChannels,

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("Missing from address: ROTA_EMAIL_FROM is required when email is configured")]
    MissingFromAddress,

    #[error("SMTP provider requires SMTP_HOST")]
    SmtpMissingHost,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let channels = match env::var("ROTA_NOTIFY_CHANNELS") {
            Ok(raw) => parse_channels(&raw)?,
            Err(_) => vec![Channel::InApp],
        };
        let outbox_poll = Duration::from_millis(parse_positive(
            "ROTA_OUTBOX_POLL_MS",
            DEFAULT_POLL_MS,
        )?);
        let outbox_batch = parse_positive("ROTA_OUTBOX_BATCH", DEFAULT_BATCH)?;
        let email = email_from_env()?;

        if channels.contains(&Channel::Email) && email.is_none() {
            return Err(ConfigError::EmailChannelWithoutProvider);
        }

        Ok(Self {
            directory_path: env::var("ROTA_DIRECTORY_PATH").ok().map(PathBuf::from),
            channels,
            outbox_poll,
            outbox_batch,
            email,
        })
    }
}

fn parse_channels(raw: &str) -> Result<Vec<Channel>, ConfigError> {
    let mut channels = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let channel: Channel = part
            .parse()
            .map_err(|_| ConfigError::InvalidChannel(part.to_string()))?;
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    if channels.is_empty() {
        return Err(ConfigError::NoChannels);
    }
    Ok(channels)
}

fn parse_number<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}

/// Like [`parse_number`], but zero is rejected.
fn parse_positive<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Default + PartialEq + ToString,
{
    let value = parse_number(name, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn email_from_env() -> Result<Option<EmailConfig>, ConfigError> {
    let Ok(provider_type) = env::var("ROTA_EMAIL_PROVIDER") else {
        return Ok(None);
    };

    let provider = match provider_type.to_lowercase().as_str() {
        "resend" => {
            let api_key = env::var("RESEND_API_KEY")
                .map_err(|_| ConfigError::MissingEnvVar("RESEND_API_KEY".to_string()))?;
            EmailProviderConfig::Resend { api_key }
        }
        "smtp" => {
            let host = env::var("SMTP_HOST").map_err(|_| ConfigError::SmtpMissingHost)?;
            let port = parse_number("SMTP_PORT", 587u16)?;
            let username = env::var("SMTP_USERNAME").ok();
            let password = env::var("SMTP_PASSWORD").ok();
            let use_tls = env::var("SMTP_USE_TLS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(true); // TLS by default

            EmailProviderConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            }
        }
        other => return Err(ConfigError::InvalidProvider(other.to_string())),
    };

    let from_address = env::var("ROTA_EMAIL_FROM").map_err(|_| ConfigError::MissingFromAddress)?;
    let from_name = env::var("ROTA_EMAIL_FROM_NAME").ok();

    Ok(Some(EmailConfig {
        provider,
        from_address,
        from_name,
    }))
}
