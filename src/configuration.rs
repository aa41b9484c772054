use crate::domain::SubscriberEmail;
use crate::email_client::{EmailClient, EmailError};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct Configuration {
    pub application: ApplicationConfigs,
    pub database: DatabaseConfigs,
    pub email_client: EmailClientConfigs,
    pub delivery: DeliverySettings,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationConfigs {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub cron_secret: Secret<String>,
    pub admin_token: Secret<String>,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseConfigs {
    pub username: String,
    pub password: Secret<String>,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

#[derive(Deserialize, Clone)]
pub struct EmailClientConfigs {
    pub base_url: String,
    pub sender_email: String,
    pub authorization_token: Secret<String>,
    pub timeout_milliseconds: u64,
}

/// Fixed constraints imposed by the email provider. Not tunable per campaign.
#[derive(Deserialize, Clone, Copy, Debug)]
pub struct DeliverySettings {
    /// Provider's daily send quota; at most this many recipients per cycle.
    pub batch_size: u32,
    pub inter_send_delay_milliseconds: u64,
    /// Cadence of the in-process scheduler. Zero leaves triggering to an external cron.
    pub daily_trigger_seconds: u64,
}

impl DeliverySettings {
    pub fn inter_send_delay(&self) -> Duration {
        Duration::from_millis(self.inter_send_delay_milliseconds)
    }

    pub fn daily_trigger(&self) -> Duration {
        Duration::from_secs(self.daily_trigger_seconds)
    }

    /// Cycles needed to drain `remaining` recipients.
    pub fn estimated_days(&self, remaining: u64) -> u64 {
        remaining.div_ceil(u64::from(self.batch_size.max(1)))
    }
}

#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment. Use either `local` or `production`."
            )),
        }
    }
}

pub fn get_config() -> Result<Configuration, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(e.to_string()))?
        .join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let configs = config::Config::builder()
        .add_source(config::File::from(base_path.join("base.yaml")))
        .add_source(config::File::from(base_path.join(environment_filename)))
        // e.g. `APP_DELIVERY__BATCH_SIZE=100` sets `delivery.batch_size`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let configuration = configs.try_deserialize::<Configuration>()?;
    if configuration.delivery.batch_size == 0 {
        return Err(config::ConfigError::Message(
            "delivery.batch_size must be greater than zero".into(),
        ));
    }
    Ok(configuration)
}

impl DatabaseConfigs {
    pub fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
            .database(&self.database_name)
    }
}

impl EmailClientConfigs {
    pub fn client(&self) -> Result<EmailClient, anyhow::Error> {
        let sender = self.sender().map_err(anyhow::Error::msg)?;
        let base_url = reqwest::Url::parse(&self.base_url).map_err(EmailError::from)?;
        Ok(EmailClient::new(
            base_url,
            sender,
            self.authorization_token.clone(),
            self.timeout(),
        )?)
    }

    pub fn sender(&self) -> Result<SubscriberEmail, String> {
        SubscriberEmail::parse(self.sender_email.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}
