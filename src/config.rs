use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

pub const DEFAULT_KONNECT_BASE_URL: &str = "https://api.preprod.konnect.network/api/v2";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub konnect: KonnectOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// `json` for structured log lines, anything else for human-readable output
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 20,
        }
    }
}

/// What the webhook answers when settlement or the processor lookup fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementFailurePolicy {
    /// Always answer `200 Ok` so the processor stops redelivering
    Acknowledge,
    /// Answer with the status of the underlying error so the processor retries
    Reject,
}

/// Konnect integration options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KonnectOptions {
    /// Konnect REST API root
    pub base_url: String,
    /// Public URL of this service's webhook route, sent to Konnect as the callback
    pub webhook_url: String,
    pub success_url: String,
    pub fail_url: String,
    /// Minutes the hosted payment page stays valid
    pub lifespan: u32,
    pub theme: String,
    pub accepted_payment_methods: Vec<String>,
    pub add_payment_fees_to_amount: bool,
    pub silent_webhook: bool,
    /// Unset leaves the HTTP transport default in place
    pub request_timeout_secs: Option<u64>,
    /// Channel used for webhook deliveries that do not name one
    pub default_channel_token: Option<String>,
    /// When set, webhook deliveries must carry a valid `x-konnect-signature`
    pub webhook_secret: Option<String>,
    /// Apply each payment reference to an order at most once
    pub deduplicate_settlements: bool,
    pub settlement_failure_policy: SettlementFailurePolicy,
}

impl Default for KonnectOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_KONNECT_BASE_URL.to_string(),
            webhook_url: "http://localhost:3000/payments/konnect".to_string(),
            success_url: "https://dev.konnect.network/gateway/payment-success".to_string(),
            fail_url: "https://dev.konnect.network/gateway/payment-failure".to_string(),
            lifespan: 10,
            theme: "light".to_string(),
            accepted_payment_methods: vec!["bank_card".to_string()],
            add_payment_fees_to_amount: true,
            silent_webhook: true,
            request_timeout_secs: None,
            default_channel_token: None,
            webhook_secret: None,
            deduplicate_settlements: true,
            settlement_failure_policy: SettlementFailurePolicy::Acknowledge,
        }
    }
}

impl AppConfig {
    /// Load configuration from `config/konnect.{toml,yaml,json}` (optional) and
    /// `APP_<SECTION>__<KEY>` environment variables, e.g. `APP_KONNECT__BASE_URL`.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/konnect").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("konnect.accepted_payment_methods"),
            )
            .build()
            .context("failed to read configuration sources")?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("APP_DATABASE__URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("APP_DATABASE__MAX_CONNECTIONS must be greater than 0"));
        }

        self.konnect.validate()
    }
}

impl KonnectOptions {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("base_url", &self.base_url),
            ("webhook_url", &self.webhook_url),
            ("success_url", &self.success_url),
            ("fail_url", &self.fail_url),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("konnect.{} cannot be empty", name));
            }
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(anyhow!(
                    "konnect.{} must be an http(s) URL, got {}",
                    name,
                    value
                ));
            }
        }

        if self.lifespan == 0 {
            return Err(anyhow!("konnect.lifespan must be greater than 0"));
        }

        if self.accepted_payment_methods.is_empty() {
            return Err(anyhow!(
                "konnect.accepted_payment_methods must contain at least one method"
            ));
        }

        if let Some(secret) = &self.webhook_secret {
            if secret.trim().is_empty() {
                return Err(anyhow!("konnect.webhook_secret cannot be empty when set"));
            }
        }

        Ok(())
    }
}
