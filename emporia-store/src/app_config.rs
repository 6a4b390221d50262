use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use uuid::Uuid;
use emporia_shared::{Masked, Partner, Site, SiteConfiguration};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub enterprise: EnterpriseConfig,
    /// Switch defaults; rows in the `switches` table override them.
    #[serde(default)]
    pub switches: HashMap<String, bool>,
    #[serde(default)]
    pub sites: Vec<SiteSettings>,
    #[serde(default)]
    pub payment: PaymentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    /// Events are not published when unset.
    pub brokers: Option<String>,
    #[serde(default = "default_basket_topic")]
    pub basket_topic: String,
}

fn default_basket_topic() -> String { "basket-events".to_string() }

impl Default for KafkaConfig {
    fn default() -> Self {
        Self { brokers: None, basket_topic: default_basket_topic() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Upper bound on how long the process-local tier keeps an entry.
    pub local_ttl_seconds: u64,
    pub local_max_capacity: u64,
    /// Prefix of every key written to the shared tier.
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_ttl_seconds: 300,
            local_max_capacity: 10_000,
            namespace: "emporia".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnterpriseConfig {
    pub api_cache_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub backoff_max_tries: u32,
    pub backoff_base_ms: u64,
}

impl Default for EnterpriseConfig {
    fn default() -> Self {
        Self {
            api_cache_timeout_seconds: 3600,
            request_timeout_seconds: 5,
            backoff_max_tries: 3,
            backoff_base_ms: 100,
        }
    }
}

/// One storefront as configured on disk.
#[derive(Debug, Deserialize, Clone)]
pub struct SiteSettings {
    pub id: Uuid,
    pub domain: String,
    pub partner_id: Uuid,
    pub partner_code: String,
    pub partner_name: String,
    pub enterprise_api_url: String,
    pub oauth2_provider_url: String,
    pub oauth2_client_id: String,
    pub oauth2_client_secret: String,
}

impl SiteSettings {
    pub fn to_site(&self) -> Site {
        Site {
            id: self.id,
            domain: self.domain.clone(),
            configuration: SiteConfiguration {
                partner: Partner {
                    id: self.partner_id,
                    short_code: self.partner_code.clone(),
                    name: self.partner_name.clone(),
                },
                enterprise_api_url: self.enterprise_api_url.clone(),
                oauth2_provider_url: self.oauth2_provider_url.clone(),
                oauth2_client_id: self.oauth2_client_id.clone(),
                oauth2_client_secret: Masked::new(self.oauth2_client_secret.clone()),
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PaymentConfig {
    #[serde(default)]
    pub processors: Vec<ProcessorSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessorSettings {
    pub name: String,
    pub payment_page_url: String,
    pub merchant_id: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `EMPORIA__SERVER__PORT=8080` sets `server.port`
            .add_source(config::Environment::with_prefix("EMPORIA").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn sites(&self) -> Vec<Site> {
        self.sites.iter().map(SiteSettings::to_site).collect()
    }
}
