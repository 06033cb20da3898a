use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_ssm::Client as SsmClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::repositories::TableNames;

/// Prefix shared by every environment variable the service reads
pub const ENV_PREFIX: &str = "REVIEWS";

/// Shortest accepted JWT signing secret, in bytes
const MIN_JWT_SECRET_LEN: usize = 32;

/// bcrypt work factor bounds
const MIN_HASH_COST: u32 = 4;
const MAX_HASH_COST: u32 = 31;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Parameter not found: {name}")]
    ParameterNotFound { name: String },

    #[error("AWS SDK error: {source}")]
    AwsSdk {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Environment variable missing: {name}")]
    MissingEnvironmentVariable { name: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub aws: AwsConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

/// Where the five tables live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[serde(alias = "dynamo")]
    DynamoDb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,
    #[serde(default = "default_users_table")]
    pub users_table_name: String,
    #[serde(default = "default_profiles_table")]
    pub profiles_table_name: String,
    #[serde(default = "default_reviews_table")]
    pub reviews_table_name: String,
    #[serde(default = "default_comments_table")]
    pub comments_table_name: String,
    #[serde(default = "default_drafts_table")]
    pub drafts_table_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// DynamoDB Local or LocalStack
    #[serde(default)]
    pub dynamodb_endpoint_url: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// SSM parameter holding the secret when `jwt_secret` is unset
    #[serde(default)]
    pub jwt_secret_parameter: Option<String>,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
    #[serde(default = "default_require_confirmation")]
    pub require_confirmation: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_secret_parameter", &self.jwt_secret_parameter)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("password_hash_cost", &self.password_hash_cost)
            .field("require_confirmation", &self.require_confirmation)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub dynamodb_client: DynamoDbClient,
    pub ssm_client: SsmClient,
    pub parameter_store: Arc<ParameterStoreConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
}

pub struct ParameterStoreConfig {
    ssm_client: SsmClient,
    cache: Arc<RwLock<HashMap<String, (String, Instant)>>>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for ParameterStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStoreConfig")
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_size", &"<runtime>")
            .finish()
    }
}

/// Deserialize one config section from `REVIEWS_*` variables
fn load_section<T: DeserializeOwned>(section: &str) -> Result<T, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section, e),
        })?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to deserialize {} config: {}", section, e),
        })
}

impl Config {
    /// Load every section, build the AWS clients once and resolve the JWT
    /// secret (possibly from Parameter Store).
    pub async fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");

        let server = ServerConfig::from_env()?;
        let database = DatabaseConfig::from_env()?;
        let mut auth = AuthConfig::from_env()?;
        let observability = ObservabilityConfig::from_env()?;

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(database.region.clone()))
            .load()
            .await;

        let dynamodb_client = match &database.dynamodb_endpoint_url {
            Some(endpoint_url) => {
                info!("Using DynamoDB endpoint override: {}", endpoint_url);
                let dynamodb_config = aws_sdk_dynamodb::config::Builder::from(&sdk_config)
                    .endpoint_url(endpoint_url)
                    .build();
                DynamoDbClient::from_conf(dynamodb_config)
            }
            None => DynamoDbClient::new(&sdk_config),
        };
        let ssm_client = SsmClient::new(&sdk_config);

        let parameter_store = Arc::new(ParameterStoreConfig::new(
            ssm_client.clone(),
            Duration::from_secs(5 * 60),
        ));

        if auth.jwt_secret.is_none() {
            if let Some(name) = &auth.jwt_secret_parameter {
                info!("Resolving JWT secret from Parameter Store: {}", name);
                auth.jwt_secret = Some(parameter_store.get_parameter(name).await?);
            }
        }

        let aws = AwsConfig {
            region: database.region.clone(),
            dynamodb_client,
            ssm_client,
            parameter_store,
        };

        let config = Config {
            server,
            database,
            auth,
            aws,
            observability,
        };

        config.validate()?;
        config.check_connectivity().await;

        info!("Configuration loaded successfully");
        debug!("Configuration: {:?}", config);

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.auth.validate()
    }

    /// Log-only probe; an unreachable store does not stop startup
    async fn check_connectivity(&self) {
        if self.database.storage_backend != StorageBackend::DynamoDb {
            return;
        }

        match self.aws.dynamodb_client.list_tables().limit(1).send().await {
            Ok(_) => info!("DynamoDB connectivity validated"),
            Err(e) => warn!("DynamoDB connectivity test failed: {}", e),
        }
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("server")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "Server port cannot be 0".to_string(),
            });
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "Request timeout cannot be 0".to_string(),
            });
        }

        if self.max_request_size == 0 {
            return Err(ConfigError::ValidationError {
                message: "Max request size cannot be 0".to_string(),
            });
        }

        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("database")
    }

    pub fn table_names(&self) -> TableNames {
        TableNames {
            users: self.users_table_name.clone(),
            profiles: self.profiles_table_name.clone(),
            reviews: self.reviews_table_name.clone(),
            comments: self.comments_table_name.clone(),
            drafts: self.drafts_table_name.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("Users", &self.users_table_name),
            ("Profiles", &self.profiles_table_name),
            ("Reviews", &self.reviews_table_name),
            ("Comments", &self.comments_table_name),
            ("Drafts", &self.drafts_table_name),
        ];

        for (label, name) in names {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    message: format!("{} table name cannot be empty", label),
                });
            }
        }

        Ok(())
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("auth")
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }

    /// The resolved signing secret
    pub fn secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                name: format!("{}_JWT_SECRET", ENV_PREFIX),
            })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.secret()?.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::ValidationError {
                message: format!("JWT secret must be at least {} bytes", MIN_JWT_SECRET_LEN),
            });
        }

        if self.token_ttl_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "Token TTL cannot be 0".to_string(),
            });
        }

        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.password_hash_cost) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Password hash cost must be between {} and {}",
                    MIN_HASH_COST, MAX_HASH_COST
                ),
            });
        }

        Ok(())
    }
}

impl ObservabilityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("observability")
    }
}

impl ParameterStoreConfig {
    pub fn new(ssm_client: SsmClient, cache_ttl: Duration) -> Self {
        Self {
            ssm_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
        }
    }

    /// Fetch a decrypted parameter, served from cache while fresh
    pub async fn get_parameter(&self, name: &str) -> Result<String, ConfigError> {
        {
            let cache = self.cache.read().await;
            if let Some((value, timestamp)) = cache.get(name) {
                if timestamp.elapsed() < self.cache_ttl {
                    debug!("Parameter found in cache: {}", name);
                    return Ok(value.clone());
                }
                debug!("Parameter cache expired: {}", name);
            }
        }

        debug!("Fetching parameter from AWS SSM: {}", name);
        let result = self
            .ssm_client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| ConfigError::AwsSdk {
                source: Box::new(e),
            })?;

        let value = result
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| ConfigError::ParameterNotFound {
                name: name.to_string(),
            })?
            .to_string();

        self.cache
            .write()
            .await
            .insert(name.to_string(), (value.clone(), Instant::now()));

        Ok(value)
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
        info!("Parameter store cache cleared");
    }

    pub async fn cache_size(&self) -> usize {
        self.cache.read().await.len()
    }
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_timeout() -> u64 {
    30
}

pub(crate) fn default_max_request_size() -> usize {
    1024 * 1024
}

pub(crate) fn default_storage_backend() -> StorageBackend {
    StorageBackend::DynamoDb
}

pub(crate) fn default_users_table() -> String {
    "Users".to_string()
}

pub(crate) fn default_profiles_table() -> String {
    "Profiles".to_string()
}

pub(crate) fn default_reviews_table() -> String {
    "Reviews".to_string()
}

pub(crate) fn default_comments_table() -> String {
    "Comments".to_string()
}

pub(crate) fn default_drafts_table() -> String {
    "Drafts".to_string()
}

pub(crate) fn default_region() -> String {
    "us-west-2".to_string()
}

pub(crate) fn default_token_ttl() -> u64 {
    3600
}

pub(crate) fn default_password_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

pub(crate) fn default_require_confirmation() -> bool {
    true
}

pub(crate) fn default_service_name() -> String {
    "reviews-rs".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}
