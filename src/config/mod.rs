//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then a TOML file, then
//! `SPACESWEEP_*` environment variables.
//!
//! # Example TOML
//!
//! ```toml
//! data_dir = "/var/lib/spacesweep"
//!
//! [endpoints]
//! graphql_url = "https://replica.example.org/graphql"
//! gateway_url = "https://gateway.example.org"
//! rpc_url = "https://rpc.example.org"
//!
//! [operator]
//! address = "0x1111111111111111111111111111111111111111"
//! personal_space_id = "2f3c0b1a9e8d4c7b8a6f5e4d3c2b1a09"
//!
//! [batch]
//! batch_size = 5000
//! drain_chunk_size = 20000
//! ```

mod file;

pub use file::{
    ConfigFile, ConfigFileBatch, ConfigFileEndpoints, ConfigFileGovernance, ConfigFileOperator,
    ConfigFileRetry, ConfigFileSchema, ConfigFileTiming, LoggingSettings,
    MetricsPushGatewaySettings, MetricsSettings,
};

use crate::models::{ObjectId, SpaceId, VotingMode};
use crate::{Error, Result};
use secrecy::SecretString;
use std::path::{Path, PathBuf};

/// Default account type marker for author objects.
pub const DEFAULT_ACCOUNT_TYPE_ID: &str = "cb69723f7456471a9fa3a4a0f8f0da4b";

/// Default property linking entities to their types.
pub const DEFAULT_TYPES_PROPERTY_ID: &str = "8f151ba4de204e3c9cb499ddf96f48f1";

/// Default name property.
pub const DEFAULT_NAME_PROPERTY_ID: &str = "a126ca530c8e48d5b88882c734c38935";

/// Main configuration for spacesweep.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Directory holding progress logs.
    pub data_dir: PathBuf,
    /// Remote endpoints.
    pub endpoints: EndpointConfig,
    /// Operator identity.
    pub operator: OperatorConfig,
    /// Batching limits.
    pub batch: BatchConfig,
    /// Delays and timeouts.
    pub timing: TimingConfig,
    /// Read retry policy.
    pub retry: RetryConfig,
    /// Well-known schema ids.
    pub schema: SchemaConfig,
    /// Voting mode for proposals.
    pub voting_mode: VotingMode,
    /// Logging settings as read from the file.
    pub logging: LoggingSettings,
    /// Metrics settings as read from the file.
    pub metrics: MetricsSettings,
}

/// Remote endpoints.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// GraphQL read replica.
    pub graphql_url: String,
    /// Write gateway.
    pub gateway_url: String,
    /// Chain JSON-RPC node.
    pub rpc_url: String,
    /// Bearer token for the gateway.
    pub gateway_token: Option<SecretString>,
    /// HMAC key for signing gateway request bodies.
    pub gateway_hmac_secret: Option<SecretString>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            graphql_url: "http://localhost:4000/graphql".to_string(),
            gateway_url: "http://localhost:4100".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            gateway_token: None,
            gateway_hmac_secret: None,
        }
    }
}

/// Operator identity.
#[derive(Debug, Clone, Default)]
pub struct OperatorConfig {
    /// Wallet address that signs every write.
    pub address: Option<String>,
    /// Operator's personal space, the governance-registered voter.
    pub personal_space_id: Option<SpaceId>,
}

/// Batching limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Deletions per batch.
    pub batch_size: usize,
    /// Objects enumerated per drain pass.
    pub drain_chunk_size: usize,
    /// GraphQL page size.
    pub page_size: usize,
    /// Upper bound on drain passes.
    pub max_passes: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5_000,
            drain_chunk_size: 20_000,
            page_size: 1_000,
            max_passes: 50,
        }
    }
}

/// Delays and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Delay after each direct-publish batch.
    pub direct_delay_ms: u64,
    /// Delay after each governed batch.
    pub governed_delay_ms: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_ms: u64,
    /// Budget for one confirmation wait.
    pub confirmation_timeout_ms: u64,
    /// Interval between receipt polls.
    pub confirmation_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            direct_delay_ms: 2_000,
            governed_delay_ms: 5_000,
            request_timeout_ms: 30_000,
            confirmation_timeout_ms: 120_000,
            confirmation_poll_ms: 2_000,
        }
    }
}

/// Retry policy for idempotent reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles each time.
    pub retry_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

/// Well-known schema ids.
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    /// Type marking author/account entities.
    pub account_type_id: ObjectId,
    /// Property linking an entity to its types.
    pub types_property_id: ObjectId,
    /// Name property.
    pub name_property_id: ObjectId,
    /// Topic of the proposal-created event, when proposal ids come from receipt logs.
    pub proposal_created_topic: Option<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            account_type_id: parse_builtin(DEFAULT_ACCOUNT_TYPE_ID),
            types_property_id: parse_builtin(DEFAULT_TYPES_PROPERTY_ID),
            name_property_id: parse_builtin(DEFAULT_NAME_PROPERTY_ID),
            proposal_created_topic: None,
        }
    }
}

/// Parses a compile-time id constant.
fn parse_builtin(s: &str) -> ObjectId {
    ObjectId::parse(s).unwrap_or_else(|_| ObjectId::generate())
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".spacesweep"),
            endpoints: EndpointConfig::default(),
            operator: OperatorConfig::default(),
            batch: BatchConfig::default(),
            timing: TimingConfig::default(),
            retry: RetryConfig::default(),
            schema: SchemaConfig::default(),
            voting_mode: VotingMode::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl SweepConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an id
    /// in it is malformed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or an id is malformed.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `<config_dir>/spacesweep/config.toml`, then
    /// `~/.config/spacesweep/config.toml`. Returns defaults if neither exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but is invalid.
    pub fn load_default() -> Result<Self> {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Ok(Self::default());
        };

        let candidates = [
            base_dirs.config_dir().join("spacesweep").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("spacesweep")
                .join("config.toml"),
        ];
        for candidate in &candidates {
            if candidate.exists() {
                return Self::load_from_file(candidate);
            }
        }

        Ok(Self::default())
    }

    /// Converts a `ConfigFile` to `SweepConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(endpoints) = file.endpoints {
            config.apply_endpoints(endpoints);
        }
        if let Some(operator) = file.operator {
            config.operator.address = operator.address.map(|a| a.trim().to_string());
            config.operator.personal_space_id = operator
                .personal_space_id
                .as_deref()
                .map(SpaceId::parse)
                .transpose()?;
        }
        if let Some(batch) = file.batch {
            config.apply_batch(&batch);
        }
        if let Some(timing) = file.timing {
            config.apply_timing(&timing);
        }
        if let Some(retry) = file.retry {
            if let Some(v) = retry.max_retries {
                config.retry.max_retries = v;
            }
            if let Some(v) = retry.retry_backoff_ms {
                config.retry.retry_backoff_ms = v;
            }
        }
        if let Some(schema) = file.schema {
            config.apply_schema(schema)?;
        }
        if let Some(mode) = file.governance.and_then(|g| g.voting_mode) {
            config.voting_mode = VotingMode::parse(&mode);
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.metrics = metrics;
        }

        Ok(config)
    }

    fn apply_endpoints(&mut self, endpoints: ConfigFileEndpoints) {
        if let Some(url) = endpoints.graphql_url {
            self.endpoints.graphql_url = url;
        }
        if let Some(url) = endpoints.gateway_url {
            self.endpoints.gateway_url = url;
        }
        if let Some(url) = endpoints.rpc_url {
            self.endpoints.rpc_url = url;
        }
        if let Some(token) = endpoints.gateway_token {
            self.endpoints.gateway_token = Some(SecretString::from(token));
        }
        if let Some(secret) = endpoints.gateway_hmac_secret {
            self.endpoints.gateway_hmac_secret = Some(SecretString::from(secret));
        }
    }

    fn apply_batch(&mut self, batch: &ConfigFileBatch) {
        if let Some(v) = batch.batch_size {
            self.batch.batch_size = v.max(1);
        }
        if let Some(v) = batch.drain_chunk_size {
            self.batch.drain_chunk_size = v.max(1);
        }
        if let Some(v) = batch.page_size {
            self.batch.page_size = v.clamp(1, 1_000);
        }
        if let Some(v) = batch.max_passes {
            self.batch.max_passes = v.max(1);
        }
    }

    const fn apply_timing(&mut self, timing: &ConfigFileTiming) {
        if let Some(v) = timing.direct_delay_ms {
            self.timing.direct_delay_ms = v;
        }
        if let Some(v) = timing.governed_delay_ms {
            self.timing.governed_delay_ms = v;
        }
        if let Some(v) = timing.request_timeout_ms {
            self.timing.request_timeout_ms = v;
        }
        if let Some(v) = timing.confirmation_timeout_ms {
            self.timing.confirmation_timeout_ms = v;
        }
        if let Some(v) = timing.confirmation_poll_ms {
            self.timing.confirmation_poll_ms = v;
        }
    }

    fn apply_schema(&mut self, schema: ConfigFileSchema) -> Result<()> {
        if let Some(id) = schema.account_type_id {
            self.schema.account_type_id = ObjectId::parse(&id)?;
        }
        if let Some(id) = schema.types_property_id {
            self.schema.types_property_id = ObjectId::parse(&id)?;
        }
        if let Some(id) = schema.name_property_id {
            self.schema.name_property_id = ObjectId::parse(&id)?;
        }
        self.schema.proposal_created_topic = schema
            .proposal_created_topic
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        Ok(())
    }

    /// Applies `SPACESWEEP_*` environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an overridden id is malformed.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if an overridden id is malformed.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("SPACESWEEP_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SPACESWEEP_GRAPHQL_URL") {
            self.endpoints.graphql_url = v;
        }
        if let Some(v) = get("SPACESWEEP_GATEWAY_URL") {
            self.endpoints.gateway_url = v;
        }
        if let Some(v) = get("SPACESWEEP_RPC_URL") {
            self.endpoints.rpc_url = v;
        }
        if let Some(v) = get("SPACESWEEP_GATEWAY_TOKEN") {
            self.endpoints.gateway_token = Some(SecretString::from(v));
        }
        if let Some(v) = get("SPACESWEEP_GATEWAY_HMAC_SECRET") {
            self.endpoints.gateway_hmac_secret = Some(SecretString::from(v));
        }
        if let Some(v) = get("SPACESWEEP_OPERATOR_ADDRESS") {
            self.operator.address = Some(v);
        }
        if let Some(v) = get("SPACESWEEP_PERSONAL_SPACE_ID") {
            self.operator.personal_space_id = Some(SpaceId::parse(&v)?);
        }
        if let Some(v) = get("SPACESWEEP_BATCH_SIZE").and_then(|v| v.parse::<usize>().ok()) {
            self.batch.batch_size = v.max(1);
        }
        if let Some(v) = get("SPACESWEEP_LOG_FORMAT") {
            self.logging.format = Some(v);
        }
        if let Some(v) = get("SPACESWEEP_LOG_FILE") {
            self.logging.file = Some(v);
        }

        Ok(self)
    }

    /// Returns the progress log path for a target space.
    #[must_use]
    pub fn progress_path(&self, space: SpaceId) -> PathBuf {
        self.data_dir.join(format!("progress-{space}.jsonl"))
    }

    /// Returns the operator address or an error naming the missing setting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when no operator address is configured.
    pub fn require_operator_address(&self) -> Result<&str> {
        self.operator
            .address
            .as_deref()
            .ok_or_else(|| {
                Error::InvalidInput(
                    "operator address not configured (set [operator].address or SPACESWEEP_OPERATOR_ADDRESS)"
                        .to_string(),
                )
            })
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }
}
