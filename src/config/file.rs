//! Configuration file structure (for TOML parsing).
//!
//! Every field is optional; missing values keep their defaults.

use serde::Deserialize;

/// Top-level config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Directory for progress logs.
    pub data_dir: Option<String>,
    /// Remote endpoints.
    pub endpoints: Option<ConfigFileEndpoints>,
    /// Operator identity.
    pub operator: Option<ConfigFileOperator>,
    /// Batching limits.
    pub batch: Option<ConfigFileBatch>,
    /// Delays and timeouts.
    pub timing: Option<ConfigFileTiming>,
    /// Read retry policy.
    pub retry: Option<ConfigFileRetry>,
    /// Well-known schema ids.
    pub schema: Option<ConfigFileSchema>,
    /// Governance options.
    pub governance: Option<ConfigFileGovernance>,
    /// Logging settings.
    pub logging: Option<LoggingSettings>,
    /// Metrics settings.
    pub metrics: Option<MetricsSettings>,
}

/// `[endpoints]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEndpoints {
    /// GraphQL read replica.
    pub graphql_url: Option<String>,
    /// Write gateway.
    pub gateway_url: Option<String>,
    /// Chain JSON-RPC node.
    pub rpc_url: Option<String>,
    /// Bearer token for the gateway.
    pub gateway_token: Option<String>,
    /// HMAC key for signing gateway request bodies.
    pub gateway_hmac_secret: Option<String>,
}

/// `[operator]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileOperator {
    /// Operator wallet address.
    pub address: Option<String>,
    /// Operator's personal space, used as the voter identity.
    pub personal_space_id: Option<String>,
}

/// `[batch]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileBatch {
    /// Deletions per batch.
    pub batch_size: Option<usize>,
    /// Objects enumerated per drain pass.
    pub drain_chunk_size: Option<usize>,
    /// GraphQL page size.
    pub page_size: Option<usize>,
    /// Upper bound on drain passes.
    pub max_passes: Option<u32>,
}

/// `[timing]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileTiming {
    /// Delay after each direct-publish batch.
    pub direct_delay_ms: Option<u64>,
    /// Delay after each governed batch.
    pub governed_delay_ms: Option<u64>,
    /// Per-request HTTP timeout.
    pub request_timeout_ms: Option<u64>,
    /// Budget for one confirmation wait.
    pub confirmation_timeout_ms: Option<u64>,
    /// Interval between receipt polls.
    pub confirmation_poll_ms: Option<u64>,
}

/// `[retry]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRetry {
    /// Retries for idempotent reads.
    pub max_retries: Option<u32>,
    /// Base backoff between retries.
    pub retry_backoff_ms: Option<u64>,
}

/// `[schema]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSchema {
    /// Type marking author/account entities.
    pub account_type_id: Option<String>,
    /// Property linking an entity to its types.
    pub types_property_id: Option<String>,
    /// Name property.
    pub name_property_id: Option<String>,
    /// Topic of the proposal-created event.
    pub proposal_created_topic: Option<String>,
}

/// `[governance]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileGovernance {
    /// `fast` or `slow`.
    pub voting_mode: Option<String>,
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive, e.g. `spacesweep=debug`.
    pub filter: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<String>,
}

/// `[metrics]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsSettings {
    /// Whether metrics are recorded.
    pub enabled: Option<bool>,
    /// Push gateway to flush to at exit.
    pub push_gateway: Option<MetricsPushGatewaySettings>,
}

/// `[metrics.push_gateway]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsPushGatewaySettings {
    /// Push gateway endpoint URI.
    pub endpoint: Option<String>,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Use POST instead of PUT.
    pub use_http_post: Option<bool>,
}
