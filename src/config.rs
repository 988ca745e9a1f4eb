//! Configuration module for the telemetry simulator.
//!
//! Everything is read from `EDGE_TELEMETRY_*` environment variables: the
//! node fleet (count, type, region, id prefix, rate, seed), the sink, and
//! the HEC shipping settings.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::edge_node::NodeType;
use crate::hec::HEC_EVENT_PATH;
use crate::pools::{Pools, PoolsError};

/// Default number of simulated nodes
const DEFAULT_NODE_COUNT: usize = 3;

/// Upper bound on simulated nodes
const MAX_NODE_COUNT: usize = 256;

/// Default node id prefix; nodes are named `{prefix}-01`, `{prefix}-02`, ...
const DEFAULT_NODE_PREFIX: &str = "edge";

/// Default events per second, per node
const DEFAULT_EVENTS_PER_SEC: u32 = 20;

/// Upper bound on events per second, per node
const MAX_EVENTS_PER_SEC: u32 = 10_000;

/// Default HEC base URL
const DEFAULT_HEC_URL: &str = "http://localhost:8088";

/// Token accepted by the local mock collector
const DEFAULT_HEC_TOKEN: &str = "00000000-0000-0000-0000-000000000000";

/// Default batch size (number of events per batch)
const DEFAULT_BATCH_SIZE: usize = 100;

/// Maximum allowed batch size to prevent memory issues
const MAX_BATCH_SIZE: usize = 10_000;

/// Default flush interval in seconds
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 5;

/// Minimum flush interval to prevent overwhelming the collector
const MIN_FLUSH_INTERVAL_SECS: u64 = 1;

/// Maximum flush interval to ensure reasonable data freshness
const MAX_FLUSH_INTERVAL_SECS: u64 = 300;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_MAX_RETRIES: u32 = 3;

/// Where flushed batches go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    /// One JSON event per line on stdout
    #[default]
    Stdout,

    /// Posted to a Splunk HTTP Event Collector
    Hec,
}

impl SinkKind {
    pub fn name(&self) -> &'static str {
        match self {
            SinkKind::Stdout => "stdout",
            SinkKind::Hec => "hec",
        }
    }

    pub fn from_tag(tag: &str) -> Option<SinkKind> {
        match tag.to_ascii_lowercase().as_str() {
            "stdout" => Some(SinkKind::Stdout),
            "hec" => Some(SinkKind::Hec),
            _ => None,
        }
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for the telemetry simulator.
///
/// All settings can be configured via environment variables:
/// - `EDGE_TELEMETRY_NODE_COUNT`: Number of nodes (default: 3)
/// - `EDGE_TELEMETRY_NODE_TYPE`: `web`, `iot`, `infra` or `mixed` (default: mixed)
/// - `EDGE_TELEMETRY_REGION`: Region tag (default: us)
/// - `EDGE_TELEMETRY_NODE_PREFIX`: Node id prefix (default: edge)
/// - `EDGE_TELEMETRY_EVENTS_PER_SEC`: Events per second per node (default: 20)
/// - `EDGE_TELEMETRY_SEED`: Seed for reproducible runs (default: unset)
/// - `EDGE_TELEMETRY_SINK`: `stdout` or `hec` (default: stdout)
/// - `EDGE_TELEMETRY_HEC_URL`: Collector base URL (default: http://localhost:8088)
/// - `EDGE_TELEMETRY_HEC_TOKEN`: Collector token
/// - `EDGE_TELEMETRY_BATCH_SIZE`: Events per batch (default: 100)
/// - `EDGE_TELEMETRY_FLUSH_INTERVAL_SECS`: Seconds between flushes (default: 5)
/// - `EDGE_TELEMETRY_REQUEST_TIMEOUT_SECS`: HTTP request timeout (default: 30)
/// - `EDGE_TELEMETRY_MAX_RETRIES`: Max retry attempts (default: 3)
/// - `EDGE_TELEMETRY_POOLS_FILE`: JSON file replacing the built-in pools
#[derive(Debug, Clone)]
pub struct Config {
    pub node_count: usize,
    pub node_type: NodeType,
    pub region: String,
    pub node_prefix: String,
    pub events_per_sec: u32,

    /// Base seed; node `i` uses `seed + i`
    pub seed: Option<u64>,

    pub sink: SinkKind,

    /// Base URL of the collector
    pub hec_url: String,

    /// Full URL of the event endpoint
    pub hec_event_url: String,

    pub hec_token: String,

    /// Number of events to accumulate before sending a batch
    pub batch_size: usize,

    /// Duration to wait before flushing buffered events, even if batch size not reached
    pub flush_interval: Duration,

    /// HTTP request timeout duration
    pub request_timeout: Duration,

    /// Maximum number of retry attempts for failed requests
    pub max_retries: u32,

    pub pools_file: Option<PathBuf>,
}

/// Error type for configuration loading failures
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub env_var: Option<String>,
}

impl ConfigError {
    fn for_var(env_var: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            env_var: Some(env_var.to_string()),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "Configuration error for {}: {}", var, self.message),
            None => write!(f, "Configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a set variable cannot be parsed or is out of
    /// range, or if the node type, sink or node prefix is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let node_count = parse_bounded(
            "EDGE_TELEMETRY_NODE_COUNT",
            DEFAULT_NODE_COUNT,
            1,
            MAX_NODE_COUNT,
        )?;

        let node_type = match env::var("EDGE_TELEMETRY_NODE_TYPE") {
            Ok(value) => NodeType::from_tag(value.trim()).ok_or_else(|| {
                ConfigError::for_var(
                    "EDGE_TELEMETRY_NODE_TYPE",
                    format!("'{}' is not one of web, iot, infra, mixed", value),
                )
            })?,
            Err(_) => NodeType::default(),
        };

        let region = env::var("EDGE_TELEMETRY_REGION")
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|_| crate::generators::DEFAULT_REGION.to_string());

        let node_prefix = env::var("EDGE_TELEMETRY_NODE_PREFIX")
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|_| DEFAULT_NODE_PREFIX.to_string());
        if node_prefix.is_empty() {
            return Err(ConfigError::for_var(
                "EDGE_TELEMETRY_NODE_PREFIX",
                "node prefix must not be empty",
            ));
        }

        let events_per_sec = parse_bounded(
            "EDGE_TELEMETRY_EVENTS_PER_SEC",
            DEFAULT_EVENTS_PER_SEC,
            1,
            MAX_EVENTS_PER_SEC,
        )?;

        let seed = match env::var("EDGE_TELEMETRY_SEED") {
            Ok(value) => Some(parse_value::<u64>("EDGE_TELEMETRY_SEED", &value)?),
            Err(_) => None,
        };

        let sink = match env::var("EDGE_TELEMETRY_SINK") {
            Ok(value) => SinkKind::from_tag(value.trim()).ok_or_else(|| {
                ConfigError::for_var(
                    "EDGE_TELEMETRY_SINK",
                    format!("'{}' is not one of stdout, hec", value),
                )
            })?,
            Err(_) => SinkKind::default(),
        };

        let hec_url = env::var("EDGE_TELEMETRY_HEC_URL")
            .unwrap_or_else(|_| DEFAULT_HEC_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let hec_event_url = format!("{}{}", hec_url, HEC_EVENT_PATH);

        let hec_token = env::var("EDGE_TELEMETRY_HEC_TOKEN")
            .unwrap_or_else(|_| DEFAULT_HEC_TOKEN.to_string());

        let batch_size =
            parse_bounded("EDGE_TELEMETRY_BATCH_SIZE", DEFAULT_BATCH_SIZE, 1, MAX_BATCH_SIZE)?;

        let flush_interval_secs = parse_bounded(
            "EDGE_TELEMETRY_FLUSH_INTERVAL_SECS",
            DEFAULT_FLUSH_INTERVAL_SECS,
            MIN_FLUSH_INTERVAL_SECS,
            MAX_FLUSH_INTERVAL_SECS,
        )?;

        // Optional, malformed values fall back to the defaults
        let request_timeout_secs: u64 = env::var("EDGE_TELEMETRY_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let max_retries: u32 = env::var("EDGE_TELEMETRY_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);

        let pools_file = env::var("EDGE_TELEMETRY_POOLS_FILE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            node_count,
            node_type,
            region,
            node_prefix,
            events_per_sec,
            seed,
            sink,
            hec_url,
            hec_event_url,
            hec_token,
            batch_size,
            flush_interval: Duration::from_secs(flush_interval_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_retries,
            pools_file,
        })
    }

    /// Node ids for the configured fleet: `{prefix}-01` onwards.
    pub fn node_ids(&self) -> Vec<String> {
        (1..=self.node_count)
            .map(|i| format!("{}-{:02}", self.node_prefix, i))
            .collect()
    }

    /// Seed for the node at `index`, if runs are seeded.
    pub fn node_seed(&self, index: usize) -> Option<u64> {
        self.seed.map(|seed| seed.wrapping_add(index as u64))
    }

    /// Time between two events of one node.
    pub fn generation_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.events_per_sec.max(1)))
    }

    /// Load the pools file if one is configured, otherwise the built-in pools.
    pub fn load_pools(&self) -> Result<Arc<Pools>, PoolsError> {
        match &self.pools_file {
            Some(path) => Ok(Arc::new(Pools::from_file(path)?)),
            None => Ok(Pools::shared()),
        }
    }
}

impl Default for Config {
    /// Create a default configuration using default values.
    ///
    /// This is useful for testing or when environment variables are not set.
    fn default() -> Self {
        Self {
            node_count: DEFAULT_NODE_COUNT,
            node_type: NodeType::default(),
            region: crate::generators::DEFAULT_REGION.to_string(),
            node_prefix: DEFAULT_NODE_PREFIX.to_string(),
            events_per_sec: DEFAULT_EVENTS_PER_SEC,
            seed: None,
            sink: SinkKind::default(),
            hec_url: DEFAULT_HEC_URL.to_string(),
            hec_event_url: format!("{}{}", DEFAULT_HEC_URL, HEC_EVENT_PATH),
            hec_token: DEFAULT_HEC_TOKEN.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            pools_file: None,
        }
    }
}

fn parse_value<T: FromStr>(env_var: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::for_var(env_var, format!("'{}' is not a valid number", value)))
}

/// Parse a numeric variable and check it against `[min, max]`.
fn parse_bounded<T>(env_var: &str, default: T, min: T, max: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Display + Copy,
{
    let value = match env::var(env_var) {
        Ok(value) => parse_value::<T>(env_var, &value)?,
        Err(_) => return Ok(default),
    };

    if value < min {
        return Err(ConfigError::for_var(
            env_var,
            format!("{} is below minimum ({})", value, min),
        ));
    }

    if value > max {
        return Err(ConfigError::for_var(
            env_var,
            format!("{} exceeds maximum allowed ({})", value, max),
        ));
    }

    Ok(value)
}
