//! Apache error log lines.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{pick, pick_copy, EventSource, GeneratorOptions};
use crate::event::Event;
use crate::format::format_apache_timestamp;
use crate::pools::Pools;

pub const SOURCETYPE: &str = "apache_error";
const SOURCE: &str = "/var/log/httpd/error_log";
const INDEX: &str = "security";
const DEFAULT_HOST: &str = "web-01";

/// Apache error log severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLevel {
    Notice,
    Warn,
    Error,
    Crit,
}

impl ErrorLevel {
    /// Get all levels.
    pub fn all() -> &'static [ErrorLevel] {
        &[
            ErrorLevel::Notice,
            ErrorLevel::Warn,
            ErrorLevel::Error,
            ErrorLevel::Crit,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorLevel::Notice => "notice",
            ErrorLevel::Warn => "warn",
            ErrorLevel::Error => "error",
            ErrorLevel::Crit => "crit",
        }
    }

    /// The one message template used for this level.
    ///
    /// `{ip}` is the client address, `{path}` the probed file.
    pub fn template(&self) -> &'static str {
        match self {
            ErrorLevel::Notice => "Apache/2.4.54 configured -- resuming normal operations",
            ErrorLevel::Warn => {
                "[client {ip}] ModSecurity: Warning. Pattern match \"select|insert|update\" at ARGS:query"
            }
            ErrorLevel::Error => "[client {ip}] File does not exist: /var/www/html{path}",
            ErrorLevel::Crit => "[client {ip}] SSL handshake failed: SSL alert number 40",
        }
    }
}

impl std::fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Generates web server error log events.
#[derive(Debug, Clone)]
pub struct WebErrorGenerator {
    host: String,
    region: String,
    pools: Arc<Pools>,
}

impl WebErrorGenerator {
    pub fn new(options: &GeneratorOptions, pools: Arc<Pools>) -> Self {
        Self {
            host: options.host_or(DEFAULT_HOST),
            region: options.region_or_default(),
            pools,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

impl EventSource for WebErrorGenerator {
    fn generate_with<R: Rng>(&mut self, rng: &mut R) -> Event {
        let now = Utc::now();

        let level = pick_copy(rng, ErrorLevel::all(), ErrorLevel::Notice);
        let clientip = pick(rng, self.pools.addresses(&self.region));
        let probed = pick(rng, self.pools.probed_paths());
        let message = level
            .template()
            .replace("{ip}", clientip)
            .replace("{path}", probed);
        let pid: u32 = rng.gen_range(1000..=9999);

        let raw = format!(
            "[{}] [{}] [pid {}] {}",
            format_apache_timestamp(&now),
            level,
            pid,
            message
        );

        Event::new(now, raw, self.host.as_str(), SOURCE, SOURCETYPE, INDEX)
            .with_field("level", level.name())
            .with_field("clientip", clientip)
            .with_field("region", self.region.as_str())
    }
}
