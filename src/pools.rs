//! Static pools the generators draw from: addresses per region, request
//! paths, user agents, account names and syslog message templates.
//!
//! Pools are immutable once built. They are created once at startup, either
//! from the built-in tables ([`Pools::standard`]) or from a JSON file
//! ([`Pools::from_file`]), and shared with every generator behind an `Arc`.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::generators::syslog::{SyslogSeverity, PLACEHOLDERS};

/// Region tags with their own address pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Us,
    Eu,
    Apac,
}

impl Region {
    /// Get all supported regions.
    pub fn all() -> &'static [Region] {
        &[Region::Us, Region::Eu, Region::Apac]
    }

    /// Get the region tag as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Eu => "eu",
            Region::Apac => "apac",
        }
    }

    /// Look up a region by tag, ignoring ASCII case.
    pub fn from_tag(tag: &str) -> Option<Region> {
        Region::all()
            .iter()
            .copied()
            .find(|region| region.name().eq_ignore_ascii_case(tag))
    }

    /// Resolve a tag to the pool it draws from. Unknown tags use `us`.
    pub fn resolve(tag: &str) -> Region {
        Region::from_tag(tag).unwrap_or_default()
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Address pools keyed by region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressPools {
    pub us: Vec<String>,
    pub eu: Vec<String>,
    pub apac: Vec<String>,
}

impl AddressPools {
    pub fn for_region(&self, region: Region) -> &[String] {
        match region {
            Region::Us => &self.us,
            Region::Eu => &self.eu,
            Region::Apac => &self.apac,
        }
    }
}

/// Syslog message templates grouped by severity.
///
/// Templates may contain the placeholders `{ip}`, `{user}`, `{pct}`,
/// `{days}`, `{ms}`, `{pid}` and `{cpu}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyslogTemplates {
    pub info: Vec<String>,
    pub notice: Vec<String>,
    pub warning: Vec<String>,
    pub error: Vec<String>,
    pub critical: Vec<String>,
}

impl SyslogTemplates {
    pub fn for_severity(&self, severity: SyslogSeverity) -> &[String] {
        match severity {
            SyslogSeverity::Info => &self.info,
            SyslogSeverity::Notice => &self.notice,
            SyslogSeverity::Warning => &self.warning,
            SyslogSeverity::Error => &self.error,
            SyslogSeverity::Critical => &self.critical,
        }
    }
}

/// The complete set of pools shared by all generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pools {
    addresses: AddressPools,
    paths: Vec<String>,
    user_agents: Vec<String>,
    privileged_users: Vec<String>,
    syslog_users: Vec<String>,
    probed_paths: Vec<String>,
    syslog: SyslogTemplates,
}

/// Error type for loading a pools file.
#[derive(Debug)]
pub enum PoolsError {
    /// The file could not be read
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The file is not a valid pools document
    Parse(serde_json::Error),

    /// A pool has no entries
    Empty(&'static str),

    /// A syslog template uses a placeholder the generator cannot fill
    UnknownPlaceholder(String),
}

impl std::fmt::Display for PoolsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolsError::Io { path, source } => {
                write!(f, "Failed to read pools file {}: {}", path, source)
            }
            PoolsError::Parse(e) => write!(f, "Invalid pools document: {}", e),
            PoolsError::Empty(name) => write!(f, "Pool '{}' must not be empty", name),
            PoolsError::UnknownPlaceholder(template) => {
                write!(f, "Syslog template has an unknown placeholder: {}", template)
            }
        }
    }
}

impl std::error::Error for PoolsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolsError::Io { source, .. } => Some(source),
            PoolsError::Parse(e) => Some(e),
            PoolsError::Empty(_) | PoolsError::UnknownPlaceholder(_) => None,
        }
    }
}

/// Every `{...}` in `template` must be one of [`PLACEHOLDERS`].
fn placeholders_known(template: &str) -> bool {
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            return false;
        };
        if !PLACEHOLDERS.contains(&&rest[start..=start + len]) {
            return false;
        }
        rest = &rest[start + len + 1..];
    }
    !rest.contains('}')
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

impl Pools {
    /// The built-in pools.
    pub fn standard() -> Self {
        Self {
            addresses: AddressPools {
                us: owned(&[
                    "192.168.1.100",
                    "10.0.0.50",
                    "172.16.0.1",
                    "10.10.10.42",
                    "192.168.10.15",
                ]),
                eu: owned(&[
                    "10.20.30.40",
                    "172.20.0.100",
                    "192.168.50.25",
                    "10.100.0.5",
                    "172.30.0.1",
                ]),
                apac: owned(&[
                    "10.50.0.100",
                    "172.50.0.50",
                    "192.168.100.1",
                    "10.200.0.25",
                    "172.100.0.10",
                ]),
            },
            paths: owned(&[
                "/api/users",
                "/api/orders",
                "/api/products",
                "/api/auth/login",
                "/api/auth/logout",
                "/api/search",
                "/api/cart",
                "/api/checkout",
                "/health",
                "/metrics",
                "/static/app.js",
                "/static/style.css",
                "/static/logo.png",
                "/favicon.ico",
            ]),
            user_agents: owned(&[
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0.0.0",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Safari/605.1.15",
                "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 Mobile Chrome/120.0",
                "curl/8.4.0",
                "python-requests/2.31.0",
            ]),
            privileged_users: owned(&["admin", "api-user", "service-account"]),
            syslog_users: owned(&["root", "admin", "nobody", "www-data"]),
            probed_paths: owned(&["/admin", "/wp-admin", "/.env"]),
            syslog: SyslogTemplates {
                info: owned(&[
                    "Connection established from {ip}",
                    "User {user} logged in successfully",
                    "Service started normally",
                    "Configuration reloaded",
                    "Scheduled backup completed",
                ]),
                notice: owned(&[
                    "Disk usage at {pct}%",
                    "Memory usage at {pct}%",
                    "New device connected: {ip}",
                    "Certificate expires in {days} days",
                ]),
                warning: owned(&[
                    "High CPU usage detected: {pct}%",
                    "Connection timeout from {ip}",
                    "Rate limit reached for user {user}",
                    "Slow query detected: {ms}ms",
                ]),
                error: owned(&[
                    "Failed password for {user} from {ip}",
                    "Connection refused to database",
                    "Out of memory error",
                    "Disk write error on /dev/sda1",
                ]),
                critical: owned(&[
                    "Service crashed: pid={pid}",
                    "Kernel panic detected",
                    "Hardware failure on CPU {cpu}",
                    "Database corruption detected",
                ]),
            },
        }
    }

    /// The built-in pools behind an `Arc`, ready to hand to generators.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::standard())
    }

    /// Parse pools from a JSON document and validate them.
    pub fn from_json_str(json: &str) -> Result<Self, PoolsError> {
        let pools: Pools = serde_json::from_str(json).map_err(PoolsError::Parse)?;
        pools.validate()?;
        Ok(pools)
    }

    /// Load pools from a JSON file and validate them.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PoolsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| PoolsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check that every pool has at least one entry and that syslog
    /// templates only use placeholders the generator fills.
    pub fn validate(&self) -> Result<(), PoolsError> {
        let pools: [(&'static str, &[String]); 13] = [
            ("addresses.us", &self.addresses.us),
            ("addresses.eu", &self.addresses.eu),
            ("addresses.apac", &self.addresses.apac),
            ("paths", &self.paths),
            ("user_agents", &self.user_agents),
            ("privileged_users", &self.privileged_users),
            ("syslog_users", &self.syslog_users),
            ("probed_paths", &self.probed_paths),
            ("syslog.info", &self.syslog.info),
            ("syslog.notice", &self.syslog.notice),
            ("syslog.warning", &self.syslog.warning),
            ("syslog.error", &self.syslog.error),
            ("syslog.critical", &self.syslog.critical),
        ];

        if let Some((name, _)) = pools.iter().find(|(_, items)| items.is_empty()) {
            return Err(PoolsError::Empty(name));
        }

        let templates = SyslogSeverity::all()
            .iter()
            .flat_map(|severity| self.syslog.for_severity(*severity));
        for template in templates {
            if !placeholders_known(template) {
                return Err(PoolsError::UnknownPlaceholder(template.clone()));
            }
        }

        Ok(())
    }

    /// Addresses for a region tag. Unknown tags get the `us` pool.
    pub fn addresses(&self, region: &str) -> &[String] {
        self.addresses.for_region(Region::resolve(region))
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn user_agents(&self) -> &[String] {
        &self.user_agents
    }

    pub fn privileged_users(&self) -> &[String] {
        &self.privileged_users
    }

    pub fn syslog_users(&self) -> &[String] {
        &self.syslog_users
    }

    /// Paths scanners probe for, used in "file does not exist" errors.
    pub fn probed_paths(&self) -> &[String] {
        &self.probed_paths
    }

    pub fn syslog_templates(&self, severity: SyslogSeverity) -> &[String] {
        self.syslog.for_severity(severity)
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self::standard()
    }
}
