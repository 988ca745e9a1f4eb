//! RFC 3164 style syslog lines filled from per-severity templates.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{pick, pick_copy, EventSource, GeneratorOptions};
use crate::event::Event;
use crate::format::format_apache_timestamp;
use crate::pools::Pools;

pub const SOURCETYPE: &str = "syslog";
const SOURCE: &str = "/var/log/messages";
const INDEX: &str = "os";
const DEFAULT_HOST: &str = "server-01";

/// Placeholders a syslog template may contain.
pub const PLACEHOLDERS: &[&str] = &["{ip}", "{user}", "{pct}", "{days}", "{ms}", "{pid}", "{cpu}"];

/// Base severity mix: mostly informational.
const BASE_SEVERITIES: [SyslogSeverity; 6] = [
    SyslogSeverity::Info,
    SyslogSeverity::Info,
    SyslogSeverity::Info,
    SyslogSeverity::Notice,
    SyslogSeverity::Warning,
    SyslogSeverity::Error,
];

/// Chance that an event escalates to critical regardless of the base draw.
const CRITICAL_PROBABILITY: f64 = 0.05;

/// Syslog facilities the generator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facility {
    Kern,
    User,
    Daemon,
    Auth,
    Syslog,
    Cron,
}

impl Facility {
    pub fn all() -> &'static [Facility] {
        &[
            Facility::Kern,
            Facility::User,
            Facility::Daemon,
            Facility::Auth,
            Facility::Syslog,
            Facility::Cron,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Facility::Kern => "kern",
            Facility::User => "user",
            Facility::Daemon => "daemon",
            Facility::Auth => "auth",
            Facility::Syslog => "syslog",
            Facility::Cron => "cron",
        }
    }

    /// Numeric facility code.
    pub fn code(&self) -> u8 {
        match self {
            Facility::Kern => 0,
            Facility::User => 1,
            Facility::Daemon => 3,
            Facility::Auth => 4,
            Facility::Syslog => 5,
            Facility::Cron => 9,
        }
    }
}

/// Syslog severities with a template pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyslogSeverity {
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl SyslogSeverity {
    pub fn all() -> &'static [SyslogSeverity] {
        &[
            SyslogSeverity::Info,
            SyslogSeverity::Notice,
            SyslogSeverity::Warning,
            SyslogSeverity::Error,
            SyslogSeverity::Critical,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            SyslogSeverity::Info => "info",
            SyslogSeverity::Notice => "notice",
            SyslogSeverity::Warning => "warning",
            SyslogSeverity::Error => "error",
            SyslogSeverity::Critical => "critical",
        }
    }

    /// Numeric severity code.
    pub fn code(&self) -> u8 {
        match self {
            SyslogSeverity::Critical => 2,
            SyslogSeverity::Error => 3,
            SyslogSeverity::Warning => 4,
            SyslogSeverity::Notice => 5,
            SyslogSeverity::Info => 6,
        }
    }
}

impl std::fmt::Display for SyslogSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// PRI value of a syslog header.
pub fn priority(facility: Facility, severity: SyslogSeverity) -> u8 {
    facility.code() * 8 + severity.code()
}

/// Generates operating system syslog events.
#[derive(Debug, Clone)]
pub struct SyslogGenerator {
    host: String,
    region: String,
    pools: Arc<Pools>,
}

impl SyslogGenerator {
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

    fn pick_severity<R: Rng>(rng: &mut R) -> SyslogSeverity {
        let base = pick_copy(rng, &BASE_SEVERITIES, SyslogSeverity::Info);
        if rng.gen_bool(CRITICAL_PROBABILITY) {
            SyslogSeverity::Critical
        } else {
            base
        }
    }

    /// Replace every placeholder in `template` with a random value.
    pub fn fill_template<R: Rng>(&self, rng: &mut R, template: &str) -> String {
        let ip = pick(rng, self.pools.addresses(&self.region));
        let user = pick(rng, self.pools.syslog_users());

        template
            .replace("{ip}", ip)
            .replace("{user}", user)
            .replace("{pct}", &rng.gen_range(60..=99u32).to_string())
            .replace("{days}", &rng.gen_range(7..=90u32).to_string())
            .replace("{ms}", &rng.gen_range(1_000..=30_000u32).to_string())
            .replace("{pid}", &rng.gen_range(1_000..=65_535u32).to_string())
            .replace("{cpu}", &rng.gen_range(0..=7u32).to_string())
    }
}

impl EventSource for SyslogGenerator {
    fn generate_with<R: Rng>(&mut self, rng: &mut R) -> Event {
        let now = Utc::now();

        let facility = pick_copy(rng, Facility::all(), Facility::Syslog);
        let severity = Self::pick_severity(rng);
        let template = pick(rng, self.pools.syslog_templates(severity));
        let message = self.fill_template(rng, template);
        let pid: u32 = rng.gen_range(1000..=9999);

        let raw = format!(
            "<{}>{} {} {}[{}]: {}",
            priority(facility, severity),
            format_apache_timestamp(&now),
            self.host,
            facility.name(),
            pid,
            message
        );

        Event::new(now, raw, self.host.as_str(), SOURCE, SOURCETYPE, INDEX)
            .with_field("facility", facility.name())
            .with_field("severity", severity.name())
            .with_field("message", message)
            .with_field("region", self.region.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generator() -> SyslogGenerator {
        SyslogGenerator::new(&GeneratorOptions::new().host("edge-03"), Pools::shared())
    }

    #[test]
    fn test_envelope() {
        let mut rng = StdRng::seed_from_u64(1);
        let event = generator().generate_with(&mut rng);

        assert_eq!(event.host, "edge-03");
        assert_eq!(event.source, "/var/log/messages");
        assert_eq!(event.sourcetype, "syslog");
        assert_eq!(event.index, "os");
    }

    #[test]
    fn test_default_host() {
        let generator = SyslogGenerator::new(&GeneratorOptions::default(), Pools::shared());
        assert_eq!(generator.host(), "server-01");
    }

    #[test]
    fn test_every_template_is_fully_filled() {
        let pools = Pools::standard();
        let generator = generator();
        let mut rng = StdRng::seed_from_u64(2);

        for severity in SyslogSeverity::all() {
            for template in pools.syslog_templates(*severity) {
                for _ in 0..10 {
                    let message = generator.fill_template(&mut rng, template);
                    assert!(!message.contains('{'), "unfilled: {}", message);
                    assert!(!message.contains('}'), "unfilled: {}", message);
                }
            }
        }
    }

    #[test]
    fn test_generated_messages_have_no_placeholders() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut generator = generator();

        for _ in 0..1_000 {
            let event = generator.generate_with(&mut rng);
            let message = event.field_str("message").unwrap();
            for placeholder in PLACEHOLDERS {
                assert!(!message.contains(placeholder));
            }
            assert!(event.raw.ends_with(message));
        }
    }

    #[test]
    fn test_message_matches_severity_pool() {
        let pools = Pools::standard();
        let mut rng = StdRng::seed_from_u64(4);
        let mut generator = generator();

        for _ in 0..500 {
            let event = generator.generate_with(&mut rng);
            let name = event.field_str("severity").unwrap();
            let severity = *SyslogSeverity::all()
                .iter()
                .find(|s| s.name() == name)
                .unwrap();
            let message = event.field_str("message").unwrap();

            let matches_pool = pools.syslog_templates(severity).iter().any(|template| {
                let literal = template.split('{').next().unwrap_or_default();
                message.starts_with(literal)
            });
            assert!(matches_pool, "{} not from {} pool", message, name);
        }
    }

    #[test]
    fn test_severity_mix_mostly_info_with_rare_critical() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut generator = generator();
        let mut info = 0;
        let mut critical = 0;

        for _ in 0..4_000 {
            let event = generator.generate_with(&mut rng);
            match event.field_str("severity").unwrap() {
                "info" => info += 1,
                "critical" => critical += 1,
                _ => {}
            }
        }

        // Expected: info ~ 0.5 * 0.95, critical ~ 0.05
        assert!(info > 1_700 && info < 2_100, "info = {}", info);
        assert!(critical > 120 && critical < 300, "critical = {}", critical);
    }

    #[test]
    fn test_priority_header() {
        assert_eq!(priority(Facility::Kern, SyslogSeverity::Critical), 2);
        assert_eq!(priority(Facility::Auth, SyslogSeverity::Error), 35);
        assert_eq!(priority(Facility::Cron, SyslogSeverity::Info), 78);

        let mut rng = StdRng::seed_from_u64(6);
        let mut generator = generator();
        for _ in 0..100 {
            let event = generator.generate_with(&mut rng);
            let facility = event.field_str("facility").unwrap();
            let pri: u8 = event.raw[1..event.raw.find('>').unwrap()].parse().unwrap();
            assert!(pri <= 191);
            assert!(event.raw.contains(&format!(" edge-03 {}[", facility)));
        }
    }
}
