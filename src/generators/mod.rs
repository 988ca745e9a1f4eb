//! Event generators.
//!
//! Each generator owns its identity (host or sensor id, region tag) and, for
//! the sensor and host-metrics variants, a drifting baseline. All of them
//! implement [`EventSource`]; [`Generator`] wraps the five variants so an
//! [`EdgeNode`](crate::edge_node::EdgeNode) can hold a mixed roster.

pub mod infra_metrics;
pub mod iot_sensor;
pub mod syslog;
pub mod web_access;
pub mod web_error;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::event::Event;

pub use infra_metrics::InfraMetricsGenerator;
pub use iot_sensor::IotSensorGenerator;
pub use syslog::SyslogGenerator;
pub use web_access::WebAccessGenerator;
pub use web_error::WebErrorGenerator;

/// Region tag used when none is configured.
pub const DEFAULT_REGION: &str = "us";

/// Something that produces one event per call.
///
/// `generate_with` is the primitive and takes the randomness source, so a
/// seeded RNG makes a sequence of events reproducible. `generate` draws from
/// the thread-local RNG.
pub trait EventSource {
    /// Produce the next event using `rng`.
    fn generate_with<R: Rng>(&mut self, rng: &mut R) -> Event;

    /// Produce the next event.
    fn generate(&mut self) -> Event {
        self.generate_with(&mut rand::thread_rng())
    }
}

/// Construction options shared by all generators.
///
/// Unset values fall back to per-generator defaults.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Host name stamped on events
    pub host: Option<String>,

    /// Region tag selecting the address pool
    pub region: Option<String>,

    /// Sensor identifier (IoT sensors only)
    pub sensor_id: Option<String>,

    /// Physical location (IoT sensors only)
    pub location: Option<String>,
}

impl GeneratorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn sensor_id(mut self, sensor_id: impl Into<String>) -> Self {
        self.sensor_id = Some(sensor_id.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub(crate) fn host_or(&self, default: &str) -> String {
        self.host.clone().unwrap_or_else(|| default.to_string())
    }

    pub(crate) fn region_or_default(&self) -> String {
        self.region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }
}

/// Generator variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    WebAccess,
    WebError,
    Syslog,
    IotSensor,
    InfraMetrics,
}

impl GeneratorKind {
    /// Get the variant name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            GeneratorKind::WebAccess => "web_access",
            GeneratorKind::WebError => "web_error",
            GeneratorKind::Syslog => "syslog",
            GeneratorKind::IotSensor => "iot_sensor",
            GeneratorKind::InfraMetrics => "infra_metrics",
        }
    }

    /// Get the sourcetype the variant stamps on its events.
    pub fn sourcetype(&self) -> &'static str {
        match self {
            GeneratorKind::WebAccess => web_access::SOURCETYPE,
            GeneratorKind::WebError => web_error::SOURCETYPE,
            GeneratorKind::Syslog => syslog::SOURCETYPE,
            GeneratorKind::IotSensor => iot_sensor::SOURCETYPE,
            GeneratorKind::InfraMetrics => infra_metrics::SOURCETYPE,
        }
    }
}

impl std::fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Any one of the five generators.
#[derive(Debug, Clone)]
pub enum Generator {
    WebAccess(WebAccessGenerator),
    WebError(WebErrorGenerator),
    Syslog(SyslogGenerator),
    IotSensor(IotSensorGenerator),
    InfraMetrics(InfraMetricsGenerator),
}

impl Generator {
    pub fn kind(&self) -> GeneratorKind {
        match self {
            Generator::WebAccess(_) => GeneratorKind::WebAccess,
            Generator::WebError(_) => GeneratorKind::WebError,
            Generator::Syslog(_) => GeneratorKind::Syslog,
            Generator::IotSensor(_) => GeneratorKind::IotSensor,
            Generator::InfraMetrics(_) => GeneratorKind::InfraMetrics,
        }
    }
}

impl EventSource for Generator {
    fn generate_with<R: Rng>(&mut self, rng: &mut R) -> Event {
        match self {
            Generator::WebAccess(generator) => generator.generate_with(rng),
            Generator::WebError(generator) => generator.generate_with(rng),
            Generator::Syslog(generator) => generator.generate_with(rng),
            Generator::IotSensor(generator) => generator.generate_with(rng),
            Generator::InfraMetrics(generator) => generator.generate_with(rng),
        }
    }
}

impl From<WebAccessGenerator> for Generator {
    fn from(generator: WebAccessGenerator) -> Self {
        Generator::WebAccess(generator)
    }
}

impl From<WebErrorGenerator> for Generator {
    fn from(generator: WebErrorGenerator) -> Self {
        Generator::WebError(generator)
    }
}

impl From<SyslogGenerator> for Generator {
    fn from(generator: SyslogGenerator) -> Self {
        Generator::Syslog(generator)
    }
}

impl From<IotSensorGenerator> for Generator {
    fn from(generator: IotSensorGenerator) -> Self {
        Generator::IotSensor(generator)
    }
}

impl From<InfraMetricsGenerator> for Generator {
    fn from(generator: InfraMetricsGenerator) -> Self {
        Generator::InfraMetrics(generator)
    }
}

/// Pick one entry of a pool. Pools are validated non-empty.
pub(crate) fn pick<'a, R: Rng>(rng: &mut R, items: &'a [String]) -> &'a str {
    items.choose(rng).map(String::as_str).unwrap_or_default()
}

/// Pick one entry of a fixed table.
pub(crate) fn pick_copy<T: Copy, R: Rng>(rng: &mut R, items: &[T], fallback: T) -> T {
    items.choose(rng).copied().unwrap_or(fallback)
}

/// Serialize a structured payload once, returning the raw JSON text and the
/// same payload as a field map.
pub(crate) fn render_payload<T: Serialize>(payload: &T) -> (String, Map<String, Value>) {
    match serde_json::to_value(payload) {
        Ok(Value::Object(fields)) => {
            let raw = Value::Object(fields.clone()).to_string();
            (raw, fields)
        }
        Ok(other) => (other.to_string(), Map::new()),
        Err(e) => {
            warn!(error = %e, "Failed to serialize event payload");
            ("{}".to_string(), Map::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::Pools;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_options_builder() {
        let options = GeneratorOptions::new()
            .host("edge-07")
            .region("eu")
            .sensor_id("edge-07-sensor")
            .location("dock-3");

        assert_eq!(options.host_or("web-01"), "edge-07");
        assert_eq!(options.region_or_default(), "eu");
        assert_eq!(options.sensor_id.as_deref(), Some("edge-07-sensor"));
        assert_eq!(options.location.as_deref(), Some("dock-3"));
    }

    #[test]
    fn test_options_defaults() {
        let options = GeneratorOptions::default();
        assert_eq!(options.host_or("server-01"), "server-01");
        assert_eq!(options.region_or_default(), DEFAULT_REGION);
    }

    #[test]
    fn test_generator_dispatch_matches_kind() {
        let pools = Pools::shared();
        let mut rng = StdRng::seed_from_u64(11);
        let options = GeneratorOptions::new().host("edge-01");

        let mut generators: Vec<Generator> = vec![
            WebAccessGenerator::new(&options, pools.clone()).into(),
            WebErrorGenerator::new(&options, pools.clone()).into(),
            SyslogGenerator::new(&options, pools.clone()).into(),
            IotSensorGenerator::new(&options, &mut rng).into(),
            InfraMetricsGenerator::new(&options, &mut rng).into(),
        ];

        for generator in generators.iter_mut() {
            let event = generator.generate_with(&mut rng);
            assert_eq!(event.sourcetype, generator.kind().sourcetype());
            assert!(!event.raw.is_empty());
        }
    }

    #[test]
    fn test_generate_uses_thread_rng() {
        let mut generator =
            Generator::from(WebErrorGenerator::new(&GeneratorOptions::new(), Pools::shared()));
        let event = generator.generate();
        assert_eq!(event.sourcetype, "apache_error");
    }

    #[test]
    fn test_pick_from_pool() {
        let mut rng = StdRng::seed_from_u64(3);
        let items = vec!["a".to_string(), "b".to_string()];
        for _ in 0..20 {
            assert!(["a", "b"].contains(&pick(&mut rng, &items)));
        }
        assert_eq!(pick(&mut rng, &[]), "");
        assert_eq!(pick_copy(&mut rng, &[] as &[u16], 7), 7);
    }

    #[test]
    fn test_render_payload_is_stable() {
        #[derive(Serialize)]
        struct Payload {
            b: f64,
            a: u32,
        }

        let payload = Payload { b: 12.3, a: 4 };
        let (raw, fields) = render_payload(&payload);
        let (again, _) = render_payload(&payload);

        assert_eq!(raw, r#"{"b":12.3,"a":4}"#);
        assert_eq!(raw, again);
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
