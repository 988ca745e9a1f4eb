//! Environmental sensor readings with drifting temperature and humidity.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{render_payload, EventSource, GeneratorOptions};
use crate::event::Event;
use crate::format::{format_iso8601, round1};

pub const SOURCETYPE: &str = "iot:sensor";
const SOURCE: &str = "iot-gateway";
const INDEX: &str = "metrics";
const DEFAULT_LOCATION: &str = "warehouse-a";

/// Largest temperature change per reading, in either direction.
pub const TEMPERATURE_STEP_C: f64 = 1.0;

/// Largest humidity change per reading, in either direction.
pub const HUMIDITY_STEP_PCT: f64 = 2.5;

/// Drifting state of one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorBaseline {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

/// Readings block of a sensor payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReadings {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub co2_ppm: u32,
    pub light_lux: u32,
}

/// What a sensor reports for one reading. Serialized as the event's raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPayload {
    pub sensor_id: String,
    pub timestamp: String,
    pub readings: SensorReadings,
    pub battery_pct: u32,
    pub signal_strength_dbm: i32,
    pub location: String,
}

/// Generates IoT sensor events.
///
/// Temperature and humidity follow a bounded random walk from a baseline
/// drawn at construction: temperature moves by at most
/// [`TEMPERATURE_STEP_C`] per reading and is unbounded, humidity moves by at
/// most [`HUMIDITY_STEP_PCT`] and is clamped to `[0, 100]`. The other
/// readings are sampled independently every call.
#[derive(Debug, Clone)]
pub struct IotSensorGenerator {
    sensor_id: String,
    location: String,
    region: String,
    baseline: SensorBaseline,
}

impl IotSensorGenerator {
    /// Create a sensor, drawing its initial baseline from `rng`.
    ///
    /// Without a configured sensor id the sensor is named `sensor-N` with a
    /// random N in 1..=100.
    pub fn new<R: Rng>(options: &GeneratorOptions, rng: &mut R) -> Self {
        let sensor_id = match &options.sensor_id {
            Some(id) => id.clone(),
            None => format!("sensor-{}", rng.gen_range(1..=100)),
        };

        Self {
            sensor_id,
            location: options
                .location
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            region: options.region_or_default(),
            baseline: SensorBaseline {
                temperature_c: rng.gen_range(20.0..30.0),
                humidity_pct: rng.gen_range(40.0..60.0),
            },
        }
    }

    /// Replace the current baseline. Humidity is clamped to `[0, 100]`.
    pub fn with_baseline(mut self, baseline: SensorBaseline) -> Self {
        self.baseline = SensorBaseline {
            temperature_c: baseline.temperature_c,
            humidity_pct: baseline.humidity_pct.clamp(0.0, 100.0),
        };
        self
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn baseline(&self) -> SensorBaseline {
        self.baseline
    }

    fn drift<R: Rng>(&mut self, rng: &mut R) {
        self.baseline.temperature_c += rng.gen_range(-TEMPERATURE_STEP_C..TEMPERATURE_STEP_C);
        self.baseline.humidity_pct = (self.baseline.humidity_pct
            + rng.gen_range(-HUMIDITY_STEP_PCT..HUMIDITY_STEP_PCT))
        .clamp(0.0, 100.0);
    }

    /// Advance the drift and take one reading.
    pub fn read<R: Rng>(&mut self, rng: &mut R, now: &DateTime<Utc>) -> SensorPayload {
        self.drift(rng);

        SensorPayload {
            sensor_id: self.sensor_id.clone(),
            timestamp: format_iso8601(now),
            readings: SensorReadings {
                temperature_c: round1(self.baseline.temperature_c),
                humidity_pct: round1(self.baseline.humidity_pct),
                pressure_hpa: round1(1013.0 + rng.gen_range(-25.0..25.0)),
                co2_ppm: rng.gen_range(400..=1200),
                light_lux: rng.gen_range(100..=10_000),
            },
            battery_pct: rng.gen_range(20..=100),
            signal_strength_dbm: -rng.gen_range(40..=90),
            location: self.location.clone(),
        }
    }
}

impl EventSource for IotSensorGenerator {
    fn generate_with<R: Rng>(&mut self, rng: &mut R) -> Event {
        let now = Utc::now();
        let payload = self.read(rng, &now);
        let (raw, fields) = render_payload(&payload);

        Event::new(now, raw, self.sensor_id.as_str(), SOURCE, SOURCETYPE, INDEX)
            .with_fields(fields)
            .with_field("region", self.region.as_str())
    }
}
