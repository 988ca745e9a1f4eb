//! Host metrics in the shape a collectd agent would ship.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{render_payload, EventSource, GeneratorOptions};
use crate::event::Event;
use crate::format::{format_iso8601, round1};

pub const SOURCETYPE: &str = "metrics:host";
const SOURCE: &str = "collectd";
const INDEX: &str = "metrics";
const DEFAULT_HOST: &str = "server-01";

pub const CPU_MIN_PCT: f64 = 5.0;
pub const CPU_MAX_PCT: f64 = 95.0;
pub const CPU_STEP_PCT: f64 = 10.0;

pub const MEMORY_MIN_MB: f64 = 1000.0;
pub const MEMORY_MAX_MB: f64 = 7500.0;
pub const MEMORY_STEP_MB: f64 = 250.0;

const MEMORY_TOTAL_MB: u32 = 8192;
const CORES: u32 = 8;

/// User and system share of busy CPU time.
const USER_SHARE: f64 = 0.7;
const SYSTEM_SHARE: f64 = 0.3;

/// Chance that a sample reports network errors.
const NETWORK_ERROR_PROBABILITY: f64 = 0.05;

/// Drifting state of one host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostBaseline {
    pub cpu_pct: f64,
    pub memory_used_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub usage_pct: f64,
    pub user_pct: f64,
    pub system_pct: f64,
    pub iowait_pct: f64,
    pub cores: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub used_mb: u32,
    pub total_mb: u32,
    pub cached_mb: u32,
    pub buffers_mb: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub read_iops: u32,
    pub write_iops: u32,
    pub read_mbps: f64,
    pub write_mbps: f64,
    pub usage_pct: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub rx_mbps: f64,
    pub tx_mbps: f64,
    pub rx_packets: u32,
    pub tx_packets: u32,
    pub errors: u32,
}

/// One host sample. Serialized as the event's raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostPayload {
    pub timestamp: String,
    pub host: String,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: DiskMetrics,
    pub network: NetworkMetrics,
}

/// Generates host metric events.
///
/// CPU and memory drift from a baseline drawn at construction, clamped to
/// `[5, 95]` % and `[1000, 7500]` MB. The user/system split is a fixed
/// 70/30 share of the drifted CPU value. Disk and network figures are
/// sampled independently every call.
#[derive(Debug, Clone)]
pub struct InfraMetricsGenerator {
    host: String,
    region: String,
    baseline: HostBaseline,
}

impl InfraMetricsGenerator {
    /// Create a host, drawing its initial baseline from `rng`.
    pub fn new<R: Rng>(options: &GeneratorOptions, rng: &mut R) -> Self {
        Self {
            host: options.host_or(DEFAULT_HOST),
            region: options.region_or_default(),
            baseline: HostBaseline {
                cpu_pct: rng.gen_range(20.0..50.0),
                memory_used_mb: rng.gen_range(2000.0..6000.0),
            },
        }
    }

    /// Replace the current baseline, clamped to the allowed ranges.
    pub fn with_baseline(mut self, baseline: HostBaseline) -> Self {
        self.baseline = HostBaseline {
            cpu_pct: baseline.cpu_pct.clamp(CPU_MIN_PCT, CPU_MAX_PCT),
            memory_used_mb: baseline.memory_used_mb.clamp(MEMORY_MIN_MB, MEMORY_MAX_MB),
        };
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn baseline(&self) -> HostBaseline {
        self.baseline
    }

    fn drift<R: Rng>(&mut self, rng: &mut R) {
        self.baseline.cpu_pct = (self.baseline.cpu_pct + rng.gen_range(-CPU_STEP_PCT..CPU_STEP_PCT))
            .clamp(CPU_MIN_PCT, CPU_MAX_PCT);
        self.baseline.memory_used_mb = (self.baseline.memory_used_mb
            + rng.gen_range(-MEMORY_STEP_MB..MEMORY_STEP_MB))
        .clamp(MEMORY_MIN_MB, MEMORY_MAX_MB);
    }

    /// Advance the drift and take one sample.
    pub fn sample<R: Rng>(&mut self, rng: &mut R, now: &DateTime<Utc>) -> HostPayload {
        self.drift(rng);
        let cpu = self.baseline.cpu_pct;

        HostPayload {
            timestamp: format_iso8601(now),
            host: self.host.clone(),
            cpu: CpuMetrics {
                usage_pct: round1(cpu),
                user_pct: round1(cpu * USER_SHARE),
                system_pct: round1(cpu * SYSTEM_SHARE),
                iowait_pct: round1(rng.gen_range(0.0..10.0)),
                cores: CORES,
            },
            memory: MemoryMetrics {
                used_mb: self.baseline.memory_used_mb.round() as u32,
                total_mb: MEMORY_TOTAL_MB,
                cached_mb: rng.gen_range(500..=2000),
                buffers_mb: rng.gen_range(100..=500),
            },
            disk: DiskMetrics {
                read_iops: rng.gen_range(50..=500),
                write_iops: rng.gen_range(20..=200),
                read_mbps: round1(rng.gen_range(0.0..100.0)),
                write_mbps: round1(rng.gen_range(0.0..50.0)),
                usage_pct: rng.gen_range(30..=80),
            },
            network: NetworkMetrics {
                rx_mbps: round1(rng.gen_range(0.0..100.0)),
                tx_mbps: round1(rng.gen_range(0.0..50.0)),
                rx_packets: rng.gen_range(10_000..=100_000),
                tx_packets: rng.gen_range(5_000..=50_000),
                errors: if rng.gen_bool(NETWORK_ERROR_PROBABILITY) {
                    rng.gen_range(1..=10)
                } else {
                    0
                },
            },
        }
    }
}

impl EventSource for InfraMetricsGenerator {
    fn generate_with<R: Rng>(&mut self, rng: &mut R) -> Event {
        let now = Utc::now();
        let payload = self.sample(rng, &now);
        let (raw, fields) = render_payload(&payload);

        // The payload's `host` is the envelope host and is not repeated as a field.
        Event::new(now, raw, self.host.as_str(), SOURCE, SOURCETYPE, INDEX)
            .with_fields(fields)
            .with_field("region", self.region.as_str())
    }
}
