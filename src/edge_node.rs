//! Edge node: a weighted mix of generators standing in for one deployment.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::event::Event;
use crate::generators::{
    EventSource, Generator, GeneratorOptions, InfraMetricsGenerator, IotSensorGenerator,
    SyslogGenerator, WebAccessGenerator, WebErrorGenerator, DEFAULT_REGION,
};
use crate::pools::Pools;

/// Node id used when none is configured.
pub const DEFAULT_NODE_ID: &str = "edge-01";

/// Status every node starts with.
pub const DEFAULT_STATUS: &str = "healthy";

/// Allowed deviation of a custom roster's weight sum from 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Which generator mix a node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Access 85 %, error 15 %
    Web,
    /// Two independent sensors, 50 % each
    Iot,
    /// Host metrics 40 %, syslog 60 %
    Infra,
    /// Access 40 %, error 10 %, syslog 25 %, sensor 10 %, host metrics 15 %
    #[default]
    Mixed,
}

impl NodeType {
    pub fn all() -> &'static [NodeType] {
        &[NodeType::Web, NodeType::Iot, NodeType::Infra, NodeType::Mixed]
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Web => "web",
            NodeType::Iot => "iot",
            NodeType::Infra => "infra",
            NodeType::Mixed => "mixed",
        }
    }

    /// Look up a node type by tag, ignoring ASCII case.
    pub fn from_tag(tag: &str) -> Option<NodeType> {
        NodeType::all()
            .iter()
            .copied()
            .find(|node_type| node_type.name().eq_ignore_ascii_case(tag))
    }

    /// Resolve a tag, treating unknown tags as `mixed`.
    pub fn resolve(tag: &str) -> NodeType {
        NodeType::from_tag(tag).unwrap_or_default()
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of an edge node.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub node_id: String,
    pub region: String,
    pub node_type: NodeType,
}

impl NodeOptions {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Self::default()
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = node_type;
        self
    }
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            node_id: DEFAULT_NODE_ID.to_string(),
            region: DEFAULT_REGION.to_string(),
            node_type: NodeType::default(),
        }
    }
}

/// One generator in a roster and its share of the traffic.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub generator: Generator,
    pub weight: f64,
}

impl RosterEntry {
    pub fn new(generator: impl Into<Generator>, weight: f64) -> Self {
        Self {
            generator: generator.into(),
            weight,
        }
    }
}

/// Errors for a rejected custom roster.
#[derive(Debug, Clone, PartialEq)]
pub enum RosterError {
    /// The roster has no generators
    Empty,

    /// A weight is negative, NaN or infinite
    InvalidWeight { index: usize, weight: f64 },

    /// The weights do not add up to 1.0
    WeightSum(f64),
}

impl std::fmt::Display for RosterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterError::Empty => write!(f, "Roster must contain at least one generator"),
            RosterError::InvalidWeight { index, weight } => {
                write!(f, "Roster entry {} has invalid weight {}", index, weight)
            }
            RosterError::WeightSum(sum) => {
                write!(f, "Roster weights sum to {} instead of 1.0", sum)
            }
        }
    }
}

impl std::error::Error for RosterError {}

fn validate_roster(roster: &[RosterEntry]) -> Result<(), RosterError> {
    if roster.is_empty() {
        return Err(RosterError::Empty);
    }

    for (index, entry) in roster.iter().enumerate() {
        if !entry.weight.is_finite() || entry.weight < 0.0 {
            return Err(RosterError::InvalidWeight {
                index,
                weight: entry.weight,
            });
        }
    }

    let sum: f64 = roster.iter().map(|entry| entry.weight).sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(RosterError::WeightSum(sum));
    }

    Ok(())
}

/// Weighted choice by cumulative walk.
///
/// Returns the first index whose cumulative weight reaches `draw`, or `None`
/// when the weights run out first.
pub fn select_index(weights: impl IntoIterator<Item = f64>, draw: f64) -> Option<usize> {
    let mut cumulative = 0.0;
    for (index, weight) in weights.into_iter().enumerate() {
        cumulative += weight;
        if draw <= cumulative {
            return Some(index);
        }
    }
    None
}

/// Point-in-time view of a node's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    pub node_id: String,
    pub region: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub status: String,
    pub event_count: u64,
    pub bytes_generated: u64,
}

/// A simulated deployment node.
///
/// The node owns its generators and its random source. It is not shared
/// between threads; run one node per task.
#[derive(Debug, Clone)]
pub struct EdgeNode {
    node_id: String,
    region: String,
    node_type: NodeType,
    status: String,
    roster: Vec<RosterEntry>,
    event_count: u64,
    bytes_generated: u64,
    rng: StdRng,
}

impl EdgeNode {
    /// Create a node with the roster of its type, seeded from OS entropy.
    pub fn new(options: NodeOptions, pools: Arc<Pools>) -> Self {
        Self::with_rng(options, pools, StdRng::from_entropy())
    }

    /// Create a node whose whole event sequence is determined by `seed`.
    pub fn with_seed(options: NodeOptions, pools: Arc<Pools>, seed: u64) -> Self {
        Self::with_rng(options, pools, StdRng::seed_from_u64(seed))
    }

    /// Create a node with the roster of its type, drawing from `rng`.
    pub fn with_rng(options: NodeOptions, pools: Arc<Pools>, mut rng: StdRng) -> Self {
        let roster = build_roster(&options, pools, &mut rng);
        Self::assemble(options, roster, rng)
    }

    /// Create a node from a custom roster.
    ///
    /// The roster must be non-empty, with finite non-negative weights that
    /// sum to 1.0.
    ///
    /// `options.node_type` only labels the node: it is reported in
    /// [`NodeStats`] as given and does not pick or check the roster.
    pub fn with_roster(
        options: NodeOptions,
        roster: Vec<RosterEntry>,
        rng: StdRng,
    ) -> Result<Self, RosterError> {
        validate_roster(&roster)?;
        Ok(Self::assemble(options, roster, rng))
    }

    fn assemble(options: NodeOptions, roster: Vec<RosterEntry>, rng: StdRng) -> Self {
        Self {
            node_id: options.node_id,
            region: options.region,
            node_type: options.node_type,
            status: DEFAULT_STATUS.to_string(),
            roster,
            event_count: 0,
            bytes_generated: 0,
            rng,
        }
    }

    /// Produce the next event from a weighted pick of the roster.
    ///
    /// The event is tagged with `node_id` and counted. If the draw falls past
    /// the last cumulative weight the first generator is used.
    pub fn generate(&mut self) -> Event {
        let draw: f64 = self.rng.gen();
        let index = match select_index(self.roster.iter().map(|entry| entry.weight), draw) {
            Some(index) => index,
            None => {
                trace!(node_id = %self.node_id, draw = draw, "Draw past roster weights, using first generator");
                0
            }
        };

        let mut event = self.roster[index].generator.generate_with(&mut self.rng);
        event.insert_field("node_id", self.node_id.as_str());

        self.event_count += 1;
        self.bytes_generated += event.raw_len() as u64;

        event
    }

    /// Produce `count` events.
    pub fn generate_batch(&mut self, count: usize) -> Vec<Event> {
        (0..count).map(|_| self.generate()).collect()
    }

    /// Snapshot of identity and counters.
    pub fn stats(&self) -> NodeStats {
        NodeStats {
            node_id: self.node_id.clone(),
            region: self.region.clone(),
            node_type: self.node_type,
            status: self.status.clone(),
            event_count: self.event_count,
            bytes_generated: self.bytes_generated,
        }
    }

    /// Zero the counters. Generator drift and status are kept.
    pub fn reset(&mut self) {
        debug!(
            node_id = %self.node_id,
            event_count = self.event_count,
            bytes_generated = self.bytes_generated,
            "Resetting node counters"
        );
        self.event_count = 0;
        self.bytes_generated = 0;
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Mark the node, e.g. `degraded`. The node never changes this itself.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn bytes_generated(&self) -> u64 {
        self.bytes_generated
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }
}

/// Build the standard roster for a node type.
fn build_roster<R: Rng>(options: &NodeOptions, pools: Arc<Pools>, rng: &mut R) -> Vec<RosterEntry> {
    let node_id = options.node_id.as_str();
    let common = GeneratorOptions::new()
        .host(node_id)
        .region(options.region.as_str());
    let sensor = |suffix: &str| common.clone().sensor_id(format!("{}-{}", node_id, suffix));

    match options.node_type {
        NodeType::Web => vec![
            RosterEntry::new(WebAccessGenerator::new(&common, pools.clone()), 0.85),
            RosterEntry::new(WebErrorGenerator::new(&common, pools), 0.15),
        ],
        NodeType::Iot => vec![
            RosterEntry::new(IotSensorGenerator::new(&sensor("sensor-1"), rng), 0.5),
            RosterEntry::new(IotSensorGenerator::new(&sensor("sensor-2"), rng), 0.5),
        ],
        NodeType::Infra => vec![
            RosterEntry::new(InfraMetricsGenerator::new(&common, rng), 0.4),
            RosterEntry::new(SyslogGenerator::new(&common, pools), 0.6),
        ],
        NodeType::Mixed => vec![
            RosterEntry::new(WebAccessGenerator::new(&common, pools.clone()), 0.4),
            RosterEntry::new(WebErrorGenerator::new(&common, pools.clone()), 0.1),
            RosterEntry::new(SyslogGenerator::new(&common, pools), 0.25),
            RosterEntry::new(IotSensorGenerator::new(&sensor("sensor"), rng), 0.1),
            RosterEntry::new(InfraMetricsGenerator::new(&common, rng), 0.15),
        ],
    }
}
