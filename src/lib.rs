//! Edge Telemetry Library
//!
//! Synthetic telemetry for edge deployments: five event generators, a
//! weighted multiplexer standing in for one edge node, and the plumbing to
//! ship the resulting events to a Splunk HTTP Event Collector.
//!
//! - **event**: The event record (`_time`, `_raw`, envelope, extracted fields)
//! - **pools**: Static value pools (addresses per region, paths, syslog templates)
//! - **generators**: Web access, web error, syslog, IoT sensor and host metrics
//! - **edge_node**: Weighted generator mix with per-node counters
//! - **hec**: HEC wire format
//! - **buffer**: Async batching with size and time-based flush triggers
//! - **client**: HEC client with connection pooling and retry logic
//! - **sink**: Batch destinations (stdout or HEC)
//! - **config**: Environment-based configuration for the simulator binary
//!
//! # Example
//!
//! ```
//! use edge_telemetry::edge_node::{EdgeNode, NodeOptions, NodeType};
//! use edge_telemetry::pools::Pools;
//!
//! let options = NodeOptions::new("edge-01").region("eu").node_type(NodeType::Web);
//! let mut node = EdgeNode::with_seed(options, Pools::shared(), 42);
//!
//! let event = node.generate();
//! assert_eq!(event.field_str("node_id"), Some("edge-01"));
//! assert_eq!(node.stats().event_count, 1);
//! ```

pub mod buffer;
pub mod client;
pub mod config;
pub mod edge_node;
pub mod event;
pub mod format;
pub mod generators;
pub mod hec;
pub mod pools;
pub mod sink;

// Re-export commonly used types at crate root for convenience
pub use buffer::{BufferConfig, BufferError, BufferSender, BufferStats, EventBuffer};
pub use client::{ClientError, ClientStats, HecClient};
pub use config::{Config, ConfigError, SinkKind};
pub use edge_node::{EdgeNode, NodeOptions, NodeStats, NodeType, RosterEntry, RosterError};
pub use event::{Event, EventBatch};
pub use generators::{
    EventSource, Generator, GeneratorKind, GeneratorOptions, InfraMetricsGenerator,
    IotSensorGenerator, SyslogGenerator, WebAccessGenerator, WebErrorGenerator,
};
pub use hec::{HecBatch, HecEvent, HecResponse};
pub use pools::{Pools, PoolsError, Region};
pub use sink::Sink;
