//! Edge Telemetry - synthetic event streams from a fleet of simulated edge nodes
//!
//! Each node runs in its own task and emits a weighted mix of web access,
//! web error, syslog, IoT sensor and host metric events at a fixed rate.
//! Events from all nodes are buffered into batches and either printed as
//! JSON lines or shipped to a Splunk HTTP Event Collector.
//!
//! ## Configuration
//!
//! Configuration is loaded from `EDGE_TELEMETRY_*` environment variables;
//! see [`edge_telemetry::config::Config`]. `RUST_LOG` sets the log filter
//! (default: info). Logs go to stderr so stdout carries only events.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use edge_telemetry::buffer::{buffer_task, BufferConfig, BufferSender, EventBuffer};
use edge_telemetry::client::HecClient;
use edge_telemetry::config::{Config, SinkKind};
use edge_telemetry::edge_node::{EdgeNode, NodeOptions, NodeStats};
use edge_telemetry::sink::Sink;

/// How often each node logs its counters
const STATS_REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// How long shutdown waits for the buffer to drain
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    init_tracing();

    info!("Starting Edge Telemetry simulator...");

    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                node_count = config.node_count,
                node_type = %config.node_type,
                region = %config.region,
                events_per_sec = config.events_per_sec,
                seed = ?config.seed,
                sink = %config.sink,
                batch_size = config.batch_size,
                flush_interval_secs = config.flush_interval.as_secs(),
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let pools = match config.load_pools() {
        Ok(pools) => pools,
        Err(e) => {
            error!(error = %e, "Failed to load pools");
            std::process::exit(1);
        }
    };

    let sink = match config.sink {
        SinkKind::Stdout => Sink::Stdout,
        SinkKind::Hec => match HecClient::new(&config) {
            Ok(client) => {
                info!(event_url = %client.event_url(), "HEC client initialized");
                Sink::Hec(Arc::new(client))
            }
            Err(e) => {
                error!(error = %e, "Failed to create HEC client");
                std::process::exit(1);
            }
        },
    };

    let (sender, buffer) = EventBuffer::new(BufferConfig::new(config.batch_size, config.flush_interval));

    // Buffer task - batches events and hands them to the sink
    let flush_sink = sink.clone();
    let buffer_handle = tokio::spawn(async move {
        info!(sink = flush_sink.name(), "Buffer task started");
        let stats = buffer_task(buffer, move |batch| {
            let sink = flush_sink.clone();
            async move { sink.deliver(batch).await }
        })
        .await;
        info!(
            events_flushed = stats.events_flushed,
            events_dropped = stats.events_dropped,
            failed_flushes = stats.failed_flushes,
            "Buffer task completed"
        );
    });

    // One task per node
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tick = config.generation_interval();
    let node_handles: Vec<JoinHandle<NodeStats>> = config
        .node_ids()
        .into_iter()
        .enumerate()
        .map(|(index, node_id)| {
            let options = NodeOptions::new(node_id)
                .region(config.region.as_str())
                .node_type(config.node_type);
            let node = match config.node_seed(index) {
                Some(seed) => EdgeNode::with_seed(options, pools.clone(), seed),
                None => EdgeNode::new(options, pools.clone()),
            };
            tokio::spawn(run_node(node, sender.clone(), tick, shutdown_rx.clone()))
        })
        .collect();

    // Node tasks hold their own senders
    drop(sender);

    info!("Edge Telemetry running. Press Ctrl+C to stop.");
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, stopping..."),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }

    info!("Initiating graceful shutdown...");
    let _ = shutdown_tx.send(true);

    for mut handle in node_handles {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle).await {
            Ok(Ok(stats)) => info!(
                node_id = %stats.node_id,
                event_count = stats.event_count,
                bytes_generated = stats.bytes_generated,
                "Node stopped"
            ),
            Ok(Err(e)) => warn!(error = %e, "Node task panicked during shutdown"),
            Err(_) => {
                warn!("Node task did not stop within {:?}, aborting", SHUTDOWN_TIMEOUT);
                handle.abort();
            }
        }
    }

    // All senders are gone now, so the buffer flushes what is left and ends
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, buffer_handle).await {
        Ok(Ok(())) => info!("Buffer task shut down gracefully"),
        Ok(Err(e)) => warn!(error = %e, "Buffer task panicked during shutdown"),
        Err(_) => warn!("Buffer task shutdown timed out after {:?}", SHUTDOWN_TIMEOUT),
    }

    if let Sink::Hec(client) = &sink {
        let stats = client.stats();
        info!(
            batches_sent = stats.batches_sent,
            events_sent = stats.events_sent,
            batches_failed = stats.batches_failed,
            retries = stats.retries,
            "HEC shipping summary"
        );
    }

    info!("Edge Telemetry stopped");
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Resolve once shutdown has been requested or its sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Drive one node: one event per tick until shutdown or until the buffer
/// closes. Returns the node's final counters.
///
/// A send blocked on a full buffer still yields to shutdown; the pending
/// event is then dropped.
async fn run_node(
    mut node: EdgeNode,
    sender: BufferSender,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> NodeStats {
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_report_time = Instant::now();
    let mut events_at_last_report: u64 = 0;

    info!(node_id = %node.node_id(), node_type = %node.node_type(), "Node started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let event = node.generate();
                tokio::select! {
                    sent = sender.send(event) => {
                        if sent.is_err() {
                            warn!(node_id = %node.node_id(), "Buffer closed, node stopping");
                            break;
                        }
                    }
                    _ = wait_for_shutdown(&mut shutdown) => {
                        debug!(node_id = %node.node_id(), "Shutdown while buffer full, dropping pending event");
                        break;
                    }
                }

                if last_report_time.elapsed() >= STATS_REPORT_INTERVAL {
                    let stats = node.stats();
                    let produced = stats.event_count - events_at_last_report;
                    info!(
                        node_id = %stats.node_id,
                        status = %stats.status,
                        event_count = stats.event_count,
                        bytes_generated = stats.bytes_generated,
                        rate = format!("{:.1}/s", produced as f64 / last_report_time.elapsed().as_secs_f64()),
                        "Node progress"
                    );
                    events_at_last_report = stats.event_count;
                    last_report_time = Instant::now();
                }
            }

            _ = wait_for_shutdown(&mut shutdown) => break,
        }
    }

    node.stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_telemetry::edge_node::NodeType;
    use edge_telemetry::pools::Pools;

    #[test]
    fn test_intervals() {
        assert!(STATS_REPORT_INTERVAL >= Duration::from_secs(1));
        assert!(SHUTDOWN_TIMEOUT >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_run_node_stops_on_shutdown() {
        let (sender, mut buffer) = EventBuffer::new(BufferConfig::new(1_000, Duration::from_secs(60)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let node = EdgeNode::with_seed(
            NodeOptions::new("edge-01").node_type(NodeType::Web),
            Pools::shared(),
            7,
        );

        let handle = tokio::spawn(run_node(node, sender, Duration::from_millis(5), shutdown_rx));
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown_tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(stats.event_count > 0);

        // The node's sender is gone, so the buffer releases everything it got
        let batch = buffer.next_batch().await.unwrap();
        assert_eq!(batch.len() as u64, stats.event_count);
        assert!(batch.events.iter().all(|e| e.field_str("node_id") == Some("edge-01")));
    }

    #[tokio::test]
    async fn test_run_node_stops_on_shutdown_with_full_buffer() {
        let config = BufferConfig {
            channel_capacity: 4,
            ..BufferConfig::default()
        };
        // Kept alive but never drained
        let (sender, _buffer) = EventBuffer::new(config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let node = EdgeNode::with_seed(NodeOptions::new("edge-03"), Pools::shared(), 9);

        let handle = tokio::spawn(run_node(node, sender, Duration::from_millis(1), shutdown_rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("Node should stop while its send is blocked")
            .unwrap();

        // Four events fill the channel, the fifth is pending when shutdown arrives
        assert_eq!(stats.event_count, 5);
    }

    #[tokio::test]
    async fn test_wait_for_shutdown() {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let pending = tokio::time::timeout(Duration::from_millis(20), wait_for_shutdown(&mut shutdown_rx)).await;
        assert!(pending.is_err());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_millis(100), wait_for_shutdown(&mut shutdown_rx))
            .await
            .unwrap();

        // A dropped sender also ends the wait
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_millis(100), wait_for_shutdown(&mut shutdown_rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_node_stops_when_buffer_closes() {
        let (sender, buffer) = EventBuffer::new(BufferConfig::default());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(buffer);

        let node = EdgeNode::with_seed(NodeOptions::default(), Pools::shared(), 8);
        let stats = tokio::time::timeout(
            Duration::from_secs(1),
            run_node(node, sender, Duration::from_millis(1), shutdown_rx),
        )
        .await
        .unwrap();

        // The first event is generated before the send fails
        assert_eq!(stats.event_count, 1);
    }
}
