//! Buffer module for accumulating events into batches.
//!
//! Events from every node task arrive over one tokio mpsc channel. A batch is
//! released when the batch size is reached or the flush interval elapses,
//! whichever comes first.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::event::{Event, EventBatch};

/// Maximum buffer capacity to prevent memory issues.
/// If buffer exceeds this, oldest events will be dropped.
const MAX_BUFFER_CAPACITY: usize = 10_000;

/// Default channel capacity for the mpsc sender/receiver.
const DEFAULT_CHANNEL_CAPACITY: usize = 1_000;

/// Configuration for the event buffer.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Number of events to accumulate before triggering a flush
    pub batch_size: usize,

    /// Duration to wait before flushing, even if batch size not reached
    pub flush_interval: Duration,

    /// Maximum number of events to hold in the buffer
    pub max_capacity: usize,

    /// Capacity of the mpsc channel
    pub channel_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
            max_capacity: MAX_BUFFER_CAPACITY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl BufferConfig {
    /// Create a new buffer config with the specified batch size and flush interval.
    pub fn new(batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            batch_size,
            flush_interval,
            ..Self::default()
        }
    }
}

/// Statistics about buffer operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferStats {
    /// Total number of events received
    pub events_received: u64,

    /// Total number of events flushed (released in batches)
    pub events_flushed: u64,

    /// Total number of events dropped due to buffer overflow
    pub events_dropped: u64,

    /// Number of flush operations triggered by size threshold
    pub size_flushes: u64,

    /// Number of flush operations triggered by time interval
    pub time_flushes: u64,

    /// Number of batches the flush callback reported as failed
    pub failed_flushes: u64,
}

/// A sender handle for submitting events to the buffer.
///
/// This can be cloned and shared across node tasks.
#[derive(Clone)]
pub struct BufferSender {
    tx: mpsc::Sender<Event>,
}

impl BufferSender {
    /// Send an event to the buffer, waiting if the channel is full.
    pub async fn send(&self, event: Event) -> Result<(), BufferError> {
        self.tx.send(event).await.map_err(|_| BufferError::Closed)
    }
}

/// Errors that can occur during buffer operations.
#[derive(Debug)]
pub enum BufferError {
    /// The buffer has been closed and is no longer accepting events
    Closed,
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::Closed => write!(f, "Buffer has been closed"),
        }
    }
}

impl std::error::Error for BufferError {}

/// Async event buffer with size and time-based flushing.
///
/// The buffer accumulates events and produces batches when either:
/// - The batch size threshold is reached (size-based flush)
/// - The flush interval elapses (time-based flush)
///
/// When every sender is dropped the remaining events are released as a
/// final batch and [`next_batch`](EventBuffer::next_batch) returns `None`
/// afterwards.
pub struct EventBuffer {
    rx: mpsc::Receiver<Event>,
    buffer: Vec<Event>,
    config: BufferConfig,
    stats: BufferStats,
}

impl EventBuffer {
    /// Create a new event buffer with the given configuration.
    ///
    /// Returns a tuple of (BufferSender, EventBuffer).
    pub fn new(config: BufferConfig) -> (BufferSender, Self) {
        let (tx, rx) = mpsc::channel(config.channel_capacity);

        let buffer = Self {
            rx,
            buffer: Vec::with_capacity(config.batch_size),
            config,
            stats: BufferStats::default(),
        };

        (BufferSender { tx }, buffer)
    }

    /// Wait for the next batch of events to be ready.
    ///
    /// Returns `None` if the channel is closed and the buffer is empty.
    pub async fn next_batch(&mut self) -> Option<EventBatch> {
        let mut ticker = interval(self.config.flush_interval);
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                maybe_event = self.rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            self.add_event(event);

                            if self.buffer.len() >= self.config.batch_size {
                                self.stats.size_flushes += 1;
                                debug!(
                                    batch_size = self.buffer.len(),
                                    "Flushing buffer: batch size threshold reached"
                                );
                                return Some(self.create_batch());
                            }
                        }
                        None => {
                            if !self.buffer.is_empty() {
                                info!(
                                    remaining = self.buffer.len(),
                                    "Channel closed, flushing remaining events"
                                );
                                return Some(self.create_batch());
                            }
                            return None;
                        }
                    }
                }

                _ = ticker.tick() => {
                    if !self.buffer.is_empty() {
                        self.stats.time_flushes += 1;
                        debug!(
                            batch_size = self.buffer.len(),
                            interval_ms = self.config.flush_interval.as_millis() as u64,
                            "Flushing buffer: time interval elapsed"
                        );
                        return Some(self.create_batch());
                    }
                }
            }
        }
    }

    /// Add an event to the buffer, handling overflow if necessary.
    fn add_event(&mut self, event: Event) {
        self.stats.events_received += 1;

        if self.buffer.len() >= self.config.max_capacity {
            // Drop the oldest 10% at once to avoid dropping on every event
            let drop_count = (self.buffer.len() / 10).max(1);

            warn!(
                buffer_size = self.buffer.len(),
                drop_count = drop_count,
                max_capacity = self.config.max_capacity,
                "Buffer overflow: dropping oldest events"
            );

            self.buffer.drain(0..drop_count);
            self.stats.events_dropped += drop_count as u64;
        }

        self.buffer.push(event);
    }

    /// Create a batch from the current buffer contents and clear the buffer.
    fn create_batch(&mut self) -> EventBatch {
        let events = std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.config.batch_size),
        );
        self.stats.events_flushed += events.len() as u64;
        EventBatch::new(events)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }
}

/// Drive a buffer until its channel closes, handing each batch to `on_flush`.
///
/// Failed flushes are logged and counted; the batch is not retried here.
/// Returns the final buffer statistics.
pub async fn buffer_task<F, Fut>(mut buffer: EventBuffer, on_flush: F) -> BufferStats
where
    F: Fn(EventBatch) -> Fut,
    Fut: std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>,
{
    while let Some(batch) = buffer.next_batch().await {
        let batch_size = batch.len();
        let batch_id = batch.batch_id;

        if let Err(e) = on_flush(batch).await {
            buffer.stats.failed_flushes += 1;
            warn!(
                error = %e,
                batch_size = batch_size,
                batch_id = %batch_id,
                "Failed to flush batch"
            );
        }
    }

    buffer.stats.clone()
}
