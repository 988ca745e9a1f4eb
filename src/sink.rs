//! Destinations for flushed batches.

use std::io::Write;
use std::sync::Arc;

use crate::client::HecClient;
use crate::event::EventBatch;

/// Error type returned to the buffer task's flush callback.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Where a batch is delivered.
#[derive(Clone)]
pub enum Sink {
    /// Events printed as JSON lines
    Stdout,

    /// Events posted to a collector
    Hec(Arc<HecClient>),
}

impl Sink {
    pub fn name(&self) -> &'static str {
        match self {
            Sink::Stdout => "stdout",
            Sink::Hec(_) => "hec",
        }
    }

    /// Deliver one batch.
    pub async fn deliver(&self, batch: EventBatch) -> Result<(), SinkError> {
        match self {
            Sink::Stdout => {
                let lines = render_json_lines(&batch)?;
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(lines.as_bytes())?;
                stdout.flush()?;
                Ok(())
            }
            Sink::Hec(client) => {
                client.send_batch(&batch).await?;
                Ok(())
            }
        }
    }
}

/// Render every event of `batch` as one JSON object per line.
pub fn render_json_lines(batch: &EventBatch) -> Result<String, serde_json::Error> {
    let mut lines = String::new();
    for event in &batch.events {
        lines.push_str(&serde_json::to_string(event)?);
        lines.push('\n');
    }
    Ok(lines)
}
