//! HTTP client for shipping event batches to a Splunk HTTP Event Collector.
//!
//! The client reuses one reqwest connection pool, retries transient failures
//! with exponential backoff and jitter, and keeps shipping statistics.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::event::EventBatch;
use crate::hec::{HecBatch, HecResponse, HEC_CHANNEL_HEADER};

/// Default base delay for exponential backoff (in milliseconds).
const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Maximum delay between retries (in milliseconds).
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Errors that can occur during HTTP client operations.
#[derive(Debug)]
pub enum ClientError {
    /// HTTP request failed
    Request(reqwest::Error),

    /// Server returned an error status code
    Status { code: StatusCode, message: String },

    /// The collector answered with a non-zero HEC code
    Rejected { code: i64, text: String },

    /// Failed to encode the request body
    Encode(String),

    /// Failed to parse response body
    Parse(String),

    /// All retry attempts exhausted
    RetriesExhausted { attempts: u32, last_error: String },

    /// Request timeout
    Timeout,

    /// Client configuration error
    Config(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Request(e) => write!(f, "HTTP request failed: {}", e),
            ClientError::Status { code, message } => {
                write!(f, "Server error ({}): {}", code, message)
            }
            ClientError::Rejected { code, text } => {
                write!(f, "Collector rejected batch (code {}): {}", code, text)
            }
            ClientError::Encode(e) => write!(f, "Failed to encode batch: {}", e),
            ClientError::Parse(e) => write!(f, "Failed to parse response: {}", e),
            ClientError::RetriesExhausted {
                attempts,
                last_error,
            } => {
                write!(
                    f,
                    "All {} retry attempts exhausted. Last error: {}",
                    attempts, last_error
                )
            }
            ClientError::Timeout => write!(f, "Request timed out"),
            ClientError::Config(e) => write!(f, "Client configuration error: {}", e),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Request(err)
        }
    }
}

/// Statistics about client operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientStats {
    /// Total number of batches accepted by the collector
    pub batches_sent: u64,

    /// Total number of events accepted by the collector
    pub events_sent: u64,

    /// Total number of failed send attempts, retried or not
    pub failed_attempts: u64,

    /// Total number of retries performed
    pub retries: u64,

    /// Total number of batches that failed after all retries
    pub batches_failed: u64,
}

/// HTTP client for a Splunk HTTP Event Collector.
///
/// # Example
///
/// ```no_run
/// use edge_telemetry::client::HecClient;
/// use edge_telemetry::config::Config;
/// use edge_telemetry::edge_node::{EdgeNode, NodeOptions};
/// use edge_telemetry::event::EventBatch;
/// use edge_telemetry::pools::Pools;
///
/// #[tokio::main]
/// async fn main() {
///     let config = Config::default();
///     let client = HecClient::new(&config).expect("Failed to create client");
///
///     let mut node = EdgeNode::new(NodeOptions::default(), Pools::shared());
///     let batch = EventBatch::new(node.generate_batch(100));
///
///     match client.send_batch(&batch).await {
///         Ok(response) => println!("Collector said: {}", response.text),
///         Err(e) => eprintln!("Failed to send: {}", e),
///     }
/// }
/// ```
pub struct HecClient {
    /// The underlying HTTP client (reused for connection pooling)
    client: Client,

    /// URL of the event endpoint
    event_url: String,

    /// Value of the Authorization header
    authorization: String,

    max_retries: u32,

    timeout: Duration,

    stats: RwLock<ClientStats>,
}

impl HecClient {
    /// Create a client from the HEC settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        Self::with_settings(
            config.hec_event_url.clone(),
            &config.hec_token,
            config.request_timeout,
            config.max_retries,
        )
    }

    /// Create a client with custom settings.
    pub fn with_settings(
        event_url: impl Into<String>,
        token: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            client,
            event_url: event_url.into(),
            authorization: format!("Splunk {}", token),
            max_retries,
            timeout,
            stats: RwLock::new(ClientStats::default()),
        })
    }

    /// Ship a batch to the collector.
    ///
    /// Connection errors, timeouts, 5xx and 429 responses are retried up to
    /// `max_retries` times. Other 4xx responses and HEC rejections are not.
    pub async fn send_batch(&self, batch: &EventBatch) -> Result<HecResponse, ClientError> {
        let hec_batch = HecBatch::from_batch(batch);
        let body = hec_batch
            .to_ndjson()
            .map_err(|e| ClientError::Encode(e.to_string()))?;

        debug!(
            batch_size = hec_batch.len(),
            batch_id = %hec_batch.batch_id,
            url = %self.event_url,
            "Sending event batch"
        );

        let result = self.send_with_retries(&hec_batch, body).await;
        self.record(hec_batch.len() as u64, &result);
        result
    }

    async fn send_with_retries(
        &self,
        batch: &HecBatch,
        body: String,
    ) -> Result<HecResponse, ClientError> {
        let mut last_error: Option<ClientError> = None;
        let mut attempt = 0;

        while attempt <= self.max_retries {
            if attempt > 0 {
                let delay = self.calculate_backoff_delay(attempt);
                warn!(
                    attempt = attempt,
                    max_retries = self.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after failure"
                );
                self.bump(|stats| stats.retries += 1);
                tokio::time::sleep(delay).await;
            }

            match self.send_request(batch, body.clone()).await {
                Ok(response) => {
                    info!(
                        batch_size = batch.len(),
                        batch_id = %batch.batch_id,
                        "Collector accepted event batch"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    self.bump(|stats| stats.failed_attempts += 1);
                    let is_retryable = self.is_retryable_error(&e);

                    if is_retryable && attempt < self.max_retries {
                        warn!(
                            error = %e,
                            attempt = attempt + 1,
                            max_retries = self.max_retries,
                            "Request failed, will retry"
                        );
                        last_error = Some(e);
                        attempt += 1;
                    } else {
                        error!(
                            error = %e,
                            attempts = attempt + 1,
                            retryable = is_retryable,
                            "Request failed permanently"
                        );
                        return Err(e);
                    }
                }
            }
        }

        let last_error_msg = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());

        Err(ClientError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error: last_error_msg,
        })
    }

    /// Send a single HTTP request without retry logic.
    async fn send_request(&self, batch: &HecBatch, body: String) -> Result<HecResponse, ClientError> {
        let response = self
            .client
            .post(&self.event_url)
            .timeout(self.timeout)
            .header(AUTHORIZATION, &self.authorization)
            .header(HEC_CHANNEL_HEADER, batch.batch_id.to_string())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // The collector still reports a HEC code and text on most errors
            let message = serde_json::from_str::<HecResponse>(&text)
                .map(|r| r.text)
                .unwrap_or(text);
            return Err(ClientError::Status {
                code: status,
                message,
            });
        }

        let response: HecResponse =
            serde_json::from_str(&text).map_err(|e| ClientError::Parse(e.to_string()))?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(ClientError::Rejected {
                code: response.code,
                text: response.text,
            })
        }
    }

    /// Calculate the backoff delay for a given retry attempt.
    ///
    /// delay = min(base_delay * 2^attempt + jitter, max_delay), jitter up to 25%
    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let exponential_delay = DEFAULT_BASE_DELAY_MS.saturating_mul(1 << attempt.min(10));
        let jitter = rand::random::<u64>() % (exponential_delay / 4 + 1);
        let total_delay = exponential_delay
            .saturating_add(jitter)
            .min(MAX_RETRY_DELAY_MS);

        Duration::from_millis(total_delay)
    }

    fn is_retryable_error(&self, error: &ClientError) -> bool {
        match error {
            ClientError::Request(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ClientError::Timeout => true,
            ClientError::Status { code, .. } => {
                code.is_server_error() || *code == StatusCode::TOO_MANY_REQUESTS
            }
            ClientError::Rejected { .. } => false,
            ClientError::Encode(_) => false,
            ClientError::Parse(_) => false,
            ClientError::RetriesExhausted { .. } => false,
            ClientError::Config(_) => false,
        }
    }

    fn bump(&self, update: impl FnOnce(&mut ClientStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }

    fn record(&self, events: u64, result: &Result<HecResponse, ClientError>) {
        self.bump(|stats| match result {
            Ok(_) => {
                stats.batches_sent += 1;
                stats.events_sent += events;
            }
            Err(_) => stats.batches_failed += 1,
        });
    }

    /// Get current client statistics.
    pub fn stats(&self) -> ClientStats {
        self.stats.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn event_url(&self) -> &str {
        &self.event_url
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_node::{EdgeNode, NodeOptions};
    use crate::hec::HEC_EVENT_PATH;
    use crate::pools::Pools;
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    const SUCCESS: &str = r#"{"text":"Success","code":0}"#;

    /// Head (request line and headers) and body of a request the local
    /// collector received.
    struct ReceivedRequest {
        head: String,
        body: String,
    }

    impl ReceivedRequest {
        fn header(&self, name: &str) -> Option<&str> {
            self.head.lines().find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim())
            })
        }
    }

    async fn read_request(stream: &mut TcpStream) -> ReceivedRequest {
        let mut data = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);

            if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&data[..end]).to_string();
                let length = head
                    .lines()
                    .find_map(|line| {
                        let (key, value) = line.split_once(':')?;
                        if key.trim().eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);

                let body_start = end + 4;
                if data.len() >= body_start + length {
                    let body =
                        String::from_utf8_lossy(&data[body_start..body_start + length]).to_string();
                    return ReceivedRequest { head, body };
                }
            }
        }

        ReceivedRequest {
            head: String::from_utf8_lossy(&data).to_string(),
            body: String::new(),
        }
    }

    /// Start a local collector answering one connection per scripted
    /// `(status line, body)` response. Returns the event URL and a handle
    /// yielding the received requests.
    async fn local_collector(
        responses: Vec<(&'static str, &'static str)>,
    ) -> (String, JoinHandle<Vec<ReceivedRequest>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}{}", listener.local_addr().unwrap(), HEC_EVENT_PATH);

        let handle = tokio::spawn(async move {
            let mut received = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                received.push(read_request(&mut stream).await);

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
            received
        });

        (url, handle)
    }

    fn client_for(url: &str, max_retries: u32) -> HecClient {
        HecClient::with_settings(url, "token-1", Duration::from_secs(5), max_retries).unwrap()
    }

    fn create_test_batch(size: usize) -> EventBatch {
        let mut node = EdgeNode::with_seed(NodeOptions::default(), Pools::shared(), 1);
        EventBatch::new(node.generate_batch(size))
    }

    #[test]
    fn test_client_error_display() {
        let err = ClientError::Timeout;
        assert_eq!(format!("{}", err), "Request timed out");

        let err = ClientError::Status {
            code: StatusCode::BAD_REQUEST,
            message: "Invalid data format".to_string(),
        };
        assert!(format!("{}", err).contains("400"));
        assert!(format!("{}", err).contains("Invalid data format"));

        let err = ClientError::Rejected {
            code: 6,
            text: "Invalid data format".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Collector rejected batch (code 6): Invalid data format"
        );

        let err = ClientError::RetriesExhausted {
            attempts: 3,
            last_error: "Connection refused".to_string(),
        };
        assert!(format!("{}", err).contains("3"));
        assert!(format!("{}", err).contains("Connection refused"));
    }

    #[test]
    fn test_client_creation() {
        let client = HecClient::new(&Config::default()).unwrap();
        assert_eq!(
            client.event_url(),
            "http://localhost:8088/services/collector/event"
        );
        assert_eq!(client.max_retries(), 3);
        assert_eq!(client.timeout(), Duration::from_secs(30));
        assert_eq!(
            client.authorization,
            "Splunk 00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_client_with_settings() {
        let client = HecClient::with_settings(
            "http://splunk:8088/services/collector/event",
            "token-1",
            Duration::from_secs(60),
            5,
        )
        .unwrap();

        assert_eq!(client.event_url(), "http://splunk:8088/services/collector/event");
        assert_eq!(client.authorization, "Splunk token-1");
        assert_eq!(client.max_retries(), 5);
        assert_eq!(client.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_delay_increases() {
        let client = HecClient::new(&Config::default()).unwrap();

        let delay1 = client.calculate_backoff_delay(0);
        let delay2 = client.calculate_backoff_delay(1);
        let delay3 = client.calculate_backoff_delay(2);

        // Base 500ms plus up to 25% jitter
        assert!(delay1.as_millis() >= 500 && delay1.as_millis() <= 625);
        assert!(delay2.as_millis() >= 1000 && delay2.as_millis() <= 1250);
        assert!(delay3.as_millis() >= 2000 && delay3.as_millis() <= 2500);
    }

    #[test]
    fn test_backoff_delay_caps_at_max() {
        let client = HecClient::new(&Config::default()).unwrap();
        let delay = client.calculate_backoff_delay(20);
        assert!(delay.as_millis() <= MAX_RETRY_DELAY_MS as u128);
    }

    #[test]
    fn test_retryable_error_detection() {
        let client = HecClient::new(&Config::default()).unwrap();

        assert!(client.is_retryable_error(&ClientError::Timeout));
        assert!(!client.is_retryable_error(&ClientError::Parse("invalid json".to_string())));
        assert!(!client.is_retryable_error(&ClientError::Encode("bad float".to_string())));
        assert!(!client.is_retryable_error(&ClientError::Rejected {
            code: 6,
            text: "Invalid data format".to_string(),
        }));

        assert!(client.is_retryable_error(&ClientError::Status {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
        }));
        assert!(client.is_retryable_error(&ClientError::Status {
            code: StatusCode::TOO_MANY_REQUESTS,
            message: "Rate limited".to_string(),
        }));
        assert!(!client.is_retryable_error(&ClientError::Status {
            code: StatusCode::BAD_REQUEST,
            message: "Bad request".to_string(),
        }));
        assert!(!client.is_retryable_error(&ClientError::Status {
            code: StatusCode::FORBIDDEN,
            message: "Invalid token".to_string(),
        }));
    }

    #[test]
    fn test_client_stats_default() {
        let client = HecClient::new(&Config::default()).unwrap();
        assert_eq!(client.stats(), ClientStats::default());
    }

    #[test]
    fn test_record_updates_stats() {
        let client = HecClient::new(&Config::default()).unwrap();

        let ok = Ok(HecResponse {
            text: "Success".to_string(),
            code: 0,
            invalid_event_number: None,
        });
        client.record(25, &ok);
        client.record(5, &Err(ClientError::Timeout));

        let stats = client.stats();
        assert_eq!(stats.batches_sent, 1);
        assert_eq!(stats.events_sent, 25);
        assert_eq!(stats.batches_failed, 1);
    }

    #[tokio::test]
    async fn test_unreachable_collector_fails_without_retries() {
        // Nothing listens on port 1
        let client = HecClient::with_settings(
            "http://127.0.0.1:1/services/collector/event",
            "token",
            Duration::from_secs(2),
            0,
        )
        .unwrap();

        let result = client.send_batch(&create_test_batch(3)).await;
        assert!(result.is_err());

        let stats = client.stats();
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.failed_attempts, 1);
        assert_eq!(stats.retries, 0);
        assert_eq!(stats.events_sent, 0);
    }

    #[tokio::test]
    async fn test_send_batch_posts_ndjson_with_headers() {
        let (url, collector) = local_collector(vec![("200 OK", SUCCESS)]).await;
        let client = client_for(&url, 0);
        let batch = create_test_batch(3);

        let response = client.send_batch(&batch).await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.text, "Success");

        let received = collector.await.unwrap();
        assert_eq!(received.len(), 1);
        let request = &received[0];

        assert!(request.head.starts_with("POST /services/collector/event "));
        assert_eq!(request.header("authorization"), Some("Splunk token-1"));
        let channel = batch.batch_id.to_string();
        assert_eq!(request.header("x-splunk-request-channel"), Some(channel.as_str()));
        assert_eq!(request.header("content-type"), Some("application/json"));

        let lines: Vec<&str> = request.body.lines().collect();
        assert_eq!(lines.len(), 3);
        for (line, event) in lines.iter().zip(&batch.events) {
            let parsed: Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed["event"], event.raw.as_str());
            assert_eq!(parsed["sourcetype"], event.sourcetype.as_str());
            assert_eq!(parsed["host"], event.host.as_str());
        }

        let stats = client.stats();
        assert_eq!(stats.batches_sent, 1);
        assert_eq!(stats.events_sent, 3);
        assert_eq!(stats.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_nonzero_code_is_rejected_without_retry() {
        let (url, collector) =
            local_collector(vec![("200 OK", r#"{"text":"Invalid token","code":4}"#)]).await;
        let client = client_for(&url, 2);

        let err = client.send_batch(&create_test_batch(2)).await.unwrap_err();
        match &err {
            ClientError::Rejected { code, text } => {
                assert_eq!(*code, 4);
                assert_eq!(text, "Invalid token");
            }
            other => panic!("expected rejection, got {}", other),
        }
        assert_eq!(
            err.to_string(),
            "Collector rejected batch (code 4): Invalid token"
        );

        assert_eq!(collector.await.unwrap().len(), 1);
        let stats = client.stats();
        assert_eq!(stats.failed_attempts, 1);
        assert_eq!(stats.retries, 0);
        assert_eq!(stats.batches_failed, 1);
    }

    #[tokio::test]
    async fn test_server_busy_is_retried() {
        let (url, collector) = local_collector(vec![
            ("503 Service Unavailable", r#"{"text":"Server is busy","code":9}"#),
            ("200 OK", SUCCESS),
        ])
        .await;
        let client = client_for(&url, 1);
        let batch = create_test_batch(2);

        let response = client.send_batch(&batch).await.unwrap();
        assert!(response.is_success());

        let received = collector.await.unwrap();
        assert_eq!(received.len(), 2);
        // A retry keeps the batch's channel and body
        assert_eq!(
            received[0].header("x-splunk-request-channel"),
            received[1].header("x-splunk-request-channel")
        );
        assert_eq!(received[0].body, received[1].body);

        let stats = client.stats();
        assert_eq!(stats.retries, 1);
        assert_eq!(stats.failed_attempts, 1);
        assert_eq!(stats.batches_sent, 1);
        assert_eq!(stats.batches_failed, 0);
    }

    #[tokio::test]
    async fn test_bad_request_is_a_status_error() {
        let (url, collector) = local_collector(vec![(
            "400 Bad Request",
            r#"{"text":"Invalid data format","code":6}"#,
        )])
        .await;
        let client = client_for(&url, 3);

        let err = client.send_batch(&create_test_batch(1)).await.unwrap_err();
        match err {
            ClientError::Status { code, message } => {
                assert_eq!(code, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Invalid data format");
            }
            other => panic!("expected status error, got {}", other),
        }

        assert_eq!(collector.await.unwrap().len(), 1);
        assert_eq!(client.stats().retries, 0);
    }
}
