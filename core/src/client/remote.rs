use crate::client::{http_client, ClientConfig};
use crate::prelude::{FetchError, ProducerMode, ProducerResult, SnapshotProducer};
use crate::snapshot::TelemetrySnapshot;
use crate::telemetry::{SnapshotBus, Subscription, TickMetrics};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Scan control commands understood by the field device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCommand {
    StartScan,
    StopScan,
}

impl ScanCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanCommand::StartScan => "START_SCAN",
            ScanCommand::StopScan => "STOP_SCAN",
        }
    }
}

#[derive(Debug, Serialize)]
struct ControlRequest<'a> {
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

/// Polls the field device for telemetry and broadcasts each snapshot on a bus.
pub struct TelemetryClient {
    config: ClientConfig,
    http: reqwest::Client,
    bus: SnapshotBus,
    metrics: Arc<TickMetrics>,
    endpoint: String,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl TelemetryClient {
    pub fn new(config: ClientConfig, bus: SnapshotBus) -> Self {
        Self {
            http: http_client(&config),
            endpoint: config.base_endpoint.clone(),
            config,
            bus,
            metrics: Arc::new(TickMetrics::new()),
            handle: None,
            cancel_token: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn bus(&self) -> &SnapshotBus {
        &self.bus
    }

    pub fn metrics(&self) -> Arc<TickMetrics> {
        self.metrics.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// URL of the device's MJPEG stream, for display collaborators only.
    pub fn video_feed_url(&self) -> String {
        ClientConfig::endpoint_url(&self.endpoint, "video_feed")
    }

    /// Starts polling `endpoint_override`, or the configured endpoint when
    /// none is given. A poll loop that is already running is stopped first.
    pub async fn connect(&mut self, endpoint_override: Option<&str>) {
        self.disconnect().await;

        self.endpoint = match endpoint_override {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint.trim().to_string(),
            _ => self.config.base_endpoint.clone(),
        };
        info!("connecting to telemetry server at {}", self.endpoint);

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            self.http.clone(),
            ClientConfig::endpoint_url(&self.endpoint, "telemetry"),
            self.config.poll_interval(),
            self.bus.clone(),
            self.metrics.clone(),
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    /// Stops polling. A request still in flight is dropped, never delivered.
    pub async fn disconnect(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!("telemetry poll task failed to join: {err}");
            }
            info!("disconnected from telemetry server at {}", self.endpoint);
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: FnMut(&TelemetrySnapshot) + Send + 'static,
    {
        self.bus.subscribe(observer)
    }

    /// Single GET against `/telemetry` outside the poll schedule.
    pub async fn poll_once(&self) -> Result<TelemetrySnapshot, FetchError> {
        fetch_snapshot(
            &self.http,
            &ClientConfig::endpoint_url(&self.endpoint, "telemetry"),
        )
        .await
    }

    /// Fire-and-forget POST to `/control`. Failures are logged only; the
    /// returned handle never yields an error.
    pub fn send_command(&self, command: &str, payload: Option<Value>) -> JoinHandle<()> {
        let http = self.http.clone();
        let url = ClientConfig::endpoint_url(&self.endpoint, "control");
        let command = command.to_string();
        info!("sending command {command} to {url}");

        tokio::spawn(async move {
            let request = ControlRequest {
                command: &command,
                payload,
            };
            match http.post(&url).json(&request).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("command {command} accepted");
                }
                Ok(response) => {
                    warn!("command {command} rejected: {}", response.status());
                }
                Err(err) => warn!("failed to send command {command}: {err}"),
            }
        })
    }

    pub fn send_scan_command(&self, command: ScanCommand) -> JoinHandle<()> {
        self.send_command(command.as_str(), None)
    }
}

impl SnapshotProducer for TelemetryClient {
    fn mode(&self) -> ProducerMode {
        ProducerMode::Remote
    }

    fn is_running(&self) -> bool {
        self.is_connected()
    }

    async fn start(&mut self) -> ProducerResult<()> {
        self.connect(None).await;
        Ok(())
    }

    async fn stop(&mut self) {
        self.disconnect().await;
    }
}

impl Drop for TelemetryClient {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

async fn poll_loop(
    http: reqwest::Client,
    url: String,
    period: time::Duration,
    bus: SnapshotBus,
    metrics: Arc<TickMetrics>,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            outcome = fetch_snapshot(&http, &url) => outcome,
        };

        match outcome {
            Ok(snapshot) => {
                let out_of_range = snapshot.out_of_range_count();
                if out_of_range > 0 {
                    debug!("snapshot carries {out_of_range} detections outside the unit frame");
                }
                metrics.record_delivered();
                bus.publish(snapshot);
            }
            Err(err) => {
                metrics.record_dropped();
                warn!("telemetry tick dropped: {err}");
            }
        }
    }

    debug!("telemetry poll loop for {url} stopped");
}

async fn fetch_snapshot(
    http: &reqwest::Client,
    url: &str,
) -> Result<TelemetrySnapshot, FetchError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|err| FetchError::Malformed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{DetectionBox, GeoFix, SystemStats};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use warp::http::StatusCode;
    use warp::Filter;

    fn fast_config() -> ClientConfig {
        ClientConfig {
            poll_interval_ms: 40,
            request_timeout_ms: 1_000,
            ..ClientConfig::default()
        }
    }

    fn device_snapshot() -> TelemetrySnapshot {
        let stats = SystemStats {
            inference_fps: 12.0,
            ..SystemStats::default()
        };
        TelemetrySnapshot::new(
            GeoFix::new(34.0522, -118.2437),
            stats,
            vec![DetectionBox::new("Aphid", 0.9, 0.1, 0.1, 0.2, 0.2, "#00FF00")],
        )
    }

    async fn spawn_device<F, R>(routes: F) -> String
    where
        F: Filter<Extract = (R,), Error = warp::Rejection> + Clone + Send + Sync + 'static,
        R: warp::Reply,
    {
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{}", addr)
    }

    fn counting_telemetry_route(
        hits: Arc<AtomicUsize>,
    ) -> impl Filter<Extract = (warp::reply::Json,), Error = warp::Rejection> + Clone {
        warp::path("telemetry").and(warp::get()).map(move || {
            hits.fetch_add(1, Ordering::SeqCst);
            warp::reply::json(&device_snapshot())
        })
    }

    #[tokio::test]
    async fn every_observer_receives_each_snapshot() {
        let endpoint = spawn_device(counting_telemetry_route(Arc::new(AtomicUsize::new(0)))).await;
        let mut client = TelemetryClient::new(fast_config(), SnapshotBus::new());

        let log = Arc::new(Mutex::new(Vec::new()));
        let first_log = log.clone();
        let _first = client.subscribe(move |_| first_log.lock().unwrap().push(1));
        let second_log = log.clone();
        let _second = client.subscribe(move |_| second_log.lock().unwrap().push(2));

        client.connect(Some(endpoint.as_str())).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        client.disconnect().await;

        let log = log.lock().unwrap();
        assert!(log.len() >= 4, "expected several deliveries, got {:?}", *log);
        for pair in log.chunks(2) {
            assert_eq!(pair, &[1, 2]);
        }
        assert_eq!(client.bus().latest().unwrap().position.unwrap().latitude, 34.0522);
    }

    #[tokio::test]
    async fn failed_status_skips_the_tick() {
        let route = warp::path("telemetry")
            .map(|| warp::reply::with_status("busy", StatusCode::SERVICE_UNAVAILABLE));
        let endpoint = spawn_device(route).await;
        let mut client = TelemetryClient::new(fast_config(), SnapshotBus::new());

        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = delivered.clone();
        let _sub = client.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        client.connect(Some(endpoint.as_str())).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        client.disconnect().await;

        assert_eq!(delivered.load(Ordering::SeqCst), 0);
        let counts = client.metrics().counts();
        assert_eq!(counts.delivered, 0);
        assert!(counts.dropped >= 1);
        assert!(client.bus().latest().is_none());
    }

    #[tokio::test]
    async fn malformed_body_is_dropped() {
        let route = warp::path("telemetry").map(|| "not telemetry");
        let endpoint = spawn_device(route).await;
        let mut client = TelemetryClient::new(fast_config(), SnapshotBus::new());
        client.connect(Some(endpoint.as_str())).await;

        let result = client.poll_once().await;
        client.disconnect().await;

        assert!(matches!(result, Err(FetchError::Malformed(_))));
        assert!(client.bus().latest().is_none());
    }

    #[tokio::test]
    async fn disconnect_stops_delivery_and_is_idempotent() {
        let endpoint = spawn_device(counting_telemetry_route(Arc::new(AtomicUsize::new(0)))).await;
        let mut client = TelemetryClient::new(fast_config(), SnapshotBus::new());
        client.disconnect().await;
        assert!(!client.is_connected());

        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = delivered.clone();
        let _sub = client.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        client.connect(Some(endpoint.as_str())).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        client.disconnect().await;
        client.disconnect().await;

        let after_disconnect = delivered.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), after_disconnect);
    }

    #[tokio::test]
    async fn reconnect_replaces_the_previous_poll_loop() {
        let hits_a = Arc::new(AtomicUsize::new(0));
        let hits_b = Arc::new(AtomicUsize::new(0));
        let endpoint_a = spawn_device(counting_telemetry_route(hits_a.clone())).await;
        let endpoint_b = spawn_device(counting_telemetry_route(hits_b.clone())).await;
        let mut client = TelemetryClient::new(fast_config(), SnapshotBus::new());

        client.connect(Some(endpoint_a.as_str())).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        client.connect(Some(endpoint_b.as_str())).await;
        assert_eq!(client.endpoint(), endpoint_b);

        let hits_a_at_switch = hits_a.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        client.disconnect().await;

        assert!(hits_a_at_switch >= 1);
        assert_eq!(hits_a.load(Ordering::SeqCst), hits_a_at_switch);
        assert!(hits_b.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn empty_override_falls_back_to_configured_endpoint() {
        let endpoint = spawn_device(counting_telemetry_route(Arc::new(AtomicUsize::new(0)))).await;
        let config = fast_config().with_endpoint(endpoint.clone());
        let mut client = TelemetryClient::new(config, SnapshotBus::new());

        client.connect(Some("")).await;
        assert_eq!(client.endpoint(), endpoint);
        assert_eq!(client.video_feed_url(), format!("{endpoint}/video_feed"));
        client.disconnect().await;
    }

    #[tokio::test]
    async fn send_command_posts_json_body() {
        let seen = Arc::new(Mutex::new(Vec::<Value>::new()));
        let sink = seen.clone();
        let route = warp::path("control")
            .and(warp::post())
            .and(warp::body::json())
            .map(move |body: Value| {
                sink.lock().unwrap().push(body);
                warp::reply()
            });
        let endpoint = spawn_device(route).await;
        let client = TelemetryClient::new(fast_config().with_endpoint(endpoint), SnapshotBus::new());

        client.send_scan_command(ScanCommand::StartScan).await.unwrap();
        client
            .send_command("SET_SPEED", Some(serde_json::json!({"speed": 2})))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], serde_json::json!({"command": "START_SCAN"}));
        assert_eq!(seen[1]["payload"]["speed"], 2);
    }

    #[tokio::test]
    async fn send_command_swallows_transport_failures() {
        let config = fast_config().with_endpoint("http://127.0.0.1:9");
        let client = TelemetryClient::new(config, SnapshotBus::new());
        assert!(client.send_scan_command(ScanCommand::StopScan).await.is_ok());
    }
}
