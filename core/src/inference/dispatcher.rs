use crate::client::{http_client, ClientConfig};
use crate::inference::capture::{CaptureDevice, CaptureHandle};
use crate::inference::encode::encode_jpeg;
use crate::inference::merge::{merge_detections, DetectResponse};
use crate::prelude::{
    CaptureError, EncodeError, FetchError, ProducerMode, ProducerResult, SnapshotProducer,
};
use crate::snapshot::DetectionBox;
use crate::telemetry::{SnapshotBus, TickMetrics};
use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(thiserror::Error, Debug)]
enum SubmitError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Clone)]
struct LoopContext {
    http: reqwest::Client,
    detect_url: String,
    jpeg_quality: u8,
    period: time::Duration,
    scanning: Arc<AtomicBool>,
    bus: SnapshotBus,
    metrics: Arc<TickMetrics>,
}

/// Produces snapshots from the local camera by submitting frames to `/detect`.
///
/// Submissions are serialized: each tick awaits its request before the next
/// capture, and ticks missed meanwhile are skipped, so at most one request is
/// in flight. Frames are grabbed and encoded on the blocking pool.
/// Deactivating drops any in-flight request without applying it, but waits
/// for a grab already in progress so the camera is released on return.
pub struct LocalInferenceDispatcher {
    config: ClientConfig,
    http: reqwest::Client,
    bus: SnapshotBus,
    device: Arc<dyn CaptureDevice>,
    endpoint: String,
    scanning: Arc<AtomicBool>,
    metrics: Arc<TickMetrics>,
    handle: Option<JoinHandle<Result<(), CaptureError>>>,
    cancel_token: Option<CancellationToken>,
}

impl LocalInferenceDispatcher {
    pub fn new(config: ClientConfig, bus: SnapshotBus, device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            http: http_client(&config),
            endpoint: config.base_endpoint.clone(),
            config,
            bus,
            device,
            scanning: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(TickMetrics::new()),
            handle: None,
            cancel_token: None,
        }
    }

    /// Detection endpoint base for the next activation.
    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint = endpoint.into();
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn metrics(&self) -> Arc<TickMetrics> {
        self.metrics.clone()
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Gates submissions. The camera stays open while scanning is off.
    pub fn set_scanning(&self, enabled: bool) {
        self.scanning.store(enabled, Ordering::SeqCst);
        debug!("local scanning {}", if enabled { "enabled" } else { "paused" });
    }

    /// Enabling acquires the camera and starts the capture loop; a failed
    /// acquisition is returned so the caller can fall back to remote mode.
    /// Disabling stops the loop and returns once the camera is released.
    pub async fn set_active(&mut self, enabled: bool) -> Result<(), CaptureError> {
        if !enabled {
            self.deactivate().await;
            return Ok(());
        }

        if self.is_active() {
            return Ok(());
        }
        // A loop that ended on its own still holds a join handle.
        self.deactivate().await;

        let capture = CaptureHandle::acquire(self.device.as_ref())?;
        let context = LoopContext {
            http: self.http.clone(),
            detect_url: ClientConfig::endpoint_url(&self.endpoint, "detect"),
            jpeg_quality: self.config.jpeg_quality,
            period: self.config.capture_interval(),
            scanning: self.scanning.clone(),
            bus: self.bus.clone(),
            metrics: self.metrics.clone(),
        };
        info!("local inference active against {}", context.detect_url);

        let cancel_token = CancellationToken::new();
        self.handle = Some(tokio::spawn(capture_loop(
            capture,
            context,
            cancel_token.clone(),
        )));
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Reports a capture loop that stopped on its own because the camera
    /// failed. Returns `Ok` while the loop is healthy or inactive.
    pub async fn check_health(&mut self) -> Result<(), CaptureError> {
        let finished = self
            .handle
            .as_ref()
            .is_some_and(|handle| handle.is_finished());
        if !finished {
            return Ok(());
        }

        self.cancel_token = None;
        match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(err) => Err(CaptureError::Unavailable(format!(
                    "capture loop aborted: {err}"
                ))),
            },
            None => Ok(()),
        }
    }

    async fn deactivate(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(Ok(())) => info!("local inference stopped"),
                Ok(Err(err)) => warn!("local inference had already stopped: {err}"),
                Err(err) => warn!("capture loop task failed to join: {err}"),
            }
        }
    }
}

impl SnapshotProducer for LocalInferenceDispatcher {
    fn mode(&self) -> ProducerMode {
        ProducerMode::Local
    }

    fn is_running(&self) -> bool {
        self.is_active()
    }

    async fn start(&mut self) -> ProducerResult<()> {
        self.set_active(true).await?;
        Ok(())
    }

    async fn stop(&mut self) {
        self.deactivate().await;
    }
}

impl Drop for LocalInferenceDispatcher {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

async fn capture_loop(
    mut capture: CaptureHandle,
    context: LoopContext,
    cancel_token: CancellationToken,
) -> Result<(), CaptureError> {
    let mut ticker = time::interval_at(Instant::now() + context.period, context.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !context.scanning.load(Ordering::SeqCst) {
            continue;
        }

        // Not raced against cancellation: the handle must come back from the
        // blocking pool before the loop can release it.
        let quality = context.jpeg_quality;
        let grabbed = tokio::task::spawn_blocking(move || {
            let jpeg = grab_jpeg(&mut capture, quality);
            (capture, jpeg)
        })
        .await;
        let jpeg = match grabbed {
            Ok((returned, jpeg)) => {
                capture = returned;
                jpeg
            }
            Err(err) => {
                warn!("capture worker failed: {err}");
                return Err(CaptureError::Unavailable(format!("capture worker failed: {err}")));
            }
        };

        let jpeg = match jpeg {
            Ok(jpeg) => jpeg,
            Err(SubmitError::Capture(CaptureError::Frame(reason))) => {
                context.metrics.record_dropped();
                debug!("capture tick dropped: {reason}");
                continue;
            }
            Err(SubmitError::Capture(err)) => {
                warn!("capture device lost: {err}");
                return Err(err);
            }
            Err(err) => {
                context.metrics.record_dropped();
                warn!("frame encode failed: {err}");
                continue;
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            outcome = submit_frame(&context, jpeg) => outcome,
        };

        match outcome {
            Ok(detections) => {
                let merged = merge_detections(context.bus.latest().as_ref(), detections);
                context.metrics.record_delivered();
                context.bus.publish(merged);
            }
            Err(err) => {
                context.metrics.record_dropped();
                warn!("detection tick dropped: {err}");
            }
        }
    }

    capture.release();
    Ok(())
}

// Runs on the blocking pool: camera reads and JPEG encoding both block.
fn grab_jpeg(capture: &mut CaptureHandle, quality: u8) -> Result<Vec<u8>, SubmitError> {
    let frame = capture.grab()?;
    Ok(encode_jpeg(&frame, quality)?)
}

async fn submit_frame(
    context: &LoopContext,
    jpeg: Vec<u8>,
) -> Result<Vec<DetectionBox>, SubmitError> {
    let part = Part::bytes(jpeg)
        .file_name("frame.jpg")
        .mime_str("image/jpeg")
        .map_err(FetchError::from)?;
    let form = Form::new().part("image", part);

    let response = context
        .http
        .post(&context.detect_url)
        .multipart(form)
        .send()
        .await
        .map_err(FetchError::from)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status).into());
    }

    let body = response.bytes().await.map_err(FetchError::from)?;
    let parsed: DetectResponse = serde_json::from_slice(&body)
        .map_err(|err| FetchError::Malformed(err.to_string()))?;
    Ok(parsed.detections)
}
