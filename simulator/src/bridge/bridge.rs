use crate::bridge::model::{ControlOutcome, DeviceModel};
use crate::workflow::config::DeviceConfig;
use bytes::Buf;
use fieldcore::inference::{encode_jpeg, CaptureHandle, SyntheticCamera};
use futures_util::{Stream, TryStreamExt};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use warp::http::{header, Response, StatusCode};
use warp::hyper::Body;
use warp::multipart::{FormData, Part};
use warp::{Filter, Rejection, Reply};

const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
const FEED_JPEG_QUALITY: u8 = 80;

type SharedModel = Arc<Mutex<DeviceModel>>;

#[derive(Debug, Deserialize)]
struct ControlRequest {
    command: String,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Debug, Clone, Copy)]
struct FeedSettings {
    width: u32,
    height: u32,
    period: Duration,
}

/// HTTP face of the simulated field device.
pub struct DeviceBridge {
    model: SharedModel,
    feed: FeedSettings,
}

impl DeviceBridge {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            model: Arc::new(Mutex::new(DeviceModel::new(config.to_generator_config()))),
            feed: FeedSettings {
                width: config.feed_width.max(1),
                height: config.feed_height.max(1),
                period: Duration::from_millis(1000 / u64::from(config.feed_fps.max(1))),
            },
        }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let model = self.model.clone();
        let model_filter = warp::any().map(move || model.clone());
        let feed = self.feed;

        let index_route = warp::path::end().and(warp::get()).map(|| {
            warp::reply::json(&json!({
                "status": "online",
                "service": "FieldScan device simulator",
                "endpoints": ["/video_feed", "/telemetry", "/detect", "/control"]
            }))
        });

        let telemetry_route = warp::path("telemetry")
            .and(warp::path::end())
            .and(warp::get())
            .and(model_filter.clone())
            .map(|model: SharedModel| warp::reply::json(&lock(&model).next_telemetry()));

        let control_route = warp::path("control")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::json())
            .and(model_filter.clone())
            .map(|request: ControlRequest, model: SharedModel| {
                info!(
                    "received command {} (payload: {:?})",
                    request.command, request.payload
                );
                let mut model = lock(&model);
                let outcome = model.control(&request.command);
                info!(
                    "scan active: {}, rover at {:?}",
                    model.is_scanning(),
                    model.position()
                );
                match outcome {
                    ControlOutcome::Accepted(body) => {
                        warp::reply::with_status(warp::reply::json(&body), StatusCode::OK)
                    }
                    ControlOutcome::Unknown(command) => warp::reply::with_status(
                        warp::reply::json(&json!({
                            "status": "error",
                            "message": format!("Unknown command {command}")
                        })),
                        StatusCode::BAD_REQUEST,
                    ),
                }
            });

        let detect_route = warp::path("detect")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
            .and(model_filter)
            .and_then(handle_detect);

        let video_route = warp::path("video_feed")
            .and(warp::path::end())
            .and(warp::get())
            .map(move || video_feed_response(feed));

        index_route
            .or(telemetry_route)
            .or(control_route)
            .or(detect_route)
            .or(video_route)
    }
}

async fn handle_detect(form: FormData, model: SharedModel) -> Result<impl Reply, Infallible> {
    let image = match read_image_field(form).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Ok(error_reply("No image provided")),
        Err(err) => {
            warn!("detect upload failed: {err}");
            return Ok(error_reply("Invalid upload"));
        }
    };

    let detections = lock(&model).detect_image(&image);
    match detections {
        Ok(detections) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "detections": detections })),
            StatusCode::OK,
        )),
        Err(err) => {
            warn!("detect image rejected: {err}");
            Ok(error_reply("Invalid image"))
        }
    }
}

async fn read_image_field(form: FormData) -> Result<Option<Vec<u8>>, warp::Error> {
    let parts: Vec<Part> = form.try_collect().await?;
    for part in parts {
        if part.name() == "image" {
            let bytes = part
                .stream()
                .try_fold(Vec::new(), |mut acc, chunk| async move {
                    acc.extend_from_slice(chunk.chunk());
                    Ok(acc)
                })
                .await?;
            return Ok(Some(bytes));
        }
    }
    Ok(None)
}

fn error_reply(message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        StatusCode::BAD_REQUEST,
    )
}

fn video_feed_response(feed: FeedSettings) -> Response<Body> {
    let mut response = Response::new(Body::wrap_stream(mjpeg_stream(feed)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("multipart/x-mixed-replace; boundary=frame"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, header::HeaderValue::from_static("0"));
    response
}

// Each viewer gets its own test-pattern camera; the stream ends if it fails.
fn mjpeg_stream(feed: FeedSettings) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> {
    let camera = SyntheticCamera::new(feed.width, feed.height);
    let capture = CaptureHandle::acquire(&camera).ok();

    futures_util::stream::unfold(capture, move |capture| async move {
        let mut capture = capture?;
        tokio::time::sleep(feed.period).await;
        let frame = capture.grab().ok()?;
        let jpeg = encode_jpeg(&frame, FEED_JPEG_QUALITY).ok()?;

        let mut chunk = Vec::with_capacity(jpeg.len() + 48);
        chunk.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
        chunk.extend_from_slice(&jpeg);
        chunk.extend_from_slice(b"\r\n");
        Some((Ok(chunk), Some(capture)))
    })
}

fn lock(model: &SharedModel) -> MutexGuard<'_, DeviceModel> {
    model
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldcore::inference::CapturedFrame;
    use fieldcore::snapshot::TelemetrySnapshot;

    fn bridge() -> DeviceBridge {
        DeviceBridge::new(&DeviceConfig::default())
    }

    fn multipart_body(field: &str, bytes: &[u8]) -> (String, Vec<u8>) {
        let boundary = "fieldscan-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"frame.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    fn test_jpeg() -> Vec<u8> {
        let frame = CapturedFrame {
            width: 64,
            height: 48,
            pixels: vec![200; 64 * 48 * 3],
        };
        encode_jpeg(&frame, 80).unwrap()
    }

    #[tokio::test]
    async fn telemetry_route_serves_snapshots() {
        let routes = bridge().routes();
        let response = warp::test::request()
            .method("GET")
            .path("/telemetry")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let snapshot: TelemetrySnapshot = serde_json::from_slice(response.body()).unwrap();
        assert!(snapshot.captured_at > 0.0);
        let position = snapshot.position.unwrap();
        assert!((position.latitude - 34.0522).abs() < 0.001);
    }

    #[tokio::test]
    async fn control_route_runs_scan_lifecycle() {
        let routes = bridge().routes();
        let started = warp::test::request()
            .method("POST")
            .path("/control")
            .json(&json!({ "command": "START_SCAN" }))
            .reply(&routes)
            .await;
        assert_eq!(started.status(), StatusCode::OK);

        let stopped = warp::test::request()
            .method("POST")
            .path("/control")
            .json(&json!({ "command": "STOP_SCAN", "payload": null }))
            .reply(&routes)
            .await;
        let body: Value = serde_json::from_slice(stopped.body()).unwrap();
        assert_eq!(body["status"], "stopped");
        assert!(body["report"].is_string());

        let unknown = warp::test::request()
            .method("POST")
            .path("/control")
            .json(&json!({ "command": "DANCE" }))
            .reply(&routes)
            .await;
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn detect_route_accepts_multipart_jpeg() {
        let routes = bridge().routes();
        let (content_type, body) = multipart_body("image", &test_jpeg());
        let response = warp::test::request()
            .method("POST")
            .path("/detect")
            .header("content-type", content_type)
            .body(body)
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let parsed: Value = serde_json::from_slice(response.body()).unwrap();
        assert!(parsed["detections"].is_array());
    }

    #[tokio::test]
    async fn detect_route_rejects_missing_or_bad_image() {
        let routes = bridge().routes();

        let (content_type, body) = multipart_body("photo", &test_jpeg());
        let missing = warp::test::request()
            .method("POST")
            .path("/detect")
            .header("content-type", content_type)
            .body(body)
            .reply(&routes)
            .await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let (content_type, body) = multipart_body("image", b"not a jpeg");
        let invalid = warp::test::request()
            .method("POST")
            .path("/detect")
            .header("content-type", content_type)
            .body(body)
            .reply(&routes)
            .await;
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let routes = bridge().routes();
        let response = warp::test::request().path("/").reply(&routes).await;
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "online");
    }

    #[tokio::test]
    async fn video_feed_emits_jpeg_parts() {
        use futures_util::StreamExt;

        let feed = FeedSettings {
            width: 16,
            height: 16,
            period: Duration::from_millis(1),
        };
        let mut stream = Box::pin(mjpeg_stream(feed));
        let chunk = stream.next().await.unwrap().unwrap();
        assert!(chunk.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8"));
    }
}
