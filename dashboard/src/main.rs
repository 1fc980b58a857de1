use anyhow::Context;
use args::Args;
use clap::Parser;
use fieldcore::inference::SyntheticCamera;
use fieldcore::{
    ClientConfig, LocalInferenceDispatcher, ModeChange, ModeSwitch, ProducerMode, SnapshotBus,
    TelemetryClient, TelemetrySnapshot,
};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::time::{self, MissedTickBehavior};
use view::DashboardView;

mod args;
mod view;

const CAMERA_WIDTH: u32 = 1280;
const CAMERA_HEIGHT: u32 = 720;
const STATUS_PERIOD: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading client config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(endpoint) = &args.endpoint {
        config = config.with_endpoint(endpoint.as_str());
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating dashboard runtime")?;
    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: ClientConfig) -> anyhow::Result<()> {
    let bus = SnapshotBus::new();
    let view = Arc::new(Mutex::new(DashboardView::new(args.target)));

    let view_for_bus = view.clone();
    let subscription = bus.subscribe(move |snapshot: &TelemetrySnapshot| {
        let mut view = lock(&view_for_bus);
        let advisory_before = view.advisory().map(str::to_string);
        view.update(snapshot);
        if let Some(advisory) = view.advisory() {
            if advisory_before.as_deref() != Some(advisory) {
                info!("advisory: {advisory}");
            }
        }
    });

    let camera = if args.deny_camera {
        SyntheticCamera::denied(CAMERA_WIDTH, CAMERA_HEIGHT)
    } else {
        SyntheticCamera::new(CAMERA_WIDTH, CAMERA_HEIGHT)
    };
    let mut switch = ModeSwitch::new(
        TelemetryClient::new(config.clone(), bus.clone()),
        LocalInferenceDispatcher::new(config, bus.clone(), Arc::new(camera)),
    );
    info!(
        "dashboard targeting {} (video feed {})",
        switch.remote().endpoint(),
        switch.remote().video_feed_url()
    );

    report_change(switch.select(ProducerMode::from(args.mode)).await);
    if args.start_scan {
        send_scan_toggle(&mut switch, true).await;
    }

    let deadline = async {
        match args.duration {
            Some(secs) => time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticker = time::interval(STATUS_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(err) = result {
                    warn!("ctrl-c handler failed: {err}");
                }
                break;
            }
            _ = &mut deadline => break,
            _ = ticker.tick() => {
                if let Some(change) = switch.supervise().await {
                    report_change(change);
                }
                let view = lock(&view);
                info!("[{}] {}", mode_label(switch.current()), view.status());
                for item in view.overlay() {
                    debug!("overlay {} {:?} {}", item.caption, item.rect, item.color);
                }
            }
        }
    }

    if switch.is_scanning() {
        send_scan_toggle(&mut switch, false).await;
    }
    switch.shutdown().await;
    subscription.unsubscribe();

    let view = lock(&view);
    println!(
        "Session -> snapshots {}, path points {}, remote {}, local {}",
        view.received(),
        view.path().len(),
        switch.remote().metrics().counts(),
        switch.local().metrics().counts()
    );
    if !view.history().is_empty() {
        println!("Recent detections:");
    }
    for entry in view.history() {
        println!("  {entry}");
    }
    if let Some(report) = view.report() {
        println!("Scan report:\n{report}");
    }
    let path = serde_json::to_string(&view.path()).context("serializing trajectory")?;
    info!("trajectory: {path}");
    Ok(())
}

async fn send_scan_toggle(switch: &mut ModeSwitch, enabled: bool) {
    if let Some(pending) = switch.set_scanning(enabled) {
        if let Err(err) = pending.await {
            warn!("scan command task failed to join: {err}");
        }
    }
}

fn report_change(change: ModeChange) {
    match change {
        ModeChange::Unchanged(mode) => info!("producer already {mode}"),
        ModeChange::Switched(mode) => info!("producer now {mode}"),
        ModeChange::FellBack { requested, reason } => {
            warn!("{requested} producer unavailable ({reason}); using remote feed")
        }
    }
}

fn mode_label(mode: Option<ProducerMode>) -> String {
    mode.map(|mode| mode.to_string())
        .unwrap_or_else(|| "idle".into())
}

fn lock(view: &Mutex<DashboardView>) -> MutexGuard<'_, DashboardView> {
    view.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
