use crate::client::{ScanCommand, TelemetryClient};
use crate::inference::LocalInferenceDispatcher;
use crate::prelude::{CaptureError, ProducerError, ProducerMode, SnapshotProducer};
use log::{info, warn};
use tokio::task::JoinHandle;

/// Outcome of a mode selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeChange {
    Unchanged(ProducerMode),
    Switched(ProducerMode),
    /// The requested producer could not start and the remote feed took over.
    FellBack {
        requested: ProducerMode,
        reason: CaptureError,
    },
}

/// Runs exactly one snapshot producer at a time, both feeding the same bus.
pub struct ModeSwitch {
    remote: TelemetryClient,
    local: LocalInferenceDispatcher,
    mode: Option<ProducerMode>,
    scanning: bool,
}

impl ModeSwitch {
    pub fn new(remote: TelemetryClient, local: LocalInferenceDispatcher) -> Self {
        Self {
            remote,
            local,
            mode: None,
            scanning: false,
        }
    }

    pub fn current(&self) -> Option<ProducerMode> {
        self.mode
    }

    pub fn remote(&self) -> &TelemetryClient {
        &self.remote
    }

    pub fn local(&self) -> &LocalInferenceDispatcher {
        &self.local
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub async fn select(&mut self, requested: ProducerMode) -> ModeChange {
        if self.mode == Some(requested) && self.is_running(requested) {
            return ModeChange::Unchanged(requested);
        }

        match requested {
            ProducerMode::Remote => {
                self.local.stop().await;
                start_logged(&mut self.remote).await;
            }
            ProducerMode::Local => {
                self.remote.stop().await;
                if let Err(ProducerError::Capture(reason)) = self.local.start().await {
                    return self.fall_back(requested, reason).await;
                }
            }
        }

        self.mode = Some(requested);
        info!("snapshot producer switched to {requested}");
        ModeChange::Switched(requested)
    }

    /// Falls back to the remote feed if the local capture loop died since the
    /// last check. Returns the change when one happened.
    pub async fn supervise(&mut self) -> Option<ModeChange> {
        if self.mode != Some(ProducerMode::Local) {
            return None;
        }
        match self.local.check_health().await {
            Ok(()) => None,
            Err(reason) => Some(self.fall_back(ProducerMode::Local, reason).await),
        }
    }

    /// Starts or stops a scan. Locally this gates frame submission; against
    /// the rover it sends the matching control command, whose task is returned.
    pub fn set_scanning(&mut self, enabled: bool) -> Option<JoinHandle<()>> {
        self.scanning = enabled;
        self.local.set_scanning(enabled);
        if self.mode != Some(ProducerMode::Remote) {
            return None;
        }
        let command = if enabled {
            ScanCommand::StartScan
        } else {
            ScanCommand::StopScan
        };
        Some(self.remote.send_scan_command(command))
    }

    pub async fn shutdown(&mut self) {
        self.local.stop().await;
        self.remote.stop().await;
        self.mode = None;
    }

    fn is_running(&self, mode: ProducerMode) -> bool {
        match mode {
            ProducerMode::Remote => self.remote.is_running(),
            ProducerMode::Local => self.local.is_running(),
        }
    }

    async fn fall_back(&mut self, requested: ProducerMode, reason: CaptureError) -> ModeChange {
        warn!("{requested} producer unavailable ({reason}); falling back to remote feed");
        self.local.stop().await;
        start_logged(&mut self.remote).await;
        self.mode = Some(ProducerMode::Remote);
        ModeChange::FellBack { requested, reason }
    }
}

async fn start_logged<P: SnapshotProducer>(producer: &mut P) {
    if let Err(err) = producer.start().await {
        warn!("{} producer failed to start: {err}", producer.mode());
    }
}
