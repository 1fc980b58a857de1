//! Local camera access for the inference dispatcher.
//!
//! A [`CaptureDevice`] hands out at most one open [`FrameSource`] at a time.
//! The dispatcher only ever holds a source through a [`CaptureHandle`], which
//! releases it exactly once however the capture loop exits.

use crate::prelude::CaptureError;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// One frame at the camera's native resolution, packed RGB8.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// An open camera stream.
pub trait FrameSource: Send {
    fn grab(&mut self) -> Result<CapturedFrame, CaptureError>;
    fn release(&mut self);
}

/// Opens camera streams. Implementations must refuse a second `open` while a
/// source is still held.
pub trait CaptureDevice: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError>;
}

/// Scoped ownership of an open source.
pub struct CaptureHandle {
    source: Option<Box<dyn FrameSource>>,
}

impl CaptureHandle {
    pub fn acquire(device: &dyn CaptureDevice) -> Result<Self, CaptureError> {
        let source = device.open()?;
        info!("capture device acquired");
        Ok(Self {
            source: Some(source),
        })
    }

    pub fn grab(&mut self) -> Result<CapturedFrame, CaptureError> {
        match self.source.as_mut() {
            Some(source) => source.grab(),
            None => Err(CaptureError::Unavailable("capture handle already released".into())),
        }
    }

    pub fn release(mut self) {
        self.release_source();
    }

    fn release_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.release();
            info!("capture device released");
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release_source();
    }
}

struct CameraState {
    in_use: AtomicBool,
    denied: AtomicBool,
    opened: AtomicUsize,
    released: AtomicUsize,
}

/// Test-pattern camera used when no hardware is attached, and by the tests.
#[derive(Clone)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    state: Arc<CameraState>,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            state: Arc::new(CameraState {
                in_use: AtomicBool::new(false),
                denied: AtomicBool::new(false),
                opened: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
            }),
        }
    }

    /// A camera whose permission prompt was declined.
    pub fn denied(width: u32, height: u32) -> Self {
        let camera = Self::new(width, height);
        camera.revoke();
        camera
    }

    /// Withdraws permission; open sources fail their next grab.
    pub fn revoke(&self) {
        self.state.denied.store(true, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn in_use(&self) -> bool {
        self.state.in_use.load(Ordering::SeqCst)
    }
}

impl CaptureDevice for SyntheticCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        if self.state.denied.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("camera access was declined".into()));
        }
        if self.state.in_use.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::Unavailable("camera already in use".into()));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticSource {
            width: self.width,
            height: self.height,
            state: self.state.clone(),
            frame_index: 0,
        }))
    }
}

struct SyntheticSource {
    width: u32,
    height: u32,
    state: Arc<CameraState>,
    frame_index: u32,
}

impl FrameSource for SyntheticSource {
    fn grab(&mut self) -> Result<CapturedFrame, CaptureError> {
        if self.state.denied.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("camera access revoked".into()));
        }

        let shift = self.frame_index.wrapping_mul(7);
        self.frame_index = self.frame_index.wrapping_add(1);

        let mut pixels = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                pixels.push((x.wrapping_add(shift) % 256) as u8);
                pixels.push((y.wrapping_add(shift) % 256) as u8);
                pixels.push(((x ^ y) % 256) as u8);
            }
        }

        debug!("synthetic frame {} grabbed", self.frame_index);
        Ok(CapturedFrame {
            width: self.width,
            height: self.height,
            pixels,
        })
    }

    fn release(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
        self.state.in_use.store(false, Ordering::SeqCst);
    }
}
