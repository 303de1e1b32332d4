//! Capture sources: live camera decode and manual photo capture
//!
//! The camera is driven through the [`DecoderDevice`] capability so the
//! lifecycle can run without real hardware. [`CameraCapture`] owns the
//! device stream exclusively while streaming; the stream is released by
//! dropping its [`ActiveStream`] guard, so every exit path (disable, mode
//! switch, device failure, teardown) stops the device exactly once.

use async_trait::async_trait;
use fieldguide_common::events::{CameraState, EventBus, IntakeEvent};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Camera unavailable, denied or failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DeviceError(pub String);

/// Which camera to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Rear camera
    #[default]
    Environment,
    User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraConstraints {
    pub facing: Facing,
}

/// Opaque handle for one started device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

/// Output of a running decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// Raw decoded text (not yet parsed)
    Decoded(String),
    /// Device failed mid-stream
    Failed(String),
}

pub type DecodeSink = mpsc::UnboundedSender<DecodeEvent>;

/// Camera + decoder capability
#[async_trait]
pub trait DecoderDevice: Send + Sync {
    /// Acquire the device and attach a decoder feeding `sink`
    async fn start(
        &self,
        constraints: &CameraConstraints,
        sink: DecodeSink,
    ) -> Result<StreamHandle, DeviceError>;

    /// Release the stream and decoder behind `handle`
    fn stop(&self, handle: StreamHandle);
}

/// Started device stream; stops the device when dropped
struct ActiveStream {
    device: Arc<dyn DecoderDevice>,
    handle: StreamHandle,
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        debug!(handle = self.handle.0, "Releasing camera stream");
        self.device.stop(self.handle);
    }
}

/// Camera lifecycle: `Idle → Starting → Streaming`, with `Error` on failure
pub struct CameraCapture {
    device: Arc<dyn DecoderDevice>,
    constraints: CameraConstraints,
    state: CameraState,
    stream: Option<ActiveStream>,
    events: EventBus,
}

impl CameraCapture {
    pub fn new(device: Arc<dyn DecoderDevice>, events: EventBus) -> Self {
        Self {
            device,
            constraints: CameraConstraints::default(),
            state: CameraState::Idle,
            stream: None,
            events,
        }
    }

    pub fn with_constraints(mut self, constraints: CameraConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Start streaming
    ///
    /// Returns the decode receiver for a newly started stream, `None` when the
    /// camera is already starting or streaming. A failed start leaves the
    /// camera in `Error`.
    pub async fn enable(&mut self) -> Result<Option<mpsc::UnboundedReceiver<DecodeEvent>>, DeviceError> {
        match self.state {
            CameraState::Starting | CameraState::Streaming => return Ok(None),
            CameraState::Error => self.transition(CameraState::Idle),
            CameraState::Idle => {}
        }

        self.transition(CameraState::Starting);
        let (tx, rx) = mpsc::unbounded_channel();

        match self.device.start(&self.constraints, tx).await {
            Ok(handle) => {
                self.stream = Some(ActiveStream {
                    device: Arc::clone(&self.device),
                    handle,
                });
                self.transition(CameraState::Streaming);
                Ok(Some(rx))
            }
            Err(e) => {
                warn!(error = %e, "Camera start failed");
                self.transition(CameraState::Error);
                Err(e)
            }
        }
    }

    /// Release the stream and return to `Idle`
    pub fn disable(&mut self) {
        self.stream.take();
        if self.state != CameraState::Idle {
            self.transition(CameraState::Idle);
        }
    }

    /// Device failure while starting or streaming: release and move to `Error`
    pub fn fail(&mut self, message: &str) {
        if self.state == CameraState::Idle {
            return;
        }
        warn!(error = message, "Camera failed");
        self.stream.take();
        if self.state != CameraState::Error {
            self.transition(CameraState::Error);
        }
    }

    fn transition(&mut self, new_state: CameraState) {
        let old_state = self.state;
        self.state = new_state;
        info!(old = %old_state, new = %new_state, "Camera state changed");
        self.events.emit_lossy(IntakeEvent::CameraStateChanged {
            old_state,
            new_state,
            timestamp: fieldguide_common::time::now(),
        });
    }
}

/// Decoder fed from outside the process
///
/// Decoded text is pushed in through [`FeedDevice::feed`] (the `/scan/decode`
/// route does this); it only reaches the intake pipeline while a stream is
/// started. One stream at a time.
#[derive(Default)]
pub struct FeedDevice {
    inner: Mutex<FeedState>,
}

#[derive(Default)]
struct FeedState {
    next_handle: u64,
    active: Option<(StreamHandle, DecodeSink)>,
}

impl FeedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Push decoded text; `false` when no stream is running
    pub fn feed(&self, text: &str) -> bool {
        self.send(DecodeEvent::Decoded(text.to_string()))
    }

    /// Report a device failure to the running stream
    pub fn report_failure(&self, message: &str) -> bool {
        self.send(DecodeEvent::Failed(message.to_string()))
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().active.is_some()
    }

    fn send(&self, event: DecodeEvent) -> bool {
        let state = self.lock();
        match &state.active {
            Some((_, sink)) => sink.send(event).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl DecoderDevice for FeedDevice {
    async fn start(
        &self,
        _constraints: &CameraConstraints,
        sink: DecodeSink,
    ) -> Result<StreamHandle, DeviceError> {
        let mut state = self.lock();
        if state.active.is_some() {
            return Err(DeviceError("Camera is already in use.".to_string()));
        }
        state.next_handle += 1;
        let handle = StreamHandle(state.next_handle);
        state.active = Some((handle, sink));
        Ok(handle)
    }

    fn stop(&self, handle: StreamHandle) {
        let mut state = self.lock();
        if matches!(state.active, Some((active, _)) if active == handle) {
            state.active = None;
        }
    }
}

/// Input mode of the intake screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    #[default]
    Scan,
    Manual,
}

/// Locally held ticket photo awaiting upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePhoto {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl CapturePhoto {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// File extension for the stored object
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "image/heic" => "heic",
            _ => "bin",
        }
    }
}

/// Single-owner slot for the manual-entry photo
#[derive(Debug, Default)]
pub struct PhotoSlot {
    current: Option<CapturePhoto>,
}

impl PhotoSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `photo`, releasing any previous one
    pub fn acquire(&mut self, photo: CapturePhoto) {
        if let Some(previous) = self.current.replace(photo) {
            debug!(bytes = previous.bytes.len(), "Released previous photo");
        }
    }

    pub fn current(&self) -> Option<&CapturePhoto> {
        self.current.as_ref()
    }

    pub fn release(&mut self) -> Option<CapturePhoto> {
        self.current.take()
    }
}
