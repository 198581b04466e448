//! Host event queue
//!
//! Host callbacks may fire on any thread. [`BridgeHandle`] turns each one
//! into a [`HostEvent`] on a bounded queue that the session runner drains
//! once per tick. Only pause and destroy wait for the runner; every other
//! event returns as soon as it is queued.

use crate::input::TouchAction;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use lb_core::config::SessionConfig;
use lb_core::SessionError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of undelivered host events
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Completion of a synchronous host event, sent back by the runner
pub type AckSender = Sender<Result<(), SessionError>>;

/// Host event delivered to the session runner
#[derive(Debug)]
pub enum HostEvent {
    SurfaceCreated,
    SurfaceChanged { width: i32, height: i32 },
    SurfaceDestroyed,
    Touch { action: TouchAction, x: f32, y: f32 },
    Button { index: i32, pressed: bool },
    LoadRom { identifier: String },
    /// Host moved to the background; `ack` carries the outcome, and `Ok`
    /// means stepping has stopped
    Pause { ack: Option<AckSender> },
    Resume,
    TogglePause,
    Reset,
    FastForward(bool),
    SaveState,
    LoadState,
    /// Shut the session down; `ack` carries `Ok` once the engine is gone
    Destroy { ack: Option<AckSender> },
}

impl HostEvent {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::SurfaceCreated => "surface_created",
            Self::SurfaceChanged { .. } => "surface_changed",
            Self::SurfaceDestroyed => "surface_destroyed",
            Self::Touch { .. } => "touch",
            Self::Button { .. } => "button",
            Self::LoadRom { .. } => "load_rom",
            Self::Pause { .. } => "host_pause",
            Self::Resume => "host_resume",
            Self::TogglePause => "toggle_pause",
            Self::Reset => "reset",
            Self::FastForward(_) => "fast_forward",
            Self::SaveState => "save_state",
            Self::LoadState => "load_state",
            Self::Destroy { .. } => "destroy",
        }
    }
}

/// Severity of a host-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Transient message for the host to show the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Host-side sender of session events
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    sender: Sender<HostEvent>,
    closed: Arc<AtomicBool>,
    pause_timeout: Duration,
    /// Bound for queueing and for the destroy acknowledgement
    ack_timeout: Duration,
}

impl BridgeHandle {
    fn send(&self, event: HostEvent) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            debug!("Dropping '{}': session closed", event.name());
            return Err(SessionError::SessionClosed);
        }
        let name = event.name();
        match self.sender.send_timeout(event, self.ack_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("Event queue full; dropping '{}'", name);
                Err(SessionError::Timeout(name))
            }
            Err(SendTimeoutError::Disconnected(_)) => Err(SessionError::SessionClosed),
        }
    }

    fn wait_ack(
        &self,
        name: &'static str,
        ack: Receiver<Result<(), SessionError>>,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        match ack.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("'{}' failed: {}", name, e);
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("'{}' not acknowledged within {:?}", name, timeout);
                Err(SessionError::Timeout(name))
            }
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::SessionClosed),
        }
    }

    pub fn notify_surface_created(&self) -> Result<(), SessionError> {
        self.send(HostEvent::SurfaceCreated)
    }

    pub fn notify_surface_changed(&self, width: i32, height: i32) -> Result<(), SessionError> {
        self.send(HostEvent::SurfaceChanged { width, height })
    }

    pub fn notify_surface_destroyed(&self) -> Result<(), SessionError> {
        self.send(HostEvent::SurfaceDestroyed)
    }

    pub fn notify_touch(&self, action: TouchAction, x: f32, y: f32) -> Result<(), SessionError> {
        self.send(HostEvent::Touch { action, x, y })
    }

    pub fn notify_button(&self, index: i32, pressed: bool) -> Result<(), SessionError> {
        self.send(HostEvent::Button { index, pressed })
    }

    /// Host moved to the background.
    ///
    /// Blocks until the runner has stopped stepping, at most the configured
    /// pause timeout. A pause the session could not apply is returned as
    /// the error it failed with.
    pub fn notify_pause(&self) -> Result<(), SessionError> {
        let (ack, done) = channel::bounded(1);
        self.send(HostEvent::Pause { ack: Some(ack) })?;
        self.wait_ack("host_pause", done, self.pause_timeout)
    }

    pub fn notify_resume(&self) -> Result<(), SessionError> {
        self.send(HostEvent::Resume)
    }

    /// Tear the session down and wait for the engine shutdown.
    ///
    /// Later requests on any clone of this handle fail immediately.
    pub fn notify_destroy(&self) -> Result<(), SessionError> {
        let (ack, done) = channel::bounded(1);
        self.send(HostEvent::Destroy { ack: Some(ack) })?;
        self.closed.store(true, Ordering::Release);
        self.wait_ack("destroy", done, self.ack_timeout)
    }

    pub fn request_load_rom(&self, identifier: impl Into<String>) -> Result<(), SessionError> {
        self.send(HostEvent::LoadRom {
            identifier: identifier.into(),
        })
    }

    pub fn request_toggle_pause(&self) -> Result<(), SessionError> {
        self.send(HostEvent::TogglePause)
    }

    pub fn request_reset(&self) -> Result<(), SessionError> {
        self.send(HostEvent::Reset)
    }

    pub fn request_fast_forward(&self, enabled: bool) -> Result<(), SessionError> {
        self.send(HostEvent::FastForward(enabled))
    }

    pub fn request_save_state(&self) -> Result<(), SessionError> {
        self.send(HostEvent::SaveState)
    }

    pub fn request_load_state(&self) -> Result<(), SessionError> {
        self.send(HostEvent::LoadState)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Runner-side end of the event queue
#[derive(Debug)]
pub struct EventReceiver {
    receiver: Receiver<HostEvent>,
    closed: Arc<AtomicBool>,
}

impl EventReceiver {
    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take every event queued so far
    pub fn drain(&self) -> Vec<HostEvent> {
        self.receiver.try_iter().collect()
    }

    /// Refuse further events from every handle
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

/// Create a connected handle/receiver pair
pub fn create_event_queue(config: &SessionConfig) -> (BridgeHandle, EventReceiver) {
    let (sender, receiver) = channel::bounded(EVENT_QUEUE_CAPACITY);
    let closed = Arc::new(AtomicBool::new(false));
    (
        BridgeHandle {
            sender,
            closed: closed.clone(),
            pause_timeout: config.pause_timeout(),
            ack_timeout: config.lock_timeout() * 2,
        },
        EventReceiver { receiver, closed },
    )
}
