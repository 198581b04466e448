//! Session runner thread
//!
//! The runner owns the stepping loop: each tick it drains the host event
//! queue, applies every event to the [`Session`], then runs however many
//! frames are due for the cartridge's region.

use crate::controller::Session;
use crate::events::{
    create_event_queue, AckSender, BridgeHandle, EventReceiver, HostEvent, Notification,
};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use lb_core::config::SessionConfig;
use lb_core::{BridgeError, SessionError};
use lb_engine::Region;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Most frames run in a single tick after a stall
const MAX_CATCH_UP_FRAMES: u32 = 4;

/// A frame is due this much before its deadline
const FRAME_SLACK: Duration = Duration::from_millis(2);

/// Accumulates wall time and converts it into due frames
#[derive(Debug, Clone)]
pub struct FramePacer {
    frame: Duration,
    last: Instant,
    accumulated: Duration,
}

impl FramePacer {
    pub fn new(region: Region) -> Self {
        Self {
            frame: region.frame_duration(),
            last: Instant::now(),
            accumulated: Duration::ZERO,
        }
    }

    pub fn set_region(&mut self, region: Region) {
        self.frame = region.frame_duration();
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame
    }

    /// Forget accumulated time so a resume does not burst frames
    pub fn reset(&mut self) {
        self.last = Instant::now();
        self.accumulated = Duration::ZERO;
    }

    /// Frames due at `now`
    pub fn due_frames(&mut self, now: Instant) -> u32 {
        self.accumulated += now.saturating_duration_since(self.last);
        self.last = now;

        let mut due = 0;
        while self.accumulated + FRAME_SLACK >= self.frame {
            self.accumulated = self.accumulated.saturating_sub(self.frame);
            due += 1;
            if due == MAX_CATCH_UP_FRAMES {
                self.accumulated = Duration::ZERO;
                break;
            }
        }
        due
    }
}

/// Drives one session from its event queue
pub struct SessionRunner {
    session: Arc<Session>,
    events: EventReceiver,
    notifications: Sender<Notification>,
    /// ROM requested before any surface was bound
    pending_rom: Option<String>,
    /// Destroy acknowledgement held until `finish` retries the shutdown
    destroy_ack: Option<AckSender>,
    pacer: FramePacer,
    idle_tick: Duration,
    frames: u64,
}

impl SessionRunner {
    pub fn new(
        session: Arc<Session>,
        events: EventReceiver,
        config: &SessionConfig,
    ) -> (Self, Receiver<Notification>) {
        let (notifications, receiver) = channel::unbounded();
        let runner = Self {
            session,
            events,
            notifications,
            pending_rom: None,
            destroy_ack: None,
            pacer: FramePacer::new(Region::default()),
            idle_tick: config.idle_tick(),
            frames: 0,
        };
        (runner, receiver)
    }

    /// Start a runner thread for `session`
    pub fn spawn(
        session: Arc<Session>,
        config: &SessionConfig,
    ) -> io::Result<(BridgeHandle, RunnerHandle)> {
        let (bridge, events) = create_event_queue(config);
        let (runner, notifications) = Self::new(session, events, config);

        let thread = thread::Builder::new()
            .name("lb-session".to_string())
            .spawn(move || runner.run())?;

        Ok((
            bridge,
            RunnerHandle {
                thread,
                notifications,
            },
        ))
    }

    /// Run until the session is destroyed or every handle is gone
    pub fn run(mut self) {
        tracing::info!("Session runner started");
        while self.tick() {}
        self.finish();
    }

    /// One loop iteration. Returns false once the runner should stop.
    pub fn tick(&mut self) -> bool {
        let first = match self.events.recv_timeout(self.idle_tick) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("Every bridge handle dropped");
                return false;
            }
        };

        let mut events = first.into_iter().chain(self.events.drain());
        while let Some(event) = events.next() {
            if !self.dispatch(event) {
                let dropped = events.count();
                if dropped > 0 {
                    tracing::debug!("Dropped {} events queued behind destroy", dropped);
                }
                return false;
            }
        }

        self.step()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn pending_rom(&self) -> Option<&str> {
        self.pending_rom.as_deref()
    }

    /// Run due frames; false once the session is closed
    fn step(&mut self) -> bool {
        let due = self.pacer.due_frames(Instant::now());
        for _ in 0..due {
            match self.session.step_frame() {
                Ok(0) => {
                    self.pacer.reset();
                    break;
                }
                Ok(frames) => self.frames += u64::from(frames),
                Err(SessionError::SessionClosed) => {
                    tracing::info!("Session closed outside the event queue");
                    return false;
                }
                Err(e) => {
                    tracing::debug!("Frame step skipped: {}", e);
                    break;
                }
            }
        }
        true
    }

    /// Apply one event; false after destroy
    fn dispatch(&mut self, event: HostEvent) -> bool {
        let name = event.name();
        let result: lb_core::Result<()> = match event {
            HostEvent::SurfaceCreated => self.session.on_surface_created().map_err(Into::into),
            HostEvent::SurfaceChanged { width, height } => {
                let result = self.session.on_surface_changed(width, height);
                if result.is_ok() {
                    self.load_pending_rom();
                }
                result.map_err(Into::into)
            }
            HostEvent::SurfaceDestroyed => {
                self.session.on_surface_destroyed().map_err(Into::into)
            }
            HostEvent::Touch { action, x, y } => {
                self.session.touch(action, x, y).map_err(Into::into)
            }
            HostEvent::Button { index, pressed } => self
                .session
                .button(index, pressed)
                .map(|_| ())
                .map_err(Into::into),
            HostEvent::LoadRom { identifier } => {
                if self.awaits_surface() {
                    tracing::info!("ROM '{}' queued until a surface is bound", identifier);
                    self.pending_rom = Some(identifier);
                    Ok(())
                } else {
                    self.load_rom(&identifier)
                }
            }
            HostEvent::Pause { ack } => {
                let result = self.session.on_host_pause();
                if let Some(ack) = ack {
                    let _ = ack.send(result.clone());
                }
                result.map_err(Into::into)
            }
            HostEvent::Resume => {
                self.pacer.reset();
                self.session.on_host_resume().map_err(Into::into)
            }
            HostEvent::TogglePause => match self.session.toggle_user_pause() {
                Ok(paused) => {
                    self.pacer.reset();
                    self.notify(Notification::info(if paused { "Paused" } else { "Resumed" }));
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
            HostEvent::Reset => self.session.reset().map_err(Into::into),
            HostEvent::FastForward(enabled) => {
                self.session.set_fast_forward(enabled).map_err(Into::into)
            }
            HostEvent::SaveState => self
                .session
                .save_state()
                .map(|()| self.notify(Notification::info("State saved"))),
            HostEvent::LoadState => self
                .session
                .load_state()
                .map(|()| self.notify(Notification::info("State loaded"))),
            HostEvent::Destroy { ack } => {
                self.events.close();
                match self.session.on_destroy() {
                    Ok(()) | Err(SessionError::SessionClosed) => {
                        if let Some(ack) = ack {
                            let _ = ack.send(Ok(()));
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Destroy failed, retrying on exit: {}", e);
                        self.destroy_ack = ack;
                    }
                }
                return false;
            }
        };

        self.report(name, result);
        true
    }

    fn load_rom(&mut self, identifier: &str) -> lb_core::Result<()> {
        let region = self.session.load_rom(identifier)?;
        self.pacer.set_region(region);
        self.pacer.reset();
        self.notify(Notification::info(format!("Loaded {}", identifier)));
        Ok(())
    }

    /// No surface has been bound yet and no cartridge is loaded
    fn awaits_surface(&self) -> bool {
        let state = self.session.state();
        if state.accepts_requests() || state.is_destroyed() {
            return false;
        }
        matches!(self.session.loaded_rom(), Ok(None))
    }

    fn load_pending_rom(&mut self) {
        if !self.session.state().accepts_requests() {
            return;
        }
        if let Some(identifier) = self.pending_rom.take() {
            let result = self.load_rom(&identifier);
            self.report("load_rom", result);
        }
    }

    /// User-visible failures become notifications; lifecycle races are
    /// only logged.
    fn report(&self, event: &'static str, result: lb_core::Result<()>) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_user_visible() => {
                tracing::error!("'{}' failed: {}", event, e);
                self.notify(Notification::error(e.to_string()));
            }
            Err(e) => tracing::debug!("'{}' dropped: {}", event, e),
        }
    }

    fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            tracing::trace!("Notification receiver gone");
        }
    }

    fn finish(mut self) {
        self.events.close();
        let result = if self.session.state().is_destroyed() {
            Ok(())
        } else {
            match self.session.on_destroy() {
                Err(SessionError::SessionClosed) => Ok(()),
                result => result,
            }
        };
        if let Some(ack) = self.destroy_ack.take() {
            let _ = ack.send(result.clone());
        }
        self.report("destroy", result.map_err(BridgeError::from));
        tracing::info!("Session runner stopped after {} frames", self.frames);
    }
}

/// Owner of a spawned runner thread
#[derive(Debug)]
pub struct RunnerHandle {
    thread: JoinHandle<()>,
    notifications: Receiver<Notification>,
}

impl RunnerHandle {
    /// Notifications produced since the last call
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.try_iter().collect()
    }

    pub fn notification_receiver(&self) -> &Receiver<Notification> {
        &self.notifications
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the runner to exit and collect outstanding notifications
    pub fn join(self) -> Vec<Notification> {
        if self.thread.join().is_err() {
            tracing::error!("Session runner panicked");
        }
        self.notifications.try_iter().collect()
    }
}
