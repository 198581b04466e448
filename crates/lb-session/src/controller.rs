//! Session controller
//!
//! One [`Session`] owns one engine. Host lifecycle callbacks, input and
//! requests may arrive from any thread; every state change and the engine
//! call it implies happen under a single lock, so the engine never sees two
//! calls at once and never sees anything after `shutdown`.
//!
//! Lifecycle:
//!
//! ```text
//! Created --surface--> SurfaceBound --resume--> Running
//! Running --pause--> Paused --resume--> Running
//! any live state --surface destroyed--> SurfaceLost --surface--> SurfaceBound
//! any live state --destroy--> Destroyed
//! ```

use crate::battery::SaveStore;
use crate::input::{InputRouter, TouchAction};
use crate::rom::{ByteSource, RomLoader};
use crate::snapshot::{SnapshotController, SnapshotOutcome};
use crate::surface::{SurfaceBinding, SurfaceChange};
use lb_core::{Config, Result, SessionError, SessionState};
use lb_engine::{
    ButtonId, EmulationEngine, EngineHandle, InputState, Region, RomImage, SnapshotDirection,
    SurfaceDescriptor,
};
use parking_lot::{Mutex, MutexGuard};
use std::io::Read;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a lifecycle or input operation
pub type SessionResult<T = ()> = std::result::Result<T, SessionError>;

/// Frames stepped per tick while fast-forward is on
const FAST_FORWARD_FRAMES: u32 = 2;

struct SessionInner {
    state: SessionState,
    engine: EngineHandle,
    surface: SurfaceBinding,
    input: InputRouter,
    snapshots: SnapshotController,
    /// Host is in the foreground
    host_active: bool,
    /// User asked for a pause from inside the session
    user_paused: bool,
    /// Identifier of the loaded ROM
    rom: Option<String>,
}

impl SessionInner {
    fn ensure_open(&self) -> SessionResult {
        if self.state.is_destroyed() {
            return Err(SessionError::SessionClosed);
        }
        Ok(())
    }

    fn ensure_accepts(&self, event: &'static str) -> SessionResult {
        self.ensure_open()?;
        if !self.state.accepts_requests() {
            debug!("Dropping '{}' in state {}", event, self.state);
            return Err(SessionError::illegal(event, self.state));
        }
        Ok(())
    }
}

/// Lifecycle controller for one emulation session
pub struct Session {
    inner: Mutex<SessionInner>,
    /// Copy of `inner.state` readable without the lock
    published: AtomicU8,
    loader: RomLoader,
    saves: Option<SaveStore>,
    lock_timeout: Duration,
}

impl Session {
    /// Create a session around an engine handle
    pub fn new(engine: EngineHandle, source: Arc<dyn ByteSource>, config: &Config) -> Self {
        let saves = config
            .paths
            .battery_saves
            .then(|| SaveStore::new(config.paths.save_dir.clone()));

        info!("Session created (start paused: {})", config.general.start_paused);
        Self {
            inner: Mutex::new(SessionInner {
                state: SessionState::Created,
                engine,
                surface: SurfaceBinding::new(),
                input: InputRouter::new(),
                snapshots: SnapshotController::new(),
                host_active: true,
                user_paused: config.general.start_paused,
                rom: None,
            }),
            published: AtomicU8::new(encode(SessionState::Created)),
            loader: RomLoader::new(source, &config.rom),
            saves,
            lock_timeout: config.session.lock_timeout(),
        }
    }

    /// Wrap `engine` in a handle and create a session around it.
    ///
    /// Fails with [`SessionError::NotInitialized`] before the engine
    /// runtime is initialized.
    pub fn create<E: EmulationEngine + 'static>(
        engine: E,
        source: Arc<dyn ByteSource>,
        config: &Config,
    ) -> SessionResult<Self> {
        Ok(Self::new(EngineHandle::create(engine)?, source, config))
    }

    fn lock(&self, event: &'static str) -> SessionResult<MutexGuard<'_, SessionInner>> {
        self.inner.try_lock_for(self.lock_timeout).ok_or_else(|| {
            warn!("'{}' timed out waiting for the session lock", event);
            SessionError::Timeout(event)
        })
    }

    fn transition(&self, inner: &mut SessionInner, next: SessionState) {
        if inner.state != next {
            info!("Session {} -> {}", inner.state, next);
            inner.state = next;
            self.published.store(encode(next), Ordering::Release);
        }
    }

    /// Start stepping if every precondition holds
    fn promote(&self, inner: &mut SessionInner) -> SessionResult {
        if inner.state == SessionState::SurfaceBound
            && inner.surface.is_bound()
            && inner.host_active
            && !inner.user_paused
        {
            inner.engine.resume()?;
            self.transition(inner, SessionState::Running);
        }
        Ok(())
    }

    fn lose_surface(&self, inner: &mut SessionInner) -> SessionResult {
        inner.surface.release(&mut inner.engine)?;
        self.transition(inner, SessionState::SurfaceLost);
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        decode(self.published.load(Ordering::Acquire))
    }

    // Host lifecycle

    pub fn on_surface_created(&self) -> SessionResult {
        let mut guard = self.lock("surface_created")?;
        guard.ensure_open()?;
        guard.surface.mark_created();
        debug!("Surface created in state {}", guard.state);
        Ok(())
    }

    /// Bind or resize the render surface.
    ///
    /// A non-positive dimension is handled as a surface loss. While running
    /// the engine is resized in place.
    pub fn on_surface_changed(&self, width: i32, height: i32) -> SessionResult {
        let mut guard = self.lock("surface_changed")?;
        let inner = &mut *guard;
        inner.ensure_open()?;

        match inner.surface.resize(&mut inner.engine, width, height)? {
            SurfaceChange::Released => {
                self.transition(inner, SessionState::SurfaceLost);
            }
            SurfaceChange::Bound(descriptor) => {
                debug!("Surface bound at {}x{}", descriptor.width, descriptor.height);
                if inner.state != SessionState::Running {
                    self.transition(inner, SessionState::SurfaceBound);
                }
                self.promote(inner)?;
            }
        }
        Ok(())
    }

    pub fn on_surface_destroyed(&self) -> SessionResult {
        let mut guard = self.lock("surface_destroyed")?;
        let inner = &mut *guard;
        inner.ensure_open()?;
        self.lose_surface(inner)
    }

    /// Host moved to the background
    pub fn on_host_pause(&self) -> SessionResult {
        let mut guard = self.lock("host_pause")?;
        let inner = &mut *guard;
        inner.ensure_open()?;
        inner.host_active = false;

        match inner.state {
            SessionState::Running | SessionState::SurfaceBound => {
                inner.engine.pause()?;
                self.transition(inner, SessionState::Paused);
            }
            state => debug!("Host pause in state {}", state),
        }
        Ok(())
    }

    /// Host returned to the foreground
    pub fn on_host_resume(&self) -> SessionResult {
        let mut guard = self.lock("host_resume")?;
        let inner = &mut *guard;
        inner.ensure_open()?;
        inner.host_active = true;

        match inner.state {
            SessionState::Paused if inner.surface.is_bound() && !inner.user_paused => {
                inner.engine.resume()?;
                self.transition(inner, SessionState::Running);
            }
            SessionState::Paused => {
                debug!("Host resumed; staying paused (user pause: {})", inner.user_paused);
            }
            SessionState::SurfaceBound => self.promote(inner)?,
            state => debug!("Host resume in state {}", state),
        }
        Ok(())
    }

    /// Flip the user pause flag; returns the new value.
    ///
    /// A user pause outlives host resumes until toggled off again.
    pub fn toggle_user_pause(&self) -> SessionResult<bool> {
        let mut guard = self.lock("toggle_pause")?;
        let inner = &mut *guard;
        inner.ensure_accepts("toggle_pause")?;
        inner.user_paused = !inner.user_paused;

        if inner.user_paused {
            if matches!(inner.state, SessionState::Running | SessionState::SurfaceBound) {
                inner.engine.pause()?;
                self.transition(inner, SessionState::Paused);
            }
        } else {
            match inner.state {
                SessionState::Paused if inner.host_active && inner.surface.is_bound() => {
                    inner.engine.resume()?;
                    self.transition(inner, SessionState::Running);
                }
                SessionState::SurfaceBound => self.promote(inner)?,
                _ => {}
            }
        }

        info!("User pause {}", if inner.user_paused { "on" } else { "off" });
        Ok(inner.user_paused)
    }

    /// Shut the engine down. Terminal; a second call fails.
    pub fn on_destroy(&self) -> SessionResult {
        let mut guard = self.lock("destroy")?;
        let inner = &mut *guard;
        inner.ensure_open()?;

        self.persist_battery(inner);
        inner.engine.shutdown();
        self.transition(inner, SessionState::Destroyed);
        Ok(())
    }

    // Requests

    pub fn reset(&self) -> SessionResult {
        let mut guard = self.lock("reset")?;
        guard.ensure_accepts("reset")?;
        guard.engine.reset()?;
        info!("Cartridge reset");
        Ok(())
    }

    pub fn set_fast_forward(&self, enabled: bool) -> SessionResult {
        let mut guard = self.lock("fast_forward")?;
        let inner = &mut *guard;
        inner.ensure_accepts("fast_forward")?;
        inner.input.set_fast_forward(&mut inner.engine, enabled)
    }

    /// Forward an on-screen button change by host index
    pub fn button(&self, index: i32, pressed: bool) -> SessionResult<ButtonId> {
        let mut guard = self.lock("button")?;
        let inner = &mut *guard;
        inner.ensure_accepts("button")?;
        inner.input.button(&mut inner.engine, index, pressed)
    }

    pub fn touch(&self, action: TouchAction, x: f32, y: f32) -> SessionResult {
        let mut guard = self.lock("touch")?;
        let inner = &mut *guard;
        inner.ensure_accepts("touch")?;
        inner.input.touch(&mut inner.engine, action, x, y)
    }

    pub fn save_state(&self) -> Result<()> {
        self.snapshot(SnapshotDirection::Save)
    }

    pub fn load_state(&self) -> Result<()> {
        self.snapshot(SnapshotDirection::Load)
    }

    fn snapshot(&self, direction: SnapshotDirection) -> Result<()> {
        let event = match direction {
            SnapshotDirection::Save => "save_state",
            SnapshotDirection::Load => "load_state",
        };
        let mut guard = self.lock(event)?;
        let inner = &mut *guard;
        inner.ensure_accepts(event)?;
        inner.snapshots.request(&mut inner.engine, direction)
    }

    /// Read a ROM through the byte source and hand it to the engine.
    ///
    /// The image is read without holding the session lock. Returns the
    /// cartridge's video region.
    pub fn load_rom(&self, identifier: &str) -> Result<Region> {
        self.lock("load_rom")?.ensure_accepts("load_rom")?;
        let image = self.loader.open(identifier)?;
        self.install_rom(image)
    }

    /// Like [`Session::load_rom`] with an already opened reader
    pub fn load_rom_from(&self, reader: impl Read, identifier: &str) -> Result<Region> {
        self.lock("load_rom")?.ensure_accepts("load_rom")?;
        let image = self.loader.load(reader, identifier)?;
        self.install_rom(image)
    }

    fn install_rom(&self, image: RomImage) -> Result<Region> {
        let mut guard = self.lock("load_rom")?;
        let inner = &mut *guard;
        inner.ensure_accepts("load_rom")?;

        self.persist_battery(inner);

        let identifier = image.source().to_string();
        let size = image.len();
        let region = inner.engine.load_rom(image)?;
        inner.rom = Some(identifier.clone());
        self.restore_battery(inner, &identifier);

        info!("Loaded ROM '{}' ({} bytes, {:?})", identifier, size, region);
        Ok(region)
    }

    fn persist_battery(&self, inner: &mut SessionInner) {
        let (Some(store), Some(rom)) = (&self.saves, inner.rom.as_deref()) else {
            return;
        };
        match inner.engine.battery_save() {
            Ok(Some(data)) => match store.store(rom, &data) {
                Ok(path) => info!("Saved battery RAM to {}", path.display()),
                Err(e) => warn!("Failed to save battery RAM for '{}': {}", rom, e),
            },
            Ok(None) => {}
            Err(e) => debug!("Battery save skipped: {}", e),
        }
    }

    fn restore_battery(&self, inner: &mut SessionInner, rom: &str) {
        let Some(store) = &self.saves else {
            return;
        };
        match store.load(rom) {
            Ok(Some(data)) => match inner.engine.battery_load(&data) {
                Ok(true) => info!("Restored battery RAM for '{}'", rom),
                Ok(false) => warn!("Engine rejected battery RAM for '{}'", rom),
                Err(e) => debug!("Battery restore skipped: {}", e),
            },
            Ok(None) => {}
            Err(e) => warn!("Failed to read battery RAM for '{}': {}", rom, e),
        }
    }

    /// Emulate one tick. Returns the number of frames run, zero unless
    /// running with a ROM loaded. Fails once the session is destroyed.
    pub fn step_frame(&self) -> SessionResult<u32> {
        let mut guard = self.lock("step_frame")?;
        let inner = &mut *guard;
        inner.ensure_open()?;
        if inner.state != SessionState::Running || !inner.engine.rom_loaded() {
            return Ok(0);
        }

        let frames = if inner.input.fast_forward() {
            FAST_FORWARD_FRAMES
        } else {
            1
        };
        for _ in 0..frames {
            inner.engine.run_frame()?;
        }
        Ok(frames)
    }

    // Queries

    pub fn input_state(&self) -> SessionResult<InputState> {
        Ok(self.lock("input_state")?.input.state().clone())
    }

    pub fn surface(&self) -> SessionResult<Option<SurfaceDescriptor>> {
        Ok(self.lock("surface")?.surface.descriptor())
    }

    pub fn loaded_rom(&self) -> SessionResult<Option<String>> {
        Ok(self.lock("loaded_rom")?.rom.clone())
    }

    /// Video region of the loaded cartridge
    pub fn region(&self) -> SessionResult<Region> {
        Ok(self.lock("region")?.engine.region())
    }

    pub fn is_user_paused(&self) -> SessionResult<bool> {
        Ok(self.lock("user_paused")?.user_paused)
    }

    pub fn last_snapshot(&self) -> SessionResult<Option<SnapshotOutcome>> {
        Ok(self.lock("last_snapshot")?.snapshots.last().cloned())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("loader", &self.loader)
            .field("saves", &self.saves)
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

fn encode(state: SessionState) -> u8 {
    match state {
        SessionState::Created => 0,
        SessionState::SurfaceBound => 1,
        SessionState::Running => 2,
        SessionState::Paused => 3,
        SessionState::SurfaceLost => 4,
        SessionState::Destroyed => 5,
    }
}

fn decode(value: u8) -> SessionState {
    match value {
        0 => SessionState::Created,
        1 => SessionState::SurfaceBound,
        2 => SessionState::Running,
        3 => SessionState::Paused,
        4 => SessionState::SurfaceLost,
        _ => SessionState::Destroyed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::MemoryByteSource;
    use lb_core::BridgeError;
    use lb_engine::{runtime, CallLog, EngineCall, RecordingEngine};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.paths.battery_saves = false;
        config
    }

    fn create_session() -> (Session, CallLog, Arc<MemoryByteSource>) {
        lb_core::logging::init_for_tests();
        let _ = runtime::init();
        let (engine, log) = RecordingEngine::new();
        let source = Arc::new(MemoryByteSource::new());
        let session = Session::create(engine, source.clone(), &test_config()).unwrap();
        (session, log, source)
    }

    #[test]
    fn test_state_encoding() {
        for state in [
            SessionState::Created,
            SessionState::SurfaceBound,
            SessionState::Running,
            SessionState::Paused,
            SessionState::SurfaceLost,
            SessionState::Destroyed,
        ] {
            assert_eq!(decode(encode(state)), state);
        }
    }

    #[test]
    fn test_bind_promotes_to_running() {
        let (session, log, _) = create_session();
        assert_eq!(session.state(), SessionState::Created);

        session.on_surface_created().unwrap();
        session.on_surface_changed(256, 224).unwrap();

        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(
            log.calls(),
            vec![EngineCall::Resize { width: 256, height: 224 }, EngineCall::Resume]
        );
    }

    #[test]
    fn test_requests_rejected_before_surface() {
        let (session, log, _) = create_session();

        assert_eq!(
            session.button(4, true),
            Err(SessionError::illegal("button", SessionState::Created))
        );
        assert!(matches!(
            session.load_rom("game.sfc"),
            Err(BridgeError::Session(SessionError::IllegalStateTransition { .. }))
        ));
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_resize_while_running() {
        let (session, log, _) = create_session();
        session.on_surface_changed(256, 224).unwrap();
        session.on_surface_changed(512, 448).unwrap();

        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(log.count(|c| *c == EngineCall::Resume), 1);
        assert_eq!(session.surface().unwrap(), Some(SurfaceDescriptor::new(512, 448)));
    }

    #[test]
    fn test_start_paused() {
        let _ = runtime::init();
        let (engine, log) = RecordingEngine::new();
        let mut config = test_config();
        config.general.start_paused = true;
        let session = Session::create(engine, Arc::new(MemoryByteSource::new()), &config).unwrap();

        session.on_surface_changed(256, 224).unwrap();
        assert_eq!(session.state(), SessionState::SurfaceBound);
        assert!(!log.contains(&EngineCall::Resume));

        assert!(!session.toggle_user_pause().unwrap());
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn test_step_frame_requires_rom() {
        let (session, log, source) = create_session();
        session.on_surface_changed(256, 224).unwrap();
        assert_eq!(session.step_frame().unwrap(), 0);

        source.insert("game.sfc", vec![0u8; 0x8000]);
        session.load_rom("game.sfc").unwrap();
        assert_eq!(session.step_frame().unwrap(), 1);

        session.set_fast_forward(true).unwrap();
        assert_eq!(session.step_frame().unwrap(), 2);
        assert_eq!(log.count(|c| *c == EngineCall::RunFrame), 3);
    }

    #[test]
    fn test_destroy_twice() {
        let (session, log, _) = create_session();
        session.on_destroy().unwrap();
        assert_eq!(session.on_destroy(), Err(SessionError::SessionClosed));
        assert_eq!(session.on_surface_changed(10, 10), Err(SessionError::SessionClosed));
        assert_eq!(session.step_frame(), Err(SessionError::SessionClosed));
        assert_eq!(log.calls(), vec![EngineCall::Shutdown]);
    }
}
