//! Lifecycle tests for the session state machine

use lb_core::{BridgeError, Config, RomError, SessionError, SessionState};
use lb_engine::{runtime, ButtonId, CallLog, EngineCall, RecordingEngine, Region};
use lb_session::{MemoryByteSource, SaveStore, Session, TouchAction};
use std::sync::Arc;

fn test_config() -> Config {
    let mut config = Config::default();
    config.paths.battery_saves = false;
    config
}

fn create_session_with(engine: RecordingEngine, config: &Config) -> (Session, Arc<MemoryByteSource>) {
    lb_core::logging::init_for_tests();
    let _ = runtime::init();
    let source = Arc::new(MemoryByteSource::new());
    let session = Session::create(engine, source.clone(), config).unwrap();
    (session, source)
}

fn create_session() -> (Session, CallLog, Arc<MemoryByteSource>) {
    let (engine, log) = RecordingEngine::new();
    let (session, source) = create_session_with(engine, &test_config());
    (session, log, source)
}

/// Deterministic pseudo-random sequence for lifecycle fuzzing
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

fn apply_random_event(session: &Session, rng: &mut XorShift) {
    let _ = match rng.next() % 12 {
        0 => session.on_surface_created(),
        1 => session.on_surface_changed(256, 224),
        2 => session.on_surface_changed(0, 224),
        3 => session.on_surface_destroyed(),
        4 => session.on_host_pause(),
        5 => session.on_host_resume(),
        6 => session.toggle_user_pause().map(|_| ()),
        7 => session.button((rng.next() % 12) as i32, rng.next() % 2 == 0).map(|_| ()),
        8 => session.touch(TouchAction::Move, 1.0, 2.0),
        9 => session.reset(),
        10 => session.step_frame().map(|_| ()),
        _ => session.on_destroy(),
    };
}

#[test]
fn test_shutdown_once_and_last_for_any_sequence() {
    for seed in 1..200u64 {
        let (session, log, _source) = create_session();
        let mut rng = XorShift(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));

        for _ in 0..40 {
            apply_random_event(&session, &mut rng);
        }
        let _ = session.on_destroy();
        for _ in 0..10 {
            apply_random_event(&session, &mut rng);
        }

        let calls = log.calls();
        assert_eq!(
            calls.iter().filter(|c| **c == EngineCall::Shutdown).count(),
            1,
            "seed {seed}: {calls:?}"
        );
        assert_eq!(calls.last(), Some(&EngineCall::Shutdown), "seed {seed}");
        assert_eq!(session.state(), SessionState::Destroyed);
    }
}

#[test]
fn test_nothing_forwarded_after_destroy() {
    let (session, log, source) = create_session();
    source.insert("game.sfc", vec![0u8; 0x8000]);
    session.on_surface_changed(256, 224).unwrap();
    session.on_destroy().unwrap();
    let before = log.calls().len();

    assert_eq!(session.button(0, true), Err(SessionError::SessionClosed));
    assert_eq!(session.on_surface_changed(10, 10), Err(SessionError::SessionClosed));
    assert_eq!(session.on_host_resume(), Err(SessionError::SessionClosed));
    assert!(session.load_rom("game.sfc").unwrap_err().is_closed());
    assert!(session.save_state().unwrap_err().is_closed());
    assert_eq!(session.step_frame(), Err(SessionError::SessionClosed));

    assert_eq!(log.calls().len(), before);
}

#[test]
fn test_zero_area_resize_releases() {
    let (session, log, _source) = create_session();
    session.on_surface_changed(256, 224).unwrap();

    for (w, h) in [(0, 224), (256, 0), (-5, 100), (0, 0)] {
        session.on_surface_changed(w, h).unwrap();
        assert_eq!(session.state(), SessionState::SurfaceLost);
    }

    assert!(log
        .calls()
        .iter()
        .all(|c| !matches!(c, EngineCall::Resize { width, height } if *width == 0 || *height == 0)));
    assert_eq!(log.count(|c| *c == EngineCall::ReleaseSurface), 4);
}

#[test]
fn test_empty_rom_never_reaches_engine() {
    let (session, log, source) = create_session();
    source.insert("empty.sfc", Vec::new());
    session.on_surface_changed(256, 224).unwrap();

    let err = session.load_rom("empty.sfc").unwrap_err();
    assert!(matches!(err, BridgeError::Rom(RomError::Empty)));
    assert_eq!(log.count(|c| matches!(c, EngineCall::LoadRom { .. })), 0);
    assert_eq!(session.loaded_rom().unwrap(), None);
}

#[test]
fn test_load_rom_after_bind() {
    let (session, log, source) = create_session();
    source.insert("content://x", vec![0x5Au8; 512 * 1024]);

    session.on_surface_changed(256, 224).unwrap();
    let region = session.load_rom("content://x").unwrap();

    assert_eq!(region, Region::Ntsc);
    assert_eq!(
        log.count(|c| matches!(c, EngineCall::LoadRom { .. })),
        1
    );
    assert!(log.contains(&EngineCall::LoadRom {
        source: "content://x".to_string(),
        len: 512 * 1024,
    }));
    assert_eq!(session.loaded_rom().unwrap().as_deref(), Some("content://x"));
}

#[test]
fn test_pal_region_reported() {
    let (engine, _log) = RecordingEngine::new();
    let (session, source) = create_session_with(engine.with_region(Region::Pal), &test_config());
    source.insert("pal.sfc", vec![0u8; 0x8000]);
    session.on_surface_changed(256, 224).unwrap();

    assert_eq!(session.load_rom("pal.sfc").unwrap(), Region::Pal);
    assert_eq!(session.region().unwrap(), Region::Pal);
}

#[test]
fn test_button_forwarded_while_paused() {
    let (session, log, source) = create_session();
    source.insert("game.sfc", vec![0u8; 0x8000]);
    session.on_surface_changed(256, 224).unwrap();
    session.load_rom("game.sfc").unwrap();
    log.clear();

    session.on_host_pause().unwrap();
    assert_eq!(session.state(), SessionState::Paused);
    assert_eq!(session.button(0, true), Ok(ButtonId::Up));
    assert_eq!(session.step_frame(), Ok(0));
    assert!(session.input_state().unwrap().is_pressed(ButtonId::Up));

    session.on_host_resume().unwrap();
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(session.step_frame(), Ok(1));

    assert_eq!(
        log.calls(),
        vec![
            EngineCall::Pause,
            EngineCall::SetButton(ButtonId::Up, true),
            EngineCall::Resume,
            EngineCall::RunFrame,
        ]
    );
}

#[test]
fn test_button_dropped_after_surface_destroyed() {
    let (session, log, _source) = create_session();
    session.on_surface_changed(256, 224).unwrap();
    session.on_surface_destroyed().unwrap();

    let err = session.button(3, true).unwrap_err();
    assert_eq!(err, SessionError::illegal("button", SessionState::SurfaceLost));
    assert_eq!(log.count(|c| matches!(c, EngineCall::SetButton(..))), 0);
    assert_eq!(log.last(), Some(EngineCall::ReleaseSurface));
}

#[test]
fn test_surface_rebind_after_loss() {
    let (session, log, _source) = create_session();
    session.on_surface_changed(256, 224).unwrap();
    session.on_surface_destroyed().unwrap();
    session.on_surface_created().unwrap();
    session.on_surface_changed(320, 240).unwrap();

    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(log.count(|c| *c == EngineCall::Resume), 2);
}

#[test]
fn test_background_while_surface_lost() {
    let (session, log, _source) = create_session();
    session.on_surface_changed(256, 224).unwrap();
    session.on_surface_destroyed().unwrap();
    session.on_host_pause().unwrap();

    // Surface returns while the host is still in the background
    session.on_surface_changed(256, 224).unwrap();
    assert_eq!(session.state(), SessionState::SurfaceBound);

    session.on_host_resume().unwrap();
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(log.count(|c| *c == EngineCall::Resume), 2);
}

#[test]
fn test_user_pause_survives_host_resume() {
    let (session, log, _source) = create_session();
    session.on_surface_changed(256, 224).unwrap();

    assert_eq!(session.toggle_user_pause(), Ok(true));
    assert_eq!(session.state(), SessionState::Paused);

    session.on_host_pause().unwrap();
    session.on_host_resume().unwrap();
    assert_eq!(session.state(), SessionState::Paused);

    assert_eq!(session.toggle_user_pause(), Ok(false));
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(log.count(|c| *c == EngineCall::Pause), 1);
}

#[test]
fn test_user_unpause_stays_paused_in_background() {
    let (session, _log, _source) = create_session();
    session.on_surface_changed(256, 224).unwrap();
    session.toggle_user_pause().unwrap();
    session.on_host_pause().unwrap();

    assert_eq!(session.toggle_user_pause(), Ok(false));
    assert_eq!(session.state(), SessionState::Paused);

    session.on_host_resume().unwrap();
    assert_eq!(session.state(), SessionState::Running);
}

#[test]
fn test_snapshot_requires_rom() {
    let (session, log, _source) = create_session();
    session.on_surface_changed(256, 224).unwrap();

    assert!(matches!(
        session.save_state(),
        Err(BridgeError::State(lb_core::StateError::NoActiveSession))
    ));
    assert_eq!(log.count(|c| *c == EngineCall::SaveState), 0);
}

#[test]
fn test_snapshot_outcome_recorded() {
    let (session, _log, source) = create_session();
    source.insert("game.sfc", vec![0u8; 0x8000]);
    session.on_surface_changed(256, 224).unwrap();
    session.load_rom("game.sfc").unwrap();

    session.save_state().unwrap();
    session.load_state().unwrap();
    let outcome = session.last_snapshot().unwrap().unwrap();
    assert_eq!(outcome.direction, lb_engine::SnapshotDirection::Load);
    assert!(outcome.succeeded());
}

#[test]
fn test_battery_persisted_across_rom_swap() {
    let temp = tempfile::TempDir::new().unwrap();
    let save_dir = temp.path().join("saves");
    let mut config = Config::default();
    config.paths.save_dir = save_dir.clone();
    config.paths.battery_saves = true;

    let (engine, log) = RecordingEngine::new();
    let (session, source) = create_session_with(engine.with_battery(vec![0xAA; 2048]), &config);
    source.insert("/roms/first.sfc", vec![0u8; 0x8000]);
    source.insert("/roms/second.sfc", vec![0u8; 0x8000]);

    session.on_surface_changed(256, 224).unwrap();
    session.load_rom("/roms/first.sfc").unwrap();
    session.load_rom("/roms/second.sfc").unwrap();

    let store = SaveStore::new(&save_dir);
    assert_eq!(store.load("first.sfc").unwrap(), Some(vec![0xAA; 2048]));

    session.on_destroy().unwrap();
    assert_eq!(store.load("second.sfc").unwrap(), Some(vec![0xAA; 2048]));

    // Reloading the first ROM in a new session restores its battery file
    let (engine, log2) = RecordingEngine::new();
    let (session, source) = create_session_with(engine.with_battery(vec![0; 2048]), &config);
    source.insert("/roms/first.sfc", vec![0u8; 0x8000]);
    session.on_surface_changed(256, 224).unwrap();
    session.load_rom("/roms/first.sfc").unwrap();
    assert!(log2.contains(&EngineCall::BatteryLoad(2048)));
    session.on_destroy().unwrap();

    assert_eq!(log.last(), Some(EngineCall::Shutdown));
}

#[test]
fn test_copier_header_stripped_before_engine() {
    let (session, log, source) = create_session();
    source.insert("headered.smc", vec![0u8; 0x8000 * 4 + 512]);
    session.on_surface_changed(256, 224).unwrap();
    session.load_rom("headered.smc").unwrap();

    assert!(log.contains(&EngineCall::LoadRom {
        source: "headered.smc".to_string(),
        len: 0x8000 * 4,
    }));
}

#[test]
fn test_session_after_runtime_init() {
    let _ = runtime::init();
    assert!(runtime::is_initialized());
    let (engine, _log) = RecordingEngine::new();
    assert!(Session::create(engine, Arc::new(MemoryByteSource::new()), &test_config()).is_ok());
}
