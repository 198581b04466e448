//! lake-bridge - headless session host
//!
//! Drives one emulation session the way a UI host would: bind a surface,
//! load a ROM, play for a while, save state, background and foreground the
//! app, then tear the session down.

use anyhow::{bail, Context, Result};
use clap::Parser;
use lb_core::Config;
use lb_engine::{runtime, synthetic_rom, ButtonId, NullEngine};
use lb_session::{
    BridgeHandle, ByteSource, FileByteSource, MemoryByteSource, NotificationLevel, Session,
    SessionRunner,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// SNES native resolution
const SURFACE_WIDTH: i32 = 256;
const SURFACE_HEIGHT: i32 = 224;

const DEMO_ROM: &str = "memory://demo.sfc";

#[derive(Parser)]
#[command(name = "lake-bridge", about = "Headless host for one emulation session")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames to play before saving state
    #[arg(short, long, default_value = "120")]
    frames: u32,

    /// ROM path; a generated demo cartridge when omitted
    rom: Option<String>,
}

fn play(bridge: &BridgeHandle, frames: u32) -> Result<()> {
    let frame = Duration::from_millis(16);

    bridge.notify_button(ButtonId::Start.index() as i32, true)?;
    thread::sleep(frame * 4);
    bridge.notify_button(ButtonId::Start.index() as i32, false)?;

    thread::sleep(frame * frames);
    bridge.request_save_state()?;

    bridge.notify_pause()?;
    tracing::info!("Host backgrounded");
    bridge.notify_resume()?;

    bridge.request_fast_forward(true)?;
    thread::sleep(frame * frames / 2);
    bridge.request_fast_forward(false)?;
    bridge.request_load_state()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    lb_core::logging::init(&config.debug);
    tracing::info!("Starting lake-bridge");

    runtime::init()?;

    let (source, rom): (Arc<dyn ByteSource>, String) = match args.rom {
        Some(rom) => (Arc::new(FileByteSource::new()), rom),
        None => {
            tracing::info!("No ROM given, using a generated demo cartridge");
            let memory = MemoryByteSource::new();
            memory.insert(DEMO_ROM, synthetic_rom(0x8_0000, "LAKE BRIDGE DEMO", 0x01, 3));
            (Arc::new(memory), DEMO_ROM.to_string())
        }
    };

    let session = Arc::new(Session::create(NullEngine::new(), source, &config)?);
    let (bridge, runner) = SessionRunner::spawn(session.clone(), &config.session)
        .context("failed to start the session runner")?;

    // The ROM is requested before the surface exists, like a launch intent
    bridge.request_load_rom(rom)?;
    bridge.notify_surface_created()?;
    bridge.notify_surface_changed(SURFACE_WIDTH, SURFACE_HEIGHT)?;

    let played = play(&bridge, args.frames);
    bridge.notify_destroy()?;

    let mut failed = false;
    for notification in runner.join() {
        match notification.level {
            NotificationLevel::Info => println!("{}", notification.message),
            NotificationLevel::Error => {
                failed = true;
                eprintln!("error: {}", notification.message);
            }
        }
    }

    played?;
    if failed {
        bail!("session reported errors");
    }
    tracing::info!("Session finished in state {}", session.state());
    Ok(())
}
