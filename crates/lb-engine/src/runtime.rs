//! Process-wide engine runtime initialization
//!
//! The engine runtime is initialized once per process, before the first
//! session is created, and is never re-initialized. [`init`] fails on a
//! second call; [`crate::EngineHandle::create`] fails until it succeeded.

use lb_core::SessionError;
use once_cell::sync::OnceCell;
use std::time::Instant;

/// Facts recorded when the runtime came up
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub initialized_at: Instant,
    pub version: &'static str,
}

static RUNTIME: OnceCell<RuntimeInfo> = OnceCell::new();

/// Initialize the engine runtime
pub fn init() -> Result<&'static RuntimeInfo, SessionError> {
    let info = RuntimeInfo {
        initialized_at: Instant::now(),
        version: env!("CARGO_PKG_VERSION"),
    };
    RUNTIME
        .set(info)
        .map_err(|_| SessionError::AlreadyInitialized)?;

    let info = RUNTIME.get().ok_or(SessionError::NotInitialized)?;
    tracing::info!("Engine runtime {} initialized", info.version);
    Ok(info)
}

/// Check whether [`init`] has completed
pub fn is_initialized() -> bool {
    RUNTIME.get().is_some()
}

/// Runtime facts, if initialized
pub fn info() -> Option<&'static RuntimeInfo> {
    RUNTIME.get()
}
