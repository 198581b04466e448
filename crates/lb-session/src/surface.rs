//! Render surface binding

use lb_core::SessionError;
use lb_engine::{EngineHandle, SurfaceDescriptor};
use tracing::debug;

/// Outcome of a host surface change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceChange {
    /// A drawable surface of this size is bound
    Bound(SurfaceDescriptor),
    /// The change described a zero-area surface and was treated as a loss
    Released,
}

/// Tracks the host render target and forwards it to the engine
#[derive(Debug, Default)]
pub struct SurfaceBinding {
    descriptor: Option<SurfaceDescriptor>,
    created: bool,
}

impl SurfaceBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// The host reported that a surface exists; its size arrives later
    pub fn mark_created(&mut self) {
        self.created = true;
    }

    /// Replace the descriptor and rebind the engine.
    ///
    /// Non-positive dimensions never reach `resize`; they release the
    /// surface instead.
    pub fn resize(
        &mut self,
        engine: &mut EngineHandle,
        width: i32,
        height: i32,
    ) -> Result<SurfaceChange, SessionError> {
        if width <= 0 || height <= 0 {
            debug!("Zero-area surface {}x{} treated as release", width, height);
            self.release(engine)?;
            return Ok(SurfaceChange::Released);
        }

        let descriptor = SurfaceDescriptor::new(width as u32, height as u32);
        engine.resize(descriptor.width, descriptor.height)?;
        self.descriptor = Some(descriptor);
        self.created = true;
        Ok(SurfaceChange::Bound(descriptor))
    }

    /// Mark the surface invalid and tell the engine to stop drawing
    pub fn release(&mut self, engine: &mut EngineHandle) -> Result<(), SessionError> {
        engine.release_surface()?;
        if let Some(descriptor) = self.descriptor.as_mut() {
            descriptor.valid = false;
        }
        self.created = false;
        Ok(())
    }

    /// Current descriptor; `valid` is false after a release
    pub fn descriptor(&self) -> Option<SurfaceDescriptor> {
        self.descriptor
    }

    /// True while a drawable surface is bound
    pub fn is_bound(&self) -> bool {
        self.descriptor.map_or(false, |d| d.valid)
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}
