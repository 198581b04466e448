//! Save/load state requests

use lb_core::Result;
use lb_engine::{EngineHandle, SnapshotDirection};
use std::time::Instant;
use tracing::{info, warn};

/// Completion record of the most recent snapshot request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub direction: SnapshotDirection,
    /// Error message if the engine reported a failure
    pub error: Option<String>,
    pub completed_at: Instant,
}

impl SnapshotOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Forwards save/load requests and remembers how the last one ended.
///
/// Failures are reported once; nothing is retried.
#[derive(Debug, Default)]
pub struct SnapshotController {
    last: Option<SnapshotOutcome>,
    saves: u32,
    loads: u32,
}

impl SnapshotController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, engine: &mut EngineHandle, direction: SnapshotDirection) -> Result<()> {
        let result = match direction {
            SnapshotDirection::Save => engine.save_state(),
            SnapshotDirection::Load => engine.load_state(),
        };

        match &result {
            Ok(()) => {
                match direction {
                    SnapshotDirection::Save => self.saves += 1,
                    SnapshotDirection::Load => self.loads += 1,
                }
                info!("State {} completed", direction);
            }
            Err(e) if e.is_closed() => return result,
            Err(e) => warn!("State {} failed: {}", direction, e),
        }

        self.last = Some(SnapshotOutcome {
            direction,
            error: result.as_ref().err().map(|e| e.to_string()),
            completed_at: Instant::now(),
        });
        result
    }

    pub fn last(&self) -> Option<&SnapshotOutcome> {
        self.last.as_ref()
    }

    /// Successful (saves, loads) so far
    pub fn completed(&self) -> (u32, u32) {
        (self.saves, self.loads)
    }
}
