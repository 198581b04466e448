//! Input routing from host events to the engine

use lb_core::SessionError;
use lb_engine::{ButtonId, EngineHandle, InputState, PointerPosition};
use std::fmt;

/// Touch phase as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchAction {
    Down,
    Up,
    Move,
}

impl TouchAction {
    /// Decode the host's numeric action code (0 down, 1 up, 2 move)
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Down),
            1 => Some(Self::Up),
            2 => Some(Self::Move),
            _ => None,
        }
    }
}

impl fmt::Display for TouchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Down => "down",
            Self::Up => "up",
            Self::Move => "move",
        };
        write!(f, "{}", name)
    }
}

/// Translates host input into engine calls and keeps the last forwarded state
#[derive(Debug, Default)]
pub struct InputRouter {
    state: InputState,
    fast_forward: bool,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward a level-triggered button change.
    ///
    /// Unknown indices are rejected before anything reaches the engine.
    pub fn button(
        &mut self,
        engine: &mut EngineHandle,
        index: i32,
        pressed: bool,
    ) -> Result<ButtonId, SessionError> {
        let button = ButtonId::from_index(index).ok_or(SessionError::UnknownButton(index))?;
        engine.set_button(button, pressed)?;
        self.state.set_button(button, pressed);
        Ok(button)
    }

    /// Forward a pointer event in surface coordinates
    pub fn touch(
        &mut self,
        engine: &mut EngineHandle,
        action: TouchAction,
        x: f32,
        y: f32,
    ) -> Result<(), SessionError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(SessionError::InvalidPointer { x, y });
        }
        engine.set_pointer(x, y)?;
        self.state.pointer = Some(PointerPosition { x, y });
        self.state.pointer_active = action != TouchAction::Up;
        Ok(())
    }

    pub fn set_fast_forward(
        &mut self,
        engine: &mut EngineHandle,
        enabled: bool,
    ) -> Result<(), SessionError> {
        engine.set_fast_forward(enabled)?;
        self.fast_forward = enabled;
        Ok(())
    }

    pub fn fast_forward(&self) -> bool {
        self.fast_forward
    }

    /// Input state as last forwarded
    pub fn state(&self) -> &InputState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_engine::{runtime, EngineCall, RecordingEngine};

    fn handle() -> (EngineHandle, lb_engine::CallLog) {
        let _ = runtime::init();
        let (engine, log) = RecordingEngine::new();
        (EngineHandle::create(engine).unwrap(), log)
    }

    #[test]
    fn test_touch_action_codes() {
        assert_eq!(TouchAction::from_code(0), Some(TouchAction::Down));
        assert_eq!(TouchAction::from_code(1), Some(TouchAction::Up));
        assert_eq!(TouchAction::from_code(2), Some(TouchAction::Move));
        assert_eq!(TouchAction::from_code(3), None);
    }

    #[test]
    fn test_button_forwarding() {
        let (mut engine, log) = handle();
        let mut input = InputRouter::new();

        assert_eq!(input.button(&mut engine, 4, true).unwrap(), ButtonId::A);
        assert!(input.state().is_pressed(ButtonId::A));
        input.button(&mut engine, 4, false).unwrap();
        assert!(!input.state().is_pressed(ButtonId::A));

        assert_eq!(
            log.calls(),
            vec![
                EngineCall::SetButton(ButtonId::A, true),
                EngineCall::SetButton(ButtonId::A, false),
            ]
        );
    }

    #[test]
    fn test_unknown_button_not_forwarded() {
        let (mut engine, log) = handle();
        let mut input = InputRouter::new();

        assert_eq!(
            input.button(&mut engine, 12, true),
            Err(SessionError::UnknownButton(12))
        );
        assert_eq!(
            input.button(&mut engine, -1, true),
            Err(SessionError::UnknownButton(-1))
        );
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_touch_tracks_pointer() {
        let (mut engine, log) = handle();
        let mut input = InputRouter::new();

        input.touch(&mut engine, TouchAction::Down, 10.0, 20.0).unwrap();
        assert!(input.state().pointer_active);
        input.touch(&mut engine, TouchAction::Up, 12.0, 22.0).unwrap();
        assert!(!input.state().pointer_active);
        assert_eq!(input.state().pointer, Some(PointerPosition { x: 12.0, y: 22.0 }));
        assert_eq!(log.count(|c| matches!(c, EngineCall::SetPointer { .. })), 2);
    }

    #[test]
    fn test_non_finite_pointer_rejected() {
        let (mut engine, log) = handle();
        let mut input = InputRouter::new();

        let err = input.touch(&mut engine, TouchAction::Move, f32::NAN, 1.0);
        assert!(matches!(err, Err(SessionError::InvalidPointer { .. })));
        assert!(input.state().pointer.is_none());
        assert!(log.calls().is_empty());
    }
}
