use std::{cell::RefCell, collections::BTreeSet, rc::Rc};

use glam::Vec2;
use log::info;

use crate::input::{DeviceError, DeviceOp, InputDevice, KeyCode};

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    PointerPosition,
    SetPointerPosition(Vec2),
    BlockRawInput(bool),
    PressKey(KeyCode),
    ReleaseKey(KeyCode),
}

#[derive(Debug, Default)]
struct DeviceState {
    pointer: Vec2,
    blocked: bool,
    pressed: BTreeSet<KeyCode>,
    calls: Vec<DeviceCall>,
    fail_on: Option<DeviceOp>,
}

/// In-memory input device. Tracks key and pointer state instead of touching
/// the OS. The tests read its call journal to observe the arbiter; the binary
/// runs the logging flavour for dry runs.
#[derive(Clone, Default)]
pub struct RecordingInputDevice {
    state: Rc<RefCell<DeviceState>>,
    log_calls: bool,
}

impl RecordingInputDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo each call to the log at info level instead of journaling it, so
    /// a long dry run holds no per-call history.
    pub fn logging() -> Self {
        Self {
            log_calls: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.borrow().calls.clone()
    }

    pub fn pointer(&self) -> Vec2 {
        self.state.borrow().pointer
    }

    pub fn is_blocked(&self) -> bool {
        self.state.borrow().blocked
    }

    /// Move the pointer as the human would, without recording a call.
    pub fn warp_pointer(&self, position: Vec2) {
        self.state.borrow_mut().pointer = position;
    }

    /// Simulate the human holding or letting go of a key.
    pub fn hold_key(&self, key: KeyCode, held: bool) {
        let mut state = self.state.borrow_mut();
        if held {
            state.pressed.insert(key);
        } else {
            state.pressed.remove(&key);
        }
    }

    /// Make every subsequent call of `op` fail.
    pub fn fail_on(&self, op: DeviceOp) {
        self.state.borrow_mut().fail_on = Some(op);
    }

    fn record(&self, op: DeviceOp, call: DeviceCall) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        if self.log_calls {
            info!("[ayaya_engine::input] dry-run {call:?}");
        } else {
            state.calls.push(call);
        }
        if state.fail_on == Some(op) {
            return Err(DeviceError::Failed {
                op,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

impl InputDevice for RecordingInputDevice {
    fn pointer_position(&self) -> Result<Vec2, DeviceError> {
        self.record(DeviceOp::PointerPosition, DeviceCall::PointerPosition)?;
        Ok(self.state.borrow().pointer)
    }

    fn set_pointer_position(&self, position: Vec2) -> Result<(), DeviceError> {
        self.record(
            DeviceOp::SetPointerPosition,
            DeviceCall::SetPointerPosition(position),
        )?;
        self.state.borrow_mut().pointer = position;
        Ok(())
    }

    fn block_raw_input(&self, blocked: bool) -> Result<(), DeviceError> {
        self.record(DeviceOp::BlockRawInput, DeviceCall::BlockRawInput(blocked))?;
        self.state.borrow_mut().blocked = blocked;
        Ok(())
    }

    fn press_key(&self, key: KeyCode) -> Result<(), DeviceError> {
        self.record(DeviceOp::PressKey, DeviceCall::PressKey(key))?;
        self.state.borrow_mut().pressed.insert(key);
        Ok(())
    }

    fn release_key(&self, key: KeyCode) -> Result<(), DeviceError> {
        self.record(DeviceOp::ReleaseKey, DeviceCall::ReleaseKey(key))?;
        self.state.borrow_mut().pressed.remove(&key);
        Ok(())
    }

    fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.state.borrow().pressed.contains(&key)
    }
}
