//! Arbitration of the synthetic pointer/keyboard.
//!
//! At most one automated action owns the device at a time. A request made
//! while another action holds the lease is declined rather than queued, so a
//! trigger that has gone stale never fires late. Once raw input is blocked,
//! the pointer position and block state are restored by a drop guard on
//! every exit path, including faults and task cancellation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec2;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

/// Windows virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const XBUTTON1: KeyCode = KeyCode(0x05);
    pub const E: KeyCode = KeyCode(0x45);
    pub const N: KeyCode = KeyCode(0x4E);
    pub const Q: KeyCode = KeyCode(0x51);
    pub const R: KeyCode = KeyCode(0x52);
    pub const W: KeyCode = KeyCode(0x57);
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vk{:#04x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOp {
    PointerPosition,
    SetPointerPosition,
    BlockRawInput,
    PressKey,
    ReleaseKey,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeviceError {
    #[error("input device unavailable: {0}")]
    Unavailable(String),
    #[error("{op:?} failed: {reason}")]
    Failed { op: DeviceOp, reason: String },
}

/// The synthetic input capability. Implementations use interior mutability;
/// the arbiter is the only caller that mutates device state during an action.
pub trait InputDevice {
    fn pointer_position(&self) -> Result<Vec2, DeviceError>;
    fn set_pointer_position(&self, position: Vec2) -> Result<(), DeviceError>;
    fn block_raw_input(&self, blocked: bool) -> Result<(), DeviceError>;
    fn press_key(&self, key: KeyCode) -> Result<(), DeviceError>;
    fn release_key(&self, key: KeyCode) -> Result<(), DeviceError>;
    fn is_key_pressed(&self, key: KeyCode) -> bool;
}

/// Move the pointer to `target`, wait `settle`, release `key`, wait `confirm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastAction {
    pub key: KeyCode,
    pub target: Vec2,
    pub settle: Duration,
    pub confirm: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Completed,
    AbortedOutOfRange { distance: f32, range: f32 },
    Declined { held_by: String },
    Faulted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LeaseRecord {
    holder: String,
    acquired_at: Instant,
}

struct ArbiterInner {
    device: Rc<dyn InputDevice>,
    lease: RefCell<Option<LeaseRecord>>,
    released: Notify,
}

/// Exclusive ownership of the input device for one action.
pub struct InputLease {
    inner: Rc<ArbiterInner>,
    holder: String,
    acquired_at: Instant,
    saved_pointer: Option<Vec2>,
}

impl InputLease {
    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    pub fn saved_pointer(&self) -> Option<Vec2> {
        self.saved_pointer
    }
}

impl fmt::Debug for InputLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputLease")
            .field("holder", &self.holder)
            .field("acquired_at", &self.acquired_at)
            .field("saved_pointer", &self.saved_pointer)
            .finish()
    }
}

impl Drop for InputLease {
    fn drop(&mut self) {
        self.inner.lease.borrow_mut().take();
        self.inner.released.notify_waiters();
    }
}

/// Raw input stays blocked while this lives; dropping it puts the pointer
/// back and lifts the block.
struct InputBlock<'a> {
    device: &'a dyn InputDevice,
    saved_pointer: Vec2,
    restored: bool,
}

impl<'a> InputBlock<'a> {
    fn engage(device: &'a dyn InputDevice, saved_pointer: Vec2) -> Result<Self, DeviceError> {
        device.block_raw_input(true)?;
        Ok(Self {
            device,
            saved_pointer,
            restored: false,
        })
    }

    fn restore(&mut self) -> Result<(), DeviceError> {
        self.restored = true;
        let pointer = self.device.set_pointer_position(self.saved_pointer);
        let unblock = self.device.block_raw_input(false);
        pointer.and(unblock)
    }

    fn release(mut self) -> Result<(), DeviceError> {
        self.restore()
    }
}

impl Drop for InputBlock<'_> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(err) = self.restore() {
            warn!("[ayaya_engine::input] restoring input state failed: {err}");
        }
    }
}

/// A submitted action running on the local task set.
pub struct ActionHandle {
    join: JoinHandle<ActionOutcome>,
}

impl ActionHandle {
    pub async fn outcome(self) -> ActionOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(err) => ActionOutcome::Faulted(format!("action task ended early: {err}")),
        }
    }
}

#[derive(Clone)]
pub struct InputArbiter {
    inner: Rc<ArbiterInner>,
}

impl InputArbiter {
    pub fn new(device: Rc<dyn InputDevice>) -> Self {
        Self {
            inner: Rc::new(ArbiterInner {
                device,
                lease: RefCell::new(None),
                released: Notify::new(),
            }),
        }
    }

    pub fn try_acquire(&self, holder: &str) -> Result<InputLease, ActionOutcome> {
        let mut slot = self.inner.lease.borrow_mut();
        if let Some(current) = slot.as_ref() {
            debug!(
                "[ayaya_engine::input] {holder} declined; lease held by {} since {:?}",
                current.holder,
                current.acquired_at.elapsed()
            );
            return Err(ActionOutcome::Declined {
                held_by: current.holder.clone(),
            });
        }
        let acquired_at = Instant::now();
        *slot = Some(LeaseRecord {
            holder: holder.to_string(),
            acquired_at,
        });
        Ok(InputLease {
            inner: self.inner.clone(),
            holder: holder.to_string(),
            acquired_at,
            saved_pointer: None,
        })
    }

    pub fn lease_holder(&self) -> Option<String> {
        self.inner
            .lease
            .borrow()
            .as_ref()
            .map(|record| record.holder.clone())
    }

    pub fn is_leased(&self) -> bool {
        self.inner.lease.borrow().is_some()
    }

    /// Resolves once no lease is live.
    pub async fn wait_idle(&self) {
        loop {
            let released = self.inner.released.notified();
            if !self.is_leased() {
                return;
            }
            released.await;
        }
    }

    /// Acquire the lease and run `action` to completion.
    pub async fn perform(&self, holder: &str, action: CastAction) -> ActionOutcome {
        match self.try_acquire(holder) {
            Ok(lease) => self.run_leased(lease, action).await,
            Err(outcome) => outcome,
        }
    }

    /// Acquire the lease now and run `action` as a local task.
    ///
    /// Must be called from inside a `LocalSet`.
    pub fn submit(&self, holder: &str, action: CastAction) -> Result<ActionHandle, ActionOutcome> {
        let lease = self.try_acquire(holder)?;
        let arbiter = self.clone();
        let join = tokio::task::spawn_local(async move { arbiter.run_leased(lease, action).await });
        Ok(ActionHandle { join })
    }

    /// Direct key press from a module. Refused while an action owns the device.
    pub fn press_key(&self, key: KeyCode) -> Result<bool, DeviceError> {
        if self.is_leased() {
            return Ok(false);
        }
        self.inner.device.press_key(key)?;
        Ok(true)
    }

    pub fn release_key(&self, key: KeyCode) -> Result<bool, DeviceError> {
        if self.is_leased() {
            return Ok(false);
        }
        self.inner.device.release_key(key)?;
        Ok(true)
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.inner.device.is_key_pressed(key)
    }

    async fn run_leased(&self, mut lease: InputLease, action: CastAction) -> ActionOutcome {
        let result = self.drive(&mut lease, &action).await;
        let holder = lease.holder.clone();
        drop(lease);
        match result {
            Ok(()) => {
                debug!(
                    "[ayaya_engine::input] {holder} cast {} at {}",
                    action.key, action.target
                );
                ActionOutcome::Completed
            }
            Err(err) => {
                warn!("[ayaya_engine::input] action by {holder} faulted: {err}");
                ActionOutcome::Faulted(err.to_string())
            }
        }
    }

    async fn drive(&self, lease: &mut InputLease, action: &CastAction) -> Result<(), DeviceError> {
        let device = self.inner.device.as_ref();
        let saved = device.pointer_position()?;
        lease.saved_pointer = Some(saved);

        let block = InputBlock::engage(device, saved)?;
        device.set_pointer_position(action.target)?;
        sleep(action.settle).await;
        device.release_key(action.key)?;
        sleep(action.confirm).await;
        block.release()
    }
}

impl fmt::Debug for InputArbiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputArbiter")
            .field("lease", &self.inner.lease.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_bridge::{DeviceCall, RecordingInputDevice};

    fn cast(target: Vec2) -> CastAction {
        CastAction {
            key: KeyCode::Q,
            target,
            settle: Duration::from_millis(3),
            confirm: Duration::from_millis(10),
        }
    }

    fn arbiter(device: &RecordingInputDevice) -> InputArbiter {
        InputArbiter::new(Rc::new(device.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn completed_action_restores_pointer_and_block() {
        let device = RecordingInputDevice::new();
        device.warp_pointer(Vec2::new(10.0, 20.0));
        let arbiter = arbiter(&device);

        let outcome = arbiter.perform("test", cast(Vec2::new(500.0, 400.0))).await;
        assert_eq!(outcome, ActionOutcome::Completed);
        assert_eq!(
            device.calls(),
            vec![
                DeviceCall::PointerPosition,
                DeviceCall::BlockRawInput(true),
                DeviceCall::SetPointerPosition(Vec2::new(500.0, 400.0)),
                DeviceCall::ReleaseKey(KeyCode::Q),
                DeviceCall::SetPointerPosition(Vec2::new(10.0, 20.0)),
                DeviceCall::BlockRawInput(false),
            ]
        );
        assert_eq!(device.pointer(), Vec2::new(10.0, 20.0));
        assert!(!device.is_blocked());
        assert!(!arbiter.is_leased());
    }

    #[tokio::test(start_paused = true)]
    async fn fault_after_block_still_restores() {
        let device = RecordingInputDevice::new();
        device.warp_pointer(Vec2::new(7.0, 8.0));
        device.fail_on(DeviceOp::ReleaseKey);
        let arbiter = arbiter(&device);

        let outcome = arbiter.perform("test", cast(Vec2::new(300.0, 300.0))).await;
        assert!(matches!(outcome, ActionOutcome::Faulted(_)));
        assert_eq!(device.pointer(), Vec2::new(7.0, 8.0));
        assert!(!device.is_blocked());
        assert!(!arbiter.is_leased());
    }

    #[tokio::test(start_paused = true)]
    async fn fault_before_block_touches_nothing_else() {
        let device = RecordingInputDevice::new();
        device.fail_on(DeviceOp::PointerPosition);
        let arbiter = arbiter(&device);

        let outcome = arbiter.perform("test", cast(Vec2::ONE)).await;
        assert!(matches!(outcome, ActionOutcome::Faulted(_)));
        assert_eq!(device.calls(), vec![DeviceCall::PointerPosition]);
        assert!(!arbiter.is_leased());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_yield_one_lease() {
        let device = RecordingInputDevice::new();
        let arbiter = arbiter(&device);

        let (first, second) = tokio::join!(
            arbiter.perform("first", cast(Vec2::new(1.0, 1.0))),
            arbiter.perform("second", cast(Vec2::new(2.0, 2.0))),
        );
        assert_eq!(first, ActionOutcome::Completed);
        assert_eq!(
            second,
            ActionOutcome::Declined {
                held_by: "first".to_string()
            }
        );
        assert!(!device
            .calls()
            .contains(&DeviceCall::SetPointerPosition(Vec2::new(2.0, 2.0))));
        assert_eq!(device.calls().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn submitted_action_holds_lease_until_done() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let device = RecordingInputDevice::new();
                let arbiter = arbiter(&device);

                let handle = arbiter.submit("xerath", cast(Vec2::new(5.0, 5.0))).unwrap();
                assert_eq!(arbiter.lease_holder().as_deref(), Some("xerath"));
                assert!(matches!(
                    arbiter.submit("other", cast(Vec2::ZERO)),
                    Err(ActionOutcome::Declined { .. })
                ));
                assert_eq!(arbiter.press_key(KeyCode::W), Ok(false));

                arbiter.wait_idle().await;
                assert!(!arbiter.is_leased());
                assert_eq!(handle.outcome().await, ActionOutcome::Completed);
                assert_eq!(arbiter.press_key(KeyCode::W), Ok(true));
                assert!(device.is_key_pressed(KeyCode::W));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_action_restores_input() {
        let device = RecordingInputDevice::new();
        device.warp_pointer(Vec2::new(42.0, 24.0));
        let arbiter = arbiter(&device);

        let result = tokio::time::timeout(
            Duration::from_millis(5),
            arbiter.perform("slow", cast(Vec2::new(900.0, 900.0))),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(device.pointer(), Vec2::new(42.0, 24.0));
        assert!(!device.is_blocked());
        assert!(!arbiter.is_leased());
    }
}
