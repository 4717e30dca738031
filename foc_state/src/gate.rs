//! Gate driver boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Hardware gate driver seen from the control loop.
///
/// Both calls run on the control path and must not block.
pub trait GateDriver {
    /// Enable or disable the power stage.
    fn set_active(&mut self, active: bool);

    /// Whether the driver reports a fault.
    fn fault(&self) -> bool;
}

/// Gate driver with no hardware behind it. Never faults.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullGate;

impl GateDriver for NullGate {
    fn set_active(&mut self, _active: bool) {}

    fn fault(&self) -> bool {
        false
    }
}

/// Simulated gate driver.
///
/// Clones share state, so a test or the simulator can keep one handle to
/// observe the gate and inject faults while the control loop owns another.
#[derive(Debug, Default, Clone)]
pub struct SimGate {
    active: Arc<AtomicBool>,
    fault: Arc<AtomicBool>,
}

impl SimGate {
    /// Inactive, fault-free gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the control loop currently drives the gate active.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Raise or clear the driver fault line.
    pub fn inject_fault(&self, fault: bool) {
        self.fault.store(fault, Ordering::Release);
    }
}

impl GateDriver for SimGate {
    fn set_active(&mut self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    fn fault(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }
}
