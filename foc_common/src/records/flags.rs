//! Fault status bitflags published by the control loop.

use bitflags::bitflags;

bitflags! {
    /// Gate and watchdog status, published by the control loop every cycle.
    ///
    /// `TIMEOUT` and `GATE_FAULT` are latched: once set they stay set until
    /// the communications context explicitly re-arms.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FaultFlags: u8 {
        /// Parameter watchdog expired.
        const TIMEOUT     = 0x01;
        /// Gate driver reported a fault.
        const GATE_FAULT  = 0x02;
        /// Gates are currently driven active.
        const GATE_ACTIVE = 0x04;
    }
}

impl FaultFlags {
    /// Mask of the latched flags that block the gates.
    pub const LATCHED_MASK: Self =
        Self::from_bits_truncate(Self::TIMEOUT.bits() | Self::GATE_FAULT.bits());

    /// Returns true if any latched fault is set.
    #[inline]
    pub const fn has_fault(&self) -> bool {
        self.intersects(Self::LATCHED_MASK)
    }
}

impl Default for FaultFlags {
    fn default() -> Self {
        Self::empty()
    }
}
