//! Setpoints and overrides written by the communications context.

/// Control law selected by the communications side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ControlMode {
    /// FOC current control on the d/q setpoints.
    #[default]
    FocCurrent = 0,
    /// Raw per-phase duty cycles (`phase0..phase2`).
    RawPwm = 1,
    /// Torque control.
    Torque = 2,
    /// Velocity control.
    Velocity = 3,
    /// Position control.
    Position = 4,
    /// Position and velocity control.
    PositionVelocity = 5,
    /// Position control with feed-forward current.
    PositionFeedForward = 6,
    /// Open-loop drive duty (`pwm_drive`).
    PwmDrive = 7,
}

/// Parameter values written by the communications context.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Parameters {
    /// Control mode.
    pub control_mode: ControlMode,
    /// FOC quadrature current setpoint [A].
    pub foc_q_current_sp: f32,
    /// FOC direct current setpoint [A].
    pub foc_d_current_sp: f32,

    /// Override normal status LED behavior.
    pub override_led_color: bool,
    /// Status LED red intensity.
    pub led_red_intensity: u8,
    /// Status LED green intensity.
    pub led_green_intensity: u8,
    /// Status LED blue intensity.
    pub led_blue_intensity: u8,

    /// Phase 0 duty override.
    pub phase0: f32,
    /// Phase 1 duty override.
    pub phase1: f32,
    /// Phase 2 duty override.
    pub phase2: f32,

    /// Torque setpoint [N·m].
    pub torque_sp: f32,
    /// Velocity setpoint [rad/s].
    pub velocity_sp: f32,
    /// Position setpoint [rad].
    pub position_sp: f32,
    /// Feed-forward term for load compensation [A].
    pub feed_forward: f32,
    /// Drive duty override.
    pub pwm_drive: f32,

    /// Gates requested active.
    pub gate_active: bool,
    /// Gate driver reports a fault.
    pub gate_fault: bool,
    /// Parameter watchdog tripped.
    pub timeout_flag: bool,
}

impl Parameters {
    /// All-zero setpoints, gates off, FOC current mode.
    pub const fn new() -> Self {
        Self {
            control_mode: ControlMode::FocCurrent,
            foc_q_current_sp: 0.0,
            foc_d_current_sp: 0.0,
            override_led_color: false,
            led_red_intensity: 0,
            led_green_intensity: 0,
            led_blue_intensity: 0,
            phase0: 0.0,
            phase1: 0.0,
            phase2: 0.0,
            torque_sp: 0.0,
            velocity_sp: 0.0,
            position_sp: 0.0,
            feed_forward: 0.0,
            pwm_drive: 0.0,
            gate_active: false,
            gate_fault: false,
            timeout_flag: false,
        }
    }

    /// True when the gate interlock holds: gates are not active while a
    /// fault or timeout is present.
    #[inline]
    pub const fn gate_interlock_ok(&self) -> bool {
        !(self.gate_active && (self.gate_fault || self.timeout_flag))
    }
}
