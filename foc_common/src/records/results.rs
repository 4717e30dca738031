//! Telemetry produced by the control loop once per cycle.

/// Encoder attached to the rotor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum EncoderMode {
    /// No encoder configured.
    #[default]
    None = 0,
    /// AS5047D magnetic encoder over SPI.
    As5047d = 1,
    /// MLX90363 triaxis encoder over SPI.
    Mlx90363 = 2,
}

/// Result values written by the control loop.
///
/// Every field of one value originates from the same control cycle. Readers
/// outside the control loop only ever see committed snapshots of this record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Results {
    // ── FOC frame ──
    /// Measured direct current [A].
    pub foc_d_current: f32,
    /// Measured quadrature current [A].
    pub foc_q_current: f32,
    /// Measured direct voltage [V].
    pub foc_d_voltage: f32,
    /// Measured quadrature voltage [V].
    pub foc_q_voltage: f32,

    /// Direct current output of the PID loop [A].
    pub id_output: f32,
    /// Quadrature current output of the PID loop [A].
    pub iq_output: f32,

    /// Duty cycle for phase A (0.0..=1.0).
    pub duty_a: f32,
    /// Duty cycle for phase B (0.0..=1.0).
    pub duty_b: f32,
    /// Duty cycle for phase C (0.0..=1.0).
    pub duty_c: f32,

    // ── Encoder ──
    /// Active encoder.
    pub encoder_mode: EncoderMode,
    /// Raw encoder value, wraps around.
    pub raw_enc_value: u16,
    /// Corrected encoder position, wraps around [rad].
    pub enc_pos: f32,
    /// Encoder diagnostics bitfield (encoder specific).
    pub encoder_diag: u32,

    // ── Rotor ──
    /// Total number of rotor revolutions.
    pub rotor_revs: i16,
    /// Rotor position [rad].
    pub rotor_pos: f32,
    /// Rotor velocity, high-bandwidth estimate [rad/s].
    pub hf_rotor_vel: f32,
    /// Rotor velocity, low-bandwidth estimate [rad/s].
    pub lf_rotor_vel: f32,

    // ── Phase measurements ──
    /// Voltage on phase A [V].
    pub va: f32,
    /// Voltage on phase B [V].
    pub vb: f32,
    /// Voltage on phase C [V].
    pub vc: f32,
    /// Supply voltage [V].
    pub vin: f32,
    /// Current into phase A [A].
    pub ia: f32,
    /// Current into phase B [A].
    pub ib: f32,
    /// Current into phase C [A].
    pub ic: f32,

    // ── Board ──
    /// X acceleration [milli-g].
    pub xl_x: i16,
    /// Y acceleration [milli-g].
    pub xl_y: i16,
    /// Z acceleration [milli-g].
    pub xl_z: i16,

    /// Temperature [°C].
    pub temperature: f32,
}

impl Results {
    /// All-zero telemetry with no encoder.
    pub const fn new() -> Self {
        Self {
            foc_d_current: 0.0,
            foc_q_current: 0.0,
            foc_d_voltage: 0.0,
            foc_q_voltage: 0.0,
            id_output: 0.0,
            iq_output: 0.0,
            duty_a: 0.0,
            duty_b: 0.0,
            duty_c: 0.0,
            encoder_mode: EncoderMode::None,
            raw_enc_value: 0,
            enc_pos: 0.0,
            encoder_diag: 0,
            rotor_revs: 0,
            rotor_pos: 0.0,
            hf_rotor_vel: 0.0,
            lf_rotor_vel: 0.0,
            va: 0.0,
            vb: 0.0,
            vc: 0.0,
            vin: 0.0,
            ia: 0.0,
            ib: 0.0,
            ic: 0.0,
            xl_x: 0,
            xl_y: 0,
            xl_z: 0,
            temperature: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_new_matches_default() {
        assert_eq!(Results::new(), Results::default());
    }

    #[test]
    fn default_has_no_encoder() {
        let r = Results::default();
        assert_eq!(r.encoder_mode, EncoderMode::None);
        assert_eq!(r.raw_enc_value, 0);
        assert_eq!(r.rotor_revs, 0);
        assert_eq!(r.temperature, 0.0);
    }

    #[test]
    fn encoder_mode_discriminants() {
        assert_eq!(EncoderMode::None as u8, 0);
        assert_eq!(EncoderMode::As5047d as u8, 1);
        assert_eq!(EncoderMode::Mlx90363 as u8, 2);
    }
}
