//! Durable tuning and geometry record.
//!
//! `Calibration` is the only record that survives power cycles. Its field
//! order is the persisted block layout (see [`crate::consts::CALIBRATION_BLOCK_SIZE`]),
//! so fields must not be reordered without bumping [`CALIBRATION_MAGIC`].

use core::fmt;
use core::ops::{Deref, DerefMut};

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::consts::{CALIBRATION_MAGIC, ENC_ANG_CORR_TABLE_SIZE};

/// Encoder angle correction table, one signed entry per encoder sector.
///
/// Serialized as a fixed-length tuple (no length prefix) so the persisted
/// block has a constant size.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CorrectionTable(pub [i8; ENC_ANG_CORR_TABLE_SIZE]);

impl CorrectionTable {
    /// All-zero table (no correction).
    pub const fn zeroed() -> Self {
        Self([0; ENC_ANG_CORR_TABLE_SIZE])
    }
}

impl Default for CorrectionTable {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Deref for CorrectionTable {
    type Target = [i8; ENC_ANG_CORR_TABLE_SIZE];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for CorrectionTable {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl fmt::Debug for CorrectionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nonzero = self.0.iter().filter(|v| **v != 0).count();
        f.debug_struct("CorrectionTable")
            .field("len", &ENC_ANG_CORR_TABLE_SIZE)
            .field("nonzero", &nonzero)
            .finish()
    }
}

impl Serialize for CorrectionTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(ENC_ANG_CORR_TABLE_SIZE)?;
        for v in &self.0 {
            tup.serialize_element(v)?;
        }
        tup.end()
    }
}

impl<'de> Deserialize<'de> for CorrectionTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = CorrectionTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{ENC_ANG_CORR_TABLE_SIZE} signed bytes")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut table = CorrectionTable::zeroed();
                for (i, slot) in table.0.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                Ok(table)
            }
        }

        deserializer.deserialize_tuple(ENC_ANG_CORR_TABLE_SIZE, TableVisitor)
    }
}

/// Calibration values.
///
/// Read continuously by the control loop; replaced only as a whole through
/// the persistence operations (load / clear) or explicit staging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Start sequence; equals [`CALIBRATION_MAGIC`] for a valid record.
    pub start_sequence: u16,
    /// Encoder reading at the start of an electrical revolution.
    pub erev_start: u16,
    /// Electrical revolutions per mechanical revolution.
    pub erevs_per_mrev: u8,
    /// Phases A, B, C are arranged clockwise instead of counter-clockwise.
    /// Persisted as one byte; any nonzero byte reads as set.
    #[serde(deserialize_with = "nonzero_byte")]
    pub flip_phases: bool,

    // ── Current loop ──
    /// Proportional gain, FOC d-axis PI loop.
    pub foc_kp_d: f32,
    /// Integral gain, FOC d-axis PI loop.
    pub foc_ki_d: f32,
    /// Proportional gain, FOC q-axis PI loop.
    pub foc_kp_q: f32,
    /// Integral gain, FOC q-axis PI loop.
    pub foc_ki_q: f32,

    // ── Outer loops ──
    /// Proportional gain, velocity loop.
    pub velocity_kp: f32,
    /// Derivative gain, velocity loop.
    pub velocity_kd: f32,
    /// Proportional gain, position loop.
    pub position_kp: f32,
    /// Derivative gain, position loop.
    pub position_kd: f32,

    // ── Limits ──
    /// Current limit [A].
    pub current_limit: f32,
    /// Torque limit [N·m].
    pub torque_limit: f32,
    /// Velocity limit [rad/s].
    pub velocity_limit: f32,
    /// Position lower limit [rad].
    pub position_lower_limit: f32,
    /// Position upper limit [rad].
    pub position_upper_limit: f32,

    // ── Motor ──
    /// Motor resistance [Ω].
    pub motor_resistance: f32,
    /// Motor inductance [H].
    pub motor_inductance: f32,
    /// Motor torque constant [N·m/A].
    pub motor_torque_const: f32,

    /// Parameter update timeout [ms]; 0 disables the watchdog.
    pub control_timeout: u16,

    // ── Filters and offsets ──
    /// Filter parameter for the high-bandwidth velocity estimate.
    pub hf_velocity_filter_param: f32,
    /// Filter parameter for the low-bandwidth velocity estimate.
    pub lf_velocity_filter_param: f32,
    /// Position offset [rad].
    pub position_offset: f32,
    /// Current offset, phase A [A].
    pub ia_offset: f32,
    /// Current offset, phase B [A].
    pub ib_offset: f32,
    /// Current offset, phase C [A].
    pub ic_offset: f32,

    // ── Encoder angle correction ──
    /// Correction scale [rad].
    pub enc_ang_corr_scale: f32,
    /// Correction offset [rad].
    pub enc_ang_corr_offset: f32,
    /// Per-sector correction table.
    pub enc_ang_corr_table_values: CorrectionTable,
}

impl Calibration {
    /// Compile-time defaults with a valid start sequence.
    pub const fn new() -> Self {
        Self {
            start_sequence: CALIBRATION_MAGIC,
            erev_start: 0,
            erevs_per_mrev: 1,
            flip_phases: false,
            foc_kp_d: 0.5,
            foc_ki_d: 0.1,
            foc_kp_q: 1.0,
            foc_ki_q: 0.2,
            velocity_kp: 0.1,
            velocity_kd: 1e-3,
            position_kp: 5.0,
            position_kd: 0.0,
            current_limit: 2.0,
            torque_limit: 3.0,
            velocity_limit: 10.0,
            position_lower_limit: 0.0,
            position_upper_limit: 0.0,
            motor_resistance: 17.8,
            motor_inductance: 0.0,
            motor_torque_const: 0.0,
            control_timeout: 0,
            hf_velocity_filter_param: 0.01,
            lf_velocity_filter_param: (1.0 - 0.9975) as f32,
            position_offset: 0.0,
            ia_offset: 0.0,
            ib_offset: 0.0,
            ic_offset: 0.0,
            enc_ang_corr_scale: 0.0,
            enc_ang_corr_offset: 0.0,
            enc_ang_corr_table_values: CorrectionTable::zeroed(),
        }
    }

    /// A record is valid iff its start sequence equals [`CALIBRATION_MAGIC`].
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.start_sequence == CALIBRATION_MAGIC
    }

    /// Whether the parameter watchdog is enabled.
    #[inline]
    pub const fn watchdog_enabled(&self) -> bool {
        self.control_timeout != 0
    }
}

/// Decode a persisted flag byte; every value is accepted.
fn nonzero_byte<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    u8::deserialize(deserializer).map(|byte| byte != 0)
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new()
    }
}
