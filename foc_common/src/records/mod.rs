//! Records exchanged between the control loop and the communications context.
//!
//! All records are `Copy` and contain only fixed-size fields, so a whole
//! record moves with one memory copy and the control path never allocates.

use static_assertions::assert_impl_all;

pub mod calibration;
pub mod flags;
pub mod parameters;
pub mod results;

pub use calibration::{Calibration, CorrectionTable};
pub use flags::FaultFlags;
pub use parameters::{ControlMode, Parameters};
pub use results::{EncoderMode, Results};

// Records cross execution contexts by value.
assert_impl_all!(Results: Copy, Send, Sync);
assert_impl_all!(Parameters: Copy, Send, Sync);
assert_impl_all!(Calibration: Copy, Send, Sync);
