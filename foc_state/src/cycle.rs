//! Periodic control loop driver.
//!
//! Paces a [`ControlContext`] at a fixed period and measures every cycle.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to the configured CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`: RT priority.
//!
//! ## Cycle Loop
//! With the `rt` feature, absolute-time `clock_nanosleep` on
//! `CLOCK_MONOTONIC` and an overrun aborts the loop. Without it,
//! `std::thread::sleep` for the remaining time and overruns are only counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use foc_common::records::{Calibration, Parameters, Results};
use thiserror::Error;
use tracing::{info, warn};

use crate::control::ControlContext;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Number of overruns detected.
    pub overruns: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: i64,
}

impl CycleStats {
    /// Zeroed stats.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += duration_ns;
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during RT setup or cycle execution.
#[derive(Error, Debug)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// A cycle exceeded its period.
    #[error("cycle overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun {
        /// Actual cycle duration [ns].
        actual_ns: i64,
        /// Configured cycle budget [ns].
        budget_ns: i64,
    },
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Which RT preparation steps took effect on the calling thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtSetupReport {
    /// All current and future pages are locked.
    pub memory_locked: bool,
    /// Stack pages were touched up front.
    pub stack_prefaulted: bool,
    /// Core the thread is pinned to.
    pub cpu_core: Option<usize>,
    /// SCHED_FIFO priority in effect.
    pub fifo_priority: Option<i32>,
}

impl RtSetupReport {
    /// Whether the thread runs under real-time scheduling.
    pub const fn is_realtime(&self) -> bool {
        self.memory_locked && self.fifo_priority.is_some()
    }
}

/// Prepare the calling thread for the control loop.
///
/// Without the `rt` feature nothing is changed and an empty report is
/// returned.
#[cfg(feature = "rt")]
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<RtSetupReport, CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::sys::mman::{MlockallFlags, mlockall};
    use nix::unistd::Pid;

    let mut report = RtSetupReport::default();

    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall: {e}")))?;
    report.memory_locked = true;

    let mut stack = [0u8; 256 * 1024];
    for byte in stack.iter_mut() {
        // SAFETY: `byte` is an exclusive reference into a live local array.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&stack);
    report.stack_prefaulted = true;

    let mut cpus = CpuSet::new();
    cpus.set(cpu_core)
        .and_then(|()| sched_setaffinity(Pid::from_raw(0), &cpus))
        .map_err(|e| CycleError::RtSetup(format!("pin to core {cpu_core}: {e}")))?;
    report.cpu_core = Some(cpu_core);

    let param = libc::sched_param {
        sched_priority: rt_priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "SCHED_FIFO priority {rt_priority}: {err}"
        )));
    }
    report.fifo_priority = Some(rt_priority);

    Ok(report)
}

/// Prepare the calling thread for the control loop.
///
/// Without the `rt` feature nothing is changed and an empty report is
/// returned.
#[cfg(not(feature = "rt"))]
pub fn rt_setup(_cpu_core: usize, _rt_priority: i32) -> Result<RtSetupReport, CycleError> {
    Ok(RtSetupReport::default())
}

// ─── Runner ─────────────────────────────────────────────────────────

/// Drives a [`ControlContext`] at a fixed period.
///
/// The body is the external FOC math: it reads the applied Parameters and
/// Calibration and writes Results.
pub struct ControlLoopRunner<B> {
    control: ControlContext,
    body: B,
    cycle_time_ns: i64,
    running: Arc<AtomicBool>,
    cycle_limit: Option<u64>,
    stats: CycleStats,
}

impl<B> ControlLoopRunner<B>
where
    B: FnMut(&Parameters, &Calibration, &mut Results),
{
    /// Runner with period `cycle_time_us`, stopping once `running` is false.
    pub fn new(control: ControlContext, body: B, cycle_time_us: u64, running: Arc<AtomicBool>) -> Self {
        Self {
            control,
            body,
            cycle_time_ns: cycle_time_us as i64 * 1000,
            running,
            cycle_limit: None,
            stats: CycleStats::new(),
        }
    }

    /// Stop after `cycles` cycles.
    pub fn with_cycle_limit(mut self, cycles: u64) -> Self {
        self.cycle_limit = Some(cycles);
        self
    }

    /// Timing statistics so far.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Controlled context.
    pub fn control(&self) -> &ControlContext {
        &self.control
    }

    /// Give the context back.
    pub fn into_inner(self) -> (ControlContext, CycleStats) {
        (self.control, self.stats)
    }

    fn keep_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.cycle_limit.is_none_or(|limit| self.stats.cycle_count < limit)
    }

    #[inline]
    fn cycle_body(&mut self) {
        self.control.run_cycle(Instant::now(), &mut self.body);
    }

    /// Run until stopped.
    ///
    /// The shared running flag is cleared on every exit, so whoever feeds
    /// this loop sees it stop, whether it was asked to or failed.
    ///
    /// # Errors
    /// With the `rt` feature, `CycleError::CycleOverrun` on the first cycle
    /// that exceeds its period.
    pub fn run(&mut self) -> Result<(), CycleError> {
        info!(cycle_time_ns = self.cycle_time_ns, "Control loop started");

        #[cfg(feature = "rt")]
        let result = self.run_rt_loop();

        #[cfg(not(feature = "rt"))]
        let result = self.run_sim_loop();

        info!(
            cycles = self.stats.cycle_count,
            overruns = self.stats.overruns,
            avg_ns = self.stats.avg_cycle_ns(),
            max_ns = self.stats.max_cycle_ns,
            "Control loop stopped"
        );
        self.running.store(false, Ordering::Release);
        result
    }

    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self) -> Result<(), CycleError> {
        use nix::sys::time::{TimeSpec, TimeValLike};
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let now = || clock_gettime(clock).map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")));
        let period = TimeSpec::nanoseconds(self.cycle_time_ns);
        let mut next_wake = now()?;

        while self.keep_running() {
            next_wake = next_wake + period;

            let cycle_start = now()?;
            self.cycle_body();
            let duration_ns = (now()? - cycle_start).num_nanoseconds();
            self.stats.record(duration_ns, 0);

            if duration_ns > self.cycle_time_ns {
                self.stats.overruns += 1;
                return Err(CycleError::CycleOverrun {
                    actual_ns: duration_ns,
                    budget_ns: self.cycle_time_ns,
                });
            }

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
            if let Ok(woke) = clock_gettime(clock) {
                let late_ns = (woke - next_wake).num_nanoseconds().abs();
                self.stats.max_latency_ns = self.stats.max_latency_ns.max(late_ns);
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self) -> Result<(), CycleError> {
        let cycle_duration = std::time::Duration::from_nanos(self.cycle_time_ns as u64);

        while self.keep_running() {
            let cycle_start = Instant::now();

            self.cycle_body();

            let elapsed = cycle_start.elapsed();
            let duration_ns = elapsed.as_nanos() as i64;
            self.stats.record(duration_ns, 0);

            if duration_ns > self.cycle_time_ns {
                self.stats.overruns += 1;
                if self.stats.overruns == 1 {
                    warn!(
                        duration_ns,
                        budget_ns = self.cycle_time_ns,
                        "First cycle overrun (simulation, not fatal)"
                    );
                }
            }

            if let Some(remaining) = cycle_duration.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
