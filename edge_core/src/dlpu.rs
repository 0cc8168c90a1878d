//! DLPU time-slot coordinator.
//!
//! The accelerator is shared by every camera process on the device. The
//! coordinator divides a fixed 1000 ms cycle into uniform 200 ms slots; each
//! process is assigned an integer index at startup and owns the slot
//! beginning at `index * slot_width`. `wait_for_slot` blocks until the
//! current wall-clock position in the cycle falls inside that process's
//! slot. This is cooperative time-sharing only — true cross-process mutual
//! exclusion is not implemented; callers must tolerate sleeps of up to one
//! cycle minus one slot.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Abstracts wall-clock access so the coordinator's slot arithmetic can be
/// exercised in tests without real sleeps.
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
    fn sleep(&self, duration_ms: u64);
}

/// Real wall-clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn sleep(&self, duration_ms: u64) {
        std::thread::sleep(Duration::from_millis(duration_ms));
    }
}

/// Cumulative wait statistics, exposed for operational visibility.
#[derive(Debug, Clone, Copy, Default)]
pub struct DlpuStats {
    /// Every `wait_for_slot` call, whether or not it actually had to sleep.
    pub slot_checks_total: u64,
    pub waits_total: u64,
    pub wait_time_total_ms: u64,
    pub last_wait_ms: u64,
}

/// Hands out cooperative time-division access to the shared accelerator.
pub struct DlpuCoordinator {
    index: u32,
    cycle_ms: u64,
    slot_ms: u64,
    clock: Box<dyn Clock>,
    stats: DlpuStats,
}

impl DlpuCoordinator {
    /// The device's fixed cycle and slot widths.
    pub const DEFAULT_CYCLE_MS: u64 = 1000;
    pub const DEFAULT_SLOT_MS: u64 = 200;

    /// Create a coordinator for camera `index` using the real system clock.
    pub fn new(index: u32) -> Self {
        Self::with_clock(index, Box::new(SystemClock))
    }

    /// Create a coordinator with an injectable clock (used by tests) and the
    /// default cycle/slot widths.
    pub fn with_clock(index: u32, clock: Box<dyn Clock>) -> Self {
        Self::with_timing(index, Self::DEFAULT_CYCLE_MS, Self::DEFAULT_SLOT_MS, clock)
    }

    /// Create a coordinator with fully custom cycle/slot widths (used by
    /// tests that want a compressed cycle rather than sleeping real
    /// wall-clock seconds).
    pub fn with_timing(index: u32, cycle_ms: u64, slot_ms: u64, clock: Box<dyn Clock>) -> Self {
        Self {
            index,
            cycle_ms,
            slot_ms,
            clock,
            stats: DlpuStats::default(),
        }
    }

    /// This process's slot offset within the cycle.
    pub fn offset_ms(&self) -> u64 {
        (self.index as u64) * self.slot_ms
    }

    pub fn stats(&self) -> DlpuStats {
        self.stats
    }

    /// Block until the current wall-clock position in the cycle falls
    /// inside this coordinator's slot.
    pub fn wait_for_slot(&mut self) {
        self.stats.slot_checks_total += 1;
        let now = self.clock.now_ms();
        let position = now % self.cycle_ms;
        let offset = self.offset_ms();
        let slot_end = offset + self.slot_ms;

        let sleep_ms = if position < offset {
            offset - position
        } else if position >= slot_end {
            (self.cycle_ms - position) + offset
        } else {
            0
        };

        if sleep_ms > 0 {
            self.clock.sleep(sleep_ms);
            self.stats.waits_total += 1;
            self.stats.wait_time_total_ms += sleep_ms;
        }
        self.stats.last_wait_ms = sleep_ms;
    }

    /// A no-op: time-division implies the slot is released implicitly when
    /// it ends.
    pub fn release_slot(&self) {}
}

/// A [`Clock`] whose `now_ms` is driven by a script and whose `sleep`
/// advances virtual time instead of blocking. Used by this crate's own
/// tests and by `edge_modules`/`edge_engine` tests that need a
/// [`DlpuCoordinator`] without real wall-clock sleeps.
pub struct ManualClock {
    time: std::sync::Mutex<std::cell::Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            time: std::sync::Mutex::new(std::cell::Cell::new(start_ms)),
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.time.lock().unwrap().get()
    }

    fn sleep(&self, duration_ms: u64) {
        let cell = self.time.lock().unwrap();
        cell.set(cell.get() + duration_ms);
    }
}
