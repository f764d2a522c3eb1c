/// A point-in-time counter reading in the kernel's read format.
///
/// `time_enabled` is the cumulative time the counter was configured to run;
/// `time_running` is the time it actually occupied a hardware slot. The two
/// differ only when the kernel multiplexed more requested counters than the
/// PMU has slots, so `time_running <= time_enabled` always holds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Count {
    pub raw_value: u64,
    pub time_enabled: u64,
    pub time_running: u64,
}

impl Count {
    /// Returns the counter value scaled to account for time the counter was
    /// descheduled, linearly extrapolating `raw_value` over the span the
    /// counter was off the PMU.
    pub fn value(&self) -> u64 {
        if self.time_enabled == self.time_running {
            // Common case: on the PMU the whole time, return the raw count
            // without a float round-trip.
            return self.raw_value;
        }
        if self.time_running == 0 {
            // Never scheduled; avoid dividing by zero.
            return 0;
        }
        (self.raw_value as f64 * (self.time_enabled as f64 / self.time_running as f64)) as u64
    }
}
