use std::io;

use perf_event_open_sys::bindings as b;

/// A requestable counter event.
///
/// Implemented by the built-in [`Hardware`] and [`Software`] descriptors.
/// External types can implement it to request raw or vendor-specific events
/// without any change to [`Counter`](crate::Counter) or
/// [`CounterSet`](crate::CounterSet).
pub trait Event {
    /// Fills in the event-selecting fields of the open attributes.
    fn set_attrs(&self, attr: &mut b::perf_event_attr) -> io::Result<()>;

    /// Name used to tag the reported metric.
    fn name(&self) -> &str;
}

/// A generalized hardware PMU event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hardware {
    name: &'static str,
    config: u64,
}

impl Hardware {
    pub const CPU_CYCLES: Self = Self::new("cpu-cycles", b::PERF_COUNT_HW_CPU_CYCLES as u64);
    pub const INSTRUCTIONS: Self =
        Self::new("instructions", b::PERF_COUNT_HW_INSTRUCTIONS as u64);
    pub const CACHE_REFERENCES: Self =
        Self::new("cache-references", b::PERF_COUNT_HW_CACHE_REFERENCES as u64);
    pub const CACHE_MISSES: Self =
        Self::new("cache-misses", b::PERF_COUNT_HW_CACHE_MISSES as u64);

    const fn new(name: &'static str, config: u64) -> Self {
        Self { name, config }
    }
}

impl Event for Hardware {
    fn set_attrs(&self, attr: &mut b::perf_event_attr) -> io::Result<()> {
        attr.type_ = b::PERF_TYPE_HARDWARE;
        attr.config = self.config;
        Ok(())
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// A kernel software event. These open even where hardware counters are
/// unavailable (virtual machines, restricted hosts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Software {
    name: &'static str,
    config: u64,
}

impl Software {
    pub const PAGE_FAULTS: Self = Self::new("page-faults", b::PERF_COUNT_SW_PAGE_FAULTS as u64);
    pub const CONTEXT_SWITCHES: Self =
        Self::new("context-switches", b::PERF_COUNT_SW_CONTEXT_SWITCHES as u64);
    pub const TASK_CLOCK: Self = Self::new("task-clock", b::PERF_COUNT_SW_TASK_CLOCK as u64);

    const fn new(name: &'static str, config: u64) -> Self {
        Self { name, config }
    }
}

impl Event for Software {
    fn set_attrs(&self, attr: &mut b::perf_event_attr) -> io::Result<()> {
        attr.type_ = b::PERF_TYPE_SOFTWARE;
        attr.config = self.config;
        Ok(())
    }

    fn name(&self) -> &str {
        self.name
    }
}
