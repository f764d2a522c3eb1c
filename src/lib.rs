//! Hardware performance-counter measurement harness.
//!
//! Wraps Linux `perf_event_open(2)` counters (CPU cycles, retired
//! instructions, cache references/misses, ...) around a measured region of
//! code and reports one per-operation metric per event when the region is
//! closed, correcting for kernel multiplexing of the limited hardware
//! counter slots.
//!
//! The expected caller is a benchmark driver: open a [`CounterSet`] once
//! per measured region, [`start`](CounterSet::start) before the region,
//! [`stop`](CounterSet::stop) after it, and [`close`](CounterSet::close) at
//! the end to flush the metrics. Stop/start may be repeated inside a long
//! region to exclude sub-intervals (allocator bookkeeping, forced
//! collections) from the totals; counts accumulate across the pause.
//!
//! Counter availability depends on the host and on
//! `kernel.perf_event_paranoid`, so a counter that fails to open degrades
//! to an absent no-op slot instead of failing the run.
//!
//! ```no_run
//! use memperf::{CounterSet, Event, Hardware};
//!
//! let events: &[&dyn Event] = &[&Hardware::CPU_CYCLES, &Hardware::INSTRUCTIONS];
//! let iters = 1_000_000u64;
//!
//! let mut set = CounterSet::open(events, |name: &str, per_op: f64| {
//!     println!("{name}/op: {per_op}");
//! });
//! set.start();
//! for _ in 0..iters {
//!     // measured work
//! }
//! set.stop();
//! set.close(iters);
//! ```

mod count;

pub use count::Count;

use thiserror::Error;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod counter;
        mod event;
        mod set;

        pub use counter::{Counter, OpenOpts};
        pub use event::{Event, Hardware, Software};
        pub use set::{CounterSet, Reporter};

        /// Open attributes filled in by [`Event::set_attrs`].
        pub use perf_event_open_sys::bindings::perf_event_attr;
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// The kernel refused to open the counter: insufficient permission,
    /// exhausted hardware slots, or an event the host does not support.
    #[error("failed to open counter {event}: {source}")]
    Open {
        event: String,
        #[source]
        source: std::io::Error,
    },
    /// Reading the counter's handle failed.
    #[error("failed to read counter: {0}")]
    Read(#[source] std::io::Error),
    /// The kernel returned fewer bytes than the fixed read format holds.
    #[error("short counter read: got {got} bytes, want {want}")]
    ShortRead { got: usize, want: usize },
}
