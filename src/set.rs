use smallvec::SmallVec;
use tracing::warn;

use crate::counter::{Counter, OpenOpts};
use crate::event::Event;

/// Sink for the metrics flushed by [`CounterSet::close`].
///
/// Implemented for any `FnMut(&str, f64)`, so a closure pushing into the
/// caller's result table is enough.
pub trait Reporter {
    /// Called at most once per event with its per-operation scaled count.
    fn report_metric(&mut self, event: &str, per_op: f64);
}

impl<F: FnMut(&str, f64)> Reporter for F {
    fn report_metric(&mut self, event: &str, per_op: f64) {
        self(event, per_op)
    }
}

/// A fixed list of counters driven as one unit: started and stopped
/// together, and reported and released by a single [`close`](Self::close).
///
/// Counters that failed to open ride along as absent slots, so the counter
/// list stays index-aligned with the event list and broadcast operations
/// need no presence checks.
///
/// All calls must come from the thread that opened the set; the set is
/// `!Send` because the counters it holds are.
pub struct CounterSet<'a, R: Reporter> {
    events: &'a [&'a dyn Event],
    counters: SmallVec<[Counter; 4]>,
    // Cleared on first close; a later close is a no-op.
    reporter: Option<R>,
}

impl<'a, R: Reporter> CounterSet<'a, R> {
    /// Opens one counter per event, in order, with default [`OpenOpts`].
    ///
    /// A per-counter open failure does not fail the set: the error is
    /// logged and that slot stays absent. Hosts without perf access yield a
    /// set where [`available`](Self::available) is zero and close reports
    /// nothing.
    pub fn open(events: &'a [&'a dyn Event], reporter: R) -> Self {
        Self::open_with(events, reporter, &OpenOpts::default())
    }

    /// Opens the set with an explicit counting policy.
    pub fn open_with(events: &'a [&'a dyn Event], reporter: R, opts: &OpenOpts) -> Self {
        let counters = events
            .iter()
            .map(|event| {
                Counter::open_with(*event, opts).unwrap_or_else(|err| {
                    warn!("error opening counter {}: {}", event.name(), err);
                    Counter::absent()
                })
            })
            .collect();

        Self {
            events,
            counters,
            reporter: Some(reporter),
        }
    }

    /// Number of counters that actually opened. The driver may treat zero
    /// as grounds to fail the whole run; this harness does not.
    pub fn available(&self) -> usize {
        self.counters.iter().filter(|c| c.is_open()).count()
    }

    /// Enables every counter in list order.
    pub fn start(&self) {
        for counter in &self.counters {
            counter.start();
        }
    }

    /// Disables every counter in list order. Counts keep accumulating
    /// across a later [`start`](Self::start); excluding an interval means
    /// stopping before it and starting after.
    pub fn stop(&self) {
        for counter in &self.counters {
            counter.stop();
        }
    }

    /// Reads, scales, and reports each live counter, then releases it.
    ///
    /// Each final reading is rescaled for multiplexing and divided by
    /// `iters`, the caller's normalization factor (typically benchmark
    /// iterations). Counters that never reached the PMU
    /// (`time_running == 0`) report nothing, as do counters whose final
    /// read fails; both are logged-and-skipped conditions. A second close
    /// is a no-op.
    pub fn close(&mut self, iters: u64) {
        let Some(mut reporter) = self.reporter.take() else {
            return;
        };

        for (event, counter) in self.events.iter().zip(&mut self.counters) {
            match counter.read() {
                Err(err) => warn!("error reading counter {}: {}", event.name(), err),
                Ok(count) if count.time_running > 0 => {
                    reporter.report_metric(event.name(), count.value() as f64 / iters as f64);
                }
                Ok(_) => {}
            }
            counter.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io;

    use perf_event_open_sys::bindings as b;

    use super::*;
    use crate::event::Hardware;

    // PERF_TYPE_HARDWARE with an out-of-range config; the kernel rejects
    // this at open on every host, which stands in for permission denial.
    struct Unopenable;

    impl Event for Unopenable {
        fn set_attrs(&self, attr: &mut b::perf_event_attr) -> io::Result<()> {
            attr.type_ = b::PERF_TYPE_HARDWARE;
            attr.config = u64::MAX;
            Ok(())
        }

        fn name(&self) -> &str {
            "unopenable"
        }
    }

    #[test]
    fn failed_open_leaves_an_absent_slot() {
        let events: &[&dyn Event] = &[&Hardware::CPU_CYCLES, &Unopenable];
        let reports = RefCell::new(Vec::new());
        let mut set = CounterSet::open(events, |name: &str, per_op: f64| {
            reports.borrow_mut().push((name.to_owned(), per_op));
        });

        // Index 1 must never open; index 0 depends on host perf access.
        assert!(set.available() <= 1);
        assert!(!set.counters[1].is_open());

        // Broadcasts must tolerate the absent slot.
        set.start();
        set.stop();
        set.close(1);
        drop(set);

        let reports = reports.into_inner();
        assert!(reports.len() <= 1);
        assert!(reports.iter().all(|(name, _)| name == "cpu-cycles"));
    }

    #[test]
    fn close_is_idempotent() {
        let events: &[&dyn Event] = &[&Hardware::CPU_CYCLES, &Hardware::INSTRUCTIONS];
        let reports = RefCell::new(Vec::new());
        let mut set = CounterSet::open(events, |name: &str, per_op: f64| {
            reports.borrow_mut().push((name.to_owned(), per_op));
        });
        let live = set.available();

        set.start();
        std::hint::black_box((0..10_000u64).sum::<u64>());
        set.stop();

        set.close(10_000);
        let after_first = reports.borrow().len();
        set.close(10_000);
        drop(set);

        let reports = reports.into_inner();
        assert_eq!(reports.len(), after_first);
        assert!(reports.len() <= live);
    }

    #[test]
    fn all_absent_set_reports_nothing() {
        let events: &[&dyn Event] = &[&Unopenable, &Unopenable];
        let reported = RefCell::new(0u32);
        let mut set = CounterSet::open(events, |_: &str, _: f64| {
            *reported.borrow_mut() += 1;
        });

        assert_eq!(set.available(), 0);
        set.start();
        set.stop();
        set.close(100);
        drop(set);

        assert_eq!(reported.into_inner(), 0);
    }
}
