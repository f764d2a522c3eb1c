use std::io;
use std::marker::PhantomData;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use perf_event_open_sys::{self as sys, bindings as b};

use crate::count::Count;
use crate::event::Event;
use crate::Error;

/// Open-time counting policy.
///
/// The defaults match self-profiling under the stock
/// `kernel.perf_event_paranoid` setting: the counter starts disabled and
/// counts user space only. Hosts with relaxed restrictions may clear
/// `exclude_kernel` to fold kernel time into the totals.
#[derive(Debug, Clone)]
pub struct OpenOpts {
    /// Do not count kernel-mode execution.
    pub exclude_kernel: bool,
    /// Do not count hypervisor-mode execution.
    pub exclude_hv: bool,
    /// Create the counter disabled; the first [`Counter::start`] arms it.
    pub start_disabled: bool,
}

impl Default for OpenOpts {
    fn default() -> Self {
        Self {
            exclude_kernel: true,
            exclude_hv: true,
            start_disabled: true,
        }
    }
}

// Kernel read layout for PERF_FORMAT_TOTAL_TIME_ENABLED |
// PERF_FORMAT_TOTAL_TIME_RUNNING.
#[repr(C)]
struct RawCount {
    value: u64,
    time_enabled: u64,
    time_running: u64,
}

const COUNT_BYTES: usize = mem::size_of::<RawCount>();

/// One open hardware counter bound to the calling thread, or the absent
/// placeholder left behind when opening failed.
///
/// The counter is opened with `pid == 0`, so the kernel counts the OS
/// thread that called [`Counter::open`]. The type is `!Send`: the handle
/// stays on its opening thread from open to close, which is the whole
/// thread-affinity contract of the perf fd.
pub struct Counter {
    fd: Option<OwnedFd>,
    // Perf fds are thread-scoped; keep the handle where it was opened.
    _thread_bound: PhantomData<*mut ()>,
}

impl Counter {
    /// Opens a counter for `event` on the current thread with default
    /// [`OpenOpts`].
    ///
    /// Availability is host- and permission-dependent, so the expected
    /// caller policy is to log the error and continue with
    /// [`Counter::absent`] rather than abort; [`CounterSet::open`] does
    /// exactly that.
    ///
    /// [`CounterSet::open`]: crate::CounterSet::open
    pub fn open(event: &dyn Event) -> Result<Self, Error> {
        Self::open_with(event, &OpenOpts::default())
    }

    /// Opens a counter with an explicit policy.
    pub fn open_with(event: &dyn Event, opts: &OpenOpts) -> Result<Self, Error> {
        let mut attr = b::perf_event_attr::default();
        attr.size = mem::size_of::<b::perf_event_attr>() as u32;
        event.set_attrs(&mut attr).map_err(|source| Error::Open {
            event: event.name().to_owned(),
            source,
        })?;

        // Every read carries total-time-enabled/running so multiplexed
        // counts can be rescaled.
        attr.read_format = b::PERF_FORMAT_TOTAL_TIME_ENABLED as u64
            | b::PERF_FORMAT_TOTAL_TIME_RUNNING as u64;
        attr.set_disabled(opts.start_disabled as u64);
        attr.set_exclude_kernel(opts.exclude_kernel as u64);
        attr.set_exclude_hv(opts.exclude_hv as u64);

        // pid 0, cpu -1: this thread, whichever CPU it runs on.
        let fd = unsafe {
            sys::perf_event_open(
                &mut attr,
                0,
                -1,
                -1,
                b::PERF_FLAG_FD_CLOEXEC as libc::c_ulong,
            )
        };
        if fd < 0 {
            return Err(Error::Open {
                event: event.name().to_owned(),
                source: io::Error::last_os_error(),
            });
        }

        Ok(Self {
            fd: Some(unsafe { OwnedFd::from_raw_fd(fd) }),
            _thread_bound: PhantomData,
        })
    }

    /// The no-op counter: start/stop/close do nothing and reads yield a
    /// zero [`Count`].
    pub fn absent() -> Self {
        Self {
            fd: None,
            _thread_bound: PhantomData,
        }
    }

    /// Whether this counter holds a live handle.
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// Enables counting. Counts accumulate across stop/start pairs; nothing
    /// is ever reset here.
    pub fn start(&self) {
        if let Some(fd) = &self.fd {
            unsafe {
                sys::ioctls::ENABLE(fd.as_raw_fd(), 0);
            }
        }
    }

    /// Disables counting.
    pub fn stop(&self) {
        if let Some(fd) = &self.fd {
            unsafe {
                sys::ioctls::DISABLE(fd.as_raw_fd(), 0);
            }
        }
    }

    /// Reads the accumulated count.
    ///
    /// Absent counters read as a zero [`Count`] without error. A short read
    /// on a live counter is surfaced as [`Error::ShortRead`], never
    /// silently zero-filled, since a partial record would corrupt the
    /// scaled metric.
    pub fn read(&self) -> Result<Count, Error> {
        let Some(fd) = &self.fd else {
            return Ok(Count::default());
        };

        let mut raw = RawCount {
            value: 0,
            time_enabled: 0,
            time_running: 0,
        };
        let got = unsafe {
            libc::read(
                fd.as_raw_fd(),
                &mut raw as *mut RawCount as *mut libc::c_void,
                COUNT_BYTES,
            )
        };
        if got < 0 {
            return Err(Error::Read(io::Error::last_os_error()));
        }
        if got as usize != COUNT_BYTES {
            return Err(Error::ShortRead {
                got: got as usize,
                want: COUNT_BYTES,
            });
        }

        Ok(Count {
            raw_value: raw.value,
            time_enabled: raw.time_enabled,
            time_running: raw.time_running,
        })
    }

    /// Releases the handle. Safe to call repeatedly and on counters that
    /// never opened; the counter is absent afterwards.
    pub fn close(&mut self) {
        self.fd = None;
    }
}
