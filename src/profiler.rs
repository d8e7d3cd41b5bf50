//! Sampling facade
//!
//! [`Profiler`] is the surface collaborators hold: attach/detach keyed by
//! pid, the sampling entry points and the stats snapshot. It performs no
//! kernel calls itself; everything is a thin pass-through to the owned
//! [`ProfilerTarget`]; its one substantive behavior is deriving the walker
//! configuration from the [`ProfilerConfig`] at attach time.

use crate::domain::{Pid, ProfilerError};
use crate::target::{BatchSample, ProfilerTarget, ThreadSnapshot};
use crate::trace_data::{ProfilerConfig, ProfilerState, ProfilerStats, StackTrace};

/// An attached sampling profiler.
///
/// ```no_run
/// use stackscope::{Pid, Profiler, ProfilerConfig};
///
/// # fn main() -> Result<(), stackscope::ProfilerError> {
/// let mut profiler = Profiler::attach(Pid(1234), &ProfilerConfig::default())?;
/// profiler.refresh_threads()?;
/// let sample = profiler.capture_all_stacks()?;
/// println!("{} of {} threads had walkable stacks", sample.successful, sample.traces.len());
/// profiler.detach();
/// # Ok(())
/// # }
/// ```
pub struct Profiler {
    target: ProfilerTarget,
}

impl Profiler {
    /// Attach to a process. See [`ProfilerTarget::attach`].
    ///
    /// # Errors
    /// [`ProfilerError::AttachFailed`] with the kernel's raw status.
    pub fn attach(pid: Pid, config: &ProfilerConfig) -> Result<Self, ProfilerError> {
        Ok(Self { target: ProfilerTarget::attach(pid, config)? })
    }

    /// Re-enumerate the target's threads, invalidating prior indices.
    ///
    /// # Errors
    /// See [`ProfilerTarget::refresh_threads`].
    pub fn refresh_threads(&mut self) -> Result<usize, ProfilerError> {
        self.target.refresh_threads()
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.target.pid()
    }

    #[must_use]
    pub fn state(&self) -> ProfilerState {
        self.target.state()
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.target.thread_count()
    }

    /// Sample one thread by index into the current thread list.
    ///
    /// # Errors
    /// See [`ProfilerTarget::capture_thread_stack`].
    pub fn capture_thread_stack(&mut self, index: usize) -> Result<StackTrace, ProfilerError> {
        self.target.capture_thread_stack(index)
    }

    /// Sample every thread in the current list.
    ///
    /// # Errors
    /// See [`ProfilerTarget::capture_all_stacks`].
    pub fn capture_all_stacks(&mut self) -> Result<BatchSample, ProfilerError> {
        self.target.capture_all_stacks()
    }

    /// A by-value snapshot of the sample counters.
    #[must_use]
    pub fn stats(&self) -> ProfilerStats {
        self.target.stats()
    }

    /// Best-effort scheduling info for the current thread list.
    #[must_use]
    pub fn thread_snapshots(&self) -> Vec<ThreadSnapshot> {
        self.target.thread_snapshots()
    }

    /// Dump the current thread list to stdout.
    pub fn print_thread_info(&self) {
        self.target.print_thread_info();
    }

    /// Release all kernel handles. Idempotent; also runs on drop.
    pub fn detach(&mut self) {
        self.target.detach();
    }
}
