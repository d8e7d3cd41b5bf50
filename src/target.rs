//! Target lifecycle management
//!
//! A [`ProfilerTarget`] owns everything acquired from the kernel for one
//! attached process: the task port, the current thread port list and the
//! stack walker configured for it. It tracks the lifecycle state machine
//! (Detached → Attached ⇄ Sampling, Error on enumeration failure) and the
//! aggregate sample statistics.
//!
//! Ownership rules: every port right acquired is released exactly once, all
//! error paths included. `detach` is the single release site and `Drop`
//! routes through it, so leaking a target cannot leak kernel handles.

use log::{debug, info, warn};
use mach2::mach_types::{task_t, thread_act_t};
use mach2::port::MACH_PORT_NULL;

use crate::domain::{CpuTime, Pid, ProfilerError, RunState};
use crate::mach;
use crate::trace_data::{
    ProfilerConfig, ProfilerState, ProfilerStats, StackTrace, StackWalkerConfig,
};
use crate::walker::StackWalker;

/// One attached target process.
pub struct ProfilerTarget {
    pid: Pid,
    task: task_t,
    threads: Vec<thread_act_t>,
    state: ProfilerState,
    walker: StackWalker,
    stats: ProfilerStats,
}

/// Result of a whole-process sample: one trace per thread in thread-list
/// order. `successful` counts traces with at least one frame; hard failures
/// left an empty placeholder in their slot.
#[derive(Debug, Clone)]
pub struct BatchSample {
    pub traces: Vec<StackTrace>,
    pub successful: u32,
}

/// Point-in-time scheduling info for one thread in the current list.
#[derive(Debug, Clone, Copy)]
pub struct ThreadSnapshot {
    pub index: usize,
    pub port: thread_act_t,
    pub run_state: RunState,
    /// Accumulated user-mode CPU time.
    pub user_time: CpuTime,
}

impl ProfilerTarget {
    /// Attach to `pid`: configure a walker from `config` and open the task
    /// port. The thread list starts empty; call
    /// [`refresh_threads`](Self::refresh_threads) before sampling.
    ///
    /// # Errors
    /// [`ProfilerError::AttachFailed`] with the kernel's verdict, verbatim.
    /// Opening a foreign task port needs root or a debugger entitlement.
    pub fn attach(pid: Pid, config: &ProfilerConfig) -> Result<Self, ProfilerError> {
        let walker = StackWalker::new(StackWalkerConfig::from(config));

        let task = mach::open_task(pid.into()).map_err(|status| {
            warn!("task_for_pid refused for {pid}: {status} (root or a debugger entitlement is usually required)");
            ProfilerError::AttachFailed { pid, status }
        })?;

        info!("attached to {pid} (task port 0x{task:x})");
        Ok(Self {
            pid,
            task,
            threads: Vec::new(),
            state: ProfilerState::Attached,
            walker,
            stats: ProfilerStats::default(),
        })
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[must_use]
    pub fn state(&self) -> ProfilerState {
        self.state
    }

    /// Threads in the current list (0 until the first refresh).
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// A by-value snapshot of the sample counters.
    #[must_use]
    pub fn stats(&self) -> ProfilerStats {
        self.stats
    }

    /// Replace the thread list with a fresh enumeration.
    ///
    /// Destructive: the previously held thread ports are released before
    /// re-enumerating, so any thread index handed out earlier is invalid
    /// afterwards, whether or not the refresh succeeds.
    ///
    /// # Errors
    /// [`ProfilerError::NotAttached`] when detached;
    /// [`ProfilerError::ThreadEnumerationFailed`] moves the target to the
    /// error state (a later successful refresh recovers it).
    pub fn refresh_threads(&mut self) -> Result<usize, ProfilerError> {
        if self.state == ProfilerState::Detached {
            return Err(ProfilerError::NotAttached);
        }

        self.release_threads();

        match mach::task_thread_list(self.task) {
            Ok(threads) => {
                debug!("found {} thread(s) in {}", threads.len(), self.pid);
                self.threads = threads;
                self.state = ProfilerState::Attached;
                Ok(self.threads.len())
            }
            Err(status) => {
                self.state = ProfilerState::Error;
                Err(ProfilerError::ThreadEnumerationFailed(status))
            }
        }
    }

    /// Sample one thread of the current list by index.
    ///
    /// # Errors
    /// [`ProfilerError::NotAttached`] / [`ProfilerError::InvalidThreadIndex`]
    /// for state and bounds (neither counts as a sample); the walker's
    /// hard failures count as failed samples and pass through.
    pub fn capture_thread_stack(&mut self, index: usize) -> Result<StackTrace, ProfilerError> {
        if self.state == ProfilerState::Detached {
            return Err(ProfilerError::NotAttached);
        }
        let Some(&thread) = self.threads.get(index) else {
            return Err(ProfilerError::InvalidThreadIndex { index, count: self.threads.len() });
        };

        match self.walker.capture(self.task, thread) {
            Ok(trace) => {
                self.stats.record_sample(Some(trace.frame_count()));
                Ok(trace)
            }
            Err(err) => {
                self.stats.record_sample(None);
                Err(err)
            }
        }
    }

    /// Sample every thread in the current list, sequentially, in list order.
    ///
    /// No cross-thread atomicity: by the time the last thread is sampled the
    /// earlier ones have resumed and moved on.
    ///
    /// # Errors
    /// [`ProfilerError::NotAttached`] when detached. Per-thread failures do
    /// not abort the batch; they are aggregated into the stats.
    pub fn capture_all_stacks(&mut self) -> Result<BatchSample, ProfilerError> {
        if self.state == ProfilerState::Detached {
            return Err(ProfilerError::NotAttached);
        }

        let entered_sampling = self.state == ProfilerState::Attached;
        if entered_sampling {
            self.state = ProfilerState::Sampling;
        }

        let (traces, successful) = self.walker.capture_batch(self.task, &self.threads);

        if entered_sampling {
            self.state = ProfilerState::Attached;
        }

        let frames: u64 = traces.iter().map(|trace| u64::from(trace.frame_count())).sum();
        self.stats.record_batch(self.threads.len() as u64, u64::from(successful), frames);

        Ok(BatchSample { traces, successful })
    }

    /// Best-effort scheduling snapshot of every thread in the current list.
    /// Threads the kernel will not describe come back as `UNKNOWN` with zero
    /// CPU time.
    #[must_use]
    pub fn thread_snapshots(&self) -> Vec<ThreadSnapshot> {
        self.threads
            .iter()
            .enumerate()
            .map(|(index, &port)| match mach::thread_basic_info(port) {
                Ok(basic) => ThreadSnapshot {
                    index,
                    port,
                    run_state: RunState::from_raw(basic.run_state),
                    user_time: CpuTime::new(basic.user_time.seconds, basic.user_time.microseconds),
                },
                Err(status) => {
                    debug!("thread_info failed for port 0x{port:x}: {status}");
                    ThreadSnapshot {
                        index,
                        port,
                        run_state: RunState::Unknown,
                        user_time: CpuTime::default(),
                    }
                }
            })
            .collect()
    }

    /// Dump the current thread list to stdout.
    pub fn print_thread_info(&self) {
        println!();
        println!("Process: {}", i32::from(self.pid));
        println!("Threads: {}", self.threads.len());
        println!("State: {}", self.state);
        println!();

        for snapshot in self.thread_snapshots() {
            println!("  Thread {} (port: 0x{:x})", snapshot.index, snapshot.port);
            println!("    State: {}", snapshot.run_state);
            println!("    CPU time: {} seconds", snapshot.user_time);
            println!();
        }
    }

    /// Release everything and return to `Detached`. Idempotent and
    /// infallible, callable from any state, including `Error`.
    pub fn detach(&mut self) {
        if self.state == ProfilerState::Detached {
            return;
        }

        self.release_threads();

        if self.task != MACH_PORT_NULL {
            mach::deallocate_port(self.task);
            self.task = MACH_PORT_NULL;
        }

        self.state = ProfilerState::Detached;
        info!("detached from {}", self.pid);
    }

    fn release_threads(&mut self) {
        for &thread in &self.threads {
            mach::deallocate_port(thread);
        }
        self.threads.clear();
    }
}

impl Drop for ProfilerTarget {
    fn drop(&mut self) {
        self.detach();
    }
}
