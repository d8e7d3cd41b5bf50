//! Live capture of a foreign thread's stack
//!
//! The critical sequence: suspend the thread, read its register state, walk
//! the chain, resume. The suspend count must balance on every path out, so
//! the resume lives in a drop guard: whatever happens between suspend and
//! return, the thread runs again.

use log::{debug, warn};
use mach2::kern_return::KERN_SUCCESS;
use mach2::mach_types::{task_t, thread_act_t};
use mach2::thread_act::{thread_resume, thread_suspend};

use super::frame_chain::RegisterSet;
use super::StackWalker;
use crate::domain::{KernelStatus, ProfilerError};
use crate::mach::{self, TaskMemory};
use crate::trace_data::StackTrace;

/// Resumes the suspended thread when dropped.
struct SuspendGuard {
    thread: thread_act_t,
}

impl SuspendGuard {
    fn suspend(thread: thread_act_t) -> Result<Self, KernelStatus> {
        mach::kern_check(unsafe { thread_suspend(thread) })?;
        Ok(Self { thread })
    }
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        let kr = unsafe { thread_resume(self.thread) };
        if kr != KERN_SUCCESS {
            warn!(
                "thread_resume failed for port 0x{:x}: {}",
                self.thread,
                KernelStatus(kr)
            );
        }
    }
}

/// The kernel's stable id for `thread`, falling back to the port name when
/// `thread_info` refuses; the status of that refusal rides along so callers
/// can tell a real id from the fallback.
#[must_use]
pub fn thread_id(thread: thread_act_t) -> (u64, Option<KernelStatus>) {
    match mach::thread_kernel_id(thread) {
        Ok(id) => (id, None),
        Err(status) => (u64::from(thread), Some(status)),
    }
}

impl StackWalker {
    /// Capture one stack trace from a live thread of `task`.
    ///
    /// Hard failures (suspend or register read refused) surface the kernel
    /// status; a walk that finds nothing readable returns an empty trace,
    /// which is success (threads parked in syscalls legitimately present
    /// this way).
    ///
    /// # Errors
    /// [`ProfilerError::SelfSample`] when asked to sample the calling thread
    /// of this process (suspending it would deadlock),
    /// [`ProfilerError::SuspendFailed`] / [`ProfilerError::StateReadFailed`]
    /// for the kernel refusals. After a successful suspend the thread is
    /// resumed on every path.
    pub fn capture(&self, task: task_t, thread: thread_act_t) -> Result<StackTrace, ProfilerError> {
        let mut trace = StackTrace::for_thread(thread);

        let (id, id_status) = thread_id(thread);
        trace.thread_id = id;
        if let Some(status) = id_status {
            debug!("no stable id for thread port 0x{thread:x} ({status}), using the port name");
        }

        if self.config().capture_timestamps {
            trace.timestamp_ns = mach::monotonic_raw_ns();
        }

        if mach::is_own_task(task) && mach::calling_thread_id() == trace.thread_id {
            return Err(ProfilerError::SelfSample);
        }

        let guard = SuspendGuard::suspend(thread).map_err(ProfilerError::SuspendFailed)?;
        let regs = read_registers(thread).map_err(ProfilerError::StateReadFailed)?;

        let memory = TaskMemory::new(task);
        self.walk_into(&memory, regs, &mut trace);

        drop(guard); // resume before returning
        Ok(trace)
    }

    /// Capture every thread in `threads`, in order. Each thread gets a slot
    /// in the output (hard failures leave an empty placeholder trace) and
    /// the second element counts captures that succeeded with at least one
    /// frame.
    #[must_use]
    pub fn capture_batch(
        &self,
        task: task_t,
        threads: &[thread_act_t],
    ) -> (Vec<StackTrace>, u32) {
        let mut traces = Vec::with_capacity(threads.len());
        let mut successful = 0;

        for &thread in threads {
            match self.capture(task, thread) {
                Ok(trace) => {
                    if trace.frame_count() > 0 {
                        successful += 1;
                    }
                    traces.push(trace);
                }
                Err(err) => {
                    debug!("capture failed for thread port 0x{thread:x}: {err}");
                    traces.push(StackTrace::for_thread(thread));
                }
            }
        }

        (traces, successful)
    }
}

fn read_registers(thread: thread_act_t) -> Result<RegisterSet, KernelStatus> {
    #[cfg(target_arch = "x86_64")]
    {
        use mach2::structs::x86_thread_state64_t;
        use mach2::thread_act::thread_get_state;
        use mach2::thread_status::x86_THREAD_STATE64;

        let mut state = x86_thread_state64_t::new();
        let mut count = x86_thread_state64_t::count();
        let kr = unsafe {
            thread_get_state(
                thread,
                x86_THREAD_STATE64,
                std::ptr::addr_of_mut!(state).cast(),
                &mut count,
            )
        };
        mach::kern_check(kr)?;
        Ok(RegisterSet { pc: state.__rip, fp: state.__rbp, sp: state.__rsp })
    }

    #[cfg(target_arch = "aarch64")]
    {
        use mach2::structs::arm_thread_state64_t;
        use mach2::thread_act::thread_get_state;
        use mach2::thread_status::ARM_THREAD_STATE64;

        let mut state = arm_thread_state64_t::new();
        let mut count = arm_thread_state64_t::count();
        let kr = unsafe {
            thread_get_state(
                thread,
                ARM_THREAD_STATE64,
                std::ptr::addr_of_mut!(state).cast(),
                &mut count,
            )
        };
        mach::kern_check(kr)?;
        Ok(RegisterSet { pc: state.__pc, fp: state.__fp, sp: state.__sp })
    }
}
