//! Structured error types for stackscope
//!
//! Using thiserror for automatic Display implementation. Kernel status codes
//! travel inside the variants verbatim so collaborators can present them.

use super::types::{KernelStatus, Pid};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerError {
    /// `task_for_pid` refused, almost always missing privileges.
    #[error("failed to open task port for {pid}: {status}")]
    AttachFailed { pid: Pid, status: KernelStatus },

    /// `task_threads` refused; the target moves to the error state.
    #[error("failed to enumerate threads: {0}")]
    ThreadEnumerationFailed(KernelStatus),

    /// Operation requires an attached target.
    #[error("not attached to a process")]
    NotAttached,

    /// Thread index is stale or out of range for the current thread list.
    #[error("thread index {index} out of range (thread count: {count})")]
    InvalidThreadIndex { index: usize, count: usize },

    /// Refused to suspend the thread driving the sampler; a thread cannot
    /// suspend itself through this mechanism without deadlocking.
    #[error("refusing to sample the calling thread")]
    SelfSample,

    /// `thread_suspend` failed; no register read was attempted.
    #[error("thread_suspend failed: {0}")]
    SuspendFailed(KernelStatus),

    /// `thread_get_state` failed; the thread was resumed before returning.
    #[error("thread_get_state failed: {0}")]
    StateReadFailed(KernelStatus),
}
