//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep pids, kernel status codes and thread
//! scheduling info from degenerating into bare integers in signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID of a profiling target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<i32> for Pid {
    fn from(pid: i32) -> Self {
        Pid(pid as u32)
    }
}

impl From<Pid> for i32 {
    fn from(pid: Pid) -> Self {
        pid.0 as i32
    }
}

/// A raw Mach `kern_return_t`, carried verbatim so collaborators can present
/// the kernel's own verdict.
///
/// `Display` names the codes the sampler actually runs into (permission
/// failures on attach, dead ports mid-sample, unmapped reads); anything else
/// falls back to the numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelStatus(pub i32);

impl KernelStatus {
    /// Symbolic name for well-known codes, if this is one.
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "KERN_SUCCESS",
            1 => "KERN_INVALID_ADDRESS",
            2 => "KERN_PROTECTION_FAILURE",
            3 => "KERN_NO_SPACE",
            4 => "KERN_INVALID_ARGUMENT",
            5 => "KERN_FAILURE",
            6 => "KERN_RESOURCE_SHORTAGE",
            8 => "KERN_NO_ACCESS",
            9 => "KERN_MEMORY_FAILURE",
            14 => "KERN_ABORTED",
            15 => "KERN_INVALID_NAME",
            16 => "KERN_INVALID_TASK",
            17 => "KERN_INVALID_RIGHT",
            37 => "KERN_TERMINATED",
            0x10000003 => "MACH_SEND_INVALID_DEST",
            _ => return None,
        })
    }
}

impl fmt::Display for KernelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.0),
            None => write!(f, "kern_return_t {}", self.0),
        }
    }
}

/// Scheduler run state of a thread, decoded from the Mach `TH_STATE_*`
/// values returned by `thread_info(THREAD_BASIC_INFO)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Stopped,
    Waiting,
    Uninterruptible,
    Halted,
    Unknown,
}

impl RunState {
    /// Decode a raw `run_state` field (TH_STATE_RUNNING = 1 ... TH_STATE_HALTED = 5).
    #[must_use]
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => RunState::Running,
            2 => RunState::Stopped,
            3 => RunState::Waiting,
            4 => RunState::Uninterruptible,
            5 => RunState::Halted,
            _ => RunState::Unknown,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Running => "RUNNING",
            RunState::Stopped => "STOPPED",
            RunState::Waiting => "WAITING",
            RunState::Uninterruptible => "UNINTERRUPTIBLE",
            RunState::Halted => "HALTED",
            RunState::Unknown => "UNKNOWN",
        };
        write!(f, "{name}")
    }
}

/// Accumulated CPU time as the kernel reports it: whole seconds plus
/// microseconds, displayed as `s.μμμμμμ`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTime {
    pub seconds: i32,
    pub microseconds: i32,
}

impl CpuTime {
    #[must_use]
    pub fn new(seconds: i32, microseconds: i32) -> Self {
        Self { seconds, microseconds }
    }

    /// Total time in seconds, for aggregation.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_seconds(&self) -> f64 {
        f64::from(self.seconds) + f64::from(self.microseconds) / 1_000_000.0
    }
}

impl fmt::Display for CpuTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.seconds, self.microseconds)
    }
}
