//! Trace records, configuration and statistics
//!
//! These are the records collaborators consume: a captured stack is
//! self-contained and safe to copy, and holds no OS handles beyond the raw
//! port name of the sampled thread (valid only while the target stays
//! attached).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard cap on frames per trace. Configured depths are clamped to this.
pub const MAX_STACK_DEPTH: u32 = 512;

/// A single stack frame in the target's virtual address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Code address: the program counter for the innermost frame, a return
    /// address for every frame beyond it.
    pub address: u64,
    /// Frame-pointer value used to locate this frame (0 if unknown).
    pub frame_pointer: u64,
}

/// One captured call stack, innermost frame first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackTrace {
    /// Frames ordered from the currently executing frame outward toward the
    /// stack base. Never longer than the walker's clamped max depth.
    pub frames: Vec<StackFrame>,
    /// Raw Mach port name of the sampled thread. Non-owning; only meaningful
    /// while the enclosing target remains attached.
    pub thread_port: u32,
    /// The kernel's stable 64-bit thread id, or the port name if the kernel
    /// would not say.
    pub thread_id: u64,
    /// Monotonic raw timestamp at sample start, in nanoseconds (0 if
    /// timestamps are disabled).
    pub timestamp_ns: u64,
}

impl StackTrace {
    /// An empty trace bound to a thread, ready to be filled by a walk.
    #[must_use]
    pub fn for_thread(thread_port: u32) -> Self {
        Self { thread_port, ..Self::default() }
    }

    /// Number of captured frames.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn frame_count(&self) -> u32 {
        self.frames.len() as u32
    }
}

/// How the walker reconstructs a call stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackWalkStrategy {
    /// Follow the frame-pointer chain. Fast, works for frame-pointer builds.
    #[default]
    FramePointer,
    /// Reserved: DWARF/compact-unwind walking. Falls back to frame pointers.
    LibUnwind,
    /// Frame pointers first, unwinder fallback once one exists.
    Hybrid,
}

/// Walker configuration, installed once per attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackWalkerConfig {
    pub strategy: StackWalkStrategy,
    /// Frames per trace; clamped to [`MAX_STACK_DEPTH`] at walker creation.
    pub max_depth: u32,
    /// Stamp traces with a monotonic raw clock reading.
    pub capture_timestamps: bool,
    /// Reserved extra-strict validation toggle; the baseline plausibility
    /// rules always apply.
    pub validate_addresses: bool,
}

impl Default for StackWalkerConfig {
    fn default() -> Self {
        Self {
            strategy: StackWalkStrategy::FramePointer,
            max_depth: MAX_STACK_DEPTH,
            capture_timestamps: true,
            validate_addresses: false,
        }
    }
}

/// Profiler-level configuration handed to `attach`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Sampling interval for drivers that loop; the core itself never sleeps.
    pub sample_interval_ms: u32,
    pub max_stack_depth: u32,
    /// Reserved: async continuation tracking is not implemented.
    pub track_async: bool,
    /// Reserved: thread lifecycle tracking is not implemented.
    pub track_threads: bool,
    pub stack_strategy: StackWalkStrategy,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 10,
            max_stack_depth: MAX_STACK_DEPTH,
            track_async: false,
            track_threads: true,
            stack_strategy: StackWalkStrategy::FramePointer,
        }
    }
}

impl From<&ProfilerConfig> for StackWalkerConfig {
    /// The attach-time mapping: strategy and depth come from the profiler
    /// config, timestamps are always captured, extra validation stays off.
    fn from(config: &ProfilerConfig) -> Self {
        Self {
            strategy: config.stack_strategy,
            max_depth: config.max_stack_depth,
            capture_timestamps: true,
            validate_addresses: false,
        }
    }
}

/// Lifecycle state of a profiling target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfilerState {
    Detached,
    Attached,
    /// Transient while a whole-process batch is in flight.
    Sampling,
    /// Thread enumeration failed; detach (or a successful refresh) recovers.
    Error,
}

impl fmt::Display for ProfilerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfilerState::Detached => "DETACHED",
            ProfilerState::Attached => "ATTACHED",
            ProfilerState::Sampling => "SAMPLING",
            ProfilerState::Error => "ERROR",
        };
        write!(f, "{name}")
    }
}

/// Monotonically non-decreasing sample counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilerStats {
    pub total_samples: u64,
    pub successful_samples: u64,
    pub failed_samples: u64,
    /// Frames accumulated over successful samples.
    pub total_frames: u64,
    /// Reserved; never maintained.
    pub unique_addresses: u64,
}

impl ProfilerStats {
    /// Account one single-thread sample: `Some(frames)` for a capture that
    /// returned (an empty trace is still a success), `None` for a hard
    /// failure.
    pub fn record_sample(&mut self, frames: Option<u32>) {
        self.total_samples += 1;
        match frames {
            Some(count) => {
                self.successful_samples += 1;
                self.total_frames += u64::from(count);
            }
            None => self.failed_samples += 1,
        }
    }

    /// Account one whole-process batch. `successful` counts captures that
    /// produced at least one frame; the rest of `attempted` count as failed.
    pub fn record_batch(&mut self, attempted: u64, successful: u64, frames: u64) {
        self.total_samples += attempted;
        self.successful_samples += successful;
        self.failed_samples += attempted - successful;
        self.total_frames += frames;
    }
}
