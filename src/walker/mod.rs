//! Stack walker
//!
//! Turns a live foreign thread into a [`StackTrace`]. All architecture
//! knowledge, memory-read plumbing and address plausibility rules live here.
//! The walker is a value owned by the target manager: configuration is
//! installed at construction (with the depth clamp applied once) and read
//! during every capture.
//!
//! The walk itself is platform-independent: [`StackWalker::walk`] runs
//! against anything implementing [`VirtualMemory`]. Live capture (suspend,
//! register read, resume) is macOS-only and lives in `capture`.

mod address;
mod frame_chain;
mod memory;

#[cfg(target_os = "macos")]
mod capture;

pub use address::AddressFilter;
pub use frame_chain::RegisterSet;
pub use memory::VirtualMemory;

#[cfg(target_os = "macos")]
pub use capture::thread_id;

use log::warn;

use crate::trace_data::{StackTrace, StackWalkStrategy, StackWalkerConfig, MAX_STACK_DEPTH};

/// Reconstructs call stacks from register state and readable memory.
#[derive(Debug, Clone)]
pub struct StackWalker {
    config: StackWalkerConfig,
    filter: AddressFilter,
}

impl StackWalker {
    /// Build a walker for the host architecture. `max_depth` is clamped to
    /// [`MAX_STACK_DEPTH`].
    #[must_use]
    pub fn new(config: StackWalkerConfig) -> Self {
        Self::with_filter(config, AddressFilter::host())
    }

    /// Build a walker with explicit address rules, for walking stacks
    /// recorded on a different architecture, or pinning tests to one ISA.
    #[must_use]
    pub fn with_filter(mut config: StackWalkerConfig, filter: AddressFilter) -> Self {
        if config.max_depth > MAX_STACK_DEPTH {
            config.max_depth = MAX_STACK_DEPTH;
        }
        Self { config, filter }
    }

    /// The installed configuration, depth clamp applied.
    #[must_use]
    pub fn config(&self) -> &StackWalkerConfig {
        &self.config
    }

    /// Walk a frame-pointer chain in `memory` seeded from `regs` and return
    /// the frames collected. Truncation (unreadable or implausible chain) is
    /// not an error, and an empty trace is a legitimate outcome for threads
    /// parked in syscalls.
    #[must_use]
    pub fn walk<M: VirtualMemory + ?Sized>(&self, memory: &M, regs: RegisterSet) -> StackTrace {
        let mut trace = StackTrace::default();
        self.walk_into(memory, regs, &mut trace);
        trace
    }

    /// As [`walk`](Self::walk), but appending into a caller-prepared trace
    /// (live capture stamps thread identity and timestamp first).
    pub(crate) fn walk_into<M: VirtualMemory + ?Sized>(
        &self,
        memory: &M,
        regs: RegisterSet,
        trace: &mut StackTrace,
    ) {
        match self.config.strategy {
            StackWalkStrategy::FramePointer => {}
            StackWalkStrategy::LibUnwind => {
                warn!("libunwind walking is not implemented, using frame pointers");
            }
            // Frame pointers first; there is no unwinder to fall back to yet.
            StackWalkStrategy::Hybrid => {}
        }
        frame_chain::walk_frame_chain(memory, regs, self.filter, self.config.max_depth, trace);
    }
}

impl Default for StackWalker {
    fn default() -> Self {
        Self::new(StackWalkerConfig::default())
    }
}
