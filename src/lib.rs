//! # Stackscope - Out-of-process Sampling Profiler Core for Darwin
//!
//! Stackscope attaches to a live process by pid, periodically suspends each of
//! its threads, reads their CPU register state and reconstructs per-thread
//! call stacks by walking the frame-pointer chain in the target's virtual
//! address space. It produces raw instruction addresses plus enough metadata
//! for an external post-processing layer to symbolize, aggregate or visualize
//! the result. No symbolization happens here.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Collaborator (CLI / UI)                  │
//! │        consumes StackTrace records + ProfilerStats        │
//! └────────────────────────────┬─────────────────────────────┘
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  Profiler (facade)                                        │
//! │  attach / refresh_threads / capture_* / stats / detach    │
//! └────────────────────────────┬─────────────────────────────┘
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  ProfilerTarget                                           │
//! │  • owns the task port and the thread port list            │
//! │  • lifecycle state machine + sample statistics            │
//! └────────────────────────────┬─────────────────────────────┘
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  StackWalker                                              │
//! │  • thread_suspend → thread_get_state → walk → resume      │
//! │  • frame-pointer chain walk over foreign memory           │
//! │  • address plausibility rules (per-ISA user-space bounds) │
//! └────────────────────────────┬─────────────────────────────┘
//!                              ▼
//!                   Mach kernel (task_for_pid,
//!              task_threads, mach_vm_read_overwrite)
//! ```
//!
//! ## Module Structure
//!
//! - [`domain`]: newtypes ([`Pid`], [`KernelStatus`]) and the structured
//!   error type ([`ProfilerError`])
//! - [`trace_data`]: trace records, configuration and statistics shared with
//!   collaborators
//! - [`walker`]: the stack walker: address plausibility, the foreign-memory
//!   read seam and the frame-pointer chain walk; on macOS also live capture
//! - `mach` (macOS only): thin checked wrappers over the Mach task/thread/VM
//!   calls
//! - `target` (macOS only): attach/detach lifecycle, thread enumeration,
//!   sampling entry points, stats
//! - `profiler` (macOS only): the public facade
//!
//! The kernel-facing half only exists on macOS. Everything else (the data
//! model, the walk, the plausibility rules, stats accounting) is
//! platform-independent and fully testable against a synthetic memory oracle:
//!
//! ```
//! use stackscope::{AddressFilter, KernelStatus, RegisterSet, StackWalker};
//! use stackscope::{StackWalkerConfig, VirtualMemory};
//!
//! // Two stack frames captured from somewhere else (a core dump, a test).
//! struct Snapshot;
//!
//! impl VirtualMemory for Snapshot {
//!     fn read_exact(&self, address: u64, buf: &mut [u8]) -> Result<(), KernelStatus> {
//!         let record: [u64; 2] = match address {
//!             0x7ff0_0000_1000 => [0x7ff0_0000_1100, 0x1000_4200],
//!             0x7ff0_0000_1100 => [0, 0x1000_4400],
//!             _ => return Err(KernelStatus(1)),
//!         };
//!         buf[..8].copy_from_slice(&record[0].to_ne_bytes());
//!         buf[8..].copy_from_slice(&record[1].to_ne_bytes());
//!         Ok(())
//!     }
//! }
//!
//! let walker = StackWalker::with_filter(StackWalkerConfig::default(), AddressFilter::x86_64());
//! let regs = RegisterSet { pc: 0x1000_4000, fp: 0x7ff0_0000_1000, sp: 0x7ff0_0000_0ff0 };
//! let trace = walker.walk(&Snapshot, regs);
//! assert_eq!(trace.frame_count(), 3);
//! ```
//!
//! ## Privileges
//!
//! Opening a foreign task port requires root or a debugger entitlement;
//! `Profiler::attach` surfaces the raw kernel status when the kernel refuses.

pub mod domain;
pub mod trace_data;
pub mod walker;

#[cfg(target_os = "macos")]
pub mod mach;
#[cfg(target_os = "macos")]
pub mod profiler;
#[cfg(target_os = "macos")]
pub mod target;

pub use domain::{CpuTime, KernelStatus, Pid, ProfilerError, RunState};
pub use trace_data::{
    ProfilerConfig, ProfilerState, ProfilerStats, StackFrame, StackTrace, StackWalkStrategy,
    StackWalkerConfig, MAX_STACK_DEPTH,
};
pub use walker::{AddressFilter, RegisterSet, StackWalker, VirtualMemory};

#[cfg(target_os = "macos")]
pub use profiler::Profiler;
#[cfg(target_os = "macos")]
pub use target::{BatchSample, ProfilerTarget, ThreadSnapshot};
