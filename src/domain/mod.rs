//! Domain model for stackscope
//!
//! Core newtypes and errors shared across the crate:
//! - Compile-time safety via the newtype pattern
//! - Kernel status codes carried verbatim, displayed by name
//! - Structured error handling

pub mod errors;
pub mod types;

pub use errors::ProfilerError;
pub use types::{CpuTime, KernelStatus, Pid, RunState};
