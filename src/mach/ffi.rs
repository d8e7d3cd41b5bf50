//! Supplemental Mach FFI
//!
//! The `mach2` crate covers the task/thread/VM calls the sampler leans on,
//! but not `thread_info` and its info structs. Those declarations are
//! centralized here, matching the layout in `<mach/thread_info.h>`.

#![allow(non_camel_case_types)]

use mach2::kern_return::kern_return_t;
use mach2::mach_types::thread_act_t;
use mach2::message::mach_msg_type_number_t;
use mach2::vm_types::{integer_t, natural_t};

pub type thread_flavor_t = natural_t;
pub type thread_info_t = *mut integer_t;

/// `thread_info` flavor: scheduling info and accumulated CPU time.
pub const THREAD_BASIC_INFO: thread_flavor_t = 3;
/// `thread_info` flavor: stable 64-bit thread id.
pub const THREAD_IDENTIFIER_INFO: thread_flavor_t = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct time_value_t {
    pub seconds: integer_t,
    pub microseconds: integer_t,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct thread_basic_info_data_t {
    pub user_time: time_value_t,
    pub system_time: time_value_t,
    pub cpu_usage: integer_t,
    pub policy: integer_t,
    pub run_state: integer_t,
    pub flags: integer_t,
    pub suspend_count: integer_t,
    pub sleep_time: integer_t,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct thread_identifier_info_data_t {
    /// The kernel's stable thread id (what `pthread_threadid_np` reports).
    pub thread_id: u64,
    pub thread_handle: u64,
    pub dispatch_qaddr: u64,
}

#[allow(clippy::cast_possible_truncation)]
pub const THREAD_BASIC_INFO_COUNT: mach_msg_type_number_t =
    (std::mem::size_of::<thread_basic_info_data_t>() / std::mem::size_of::<natural_t>())
        as mach_msg_type_number_t;

#[allow(clippy::cast_possible_truncation)]
pub const THREAD_IDENTIFIER_INFO_COUNT: mach_msg_type_number_t =
    (std::mem::size_of::<thread_identifier_info_data_t>() / std::mem::size_of::<natural_t>())
        as mach_msg_type_number_t;

extern "C" {
    /// Query per-thread info for the given flavor. The count is in/out:
    /// buffer capacity in `natural_t` units on entry, fields written on exit.
    pub fn thread_info(
        target_act: thread_act_t,
        flavor: thread_flavor_t,
        thread_info_out: thread_info_t,
        thread_info_out_count: *mut mach_msg_type_number_t,
    ) -> kern_return_t;
}
