//! Thin checked wrappers over the Mach kernel interface
//!
//! Everything that crosses into the kernel funnels through here: opening a
//! task port for a pid, enumerating threads, releasing port rights and
//! reading foreign memory. Wrappers convert raw `kern_return_t` values into
//! [`KernelStatus`] and keep the unsafe surface in one place.

pub mod ffi;

use log::warn;
use mach2::kern_return::{kern_return_t, KERN_SUCCESS};
use mach2::mach_port::mach_port_deallocate;
use mach2::mach_types::{task_t, thread_act_array_t, thread_act_t};
use mach2::message::mach_msg_type_number_t;
use mach2::port::{mach_port_t, MACH_PORT_NULL};
use mach2::task::task_threads;
use mach2::traps::{mach_task_self, task_for_pid};
use mach2::vm::{mach_vm_deallocate, mach_vm_read_overwrite};
use mach2::vm_types::{mach_vm_address_t, mach_vm_size_t};

use crate::domain::KernelStatus;
use crate::walker::VirtualMemory;

pub(crate) fn kern_check(kr: kern_return_t) -> Result<(), KernelStatus> {
    if kr == KERN_SUCCESS {
        Ok(())
    } else {
        Err(KernelStatus(kr))
    }
}

/// Open the task port for `pid`. Requires root or a debugger entitlement;
/// the kernel answers `KERN_FAILURE` without one.
pub fn open_task(pid: i32) -> Result<task_t, KernelStatus> {
    let mut task: mach_port_t = MACH_PORT_NULL;
    kern_check(unsafe { task_for_pid(mach_task_self(), pid, &mut task) })?;
    Ok(task)
}

/// Enumerate the task's threads.
///
/// The kernel hands back a port array allocated in our address space. The
/// ports are copied out and the array buffer released right here, so callers
/// only ever own the port rights themselves, each of which must be balanced
/// by one [`deallocate_port`].
pub fn task_thread_list(task: task_t) -> Result<Vec<thread_act_t>, KernelStatus> {
    let mut list: thread_act_array_t = std::ptr::null_mut();
    let mut count: mach_msg_type_number_t = 0;
    kern_check(unsafe { task_threads(task, &mut list, &mut count) })?;

    let threads = unsafe { std::slice::from_raw_parts(list, count as usize) }.to_vec();

    let kr = unsafe {
        mach_vm_deallocate(
            mach_task_self(),
            list as usize as mach_vm_address_t,
            (count as usize * std::mem::size_of::<thread_act_t>()) as mach_vm_size_t,
        )
    };
    if kr != KERN_SUCCESS {
        warn!("failed to release the thread list buffer: {}", KernelStatus(kr));
    }

    Ok(threads)
}

/// Release one port right. Ports are reference-counted by the kernel; every
/// acquired right gets exactly one of these.
pub fn deallocate_port(port: mach_port_t) {
    let kr = unsafe { mach_port_deallocate(mach_task_self(), port) };
    if kr != KERN_SUCCESS {
        warn!("mach_port_deallocate(0x{port:x}) failed: {}", KernelStatus(kr));
    }
}

/// Stable kernel id for a thread port.
pub fn thread_kernel_id(thread: thread_act_t) -> Result<u64, KernelStatus> {
    let mut info = ffi::thread_identifier_info_data_t::default();
    let mut count = ffi::THREAD_IDENTIFIER_INFO_COUNT;
    let kr = unsafe {
        ffi::thread_info(
            thread,
            ffi::THREAD_IDENTIFIER_INFO,
            std::ptr::addr_of_mut!(info).cast(),
            &mut count,
        )
    };
    kern_check(kr)?;
    Ok(info.thread_id)
}

/// Scheduling info for a thread port (run state, accumulated CPU time).
pub fn thread_basic_info(
    thread: thread_act_t,
) -> Result<ffi::thread_basic_info_data_t, KernelStatus> {
    let mut info = ffi::thread_basic_info_data_t::default();
    let mut count = ffi::THREAD_BASIC_INFO_COUNT;
    let kr = unsafe {
        ffi::thread_info(
            thread,
            ffi::THREAD_BASIC_INFO,
            std::ptr::addr_of_mut!(info).cast(),
            &mut count,
        )
    };
    kern_check(kr)?;
    Ok(info)
}

/// Monotonic raw clock reading in nanoseconds.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn monotonic_raw_ns() -> u64 {
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    // Cannot fail with a valid clock id and timespec pointer.
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut ts) };
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

/// Whether `task` is this process's own task port.
pub(crate) fn is_own_task(task: task_t) -> bool {
    task == unsafe { mach_task_self() }
}

/// Kernel thread id of the calling thread.
pub(crate) fn calling_thread_id() -> u64 {
    let mut tid: u64 = 0;
    unsafe { libc::pthread_threadid_np(libc::pthread_self(), &mut tid) };
    tid
}

/// Reads of a foreign task's address space via `mach_vm_read_overwrite`.
pub struct TaskMemory {
    task: task_t,
}

impl TaskMemory {
    #[must_use]
    pub fn new(task: task_t) -> Self {
        Self { task }
    }
}

impl VirtualMemory for TaskMemory {
    fn read_exact(&self, address: u64, buf: &mut [u8]) -> Result<(), KernelStatus> {
        let mut read_size: mach_vm_size_t = 0;
        let kr = unsafe {
            mach_vm_read_overwrite(
                self.task,
                address as mach_vm_address_t,
                buf.len() as mach_vm_size_t,
                buf.as_mut_ptr() as usize as mach_vm_address_t,
                &mut read_size,
            )
        };
        kern_check(kr)?;
        if read_size as usize != buf.len() {
            // Short read: the tail of the range is unmapped.
            return Err(KernelStatus(mach2::kern_return::KERN_INVALID_ADDRESS));
        }
        Ok(())
    }
}
