//! Frame-pointer chain walking
//!
//! Both supported ISAs store the caller's frame pointer at `[fp]` and the
//! return address at `[fp + 8]`, so a stack with frame pointers is a linked
//! list walkable without debug info. The chain lives in untrusted foreign
//! memory; every pointer is checked before use and any anomaly simply ends
//! the walk; a truncated trace is a valid trace.

use log::debug;

use super::address::AddressFilter;
use super::memory::{read_frame_record, VirtualMemory};
use crate::trace_data::{StackFrame, StackTrace};

/// Registers that seed a walk, already decoded from the ISA-specific thread
/// state flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSet {
    pub pc: u64,
    pub fp: u64,
    pub sp: u64,
}

/// Largest gap allowed between consecutive frame pointers. Real frames are
/// rarely more than a few KiB; a hop past 1 MiB means the chain is garbage.
const MAX_FRAME_SPAN: u64 = 0x10_0000;

/// Walk the frame-pointer chain starting at `regs`, appending at most
/// `max_depth` frames (counting any frame already present) to `trace`.
///
/// An implausible PC with a plausible FP skips the innermost frame but still
/// walks the chain, since threads parked in syscalls or optimized leaves present
/// this way. Implausible PC and FP yield an empty trace, which is not an
/// error.
pub(crate) fn walk_frame_chain<M: VirtualMemory + ?Sized>(
    memory: &M,
    regs: RegisterSet,
    filter: AddressFilter,
    max_depth: u32,
    trace: &mut StackTrace,
) {
    let mut fp = regs.fp;

    if filter.is_plausible(regs.pc) {
        trace.frames.push(StackFrame { address: regs.pc, frame_pointer: fp });
    } else if !filter.is_plausible(fp) {
        return;
    }

    let mut prev_fp: u64 = 0;
    while trace.frame_count() < max_depth {
        if !filter.is_plausible(fp) {
            break;
        }
        // Once a previous frame exists the chain must grow strictly toward
        // the stack base, one hop no larger than MAX_FRAME_SPAN.
        if prev_fp != 0 {
            if fp <= prev_fp {
                break;
            }
            if fp - prev_fp > MAX_FRAME_SPAN {
                break;
            }
        }

        let Some((next_fp, return_addr)) = read_frame_record(memory, fp) else {
            // Unreadable frame: the walk truncates cleanly.
            debug!("frame record read failed at 0x{fp:x}, truncating walk");
            break;
        };

        if !filter.is_plausible(return_addr) {
            break;
        }
        // A non-zero saved frame pointer that does not advance is a cycle or
        // a corrupted chain; reject the whole record.
        if next_fp != 0 && next_fp <= fp {
            break;
        }

        trace.frames.push(StackFrame { address: return_addr, frame_pointer: fp });
        prev_fp = fp;
        fp = next_fp;
        if fp == 0 {
            break; // bottom of the stack
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KernelStatus;
    use std::collections::HashMap;

    struct FakeMemory {
        records: HashMap<u64, (u64, u64)>,
    }

    impl FakeMemory {
        fn new(records: &[(u64, (u64, u64))]) -> Self {
            Self { records: records.iter().copied().collect() }
        }
    }

    impl VirtualMemory for FakeMemory {
        fn read_exact(&self, address: u64, buf: &mut [u8]) -> Result<(), KernelStatus> {
            let (next_fp, return_addr) =
                self.records.get(&address).ok_or(KernelStatus(1))?;
            buf[..8].copy_from_slice(&next_fp.to_ne_bytes());
            buf[8..].copy_from_slice(&return_addr.to_ne_bytes());
            Ok(())
        }
    }

    fn walk(memory: &FakeMemory, regs: RegisterSet, max_depth: u32) -> StackTrace {
        let mut trace = StackTrace::default();
        walk_frame_chain(memory, regs, AddressFilter::x86_64(), max_depth, &mut trace);
        trace
    }

    #[test]
    fn test_implausible_pc_with_plausible_fp_still_walks() {
        let memory = FakeMemory::new(&[(0x7ff0_0000_1000, (0, 0x1000_4200))]);
        let regs = RegisterSet { pc: 0x3, fp: 0x7ff0_0000_1000, sp: 0 };
        let trace = walk(&memory, regs, 512);
        // No PC frame, but the chain itself was walkable.
        assert_eq!(trace.frame_count(), 1);
        assert_eq!(trace.frames[0].address, 0x1000_4200);
    }

    #[test]
    fn test_unreadable_first_frame_truncates_to_pc_only() {
        let memory = FakeMemory::new(&[]);
        let regs = RegisterSet { pc: 0x1000_4000, fp: 0x7ff0_0000_1000, sp: 0 };
        let trace = walk(&memory, regs, 512);
        assert_eq!(trace.frame_count(), 1);
        assert_eq!(trace.frames[0].address, 0x1000_4000);
    }

    #[test]
    fn test_zero_next_fp_appends_then_stops() {
        let memory = FakeMemory::new(&[
            (0x7ff0_0000_1000, (0x7ff0_0000_1100, 0x1000_4200)),
            (0x7ff0_0000_1100, (0, 0x1000_4400)),
        ]);
        let regs = RegisterSet { pc: 0x1000_4000, fp: 0x7ff0_0000_1000, sp: 0 };
        let trace = walk(&memory, regs, 512);
        assert_eq!(trace.frame_count(), 3);
        assert_eq!(trace.frames[2].address, 0x1000_4400);
    }

    #[test]
    fn test_backwards_next_fp_rejects_the_record() {
        // The frame at 0x...1100 points back at 0x...1000: its return
        // address must not be appended.
        let memory = FakeMemory::new(&[
            (0x7ff0_0000_1000, (0x7ff0_0000_1100, 0x1000_4200)),
            (0x7ff0_0000_1100, (0x7ff0_0000_1000, 0x1000_4400)),
        ]);
        let regs = RegisterSet { pc: 0x1000_4000, fp: 0x7ff0_0000_1000, sp: 0 };
        let trace = walk(&memory, regs, 512);
        assert_eq!(trace.frame_count(), 2);
        assert_eq!(trace.frames[1].address, 0x1000_4200);
    }

    #[test]
    fn test_max_depth_counts_the_pc_frame() {
        let memory = FakeMemory::new(&[(0x7ff0_0000_1000, (0, 0x1000_4200))]);
        let regs = RegisterSet { pc: 0x1000_4000, fp: 0x7ff0_0000_1000, sp: 0 };
        let trace = walk(&memory, regs, 1);
        assert_eq!(trace.frame_count(), 1);
        assert_eq!(trace.frames[0].address, 0x1000_4000);
    }
}
