//! Frame-pointer walk scenarios against a synthetic memory oracle.
//!
//! These drive the platform-independent walk through the public API, pinned
//! to the x86-64 address rules so they behave identically on every host.

use std::collections::HashMap;

use stackscope::{
    AddressFilter, KernelStatus, RegisterSet, StackWalkStrategy, StackWalker, StackWalkerConfig,
    VirtualMemory,
};

/// A foreign address space made of 16-byte frame records:
/// `[saved frame pointer, return address]` at each mapped frame pointer.
struct Oracle {
    records: HashMap<u64, (u64, u64)>,
}

impl Oracle {
    fn new(records: &[(u64, (u64, u64))]) -> Self {
        Self { records: records.iter().copied().collect() }
    }

    fn empty() -> Self {
        Self { records: HashMap::new() }
    }
}

impl VirtualMemory for Oracle {
    fn read_exact(&self, address: u64, buf: &mut [u8]) -> Result<(), KernelStatus> {
        assert_eq!(buf.len(), 16, "the walker reads one frame record at a time");
        let (next_fp, return_addr) = self.records.get(&address).ok_or(KernelStatus(1))?;
        buf[..8].copy_from_slice(&next_fp.to_ne_bytes());
        buf[8..].copy_from_slice(&return_addr.to_ne_bytes());
        Ok(())
    }
}

fn walker() -> StackWalker {
    StackWalker::with_filter(StackWalkerConfig::default(), AddressFilter::x86_64())
}

fn walker_with(config: StackWalkerConfig) -> StackWalker {
    StackWalker::with_filter(config, AddressFilter::x86_64())
}

const PC: u64 = 0x1_0000_4000;
const FP0: u64 = 0x7ff0_0000_1000;
const FP1: u64 = 0x7ff0_0000_1100;
const FP2: u64 = 0x7ff0_0000_1200;

/// The three-frame chain most scenarios start from.
fn chain_of_three() -> Oracle {
    Oracle::new(&[
        (FP0, (FP1, 0x1_0000_4200)),
        (FP1, (FP2, 0x1_0000_4400)),
        (FP2, (0, 0x1_0000_4600)),
    ])
}

fn start_regs() -> RegisterSet {
    RegisterSet { pc: PC, fp: FP0, sp: FP0 - 0x40 }
}

#[test]
fn test_walks_a_chain_of_three_valid_frames() {
    let trace = walker().walk(&chain_of_three(), start_regs());

    assert_eq!(trace.frame_count(), 4);
    let addresses: Vec<u64> = trace.frames.iter().map(|frame| frame.address).collect();
    assert_eq!(addresses, vec![PC, 0x1_0000_4200, 0x1_0000_4400, 0x1_0000_4600]);
}

#[test]
fn test_truncates_on_implausible_return_address() {
    let oracle = Oracle::new(&[
        (FP0, (FP1, 0x1_0000_4200)),
        (FP1, (FP2, 0x1_0000_4400)),
        (FP2, (0, 0x1)), // odd, implausible
    ]);
    let trace = walker().walk(&oracle, start_regs());

    assert_eq!(trace.frame_count(), 3);
    assert_eq!(trace.frames.last().map(|frame| frame.address), Some(0x1_0000_4400));
}

#[test]
fn test_stops_at_a_frame_pointer_cycle() {
    let oracle = Oracle::new(&[
        (FP0, (FP1, 0x1_0000_4200)),
        (FP1, (FP0, 0x1_0000_4400)), // loops back
    ]);
    let trace = walker().walk(&oracle, start_regs());

    assert_eq!(trace.frame_count(), 2);
    let addresses: Vec<u64> = trace.frames.iter().map(|frame| frame.address).collect();
    assert_eq!(addresses, vec![PC, 0x1_0000_4200]);
}

#[test]
fn test_stops_before_an_oversized_frame() {
    let oracle = Oracle::new(&[
        (FP0, (FP0 + 0x20_0000, 0x1_0000_4200)),
        (FP0 + 0x20_0000, (0, 0x1_0000_4400)),
    ]);
    let trace = walker().walk(&oracle, start_regs());

    // The hop past 1 MiB is rejected; the frame behind it is never read.
    assert_eq!(trace.frame_count(), 2);
    assert_eq!(trace.frames.last().map(|frame| frame.address), Some(0x1_0000_4200));
}

#[test]
fn test_max_depth_caps_the_walk() {
    let config = StackWalkerConfig { max_depth: 2, ..StackWalkerConfig::default() };
    let trace = walker_with(config).walk(&chain_of_three(), start_regs());

    assert_eq!(trace.frame_count(), 2);
}

#[test]
fn test_max_depth_of_one_keeps_only_the_pc_frame() {
    let config = StackWalkerConfig { max_depth: 1, ..StackWalkerConfig::default() };
    let trace = walker_with(config).walk(&chain_of_three(), start_regs());

    assert_eq!(trace.frame_count(), 1);
    assert_eq!(trace.frames[0].address, PC);
}

#[test]
fn test_dead_registers_yield_an_empty_trace() {
    let regs = RegisterSet { pc: 0, fp: 0, sp: 0 };
    let trace = walker().walk(&Oracle::empty(), regs);

    assert_eq!(trace.frame_count(), 0);
}

#[test]
fn test_implausible_pc_with_valid_fp_walks_the_chain() {
    // Thread caught in a syscall: garbage PC, intact frame chain.
    let regs = RegisterSet { pc: 0x7, fp: FP0, sp: FP0 - 0x40 };
    let trace = walker().walk(&chain_of_three(), regs);

    assert_eq!(trace.frame_count(), 3);
    assert_eq!(trace.frames[0].address, 0x1_0000_4200);
}

#[test]
fn test_unreadable_memory_truncates_without_error() {
    let trace = walker().walk(&Oracle::empty(), start_regs());

    // Only the PC frame; the first record read failed and the walk ended.
    assert_eq!(trace.frame_count(), 1);
    assert_eq!(trace.frames[0].address, PC);
}

#[test]
fn test_walked_frame_pointers_grow_toward_the_stack_base() {
    let trace = walker().walk(&chain_of_three(), start_regs());

    assert!(trace.frame_count() >= 2);
    // The PC frame shares the innermost frame pointer; beyond it the chain
    // must be strictly monotone.
    for pair in trace.frames.windows(2) {
        assert!(pair[1].frame_pointer >= pair[0].frame_pointer);
    }
    for pair in trace.frames[1..].windows(2) {
        assert!(pair[1].frame_pointer > pair[0].frame_pointer);
    }
}

#[test]
fn test_every_returned_address_is_plausible() {
    let filter = AddressFilter::x86_64();
    let trace = walker().walk(&chain_of_three(), start_regs());

    for frame in &trace.frames {
        assert!(filter.is_plausible(frame.address), "0x{:x}", frame.address);
    }
}

#[test]
fn test_libunwind_strategy_falls_back_to_frame_pointers() {
    let config =
        StackWalkerConfig { strategy: StackWalkStrategy::LibUnwind, ..StackWalkerConfig::default() };
    let fallback = walker_with(config).walk(&chain_of_three(), start_regs());
    let reference = walker().walk(&chain_of_three(), start_regs());

    assert_eq!(fallback.frames, reference.frames);
}

#[test]
fn test_hybrid_strategy_uses_the_frame_pointer_half() {
    let config =
        StackWalkerConfig { strategy: StackWalkStrategy::Hybrid, ..StackWalkerConfig::default() };
    let trace = walker_with(config).walk(&chain_of_three(), start_regs());

    assert_eq!(trace.frame_count(), 4);
}

#[test]
fn test_aarch64_rules_reject_an_x86_64_stack_region() {
    // The same chain is out of user-space range under the AArch64 ceiling.
    let walker = StackWalker::with_filter(StackWalkerConfig::default(), AddressFilter::aarch64());
    let trace = walker.walk(&chain_of_three(), start_regs());

    // PC is fine, but FP0 is implausible, so the walk never starts.
    assert_eq!(trace.frame_count(), 1);
    assert_eq!(trace.frames[0].address, PC);
}
