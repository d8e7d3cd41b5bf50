//! Foreign-memory read seam
//!
//! The walk only ever needs one primitive: copy a handful of bytes out of the
//! target's address space. Holding it behind a trait keeps the walk itself
//! free of kernel calls: live sampling reads through `mach_vm_read_overwrite`
//! while tests read from a synthetic oracle.

use crate::domain::KernelStatus;

/// Read access to a (possibly foreign) virtual address space.
pub trait VirtualMemory {
    /// Copy exactly `buf.len()` bytes from `address` into `buf`. A short read
    /// is a failure; the caller treats any failure as the end of readable
    /// memory.
    fn read_exact(&self, address: u64, buf: &mut [u8]) -> Result<(), KernelStatus>;
}

/// Read one frame record at `fp`: `[saved frame pointer, return address]`,
/// the layout shared by both supported ISAs.
pub(crate) fn read_frame_record<M: VirtualMemory + ?Sized>(
    memory: &M,
    fp: u64,
) -> Option<(u64, u64)> {
    let mut raw = [0u8; 16];
    memory.read_exact(fp, &mut raw).ok()?;

    let mut word = [0u8; 8];
    word.copy_from_slice(&raw[..8]);
    let next_fp = u64::from_ne_bytes(word);
    word.copy_from_slice(&raw[8..]);
    let return_addr = u64::from_ne_bytes(word);
    Some((next_fp, return_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OneRecord;

    impl VirtualMemory for OneRecord {
        fn read_exact(&self, address: u64, buf: &mut [u8]) -> Result<(), KernelStatus> {
            if address != 0x1000 || buf.len() != 16 {
                return Err(KernelStatus(1));
            }
            buf[..8].copy_from_slice(&0x2000u64.to_ne_bytes());
            buf[8..].copy_from_slice(&0x3000u64.to_ne_bytes());
            Ok(())
        }
    }

    #[test]
    fn test_frame_record_layout() {
        assert_eq!(read_frame_record(&OneRecord, 0x1000), Some((0x2000, 0x3000)));
    }

    #[test]
    fn test_unmapped_read_is_none() {
        assert_eq!(read_frame_record(&OneRecord, 0x4000), None);
    }
}
