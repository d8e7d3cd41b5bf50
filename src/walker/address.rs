//! Address plausibility rules
//!
//! The walker follows pointers read from untrusted foreign memory. These
//! bounds/parity checks reject obviously invalid values so a corrupt chain
//! truncates a trace instead of producing garbage addresses. They are
//! heuristics, not guarantees, and are applied identically to the program
//! counter, every frame pointer and every read return address.

/// Below this lies the null page and the region under the typical executable
/// base; nothing plausible lives there.
const MIN_PLAUSIBLE_ADDRESS: u64 = 0x10_0000;

/// User-space ceiling on x86-64 Darwin.
const USER_CEILING_X86_64: u64 = 0x8000_0000_0000;

/// Conservative user-space ceiling on AArch64 Darwin.
const USER_CEILING_AARCH64: u64 = 0x10_0000_0000;

/// Plausibility rules bound to one architecture's user-space layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressFilter {
    user_ceiling: u64,
}

impl AddressFilter {
    /// Rules for x86-64 user space.
    #[must_use]
    pub const fn x86_64() -> Self {
        Self { user_ceiling: USER_CEILING_X86_64 }
    }

    /// Rules for AArch64 user space.
    #[must_use]
    pub const fn aarch64() -> Self {
        Self { user_ceiling: USER_CEILING_AARCH64 }
    }

    /// Rules for the architecture this crate was compiled for.
    #[cfg(target_arch = "aarch64")]
    #[must_use]
    pub const fn host() -> Self {
        Self::aarch64()
    }

    /// Rules for the architecture this crate was compiled for.
    #[cfg(not(target_arch = "aarch64"))]
    #[must_use]
    pub const fn host() -> Self {
        Self::x86_64()
    }

    /// Whether `address` could be a real user-space code or frame address:
    /// non-zero, above the executable-base floor, below the user-space
    /// ceiling and 2-byte aligned (instructions are never byte-aligned on
    /// the supported ISAs).
    #[must_use]
    pub fn is_plausible(&self, address: u64) -> bool {
        if address == 0 {
            return false;
        }
        if address < MIN_PLAUSIBLE_ADDRESS {
            return false;
        }
        if address >= self.user_ceiling {
            return false;
        }
        address & 0x1 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_null_and_low_addresses() {
        let filter = AddressFilter::x86_64();
        assert!(!filter.is_plausible(0));
        assert!(!filter.is_plausible(0x1000));
        assert!(!filter.is_plausible(0xf_fffe));
        assert!(filter.is_plausible(0x10_0000));
    }

    #[test]
    fn test_rejects_odd_addresses() {
        let filter = AddressFilter::x86_64();
        assert!(!filter.is_plausible(0x1000_4001));
        assert!(filter.is_plausible(0x1000_4002));
    }

    #[test]
    fn test_x86_64_ceiling() {
        let filter = AddressFilter::x86_64();
        assert!(filter.is_plausible(0x7fff_ffff_fffe));
        assert!(!filter.is_plausible(0x8000_0000_0000));
        assert!(!filter.is_plausible(0xffff_8000_0000_0000));
    }

    #[test]
    fn test_aarch64_ceiling_is_tighter() {
        let filter = AddressFilter::aarch64();
        assert!(filter.is_plausible(0xf_ffff_fffe));
        assert!(!filter.is_plausible(0x10_0000_0000));
        // Plausible on x86-64, out of range on AArch64
        assert!(AddressFilter::x86_64().is_plausible(0x7ff0_0000_1000));
        assert!(!filter.is_plausible(0x7ff0_0000_1000));
    }
}
