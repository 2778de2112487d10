//! Register address calculation.
//!
//! Everything here is plain arithmetic on addresses; nothing is dereferenced.

use axaddrspace::HostPhysAddr;

use crate::{layout::PlicLayout, Source};

/// Address of entry `index` of a register group: `base + group_offset + (index << shift)`.
///
/// `index` is a context index for the per-context groups and a source ID for the
/// priority table.
#[inline]
pub fn reg_addr(base: HostPhysAddr, group_offset: usize, index: usize, shift: u32) -> HostPhysAddr {
    HostPhysAddr::from_usize(base.as_usize() + group_offset + (index << shift))
}

impl PlicLayout {
    /// First enable byte of `context`. Source `s` lives in byte `s >> 3`, bit `s & 7`.
    #[inline]
    pub fn enable_addr(&self, base: HostPhysAddr, context: usize) -> HostPhysAddr {
        reg_addr(base, self.enable_offset, context, self.enable_shift_per_target)
    }

    /// The enable byte holding `source` for `context`.
    #[inline]
    pub fn enable_byte_addr(&self, base: HostPhysAddr, context: usize, source: Source) -> HostPhysAddr {
        let addr = self.enable_addr(base, context);
        HostPhysAddr::from_usize(addr.as_usize() + (source as usize >> 3))
    }

    /// Start of the global priority table (the register of reserved source 0).
    #[inline]
    pub fn priority_base(&self, base: HostPhysAddr) -> HostPhysAddr {
        reg_addr(base, self.priority_offset, 0, 0)
    }

    #[inline]
    pub fn priority_addr(&self, base: HostPhysAddr, source: Source) -> HostPhysAddr {
        reg_addr(base, self.priority_offset, source as usize, self.priority_shift_per_source)
    }

    /// The pending byte holding `source`.
    #[inline]
    pub fn pending_byte_addr(&self, base: HostPhysAddr, source: Source) -> HostPhysAddr {
        reg_addr(base, self.pending_offset, source as usize >> 3, 0)
    }

    #[inline]
    pub fn threshold_addr(&self, base: HostPhysAddr, context: usize) -> HostPhysAddr {
        reg_addr(base, self.threshold_offset, context, self.threshold_shift_per_target)
    }

    #[inline]
    pub fn claim_addr(&self, base: HostPhysAddr, context: usize) -> HostPhysAddr {
        reg_addr(base, self.claim_offset, context, self.claim_shift_per_target)
    }
}

/// Bit of `source` within its enable or pending byte.
#[inline]
pub const fn source_mask(source: Source) -> u8 {
    1 << (source & 0x7)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: usize = 0x0c00_0000;

    fn base() -> HostPhysAddr {
        HostPhysAddr::from_usize(BASE)
    }

    #[test]
    fn reg_addr_shifts_index() {
        assert_eq!(reg_addr(base(), 0x10, 0, 12).as_usize(), BASE + 0x10);
        assert_eq!(reg_addr(base(), 0x10, 3, 12).as_usize(), BASE + 0x10 + 0x3000);
        assert_eq!(reg_addr(base(), 0, 5, 0).as_usize(), BASE + 5);
    }

    #[test]
    fn sifive_context_registers() {
        let l = PlicLayout::SIFIVE;
        assert_eq!(l.enable_addr(base(), 0).as_usize(), BASE + 0x2000);
        assert_eq!(l.enable_addr(base(), 2).as_usize(), BASE + 0x2100);
        assert_eq!(l.threshold_addr(base(), 0).as_usize(), BASE + 0x20_0000);
        assert_eq!(l.threshold_addr(base(), 1).as_usize(), BASE + 0x20_1000);
        assert_eq!(l.claim_addr(base(), 0).as_usize(), BASE + 0x20_0004);
        assert_eq!(l.claim_addr(base(), 1).as_usize(), BASE + 0x20_1004);
    }

    #[test]
    fn sifive_source_registers() {
        let l = PlicLayout::SIFIVE;
        assert_eq!(l.priority_base(base()).as_usize(), BASE);
        assert_eq!(l.priority_addr(base(), 10).as_usize(), BASE + 40);
        assert_eq!(l.enable_byte_addr(base(), 1, 7).as_usize(), BASE + 0x2080);
        assert_eq!(l.enable_byte_addr(base(), 1, 8).as_usize(), BASE + 0x2081);
        assert_eq!(l.pending_byte_addr(base(), 33).as_usize(), BASE + 0x1004);
    }

    #[test]
    fn masks_and_region_sizes() {
        assert_eq!(source_mask(0), 0x01);
        assert_eq!(source_mask(7), 0x80);
        assert_eq!(source_mask(9), 0x02);
        assert_eq!(PlicLayout::enable_region_size(7), 1);
        assert_eq!(PlicLayout::enable_region_size(8), 2);
        assert_eq!(PlicLayout::enable_region_size(1023), 128);
        assert_eq!(PlicLayout::SIFIVE.priority_region_size(52), 53 * 4);
    }
}
