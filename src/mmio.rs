use axaddrspace::{device::AccessWidth, HostPhysAddr, HostVirtAddr};

use crate::utils::{perform_mmio_read, perform_mmio_write, volatile_memzero};

/// Volatile access to controller registers.
///
/// This is the only path through which the driver touches the register block. Every call
/// must reach the device: no caching, merging or reordering against other calls.
pub trait RegisterAccess {
    fn read_u8(&self, addr: HostPhysAddr) -> u8;
    fn write_u8(&self, addr: HostPhysAddr, val: u8);
    fn read_u32(&self, addr: HostPhysAddr) -> u32;
    fn write_u32(&self, addr: HostPhysAddr, val: u32);

    /// Clears `[addr, addr + size)` with byte stores.
    fn zero_fill(&self, addr: HostPhysAddr, size: usize) {
        for i in 0..size {
            self.write_u8(HostPhysAddr::from_usize(addr.as_usize() + i), 0);
        }
    }
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &T {
    fn read_u8(&self, addr: HostPhysAddr) -> u8 {
        (**self).read_u8(addr)
    }

    fn write_u8(&self, addr: HostPhysAddr, val: u8) {
        (**self).write_u8(addr, val)
    }

    fn read_u32(&self, addr: HostPhysAddr) -> u32 {
        (**self).read_u32(addr)
    }

    fn write_u32(&self, addr: HostPhysAddr, val: u32) {
        (**self).write_u32(addr, val)
    }

    fn zero_fill(&self, addr: HostPhysAddr, size: usize) {
        (**self).zero_fill(addr, size)
    }
}

/// Real memory-mapped registers, reached through a fixed physical-to-virtual offset.
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    phys_virt_offset: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// Every physical address the driver derives from its base address must be mapped at
    /// `paddr + phys_virt_offset` as device memory for as long as this value is used.
    pub const unsafe fn new(phys_virt_offset: usize) -> Self {
        Self { phys_virt_offset }
    }

    /// Physical addresses are used as-is, as in M-mode or with an identity mapping.
    ///
    /// # Safety
    ///
    /// See [`Mmio::new`].
    pub const unsafe fn identity() -> Self {
        Self { phys_virt_offset: 0 }
    }

    #[inline]
    fn phys_to_virt(&self, addr: HostPhysAddr) -> HostVirtAddr {
        HostVirtAddr::from_usize(addr.as_usize().wrapping_add(self.phys_virt_offset))
    }
}

impl RegisterAccess for Mmio {
    fn read_u8(&self, addr: HostPhysAddr) -> u8 {
        // SAFETY: mapping guaranteed by the constructor's contract.
        unsafe { perform_mmio_read(self.phys_to_virt(addr), AccessWidth::Byte) as u8 }
    }

    fn write_u8(&self, addr: HostPhysAddr, val: u8) {
        unsafe { perform_mmio_write(self.phys_to_virt(addr), AccessWidth::Byte, val as usize) }
    }

    fn read_u32(&self, addr: HostPhysAddr) -> u32 {
        unsafe { perform_mmio_read(self.phys_to_virt(addr), AccessWidth::Dword) as u32 }
    }

    fn write_u32(&self, addr: HostPhysAddr, val: u32) {
        unsafe { perform_mmio_write(self.phys_to_virt(addr), AccessWidth::Dword, val as usize) }
    }

    fn zero_fill(&self, addr: HostPhysAddr, size: usize) {
        unsafe { volatile_memzero(self.phys_to_virt(addr).as_mut_ptr(), size) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmio_over_plain_memory() {
        let mut regs = [0xffff_ffffu32; 4];
        let base = regs.as_mut_ptr() as usize;
        let mmio = unsafe { Mmio::identity() };

        mmio.write_u32(HostPhysAddr::from_usize(base + 4), 0x1234_5678);
        assert_eq!(mmio.read_u32(HostPhysAddr::from_usize(base + 4)), 0x1234_5678);

        mmio.zero_fill(HostPhysAddr::from_usize(base), 5);
        assert_eq!(mmio.read_u32(HostPhysAddr::from_usize(base)), 0);
        assert_eq!(mmio.read_u8(HostPhysAddr::from_usize(base + 4)), 0);
        assert_eq!(mmio.read_u8(HostPhysAddr::from_usize(base + 5)), 0x56);
        assert_eq!(regs[2], 0xffff_ffff);
    }

    #[test]
    fn offset_translation() {
        let mut byte = [0u8; 1];
        let virt = byte.as_mut_ptr() as usize;
        let mmio = unsafe { Mmio::new(0x1000) };
        mmio.write_u8(HostPhysAddr::from_usize(virt - 0x1000), 0x42);
        assert_eq!(byte[0], 0x42);
    }
}
