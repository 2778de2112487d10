use axaddrspace::{device::AccessWidth, HostVirtAddr};

// These cover every `AccessWidth` so the match stays total. PLIC registers only need Byte and
// Dword, which is all `Mmio` issues.

/// Volatile load of `width` bytes at `addr`, zero-extended.
///
/// # Safety
///
/// `addr` must be mapped, readable and aligned to `width`.
pub(crate) unsafe fn perform_mmio_read(addr: HostVirtAddr, width: AccessWidth) -> usize {
    let addr = addr.as_ptr();

    match width {
        AccessWidth::Byte => unsafe { addr.read_volatile() as _ },
        AccessWidth::Word => unsafe { (addr as *const u16).read_volatile() as _ },
        AccessWidth::Dword => unsafe { (addr as *const u32).read_volatile() as _ },
        AccessWidth::Qword => unsafe { (addr as *const u64).read_volatile() as _ },
    }
}

/// Volatile store of the low `width` bytes of `val` at `addr`.
///
/// # Safety
///
/// `addr` must be mapped, writable and aligned to `width`.
pub(crate) unsafe fn perform_mmio_write(addr: HostVirtAddr, width: AccessWidth, val: usize) {
    let addr = addr.as_mut_ptr();

    match width {
        AccessWidth::Byte => unsafe {
            addr.write_volatile(val as _);
        },
        AccessWidth::Word => unsafe {
            (addr as *mut u16).write_volatile(val as _);
        },
        AccessWidth::Dword => unsafe {
            (addr as *mut u32).write_volatile(val as _);
        },
        AccessWidth::Qword => unsafe {
            (addr as *mut u64).write_volatile(val as _);
        },
    }
}

/// Writes zero to every byte of `[base, base + size)`, one volatile byte store at a time.
///
/// The stores are never merged or elided, so device registers see byte-granular writes.
///
/// # Safety
///
/// The whole range must be mapped and writable.
pub unsafe fn volatile_memzero(base: *mut u8, size: usize) {
    for i in 0..size {
        unsafe { base.add(i).write_volatile(0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memzero_clears_exactly_the_range() {
        for n in [0usize, 1, 8, 4096] {
            let mut buf = [0xa5u8; 4096 + 2];
            unsafe { volatile_memzero(buf.as_mut_ptr().add(1), n) };
            assert_eq!(buf[0], 0xa5, "byte before the range, n = {n}");
            assert!(buf[1..1 + n].iter().all(|&b| b == 0), "n = {n}");
            assert!(buf[1 + n..].iter().all(|&b| b == 0xa5), "byte after the range, n = {n}");
        }
    }

    #[test]
    fn mmio_widths() {
        let mut word = [0u64; 1];
        let addr = HostVirtAddr::from_usize(word.as_mut_ptr() as usize);
        unsafe {
            perform_mmio_write(addr, AccessWidth::Qword, 0x1122_3344_5566_7788);
            assert_eq!(perform_mmio_read(addr, AccessWidth::Byte), 0x88);
            assert_eq!(perform_mmio_read(addr, AccessWidth::Word), 0x7788);
            assert_eq!(perform_mmio_read(addr, AccessWidth::Dword), 0x5566_7788);
            perform_mmio_write(addr, AccessWidth::Byte, 0xff);
            assert_eq!(perform_mmio_read(addr, AccessWidth::Qword), 0x1122_3344_5566_77ff);
        }
    }
}
