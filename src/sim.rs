//! A software model of the controller.
//!
//! [`SimPlic`] answers register accesses the way a riscv-plic-1.0.0 controller does, so the
//! driver can be exercised without hardware, and a hypervisor can hand it to a guest as an
//! emulated device.
//!
//! Locks are always taken in field order: `priorities`, `contexts`, `pending_irqs`,
//! `active_irqs`, `asserted_irqs`.

use alloc::vec::Vec;

use axaddrspace::{device::AccessWidth, GuestPhysAddr, GuestPhysAddrRange, HostPhysAddr};
use axdevice_base::{BaseDeviceOps, EmuDeviceType};
use axerrno::{ax_err, AxResult};
use bitmaps::Bitmap;
use spin::Mutex;

use crate::{consts::*, mmio::RegisterAccess, Source};

const ENABLE_BYTES: usize = PLIC_NUM_SOURCES / 8;

#[derive(Debug, Clone, Copy)]
struct ContextRegs {
    enable: [u8; ENABLE_BYTES],
    threshold: u32,
}

impl ContextRegs {
    const fn new() -> Self {
        Self {
            enable: [0; ENABLE_BYTES],
            threshold: 0,
        }
    }

    fn enabled(&self, irq: usize) -> bool {
        self.enable[irq / 8] & (1 << (irq % 8)) != 0
    }
}

pub struct SimPlic {
    /// The address of the SimPlic in the guest physical address space.
    pub addr: GuestPhysAddr,
    /// The size of the SimPlic in bytes.
    pub size: usize,
    /// Num of contexts.
    pub contexts_num: usize,
    /// Priority register of each source.
    priorities: Mutex<[u32; PLIC_NUM_SOURCES]>,
    /// Enable bits and threshold of each context.
    contexts: Mutex<Vec<ContextRegs>>,
    /// Requests forwarded by the gateways and not claimed yet.
    pending_irqs: Mutex<Bitmap<{ PLIC_NUM_SOURCES }>>,
    /// Claimed IRQs waiting for completion.
    active_irqs: Mutex<Bitmap<{ PLIC_NUM_SOURCES }>>,
    /// Interrupt lines currently held high by their devices.
    asserted_irqs: Mutex<Bitmap<{ PLIC_NUM_SOURCES }>>,
}

impl SimPlic {
    pub fn new(addr: GuestPhysAddr, size: Option<usize>, contexts_num: usize) -> Self {
        let addr_end = addr.as_usize()
            + PLIC_CONTEXT_CTRL_OFFSET
            + contexts_num * PLIC_CONTEXT_STRIDE
            + PLIC_CONTEXT_CLAIM_COMPLETE_OFFSET;
        let size = size.unwrap_or(PLIC_SIZE);
        assert!(
            addr.as_usize() + size > addr_end,
            "End address 0x{:x} exceeds region [0x{:x}, 0x{:x})",
            addr_end,
            addr.as_usize(),
            addr.as_usize() + size,
        );
        assert!(contexts_num <= PLIC_MAX_CONTEXT + 1, "Too many contexts {}", contexts_num);
        Self {
            addr,
            size,
            contexts_num,
            priorities: Mutex::new([0; PLIC_NUM_SOURCES]),
            contexts: Mutex::new(alloc::vec![ContextRegs::new(); contexts_num]),
            pending_irqs: Mutex::new(Bitmap::new()),
            active_irqs: Mutex::new(Bitmap::new()),
            asserted_irqs: Mutex::new(Bitmap::new()),
        }
    }

    /// Raises a level-triggered line. The request stays pending until claimed and is
    /// re-forwarded on completion for as long as the line stays high.
    pub fn raise(&self, irq: Source) {
        let irq = irq as usize;
        if !Self::valid_source(irq) {
            return;
        }
        let mut pending_irqs = self.pending_irqs.lock();
        let active_irqs = self.active_irqs.lock();
        self.asserted_irqs.lock().set(irq, true);
        if !active_irqs.get(irq) {
            pending_irqs.set(irq, true);
        }
    }

    /// Drops a level-triggered line. A request already forwarded stays pending.
    pub fn lower(&self, irq: Source) {
        let irq = irq as usize;
        if Self::valid_source(irq) {
            self.asserted_irqs.lock().set(irq, false);
        }
    }

    /// Edge-triggered request. Dropped while the source is being serviced.
    pub fn pulse(&self, irq: Source) {
        let irq = irq as usize;
        if !Self::valid_source(irq) {
            return;
        }
        let mut pending_irqs = self.pending_irqs.lock();
        if !self.active_irqs.lock().get(irq) {
            pending_irqs.set(irq, true);
        }
    }

    pub fn is_pending(&self, irq: Source) -> bool {
        Self::valid_source(irq as usize) && self.pending_irqs.lock().get(irq as usize)
    }

    /// Claimed and not completed yet.
    pub fn is_active(&self, irq: Source) -> bool {
        Self::valid_source(irq as usize) && self.active_irqs.lock().get(irq as usize)
    }

    fn valid_source(irq: usize) -> bool {
        irq > 0 && irq < PLIC_NUM_SOURCES
    }

    fn check_context(&self, context_id: usize) -> AxResult {
        if context_id < self.contexts_num {
            Ok(())
        } else {
            warn!("SimPlic: invalid context id {}", context_id);
            ax_err!(InvalidInput)
        }
    }

    /// Highest-priority pending source enabled for `context_id` above its threshold,
    /// lowest ID on ties.
    fn best_candidate(&self, context_id: usize) -> Option<usize> {
        let priorities = self.priorities.lock();
        let contexts = self.contexts.lock();
        let pending_irqs = self.pending_irqs.lock();
        let ctx = &contexts[context_id];

        let mut best: Option<(usize, u32)> = None;
        let mut next = pending_irqs.first_index();
        while let Some(irq) = next {
            let prio = priorities[irq];
            if irq != 0 && ctx.enabled(irq) && prio > ctx.threshold {
                if best.map_or(true, |(_, best_prio)| prio > best_prio) {
                    best = Some((irq, prio));
                }
            }
            next = pending_irqs.next_index(irq);
        }
        best.map(|(irq, _)| irq)
    }

    fn claim(&self, context_id: usize) -> usize {
        loop {
            let irq = match self.best_candidate(context_id) {
                Some(irq) => irq,
                None => return 0,
            };
            // Another context may have taken it between the scan and here.
            let mut pending_irqs = self.pending_irqs.lock();
            if pending_irqs.get(irq) {
                // Clear the pending bit and set the active bit, means the IRQ is being handled.
                pending_irqs.set(irq, false);
                self.active_irqs.lock().set(irq, true);
                return irq;
            }
        }
    }

    fn complete(&self, context_id: usize, irq: usize) {
        if !Self::valid_source(irq) || !self.contexts.lock()[context_id].enabled(irq) {
            warn!("SimPlic: context {} completes {} which it cannot own, ignored", context_id, irq);
            return;
        }
        let mut pending_irqs = self.pending_irqs.lock();
        let mut active_irqs = self.active_irqs.lock();
        if !active_irqs.get(irq) {
            warn!("SimPlic: context {} completes {} which is not claimed, ignored", context_id, irq);
            return;
        }
        // Clear the active bit, means the IRQ handling is complete.
        active_irqs.set(irq, false);
        if self.asserted_irqs.lock().get(irq) {
            pending_irqs.set(irq, true);
        }
    }

    fn width_bytes(width: AccessWidth) -> AxResult<usize> {
        match width {
            AccessWidth::Byte => Ok(1),
            AccessWidth::Dword => Ok(4),
            _ => {
                warn!("SimPlic: unsupported access width {:?}", width);
                ax_err!(InvalidInput)
            }
        }
    }

    fn read_reg(&self, reg: usize, width: AccessWidth) -> AxResult<usize> {
        let bytes = Self::width_bytes(width)?;
        if reg % bytes != 0 {
            return ax_err!(InvalidInput);
        }
        match reg {
            // priority
            PLIC_PRIORITY_OFFSET..PLIC_PENDING_OFFSET => {
                let rel = reg - PLIC_PRIORITY_OFFSET;
                let prio = self.priorities.lock()[rel >> PLIC_PRIORITY_SHIFT_PER_SOURCE];
                let lane = (rel % 4) * 8;
                Ok(((prio >> lane) as usize) & Self::width_mask(bytes))
            }
            // pending
            PLIC_PENDING_OFFSET..PLIC_ENABLE_OFFSET => {
                let bit_index_start = (reg - PLIC_PENDING_OFFSET) * 8;
                if bit_index_start >= PLIC_NUM_SOURCES {
                    return Ok(0);
                }
                let pending_irqs = self.pending_irqs.lock();
                let mut val = 0;
                for i in 0..bytes * 8 {
                    if pending_irqs.get(bit_index_start + i) {
                        val |= 1 << i;
                    }
                }
                Ok(val)
            }
            // enable
            PLIC_ENABLE_OFFSET..PLIC_CONTEXT_CTRL_OFFSET => {
                let rel = reg - PLIC_ENABLE_OFFSET;
                let context_id = rel / PLIC_ENABLE_STRIDE;
                self.check_context(context_id)?;
                let start = rel % PLIC_ENABLE_STRIDE;
                let contexts = self.contexts.lock();
                let enable = &contexts[context_id].enable[start..start + bytes];
                Ok(enable.iter().rev().fold(0, |acc, &b| (acc << 8) | b as usize))
            }
            offset => {
                let rel = offset - PLIC_CONTEXT_CTRL_OFFSET;
                let context_id = rel / PLIC_CONTEXT_STRIDE;
                self.check_context(context_id)?;
                match (rel % PLIC_CONTEXT_STRIDE, width) {
                    // threshold
                    (PLIC_CONTEXT_THRESHOLD_OFFSET, AccessWidth::Dword) => {
                        Ok(self.contexts.lock()[context_id].threshold as usize)
                    }
                    // claim/complete
                    (PLIC_CONTEXT_CLAIM_COMPLETE_OFFSET, AccessWidth::Dword) => Ok(self.claim(context_id)),
                    _ => {
                        warn!("SimPlic: unsupported read of reg {:#x} width {:?}", reg, width);
                        ax_err!(InvalidInput)
                    }
                }
            }
        }
    }

    fn write_reg(&self, reg: usize, width: AccessWidth, val: usize) -> AxResult {
        let bytes = Self::width_bytes(width)?;
        if reg % bytes != 0 {
            return ax_err!(InvalidInput);
        }
        let val = val & Self::width_mask(bytes);
        match reg {
            // priority
            PLIC_PRIORITY_OFFSET..PLIC_PENDING_OFFSET => {
                let rel = reg - PLIC_PRIORITY_OFFSET;
                let mut priorities = self.priorities.lock();
                let prio = &mut priorities[rel >> PLIC_PRIORITY_SHIFT_PER_SOURCE];
                let lane = (rel % 4) * 8;
                let mask = (Self::width_mask(bytes) << lane) as u32;
                *prio = (*prio & !mask) | ((val << lane) as u32 & mask);
                Ok(())
            }
            // pending, used to inject requests. Note: here append, not overwrite.
            PLIC_PENDING_OFFSET..PLIC_ENABLE_OFFSET => {
                let bit_index_start = (reg - PLIC_PENDING_OFFSET) * 8;
                let mut pending_irqs = self.pending_irqs.lock();
                for i in 0..bytes * 8 {
                    let irq_id = bit_index_start + i;
                    if val & (1 << i) != 0 && Self::valid_source(irq_id) {
                        pending_irqs.set(irq_id, true);
                    }
                }
                Ok(())
            }
            // enable
            PLIC_ENABLE_OFFSET..PLIC_CONTEXT_CTRL_OFFSET => {
                let rel = reg - PLIC_ENABLE_OFFSET;
                let context_id = rel / PLIC_ENABLE_STRIDE;
                self.check_context(context_id)?;
                let start = rel % PLIC_ENABLE_STRIDE;
                let mut contexts = self.contexts.lock();
                for (i, b) in contexts[context_id].enable[start..start + bytes].iter_mut().enumerate() {
                    *b = (val >> (i * 8)) as u8;
                }
                Ok(())
            }
            offset => {
                let rel = offset - PLIC_CONTEXT_CTRL_OFFSET;
                let context_id = rel / PLIC_CONTEXT_STRIDE;
                self.check_context(context_id)?;
                match (rel % PLIC_CONTEXT_STRIDE, width) {
                    // threshold
                    (PLIC_CONTEXT_THRESHOLD_OFFSET, AccessWidth::Dword) => {
                        self.contexts.lock()[context_id].threshold = val as u32;
                        Ok(())
                    }
                    // claim/complete
                    (PLIC_CONTEXT_CLAIM_COMPLETE_OFFSET, AccessWidth::Dword) => {
                        self.complete(context_id, val);
                        Ok(())
                    }
                    _ => {
                        warn!("SimPlic: unsupported write of reg {:#x} width {:?}", reg, width);
                        ax_err!(InvalidInput)
                    }
                }
            }
        }
    }

    const fn width_mask(bytes: usize) -> usize {
        usize::MAX >> (usize::BITS as usize - bytes * 8)
    }

    fn offset_of(&self, addr: usize) -> AxResult<usize> {
        match addr.checked_sub(self.addr.as_usize()) {
            Some(reg) if reg < self.size => Ok(reg),
            _ => {
                warn!("SimPlic: access to {:#x} outside the device", addr);
                ax_err!(InvalidInput)
            }
        }
    }
}

impl BaseDeviceOps<GuestPhysAddrRange> for SimPlic {
    fn emu_type(&self) -> axdevice_base::EmuDeviceType {
        // Fully emulated interrupt controller; no host PLIC is touched.
        EmuDeviceType::EmuDeviceTGicdV2
    }

    fn address_range(&self) -> GuestPhysAddrRange {
        GuestPhysAddrRange::from_start_size(self.addr, self.size)
    }

    fn handle_read(
        &self,
        addr: <GuestPhysAddrRange as axaddrspace::device::DeviceAddrRange>::Addr,
        width: axaddrspace::device::AccessWidth,
    ) -> axerrno::AxResult<usize> {
        let reg = self.offset_of(addr.as_usize())?;
        self.read_reg(reg, width)
    }

    fn handle_write(
        &self,
        addr: <GuestPhysAddrRange as axaddrspace::device::DeviceAddrRange>::Addr,
        width: axaddrspace::device::AccessWidth,
        val: usize,
    ) -> axerrno::AxResult {
        let reg = self.offset_of(addr.as_usize())?;
        self.write_reg(reg, width, val)
    }
}

// The driver sees the model like a bus: rejected accesses read as zero and writes vanish.
impl RegisterAccess for SimPlic {
    fn read_u8(&self, addr: HostPhysAddr) -> u8 {
        bus_read(self, addr, AccessWidth::Byte) as u8
    }

    fn write_u8(&self, addr: HostPhysAddr, val: u8) {
        bus_write(self, addr, AccessWidth::Byte, val as usize)
    }

    fn read_u32(&self, addr: HostPhysAddr) -> u32 {
        bus_read(self, addr, AccessWidth::Dword) as u32
    }

    fn write_u32(&self, addr: HostPhysAddr, val: u32) {
        bus_write(self, addr, AccessWidth::Dword, val as usize)
    }
}

fn bus_read(plic: &SimPlic, addr: HostPhysAddr, width: AccessWidth) -> usize {
    plic.handle_read(GuestPhysAddr::from_usize(addr.as_usize()), width)
        .unwrap_or_else(|err| {
            warn!("SimPlic: read {:#x} width {:?} rejected: {:?}, reads as 0", addr.as_usize(), width, err);
            0
        })
}

fn bus_write(plic: &SimPlic, addr: HostPhysAddr, width: AccessWidth, val: usize) {
    if let Err(err) = plic.handle_write(GuestPhysAddr::from_usize(addr.as_usize()), width, val) {
        warn!(
            "SimPlic: write {:#x} <- {:#x} width {:?} rejected: {:?}, dropped",
            addr.as_usize(),
            val,
            width,
            err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: usize = 0x0c00_0000;

    fn read(plic: &SimPlic, reg: usize) -> usize {
        plic.handle_read(GuestPhysAddr::from_usize(BASE + reg), AccessWidth::Dword)
            .unwrap()
    }

    fn write(plic: &SimPlic, reg: usize, val: usize) {
        plic.handle_write(GuestPhysAddr::from_usize(BASE + reg), AccessWidth::Dword, val)
            .unwrap()
    }

    fn claim_reg(context: usize) -> usize {
        PLIC_CLAIM_OFFSET + context * PLIC_CONTEXT_STRIDE
    }

    #[test]
    fn address_range_and_bounds() {
        let plic = SimPlic::new(GuestPhysAddr::from_usize(BASE), None, 2);
        assert_eq!(plic.address_range().start.as_usize(), BASE);
        assert_eq!(plic.address_range().size(), PLIC_SIZE);
        assert!(plic
            .handle_read(GuestPhysAddr::from_usize(BASE - 4), AccessWidth::Dword)
            .is_err());
        assert!(plic
            .handle_read(GuestPhysAddr::from_usize(BASE), AccessWidth::Qword)
            .is_err());
        // context 2 does not exist
        assert!(plic
            .handle_read(GuestPhysAddr::from_usize(BASE + claim_reg(2)), AccessWidth::Dword)
            .is_err());
    }

    #[test]
    fn claim_picks_highest_priority_then_lowest_id() {
        let plic = SimPlic::new(GuestPhysAddr::from_usize(BASE), None, 1);
        write(&plic, 3 * 4, 2);
        write(&plic, 5 * 4, 7);
        write(&plic, 9 * 4, 7);
        write(&plic, PLIC_ENABLE_OFFSET, (1 << 3) | (1 << 5) | (1 << 9));
        for irq in [3, 5, 9] {
            plic.pulse(irq);
        }

        assert_eq!(read(&plic, claim_reg(0)), 5);
        assert_eq!(read(&plic, claim_reg(0)), 9);
        assert_eq!(read(&plic, claim_reg(0)), 3);
        assert_eq!(read(&plic, claim_reg(0)), 0);
    }

    #[test]
    fn threshold_and_enable_filter_claims() {
        let plic = SimPlic::new(GuestPhysAddr::from_usize(BASE), None, 1);
        write(&plic, 4 * 4, 3);
        plic.pulse(4);
        assert_eq!(read(&plic, claim_reg(0)), 0, "not enabled");

        write(&plic, PLIC_ENABLE_OFFSET, 1 << 4);
        write(&plic, PLIC_THRESHOLD_OFFSET, 3);
        assert_eq!(read(&plic, claim_reg(0)), 0, "priority equal to threshold");

        write(&plic, PLIC_THRESHOLD_OFFSET, 2);
        assert_eq!(read(&plic, claim_reg(0)), 4);
    }

    #[test]
    fn pending_injection_is_additive() {
        let plic = SimPlic::new(GuestPhysAddr::from_usize(BASE), None, 1);
        write(&plic, PLIC_PENDING_OFFSET + 4, 1 << 1);
        write(&plic, PLIC_PENDING_OFFSET, 1 << 2);
        assert!(plic.is_pending(33));
        assert!(plic.is_pending(2));
        assert_eq!(read(&plic, PLIC_PENDING_OFFSET + 4), 1 << 1);
    }

    #[test]
    fn complete_of_unclaimed_source_is_ignored() {
        let plic = SimPlic::new(GuestPhysAddr::from_usize(BASE), None, 1);
        write(&plic, 6 * 4, 1);
        write(&plic, PLIC_ENABLE_OFFSET, 1 << 6);
        plic.raise(6);
        write(&plic, claim_reg(0), 6);
        assert!(plic.is_pending(6));
        assert!(!plic.is_active(6));
    }

    #[test]
    fn byte_lanes_of_priority_registers() {
        let plic = SimPlic::new(GuestPhysAddr::from_usize(BASE), None, 1);
        write(&plic, 4, 0x1122_3344);
        plic.handle_write(GuestPhysAddr::from_usize(BASE + 5), AccessWidth::Byte, 0)
            .unwrap();
        assert_eq!(read(&plic, 4), 0x1122_0044);
    }

    #[test]
    fn reports_an_emulated_interrupt_controller() {
        let plic = SimPlic::new(GuestPhysAddr::from_usize(BASE), None, 1);
        assert!(matches!(plic.emu_type(), EmuDeviceType::EmuDeviceTGicdV2));
    }

    #[test]
    fn rejected_bus_accesses_are_dropped() {
        let plic = SimPlic::new(GuestPhysAddr::from_usize(BASE), None, 1);
        write(&plic, PLIC_THRESHOLD_OFFSET, 5);

        // byte access to a 32-bit register, misaligned word, unknown context
        plic.write_u8(HostPhysAddr::from_usize(BASE + PLIC_THRESHOLD_OFFSET), 1);
        plic.write_u32(HostPhysAddr::from_usize(BASE + PLIC_THRESHOLD_OFFSET + 2), 1);
        plic.write_u32(HostPhysAddr::from_usize(BASE + PLIC_THRESHOLD_OFFSET + PLIC_CONTEXT_STRIDE), 1);

        assert_eq!(read(&plic, PLIC_THRESHOLD_OFFSET), 5);
        assert_eq!(plic.read_u8(HostPhysAddr::from_usize(BASE + PLIC_THRESHOLD_OFFSET)), 0);
        assert_eq!(plic.read_u32(HostPhysAddr::from_usize(BASE + claim_reg(1))), 0);
    }
}
