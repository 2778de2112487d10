use axaddrspace::HostPhysAddr;

use crate::{
    addr::source_mask,
    hart::ContextProvider,
    layout::PlicLayout,
    mmio::RegisterAccess,
    Priority, Source, Threshold,
};

/// Driver for one platform-level interrupt controller.
///
/// One `Plic` per physical register block; nothing stops two handles from aliasing the
/// same block, so callers keep that exclusive. The handle itself is context-agnostic: every
/// per-context access goes to the registers of whatever context `C` reports at call time.
///
/// None of the operations validate their arguments. `source` must be in
/// `1..=num_sources`, `priority` below `num_priorities`, and `complete_interrupt` must only
/// be given an ID returned by `claim_interrupt` on the same context.
///
/// `enable_interrupt` and `disable_interrupt` read-modify-write a shared byte. Calls from
/// one context that may interleave (say, from an interrupt handler) must be serialized by
/// the caller, typically by masking local interrupts.
#[derive(Debug)]
pub struct Plic<R, C> {
    base_addr: HostPhysAddr,
    num_sources: u32,
    num_priorities: u32,
    layout: PlicLayout,
    regs: R,
    context: C,
}

impl<R: RegisterAccess, C: ContextProvider> Plic<R, C> {
    /// Creates a handle without touching the hardware.
    pub fn new(regs: R, context: C, base_addr: HostPhysAddr, num_sources: u32, num_priorities: u32) -> Self {
        Self {
            base_addr,
            num_sources,
            num_priorities,
            layout: PlicLayout::SIFIVE,
            regs,
            context,
        }
    }

    /// Creates a handle and brings the controller to a known state, see [`Plic::initialize`].
    pub fn init(regs: R, context: C, base_addr: HostPhysAddr, num_sources: u32, num_priorities: u32) -> Self {
        let plic = Self::new(regs, context, base_addr, num_sources, num_priorities);
        plic.initialize();
        plic
    }

    pub fn with_layout(mut self, layout: PlicLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn base_addr(&self) -> HostPhysAddr {
        self.base_addr
    }

    pub fn num_sources(&self) -> u32 {
        self.num_sources
    }

    pub fn num_priorities(&self) -> u32 {
        self.num_priorities
    }

    pub fn layout(&self) -> &PlicLayout {
        &self.layout
    }

    /// Disables every source for the calling context, sets every source's priority to 0 and
    /// the calling context's threshold to 0. None of these registers are guaranteed to be
    /// reset on every boot path.
    ///
    /// The priority table is shared: call this on one context before any other context
    /// starts using the controller. Other contexts use [`Plic::init_context`].
    pub fn initialize(&self) {
        let context = self.context.context_id();
        debug!(
            "PLIC at {:#x}: init from context {}, {} sources, {} priorities",
            self.base_addr.as_usize(),
            context,
            self.num_sources,
            self.num_priorities
        );

        self.regs.zero_fill(
            self.layout.enable_addr(self.base_addr, context),
            PlicLayout::enable_region_size(self.num_sources),
        );
        self.regs.zero_fill(
            self.layout.priority_base(self.base_addr),
            self.layout.priority_region_size(self.num_sources),
        );
        self.regs.write_u32(self.layout.threshold_addr(self.base_addr, context), 0);
    }

    /// Disables every source and clears the threshold for the calling context only.
    pub fn init_context(&self) {
        let context = self.context.context_id();
        debug!("PLIC at {:#x}: init context {}", self.base_addr.as_usize(), context);

        self.regs.zero_fill(
            self.layout.enable_addr(self.base_addr, context),
            PlicLayout::enable_region_size(self.num_sources),
        );
        self.regs.write_u32(self.layout.threshold_addr(self.base_addr, context), 0);
    }

    /// Sources whose priority does not exceed `threshold` are no longer presented to the
    /// calling context.
    pub fn set_threshold(&self, threshold: Threshold) {
        let context = self.context.context_id();
        trace!("PLIC: context {} threshold <- {}", context, threshold);
        self.regs.write_u32(self.layout.threshold_addr(self.base_addr, context), threshold);
    }

    pub fn threshold(&self) -> Threshold {
        let context = self.context.context_id();
        self.regs.read_u32(self.layout.threshold_addr(self.base_addr, context))
    }

    pub fn enable_interrupt(&self, source: Source) {
        let context = self.context.context_id();
        trace!("PLIC: context {} enable {}", context, source);
        let addr = self.layout.enable_byte_addr(self.base_addr, context, source);
        let current = self.regs.read_u8(addr);
        self.regs.write_u8(addr, current | source_mask(source));
    }

    pub fn disable_interrupt(&self, source: Source) {
        let context = self.context.context_id();
        trace!("PLIC: context {} disable {}", context, source);
        let addr = self.layout.enable_byte_addr(self.base_addr, context, source);
        let current = self.regs.read_u8(addr);
        self.regs.write_u8(addr, current & !source_mask(source));
    }

    pub fn is_enabled(&self, source: Source) -> bool {
        let context = self.context.context_id();
        let addr = self.layout.enable_byte_addr(self.base_addr, context, source);
        self.regs.read_u8(addr) & source_mask(source) != 0
    }

    /// Visible to every context. Does nothing on controllers without priority registers
    /// (`num_priorities == 0`).
    pub fn set_priority(&self, source: Source, priority: Priority) {
        if self.num_priorities > 0 {
            trace!("PLIC: source {} priority <- {}", source, priority);
            self.regs.write_u32(self.layout.priority_addr(self.base_addr, source), priority);
        }
    }

    /// On controllers without priority registers (`num_priorities == 0`) this returns 0 as a
    /// placeholder without reading anything. The real priority there is fixed by the hardware
    /// and is not 0, which would mean "never interrupts".
    pub fn priority(&self, source: Source) -> Priority {
        if self.num_priorities > 0 {
            self.regs.read_u32(self.layout.priority_addr(self.base_addr, source))
        } else {
            0
        }
    }

    /// Whether the gateway has forwarded a request from `source` that nobody claimed yet.
    pub fn is_pending(&self, source: Source) -> bool {
        self.regs.read_u8(self.layout.pending_byte_addr(self.base_addr, source)) & source_mask(source) != 0
    }

    /// Takes the highest-priority pending interrupt enabled for the calling context, or
    /// returns 0 if there is none.
    ///
    /// The read itself is the claim: the controller clears the pending bit as a side effect.
    pub fn claim_interrupt(&self) -> Source {
        let context = self.context.context_id();
        let source = self.regs.read_u32(self.layout.claim_addr(self.base_addr, context));
        trace!("PLIC: context {} claimed {}", context, source);
        source
    }

    /// Tells the controller the calling context finished servicing `source`. Exactly once per
    /// claim, with the claimed ID; a missed completion keeps the source from ever being
    /// claimed again.
    pub fn complete_interrupt(&self, source: Source) {
        let context = self.context.context_id();
        trace!("PLIC: context {} complete {}", context, source);
        self.regs.write_u32(self.layout.claim_addr(self.base_addr, context), source);
    }

    /// Claims and services interrupts until none is left, completing each one after
    /// `handler` returns. Returns how many were serviced.
    ///
    /// A level-triggered source whose device still asserts its line is pending again right
    /// after completion, so `handler` has to quiet the device or this never returns.
    pub fn handle_pending<F: FnMut(Source)>(&self, mut handler: F) -> usize {
        let mut serviced = 0;
        loop {
            let source = self.claim_interrupt();
            if source == 0 {
                break;
            }
            handler(source);
            self.complete_interrupt(source);
            serviced += 1;
        }
        serviced
    }
}
