use crate::consts::*;

/// Where the register groups of a controller live, relative to its base address.
///
/// The default is the SiFive map every riscv-plic-1.0.0 compatible controller uses.
/// Boards that move the context block around can supply their own value through
/// [`Plic::with_layout`](crate::Plic::with_layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlicLayout {
    pub priority_offset: usize,
    pub priority_shift_per_source: u32,
    pub pending_offset: usize,
    pub enable_offset: usize,
    pub enable_shift_per_target: u32,
    pub threshold_offset: usize,
    pub threshold_shift_per_target: u32,
    pub claim_offset: usize,
    pub claim_shift_per_target: u32,
}

impl PlicLayout {
    pub const SIFIVE: Self = Self {
        priority_offset: PLIC_PRIORITY_OFFSET,
        priority_shift_per_source: PLIC_PRIORITY_SHIFT_PER_SOURCE,
        pending_offset: PLIC_PENDING_OFFSET,
        enable_offset: PLIC_ENABLE_OFFSET,
        enable_shift_per_target: PLIC_ENABLE_SHIFT_PER_TARGET,
        threshold_offset: PLIC_THRESHOLD_OFFSET,
        threshold_shift_per_target: PLIC_CONTEXT_SHIFT_PER_TARGET,
        claim_offset: PLIC_CLAIM_OFFSET,
        claim_shift_per_target: PLIC_CONTEXT_SHIFT_PER_TARGET,
    };

    /// Bytes of enable bits covering sources `0..=num_sources`.
    pub const fn enable_region_size(num_sources: u32) -> usize {
        (num_sources as usize + 8) / 8
    }

    /// Bytes of priority registers covering sources `0..=num_sources`.
    pub const fn priority_region_size(&self, num_sources: u32) -> usize {
        (num_sources as usize + 1) << self.priority_shift_per_source
    }
}

impl Default for PlicLayout {
    fn default() -> Self {
        Self::SIFIVE
    }
}
