// Register map of the SiFive-style PLIC, matching riscv-plic-1.0.0.

/// Number of interrupt sources addressable by the register map.
/// Source IDs range from 1 to 1023 (inclusive). Source 0 is reserved and means "no interrupt".
pub const PLIC_NUM_SOURCES: usize = 1024; // includes source 0 for indexing convenience

/// Largest valid source ID.
pub const PLIC_MAX_SOURCE: u32 = 1023;

/// Largest context index the register map leaves room for.
pub const PLIC_MAX_CONTEXT: usize = 15871;

// --- Register Offsets (relative to PLIC_BASE) ---

/// Offset to priority register for interrupt source 0 (reserved).
/// Priority for source N is at: PLIC_PRIORITY_OFFSET + (N << PLIC_PRIORITY_SHIFT_PER_SOURCE)
pub const PLIC_PRIORITY_OFFSET: usize = 0x000000;

/// Each priority register is 32 bits wide.
pub const PLIC_PRIORITY_SHIFT_PER_SOURCE: u32 = 2;

/// Offset to the first pending register word (bits 0–31).
/// Byte B covers sources [B*8, B*8+7].
pub const PLIC_PENDING_OFFSET: usize = 0x001000;

/// Offset to the enable bits for context 0.
/// For context C, enable region starts at: PLIC_ENABLE_OFFSET + (C << PLIC_ENABLE_SHIFT_PER_TARGET)
pub const PLIC_ENABLE_OFFSET: usize = 0x002000;

/// Each context uses 32 words = 128 bytes = 0x80 of enable bits.
pub const PLIC_ENABLE_SHIFT_PER_TARGET: u32 = 7;

/// Stride between contexts in the enable region (in bytes).
pub const PLIC_ENABLE_STRIDE: usize = 1 << PLIC_ENABLE_SHIFT_PER_TARGET;

/// Offset to the control registers (threshold & claim/complete) for context 0.
pub const PLIC_CONTEXT_CTRL_OFFSET: usize = 0x200000;

/// Each context uses two 32-bit registers (8 bytes), but spaced by 0x1000.
pub const PLIC_CONTEXT_SHIFT_PER_TARGET: u32 = 12;

/// Stride between contexts in the control region (in bytes).
pub const PLIC_CONTEXT_STRIDE: usize = 1 << PLIC_CONTEXT_SHIFT_PER_TARGET;

/// Offset within a context's control region to the priority threshold register.
pub const PLIC_CONTEXT_THRESHOLD_OFFSET: usize = 0x00;

/// Offset within a context's control region to the claim/complete register.
pub const PLIC_CONTEXT_CLAIM_COMPLETE_OFFSET: usize = 0x04;

/// Threshold register of context 0.
pub const PLIC_THRESHOLD_OFFSET: usize = PLIC_CONTEXT_CTRL_OFFSET + PLIC_CONTEXT_THRESHOLD_OFFSET;

/// Claim/complete register of context 0.
pub const PLIC_CLAIM_OFFSET: usize = PLIC_CONTEXT_CTRL_OFFSET + PLIC_CONTEXT_CLAIM_COMPLETE_OFFSET;

/// Size of the whole register block.
pub const PLIC_SIZE: usize = 0x4000000;
