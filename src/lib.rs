//! Driver for the RISC-V platform-level interrupt controller (PLIC).
//!
//! The driver programs per-source priorities, per-context enable bits and thresholds, and
//! runs the claim/complete handshake for the context it is called from. All register
//! traffic goes through [`RegisterAccess`], and the calling context is asked from a
//! [`ContextProvider`], so the same code runs on hardware ([`Mmio`]) and against the
//! software model in [`sim`].
//!
//! ```ignore
//! let base = HostPhysAddr::from_usize(PLIC_BASE);
//! let plic = Plic::init(unsafe { Mmio::identity() }, CurrentHart, base, 52, 8);
//! plic.set_priority(UART0_IRQ, 1);
//! plic.enable_interrupt(UART0_IRQ);
//!
//! // in the external interrupt handler
//! plic.handle_pending(|irq| dispatch(irq));
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

mod addr;
mod consts;
mod driver;
mod hart;
mod layout;
mod mmio;
mod utils;

pub mod sim;

pub use addr::{reg_addr, source_mask};
pub use consts::*;
pub use driver::Plic;
pub use hart::{ContextProvider, FixedContext};
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
pub use hart::CurrentHart;
pub use layout::PlicLayout;
pub use mmio::{Mmio, RegisterAccess};
pub use utils::volatile_memzero;

/// Interrupt source ID. 0 is reserved and means "no interrupt".
pub type Source = u32;
/// Source priority. 0 never interrupts.
pub type Priority = u32;
/// Per-context priority threshold.
pub type Threshold = u32;
