/// Tells the driver which context's registers the calling code owns.
///
/// Asked on every operation, never cached: the same controller handle may be used from any
/// hart.
pub trait ContextProvider {
    fn context_id(&self) -> usize;
}

impl<T: ContextProvider + ?Sized> ContextProvider for &T {
    fn context_id(&self) -> usize {
        (**self).context_id()
    }
}

/// Context index supplied up front, for callers that already know it (tests, hypervisors,
/// S-mode contexts that don't map 1:1 onto `mhartid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedContext(pub usize);

impl ContextProvider for FixedContext {
    fn context_id(&self) -> usize {
        self.0
    }
}

/// Uses the `mhartid` CSR of the executing hart as the context index.
///
/// Only readable from M-mode.
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentHart;

#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
impl ContextProvider for CurrentHart {
    #[inline]
    fn context_id(&self) -> usize {
        riscv::register::mhartid::read()
    }
}
