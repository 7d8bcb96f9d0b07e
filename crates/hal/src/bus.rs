/// Word access to the memory-mapped address space.
///
/// Implementations must perform every call as exactly one access, in program
/// order. Nothing may be cached, merged or elided: a register read can clear a
/// flag and a register write can start a transfer.
pub trait RegisterBus {
    fn read_u32(&mut self, addr: u32) -> u32;
    fn write_u32(&mut self, addr: u32, value: u32);
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    #[inline(always)]
    fn read_u32(&mut self, addr: u32) -> u32 {
        (**self).read_u32(addr)
    }

    #[inline(always)]
    fn write_u32(&mut self, addr: u32, value: u32) {
        (**self).write_u32(addr, value)
    }
}

/// The physical address space, accessed with volatile loads and stores.
///
/// There is one of these per program. It is handed out by
/// [`Peripherals::take`](crate::Peripherals::take) and, before RAM is
/// initialised, stolen by the reset handler.
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Every address later passed to the bus must be a valid, word aligned
    /// location on the running chip, and no other `Mmio` may be used to write
    /// the same registers concurrently.
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Mmio {
    #[inline(always)]
    fn read_u32(&mut self, addr: u32) -> u32 {
        // SAFETY: the constructor contract makes `addr` a valid register or RAM word.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    #[inline(always)]
    fn write_u32(&mut self, addr: u32, value: u32) {
        // SAFETY: see `read_u32`.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}
