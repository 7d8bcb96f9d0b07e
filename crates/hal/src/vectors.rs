//! Cortex-M4 exception vector table.
//!
//! Word 0 is the initial stack pointer, word 1 the reset handler, words 2..16
//! the architecturally defined system exceptions. The order is fixed by the
//! core; a slot in the wrong place sends the processor to the wrong handler.
//! Device interrupts (vector 16 and up) are not used by this firmware and are
//! left out of the table.

use crate::startup;

/// Exception handlers are plain functions with the C ABI.
pub type Handler = unsafe extern "C" fn();

/// The reset vector may not return.
pub type ResetHandler = unsafe extern "C" fn() -> !;

/// Number of vectors in the table, including the stack pointer word.
pub const SYSTEM_VECTORS: usize = 16;

/// System exceptions with their vector numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Exception {
    Nmi = 2,
    HardFault = 3,
    MemManage = 4,
    BusFault = 5,
    UsageFault = 6,
    SvCall = 11,
    DebugMonitor = 12,
    PendSv = 14,
    SysTick = 15,
}

impl Exception {
    pub const ALL: [Exception; 9] = [
        Exception::Nmi,
        Exception::HardFault,
        Exception::MemManage,
        Exception::BusFault,
        Exception::UsageFault,
        Exception::SvCall,
        Exception::DebugMonitor,
        Exception::PendSv,
        Exception::SysTick,
    ];

    pub const fn number(self) -> u8 {
        self as u8
    }

    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            2 => Some(Exception::Nmi),
            3 => Some(Exception::HardFault),
            4 => Some(Exception::MemManage),
            5 => Some(Exception::BusFault),
            6 => Some(Exception::UsageFault),
            11 => Some(Exception::SvCall),
            12 => Some(Exception::DebugMonitor),
            14 => Some(Exception::PendSv),
            15 => Some(Exception::SysTick),
            _ => None,
        }
    }

    const fn slot(self) -> usize {
        self as usize - 2
    }
}

/// The table the core reads at reset and on every exception entry.
///
/// Build it in a `static` with [`VectorTable::new`], override slots with
/// [`VectorTable::with_handler`], and place it in `.isr_vector`:
///
/// ```ignore
/// #[link_section = ".isr_vector"]
/// #[no_mangle]
/// static VECTORS: VectorTable =
///     VectorTable::new(unsafe { addr_of!(_estack) }, Reset, default_handler)
///         .with_handler(Exception::SysTick, tick);
/// ```
#[repr(C)]
pub struct VectorTable {
    pub initial_stack: *const u32,
    pub reset: ResetHandler,
    /// Vectors 2..16. Reserved vectors (7..=10, 13) stay `None`, i.e. zero.
    pub exceptions: [Option<Handler>; SYSTEM_VECTORS - 2],
}

// SAFETY: the table is immutable once built; the stack pointer is only an
// address for the core to load, never dereferenced by Rust code.
unsafe impl Sync for VectorTable {}

impl VectorTable {
    /// Every system exception starts out pointing at `default`.
    pub const fn new(initial_stack: *const u32, reset: ResetHandler, default: Handler) -> Self {
        let mut exceptions: [Option<Handler>; SYSTEM_VECTORS - 2] = [None; SYSTEM_VECTORS - 2];
        let mut i = 0;
        while i < Exception::ALL.len() {
            exceptions[Exception::ALL[i].slot()] = Some(default);
            i += 1;
        }
        Self {
            initial_stack,
            reset,
            exceptions,
        }
    }

    pub const fn with_handler(mut self, exception: Exception, handler: Handler) -> Self {
        self.exceptions[exception.slot()] = Some(handler);
        self
    }

    /// Handler for a vector number in 2..16. `None` for reserved and
    /// out-of-range numbers; the stack pointer and reset words are not
    /// handlers.
    pub fn handler(&self, number: u8) -> Option<Handler> {
        let slot = (number as usize).checked_sub(2)?;
        self.exceptions.get(slot).copied().flatten()
    }
}

/// Shared handler for every exception the application does not claim.
///
/// # Safety
///
/// Only the core may call this, on exception entry.
pub unsafe extern "C" fn default_handler() {
    startup::halt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{offset_of, size_of};
    use core::sync::atomic::{AtomicU32, Ordering};

    static HITS: AtomicU32 = AtomicU32::new(0);

    unsafe extern "C" fn fallback() {
        HITS.fetch_add(1, Ordering::Relaxed);
    }

    unsafe extern "C" fn tick() {
        HITS.fetch_add(100, Ordering::Relaxed);
    }

    unsafe extern "C" fn reset() -> ! {
        loop {}
    }

    static STACK_TOP: u32 = 0;

    fn table() -> VectorTable {
        VectorTable::new(&STACK_TOP, reset, fallback).with_handler(Exception::SysTick, tick)
    }

    #[test]
    fn test_layout_is_sixteen_words() {
        assert_eq!(size_of::<VectorTable>(), SYSTEM_VECTORS * size_of::<usize>());
        assert_eq!(offset_of!(VectorTable, initial_stack), 0);
        assert_eq!(offset_of!(VectorTable, reset), size_of::<usize>());
        assert_eq!(offset_of!(VectorTable, exceptions), 2 * size_of::<usize>());
    }

    #[test]
    fn test_unused_slots_use_default_handler() {
        let table = table();
        for exception in Exception::ALL {
            let handler = table.handler(exception.number()).map(|h| h as usize);
            if exception == Exception::SysTick {
                assert_eq!(handler, Some(tick as usize));
            } else {
                assert_eq!(handler, Some(fallback as usize), "{exception:?}");
            }
        }
    }

    #[test]
    fn test_reserved_slots_are_zero() {
        let table = table();
        for number in [7, 8, 9, 10, 13] {
            assert!(table.handler(number).is_none());
            assert!(Exception::from_number(number).is_none());
        }
        assert!(table.handler(0).is_none());
        assert!(table.handler(1).is_none());
        assert!(table.handler(16).is_none());
    }

    #[test]
    fn test_exception_numbers_round_trip() {
        for exception in Exception::ALL {
            assert_eq!(Exception::from_number(exception.number()), Some(exception));
        }
        assert_eq!(Exception::HardFault.number(), 3);
        assert_eq!(Exception::PendSv.number(), 14);
    }
}
