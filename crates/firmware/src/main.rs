#![no_std]
#![no_main]

use core::ptr::addr_of;
use l4blink_hal::app::{Blinky, Led, BLINK_HALF_PERIOD_MS, LED_PIN};
use l4blink_hal::startup::{self, SegmentLayout, Startup};
use l4blink_hal::vectors::{default_handler, VectorTable};
use l4blink_hal::{Mmio, Peripherals};
use panic_halt as _;

// Provided by link.x.
extern "C" {
    static _estack: u32;
    static _sidata: u32;
    static _sdata: u32;
    static _edata: u32;
    static _sbss: u32;
    static _ebss: u32;
}

#[link_section = ".isr_vector"]
#[no_mangle]
#[used]
pub static VECTORS: VectorTable =
    VectorTable::new(unsafe { addr_of!(_estack) }, Reset, default_handler);

/// Entered by the core after reset, with the stack pointer loaded from
/// `VECTORS`. Must not touch `.data` or `.bss` before the startup sequence
/// has initialised them.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn Reset() -> ! {
    let layout = SegmentLayout {
        data_load: addr_of!(_sidata) as u32,
        data_start: addr_of!(_sdata) as u32,
        data_end: addr_of!(_edata) as u32,
        bss_start: addr_of!(_sbss) as u32,
        bss_end: addr_of!(_ebss) as u32,
    };
    // SAFETY: single thread of control, and the segment bounds come from the
    // linker script for this chip.
    let mut bus = Mmio::steal();
    Startup::new(layout).run(&mut bus, |_| main());

    // `main` returned.
    startup::halt()
}

fn main() {
    let Some(mut p) = Peripherals::take() else {
        return;
    };
    let led = Led::new(&mut p.bus, &mut p.rcc, p.gpioa, LED_PIN);
    Blinky::new(led, BLINK_HALF_PERIOD_MS).run(&mut p.bus)
}
