//! Clock gating. Only the enable side is implemented; the clock tree itself is
//! left at its reset configuration (MSI at 4 MHz).

use crate::bus::RegisterBus;
use crate::map::{Port, RccBlock, RCC};
use bitflags::bitflags;

bitflags! {
    /// `RCC_AHB2ENR` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Ahb2Enr: u32 {
        const GPIOAEN = 1 << 0;
        const GPIOBEN = 1 << 1;
        const GPIOCEN = 1 << 2;
        const GPIODEN = 1 << 3;
        const GPIOEEN = 1 << 4;
        const GPIOFEN = 1 << 5;
        const GPIOGEN = 1 << 6;
        const GPIOHEN = 1 << 7;
        const OTGFSEN = 1 << 12;
        const ADCEN = 1 << 13;
        const AESEN = 1 << 16;
        const RNGEN = 1 << 18;
    }
}

impl Ahb2Enr {
    /// Clock enable bit for a GPIO port.
    pub const fn gpio(port: Port) -> Self {
        Self::from_bits_retain(1 << port.index())
    }
}

/// Owning handle for the RCC block.
#[derive(Debug)]
pub struct Rcc {
    regs: RccBlock,
}

impl Rcc {
    pub(crate) const fn new() -> Self {
        Self { regs: RCC }
    }

    pub fn regs(&self) -> RccBlock {
        self.regs
    }

    /// Sets `bits` in `AHB2ENR`, leaving every other enable untouched.
    pub fn enable_ahb2<B: RegisterBus + ?Sized>(&mut self, bus: &mut B, bits: Ahb2Enr) {
        let reg = self.regs.ahb2enr();
        reg.modify(bus, |r| r | bits.bits());
        // RM0351 6.2.19: two AHB cycles between the enable and the first
        // peripheral access. The read back provides them.
        let _ = reg.read(bus);
    }

    pub fn enable_gpio_clock<B: RegisterBus + ?Sized>(&mut self, bus: &mut B, port: Port) {
        self.enable_ahb2(bus, Ahb2Enr::gpio(port));
    }

    pub fn ahb2_enabled<B: RegisterBus + ?Sized>(&self, bus: &mut B) -> Ahb2Enr {
        Ahb2Enr::from_bits_retain(self.regs.ahb2enr().read(bus))
    }
}
