use crate::bus::Mmio;
use crate::gpio::Gpio;
use crate::map::Port;
use crate::rcc::Rcc;
use core::sync::atomic::{AtomicBool, Ordering};

static TAKEN: AtomicBool = AtomicBool::new(false);

/// The bus capability plus one handle per peripheral block.
///
/// The register blocks live from reset until power-off and are owned by
/// whoever holds these handles. There is a single thread of control, so
/// nothing else guards them; a second one would need its own exclusive-access
/// discipline for register writes.
#[derive(Debug)]
pub struct Peripherals {
    pub bus: Mmio,
    pub rcc: Rcc,
    pub gpioa: Gpio,
    pub gpiob: Gpio,
    pub gpioc: Gpio,
    pub gpiod: Gpio,
    pub gpioe: Gpio,
    pub gpiof: Gpio,
    pub gpiog: Gpio,
    pub gpioh: Gpio,
}

impl Peripherals {
    /// Returns the handles the first time it is called, `None` afterwards.
    pub fn take() -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            None
        } else {
            // SAFETY: the flag guarantees this is the only set of handles.
            Some(unsafe { Self::steal() })
        }
    }

    /// # Safety
    ///
    /// Creates handles regardless of any already handed out. The caller must
    /// make sure at most one copy is used to access the hardware.
    pub unsafe fn steal() -> Self {
        Self {
            bus: Mmio::steal(),
            rcc: Rcc::new(),
            gpioa: Gpio::new(Port::A),
            gpiob: Gpio::new(Port::B),
            gpioc: Gpio::new(Port::C),
            gpiod: Gpio::new(Port::D),
            gpioe: Gpio::new(Port::E),
            gpiof: Gpio::new(Port::F),
            gpiog: Gpio::new(Port::G),
            gpioh: Gpio::new(Port::H),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_once() {
        let first = Peripherals::take();
        assert!(first.is_some());
        assert!(Peripherals::take().is_none());

        let p = first.unwrap();
        assert_eq!(p.gpioa.port(), Port::A);
        assert_eq!(p.gpioh.regs().base(), 0x4800_1C00);
    }
}
