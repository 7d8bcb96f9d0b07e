//! STM32L4x6 memory map (RM0351 rev 9, sections 2.2.2, 6.4 and 8.4).
//!
//! Register offsets are declared exactly once, as `#[repr(C)]` layouts that
//! mirror the reference manual word for word, reserved words included. The
//! block types turn those layouts into [`Reg`] handles; nothing else in the
//! crate adds offsets to base addresses.

use crate::bus::RegisterBus;

pub const FLASH_BASE: u32 = 0x0800_0000;
pub const SRAM1_BASE: u32 = 0x2000_0000;
pub const PERIPH_BASE: u32 = 0x4000_0000;
pub const APB1PERIPH_BASE: u32 = PERIPH_BASE;
pub const APB2PERIPH_BASE: u32 = PERIPH_BASE + 0x0001_0000;
pub const AHB1PERIPH_BASE: u32 = PERIPH_BASE + 0x0002_0000;
pub const AHB2PERIPH_BASE: u32 = PERIPH_BASE + 0x0800_0000;

pub const RCC_BASE: u32 = AHB1PERIPH_BASE + 0x0000_1000;
pub const GPIOA_BASE: u32 = AHB2PERIPH_BASE;
/// Distance between consecutive GPIO port blocks.
pub const GPIO_PORT_STRIDE: u32 = 0x400;

/// One 32-bit memory-mapped register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg {
    addr: u32,
}

impl Reg {
    pub const fn at(addr: u32) -> Self {
        Self { addr }
    }

    pub const fn addr(self) -> u32 {
        self.addr
    }

    #[inline]
    pub fn read<B: RegisterBus + ?Sized>(self, bus: &mut B) -> u32 {
        bus.read_u32(self.addr)
    }

    #[inline]
    pub fn write<B: RegisterBus + ?Sized>(self, bus: &mut B, value: u32) {
        bus.write_u32(self.addr, value)
    }

    /// One read followed by one write of `f(read value)`.
    #[inline]
    pub fn modify<B, F>(self, bus: &mut B, f: F)
    where
        B: RegisterBus + ?Sized,
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(bus);
        self.write(bus, f(value));
    }

    /// Clears the bits in `mask`, then ORs in `value & mask`.
    #[inline]
    pub fn clear_set<B: RegisterBus + ?Sized>(self, bus: &mut B, mask: u32, value: u32) {
        self.modify(bus, |r| (r & !mask) | (value & mask));
    }
}

macro_rules! register_block {
    (
        $(#[$meta:meta])*
        $block:ident => $layout:ident { $($reg:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $block {
            base: u32,
        }

        impl $block {
            pub const fn new(base: u32) -> Self {
                Self { base }
            }

            pub const fn base(&self) -> u32 {
                self.base
            }

            $(
                #[inline]
                pub const fn $reg(&self) -> Reg {
                    Reg::at(self.base + core::mem::offset_of!($layout, $reg) as u32)
                }
            )+
        }
    };
}

/// Reset and clock control register layout. Never instantiated.
#[repr(C)]
pub struct RccLayout {
    pub cr: u32,
    pub icscr: u32,
    pub cfgr: u32,
    pub pllcfgr: u32,
    pub pllsai1cfgr: u32,
    pub pllsai2cfgr: u32,
    pub cier: u32,
    pub cifr: u32,
    pub cicr: u32,
    pub reserved0: u32,
    pub ahb1rstr: u32,
    pub ahb2rstr: u32,
    pub ahb3rstr: u32,
    pub reserved1: u32,
    pub apb1rstr1: u32,
    pub apb1rstr2: u32,
    pub apb2rstr: u32,
    pub reserved2: u32,
    pub ahb1enr: u32,
    pub ahb2enr: u32,
    pub ahb3enr: u32,
    pub reserved3: u32,
    pub apb1enr1: u32,
    pub apb1enr2: u32,
    pub apb2enr: u32,
}

/// GPIO port register layout. Never instantiated.
#[repr(C)]
pub struct GpioLayout {
    pub moder: u32,
    pub otyper: u32,
    pub ospeedr: u32,
    pub pupdr: u32,
    pub idr: u32,
    pub odr: u32,
    pub bsrr: u32,
    pub lckr: u32,
    pub afrl: u32,
    pub afrh: u32,
    pub brr: u32,
    pub ascr: u32,
}

register_block! {
    /// Reset and clock control.
    RccBlock => RccLayout {
        cr, icscr, cfgr, pllcfgr, pllsai1cfgr, pllsai2cfgr, cier, cifr, cicr,
        ahb1rstr, ahb2rstr, ahb3rstr, apb1rstr1, apb1rstr2, apb2rstr,
        ahb1enr, ahb2enr, ahb3enr, apb1enr1, apb1enr2, apb2enr,
    }
}

register_block! {
    /// One general purpose I/O port.
    GpioBlock => GpioLayout {
        moder, otyper, ospeedr, pupdr, idr, odr, bsrr, lckr, afrl, afrh, brr, ascr,
    }
}

pub const RCC: RccBlock = RccBlock::new(RCC_BASE);

/// GPIO ports present on the 64..144 pin STM32L476 packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Port {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
    H = 7,
}

impl Port {
    pub const ALL: [Port; 8] = [
        Port::A,
        Port::B,
        Port::C,
        Port::D,
        Port::E,
        Port::F,
        Port::G,
        Port::H,
    ];

    /// Port number; also the port's bit position in `RCC_AHB2ENR`.
    pub const fn index(self) -> u32 {
        self as u32
    }

    pub const fn block(self) -> GpioBlock {
        GpioBlock::new(GPIOA_BASE + GPIO_PORT_STRIDE * self.index())
    }

    pub const fn name(self) -> &'static str {
        match self {
            Port::A => "gpioa",
            Port::B => "gpiob",
            Port::C => "gpioc",
            Port::D => "gpiod",
            Port::E => "gpioe",
            Port::F => "gpiof",
            Port::G => "gpiog",
            Port::H => "gpioh",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rcc_addresses_match_reference_manual() {
        assert_eq!(RCC.base(), 0x4002_1000);
        assert_eq!(RCC.cr().addr(), 0x4002_1000);
        assert_eq!(RCC.cicr().addr(), 0x4002_1020);
        assert_eq!(RCC.ahb1rstr().addr(), 0x4002_1028);
        assert_eq!(RCC.apb2rstr().addr(), 0x4002_1040);
        assert_eq!(RCC.ahb1enr().addr(), 0x4002_1048);
        assert_eq!(RCC.ahb2enr().addr(), 0x4002_104C);
        assert_eq!(RCC.ahb3enr().addr(), 0x4002_1050);
        assert_eq!(RCC.apb1enr1().addr(), 0x4002_1058);
        assert_eq!(RCC.apb2enr().addr(), 0x4002_1060);
    }

    #[test]
    fn test_gpio_offsets_match_reference_manual() {
        let gpio = Port::A.block();
        let offsets = [
            (gpio.moder(), 0x00),
            (gpio.otyper(), 0x04),
            (gpio.ospeedr(), 0x08),
            (gpio.pupdr(), 0x0C),
            (gpio.idr(), 0x10),
            (gpio.odr(), 0x14),
            (gpio.bsrr(), 0x18),
            (gpio.lckr(), 0x1C),
            (gpio.afrl(), 0x20),
            (gpio.afrh(), 0x24),
            (gpio.brr(), 0x28),
            (gpio.ascr(), 0x2C),
        ];
        for (reg, offset) in offsets {
            assert_eq!(reg.addr(), 0x4800_0000 + offset);
        }
    }

    #[test]
    fn test_gpio_port_bases() {
        assert_eq!(Port::A.block().base(), 0x4800_0000);
        assert_eq!(Port::B.block().base(), 0x4800_0400);
        assert_eq!(Port::C.block().odr().addr(), 0x4800_0814);
        assert_eq!(Port::H.block().base(), 0x4800_1C00);
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(core::mem::size_of::<RccLayout>(), 0x64);
        assert_eq!(core::mem::size_of::<GpioLayout>(), 0x30);
    }

    #[test]
    fn test_clear_set_only_touches_mask() {
        let mut bus = crate::bus::fake::MapBus::new();
        let reg = Reg::at(0x100);
        bus.poke(0x100, 0xFFFF_0F0F);
        reg.clear_set(&mut bus, 0x0000_00F0, 0x0000_0050);
        assert_eq!(bus.peek(0x100), 0xFFFF_0F5F);
        assert_eq!(bus.writes.len(), 1);
    }
}
