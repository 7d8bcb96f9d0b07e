//! GPIO pin configuration and output control.
//!
//! Configuration registers hold one field per pin, so every change is a
//! read-modify-write that clears the target field and ORs in the new value.
//! Pins sharing the register are never disturbed.

use crate::bus::RegisterBus;
use crate::map::{GpioBlock, Port};
use crate::rcc::Rcc;

/// Pins per port.
pub const PINS: u8 = 16;

/// `MODER` encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Mode {
    Input = 0b00,
    Output = 0b01,
    Alternate = 0b10,
    Analog = 0b11,
}

/// `OTYPER` encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OutputType {
    PushPull = 0,
    OpenDrain = 1,
}

/// `OSPEEDR` encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Speed {
    Low = 0b00,
    Medium = 0b01,
    High = 0b10,
    VeryHigh = 0b11,
}

/// `PUPDR` encodings. `0b11` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Pull {
    None = 0b00,
    Up = 0b01,
    Down = 0b10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    pub mode: Mode,
    pub output_type: OutputType,
    pub speed: Speed,
    pub pull: Pull,
}

impl PinConfig {
    /// Push-pull output, low speed, no pull resistor.
    pub const PUSH_PULL_OUTPUT: PinConfig = PinConfig {
        mode: Mode::Output,
        output_type: OutputType::PushPull,
        speed: Speed::Low,
        pull: Pull::None,
    };
}

#[inline]
const fn field2(pin: u8) -> (u32, u32) {
    let shift = pin as u32 * 2;
    (0b11 << shift, shift)
}

/// Owning handle for one GPIO port.
#[derive(Debug)]
pub struct Gpio {
    port: Port,
    regs: GpioBlock,
}

impl Gpio {
    pub(crate) const fn new(port: Port) -> Self {
        Self {
            port,
            regs: port.block(),
        }
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn regs(&self) -> GpioBlock {
        self.regs
    }

    pub fn set_mode<B: RegisterBus + ?Sized>(&mut self, bus: &mut B, pin: u8, mode: Mode) {
        debug_assert!(pin < PINS);
        let (mask, shift) = field2(pin);
        self.regs.moder().clear_set(bus, mask, (mode as u32) << shift);
    }

    pub fn set_output_type<B: RegisterBus + ?Sized>(
        &mut self,
        bus: &mut B,
        pin: u8,
        output_type: OutputType,
    ) {
        debug_assert!(pin < PINS);
        self.regs
            .otyper()
            .clear_set(bus, 1 << pin, (output_type as u32) << pin);
    }

    pub fn set_speed<B: RegisterBus + ?Sized>(&mut self, bus: &mut B, pin: u8, speed: Speed) {
        debug_assert!(pin < PINS);
        let (mask, shift) = field2(pin);
        self.regs.ospeedr().clear_set(bus, mask, (speed as u32) << shift);
    }

    pub fn set_pull<B: RegisterBus + ?Sized>(&mut self, bus: &mut B, pin: u8, pull: Pull) {
        debug_assert!(pin < PINS);
        let (mask, shift) = field2(pin);
        self.regs.pupdr().clear_set(bus, mask, (pull as u32) << shift);
    }

    /// Flips the pin's `ODR` bit.
    pub fn toggle<B: RegisterBus + ?Sized>(&mut self, bus: &mut B, pin: u8) {
        debug_assert!(pin < PINS);
        self.regs.odr().modify(bus, |odr| odr ^ (1 << pin));
    }

    /// Drives the pin high through `BSRR`, without a read.
    pub fn set_high<B: RegisterBus + ?Sized>(&mut self, bus: &mut B, pin: u8) {
        debug_assert!(pin < PINS);
        self.regs.bsrr().write(bus, 1 << pin);
    }

    /// Drives the pin low through the reset half of `BSRR`.
    pub fn set_low<B: RegisterBus + ?Sized>(&mut self, bus: &mut B, pin: u8) {
        debug_assert!(pin < PINS);
        self.regs.bsrr().write(bus, 1 << (pin as u32 + 16));
    }

    /// Output latch state, not the pad level.
    pub fn is_set_high<B: RegisterBus + ?Sized>(&self, bus: &mut B, pin: u8) -> bool {
        debug_assert!(pin < PINS);
        self.regs.odr().read(bus) & (1 << pin) != 0
    }
}

/// Enables the port clock, then applies `config` to `pin`.
///
/// `pin` must be below [`PINS`]. This is not checked in release builds.
pub fn configure_pin<B: RegisterBus + ?Sized>(
    bus: &mut B,
    rcc: &mut Rcc,
    gpio: &mut Gpio,
    pin: u8,
    config: PinConfig,
) {
    rcc.enable_gpio_clock(bus, gpio.port());
    gpio.set_mode(bus, pin, config.mode);
    gpio.set_output_type(bus, pin, config.output_type);
    gpio.set_speed(bus, pin, config.speed);
    gpio.set_pull(bus, pin, config.pull);
}

/// Makes `pin` a push-pull, low speed output with no pull resistor.
pub fn configure_output_pin<B: RegisterBus + ?Sized>(
    bus: &mut B,
    rcc: &mut Rcc,
    gpio: &mut Gpio,
    pin: u8,
) {
    configure_pin(bus, rcc, gpio, pin, PinConfig::PUSH_PULL_OUTPUT);
}
