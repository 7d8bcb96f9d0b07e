//! The LED demo: LD2 on the NUCLEO-L476RG, toggled forever.

use crate::bus::RegisterBus;
use crate::delay;
use crate::gpio::{self, Gpio};
use crate::map::Port;
use crate::rcc::Rcc;

/// LD2 sits on PA5.
pub const LED_PORT: Port = Port::A;
pub const LED_PIN: u8 = 5;
/// Time between toggles, in approximate milliseconds (see [`delay`]).
pub const BLINK_HALF_PERIOD_MS: u32 = 500;

/// An LED on a push-pull output pin, lit when the pin is high.
#[derive(Debug)]
pub struct Led {
    gpio: Gpio,
    pin: u8,
}

impl Led {
    /// Takes the port handle, enables its clock and makes `pin` an output.
    pub fn new<B: RegisterBus + ?Sized>(bus: &mut B, rcc: &mut Rcc, mut gpio: Gpio, pin: u8) -> Self {
        gpio::configure_output_pin(bus, rcc, &mut gpio, pin);
        Self { gpio, pin }
    }

    pub fn on<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) {
        self.gpio.set_high(bus, self.pin);
    }

    pub fn off<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) {
        self.gpio.set_low(bus, self.pin);
    }

    pub fn toggle<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) {
        self.gpio.toggle(bus, self.pin);
    }

    pub fn is_on<B: RegisterBus + ?Sized>(&self, bus: &mut B) -> bool {
        self.gpio.is_set_high(bus, self.pin)
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Gives the port handle back. The pin stays configured as an output.
    pub fn release(self) -> Gpio {
        self.gpio
    }
}

/// Toggle, wait, repeat.
#[derive(Debug)]
pub struct Blinky {
    led: Led,
    half_period_ms: u32,
}

impl Blinky {
    pub fn new(led: Led, half_period_ms: u32) -> Self {
        Self {
            led,
            half_period_ms,
        }
    }

    pub fn led(&self) -> &Led {
        &self.led
    }

    /// One half period: flip the LED, then busy-wait.
    pub fn step<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) {
        self.led.toggle(bus);
        delay::delay_ms(self.half_period_ms);
    }

    pub fn run<B: RegisterBus + ?Sized>(mut self, bus: &mut B) -> ! {
        loop {
            self.step(bus);
        }
    }
}
