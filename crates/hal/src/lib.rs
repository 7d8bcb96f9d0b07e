//! Register-level support for the STM32L476 LED demo.
//!
//! Everything that touches the chip goes through [`RegisterBus`]: on target that
//! is [`Mmio`] (volatile loads and stores), on the host it is the register
//! simulator in `l4blink-core`. The firmware crate only wires these pieces to
//! the linker symbols and the vector table section.
#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod bus;
pub mod delay;
pub mod gpio;
pub mod map;
pub mod peripherals;
pub mod rcc;
pub mod startup;
pub mod util;
pub mod vectors;

pub use bus::{Mmio, RegisterBus};
pub use peripherals::Peripherals;
