//! A register-level stand-in for the MCU.
//!
//! There is no instruction set simulator here. Firmware logic written against
//! [`RegisterBus`] runs natively and every access it makes lands on the
//! simulated [`SystemBus`]. The machine adds what the core would: the reset
//! sequence, exception entry and the terminal halt state.

use crate::bus::SystemBus;
use crate::memory::ProgramImage;
use crate::snapshot::MachineSnapshot;
use crate::{Bus, HaltReason, SimResult, SimulationError, SimulationObserver};
use l4blink_config::ChipDescriptor;
use l4blink_hal::startup::{SegmentLayout, Startup};
use l4blink_hal::vectors::Exception;
use l4blink_hal::RegisterBus;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// Powered, reset sequence not started.
    Reset,
    Running,
    /// Terminal until the next [`Machine::reset`].
    Halted(HaltReason),
}

pub struct Machine {
    pub bus: SystemBus,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
    state: MachineState,
    /// Bit n set: exception n has a handler of its own.
    claimed: u16,
    last_fault: Option<SimulationError>,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self::with_bus(SystemBus::new())
    }

    pub fn with_bus(bus: SystemBus) -> Self {
        Self {
            bus,
            observers: Vec::new(),
            state: MachineState::Reset,
            claimed: 0,
            last_fault: None,
        }
    }

    pub fn from_config(chip: &ChipDescriptor) -> anyhow::Result<Self> {
        Ok(Self::with_bus(SystemBus::from_config(chip)?))
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        match self.state {
            MachineState::Halted(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halt_reason().is_some()
    }

    /// The bus error that forced the BusFault, if any. Faulting accesses
    /// after the halt do not replace it.
    pub fn last_fault(&self) -> Option<&SimulationError> {
        self.last_fault.as_ref()
    }

    pub fn load_firmware(&mut self, image: &ProgramImage) {
        for segment in &image.segments {
            if !self.bus.flash.load_from_segment(segment) && !self.bus.ram.load_from_segment(segment)
            {
                tracing::warn!(
                    "Failed to load segment at {:#x} - outside of memory map",
                    segment.start_addr
                );
            }
        }
    }

    /// Raw vector table word `index` at the start of flash. Index 0 is the
    /// initial stack pointer, 1 the reset handler.
    pub fn vector(&self, index: u8) -> SimResult<u32> {
        self.bus.read_u32(self.bus.flash.base_addr + 4 * index as u64)
    }

    /// Initial stack pointer and reset handler address from the vector table.
    pub fn initial_vectors(&self) -> SimResult<(u32, u32)> {
        Ok((self.vector(0)?, self.vector(1)?))
    }

    /// Power-on reset: peripherals go back to their reset values, RAM keeps
    /// whatever it held.
    pub fn reset(&mut self) {
        self.bus.reset_peripherals();
        self.state = MachineState::Reset;
        self.last_fault = None;
        tracing::info!("Machine reset");
        for observer in &self.observers {
            observer.on_reset();
        }
    }

    /// Resets, then runs the startup sequence with `entry` as `main`.
    ///
    /// Returns once the machine has halted, either because `entry` returned
    /// or because an unhandled exception was taken on the way. A fault while
    /// initialising RAM halts before `entry` is ever called.
    pub fn boot<F>(&mut self, layout: SegmentLayout, entry: F) -> HaltReason
    where
        F: FnOnce(&mut Self),
    {
        self.reset();
        self.state = MachineState::Running;
        tracing::debug!("Startup with {:?}", layout);

        let reason = Startup::new(layout).run(self, |m: &mut Self| {
            if !m.is_halted() {
                entry(m);
            }
        });
        match self.state {
            MachineState::Halted(earlier) => earlier,
            _ => {
                self.halt(reason);
                reason
            }
        }
    }

    /// Gives `exception` a handler of its own, so taking it does not halt.
    pub fn claim_exception(&mut self, exception: Exception) {
        self.claimed |= 1 << exception.number();
    }

    /// Takes exception `number`.
    ///
    /// Claimed exceptions return straight away. Everything else lands in the
    /// default handler and halts. Reserved or out-of-range numbers have a zero
    /// vector and escalate to HardFault.
    pub fn inject_exception(&mut self, number: u8) -> SimResult<()> {
        if let Some(reason) = self.halt_reason() {
            return Err(SimulationError::Halted(reason));
        }

        let number = match Exception::from_number(number) {
            Some(exception) if self.claimed & (1 << exception.number()) != 0 => {
                tracing::debug!("Exception {} handled", number);
                return Ok(());
            }
            Some(_) => number,
            None => {
                tracing::warn!("Exception {} has no vector, escalating to HardFault", number);
                Exception::HardFault.number()
            }
        };

        self.halt(HaltReason::UnexpectedException(number));
        Ok(())
    }

    fn halt(&mut self, reason: HaltReason) {
        if self.is_halted() {
            return;
        }
        tracing::info!("Machine halted: {:?}", reason);
        self.state = MachineState::Halted(reason);
        for observer in &self.observers {
            observer.on_halt(reason);
        }
    }

    /// A faulting access from firmware: record it and take BusFault, which
    /// has no handler of its own unless claimed.
    fn bus_fault(&mut self, error: SimulationError) {
        if self.is_halted() {
            tracing::debug!("Access after halt faulted: {}", error);
            return;
        }
        tracing::warn!("Bus fault: {}", error);
        self.last_fault = Some(error);
        // Cannot fail, the machine is not halted
        let _ = self.inject_exception(Exception::BusFault.number());
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            state: format!("{:?}", self.state),
            last_fault: self.last_fault.as_ref().map(|e| e.to_string()),
            peripherals: self
                .bus
                .peripherals
                .iter()
                .map(|p| (p.name.clone(), p.dev.snapshot()))
                .collect(),
        }
    }
}

impl RegisterBus for Machine {
    fn read_u32(&mut self, addr: u32) -> u32 {
        match Bus::read_u32(&self.bus, addr as u64) {
            Ok(value) => {
                for observer in &self.observers {
                    observer.on_read(addr, value);
                }
                value
            }
            Err(e) => {
                self.bus_fault(e);
                0
            }
        }
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        if self.is_halted() {
            tracing::debug!("Write of {:#010x} to {:#x} after halt dropped", value, addr);
            for observer in &self.observers {
                observer.on_write_rejected(addr, value);
            }
            return;
        }

        match Bus::write_u32(&mut self.bus, addr as u64, value) {
            Ok(()) => {
                tracing::debug!("Write {:#010x} -> {:#x}", value, addr);
                for observer in &self.observers {
                    observer.on_write(addr, value);
                }
            }
            Err(e) => self.bus_fault(e),
        }
    }
}
