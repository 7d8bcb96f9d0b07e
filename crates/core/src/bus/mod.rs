use crate::memory::LinearMemory;
use crate::peripherals::gpio::{GpioPort, GpioResetValues};
use crate::peripherals::rcc::Rcc;
use crate::{Bus, Peripheral, SimResult, SimulationError};
use anyhow::Context;
use l4blink_config::{checked_offset, parse_size, ChipDescriptor};
use l4blink_hal::map;

/// Absolute address and bit of the enable flag a peripheral needs before
/// its registers respond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockGate {
    pub register: u64,
    pub bit: u8,
}

pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub clock_gate: Option<ClockGate>,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.base + self.size
    }
}

pub struct SystemBus {
    pub flash: LinearMemory,
    pub ram: LinearMemory,
    pub peripherals: Vec<PeripheralEntry>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    /// STM32L476RG: 1 MiB flash, 96 KiB SRAM1, RCC and GPIOA..GPIOH.
    pub fn new() -> Self {
        let rcc_base = map::RCC_BASE as u64;
        let ahb2enr = map::RCC.ahb2enr().addr() as u64;

        let mut peripherals = vec![PeripheralEntry {
            name: "rcc".to_string(),
            base: rcc_base,
            size: 0x400,
            clock_gate: None,
            dev: Box::new(Rcc::new()),
        }];

        for port in map::Port::ALL {
            let reset_values = match port {
                map::Port::A => GpioResetValues {
                    moder: 0xABFF_FFFF,
                    ospeedr: 0x0C00_0000,
                    pupdr: 0x6400_0000,
                },
                map::Port::B => GpioResetValues {
                    moder: 0xFFFF_FEBF,
                    ospeedr: 0x0000_00C0,
                    pupdr: 0x0000_0100,
                },
                map::Port::H => GpioResetValues {
                    moder: 0x0000_000F,
                    ..GpioResetValues::default()
                },
                _ => GpioResetValues::default(),
            };
            peripherals.push(PeripheralEntry {
                name: port.name().to_string(),
                base: port.block().base() as u64,
                size: map::GPIO_PORT_STRIDE as u64,
                clock_gate: Some(ClockGate {
                    register: ahb2enr,
                    bit: port.index() as u8,
                }),
                dev: Box::new(GpioPort::with_reset_values(reset_values)),
            });
        }

        Self {
            flash: LinearMemory::new(1024 * 1024, map::FLASH_BASE as u64),
            ram: LinearMemory::new(96 * 1024, map::SRAM1_BASE as u64),
            peripherals,
        }
    }

    pub fn from_config(chip: &ChipDescriptor) -> anyhow::Result<Self> {
        chip.validate()?;
        let flash_size = parse_size(&chip.flash.size)?;
        let ram_size = parse_size(&chip.ram.size)?;

        let mut bus = Self {
            flash: LinearMemory::new(flash_size as usize, chip.flash.base),
            ram: LinearMemory::new(ram_size as usize, chip.ram.base),
            peripherals: Vec::new(),
        };

        for p_cfg in &chip.peripherals {
            let dev: Box<dyn Peripheral> = match p_cfg.r#type.as_str() {
                "rcc" => Box::new(Rcc::new()),
                "gpio" => {
                    let reset_values = GpioResetValues::from_config(p_cfg)
                        .with_context(|| format!("Invalid GPIO options for '{}'", p_cfg.id))?;
                    Box::new(GpioPort::with_reset_values(reset_values))
                }
                other => {
                    tracing::warn!(
                        "Unsupported peripheral type '{}' for '{}', skipping",
                        other,
                        p_cfg.id
                    );
                    continue;
                }
            };

            let clock_gate = match &p_cfg.clock_gate {
                Some(gate) => {
                    let controller = chip
                        .peripheral(&gate.controller)
                        .with_context(|| format!("No clock controller for '{}'", p_cfg.id))?;
                    let register =
                        checked_offset(&p_cfg.id, controller.base_address, gate.register)?;
                    Some(ClockGate {
                        register,
                        bit: gate.bit,
                    })
                }
                None => None,
            };

            bus.peripherals.push(PeripheralEntry {
                name: p_cfg.id.clone(),
                base: p_cfg.base_address,
                size: p_cfg.size_bytes()?,
                clock_gate,
                dev,
            });
        }

        tracing::info!(
            "Built bus for '{}' with {} peripherals",
            chip.name,
            bus.peripherals.len()
        );
        Ok(bus)
    }

    fn find(&self, addr: u64) -> Option<usize> {
        self.peripherals.iter().position(|p| p.contains(addr))
    }

    /// Whether the clock gate (if any) of the peripheral at `index` is open.
    fn is_clocked(&self, index: usize) -> bool {
        let Some(gate) = self.peripherals[index].clock_gate else {
            return true;
        };
        let Some(controller) = self.find(gate.register) else {
            return false;
        };
        let entry = &self.peripherals[controller];
        entry
            .dev
            .read_u32(gate.register - entry.base)
            .is_ok_and(|value| value & (1 << gate.bit) != 0)
    }

    /// Downcasts the peripheral called `name`.
    pub fn peripheral<T: 'static>(&self, name: &str) -> Option<&T> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)?
            .dev
            .as_any()?
            .downcast_ref::<T>()
    }

    pub fn peripheral_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.peripherals
            .iter_mut()
            .find(|p| p.name == name)?
            .dev
            .as_any_mut()?
            .downcast_mut::<T>()
    }

    /// Puts every peripheral back to its power-on state. Memory is kept.
    pub fn reset_peripherals(&mut self) {
        for p in &mut self.peripherals {
            p.dev.reset();
        }
    }
}

impl Bus for SystemBus {
    fn read_u8(&self, addr: u64) -> SimResult<u8> {
        if let Some(byte) = self.flash.read_u8(addr) {
            return Ok(byte);
        }
        if let Some(byte) = self.ram.read_u8(addr) {
            return Ok(byte);
        }
        if let Some(index) = self.find(addr) {
            if !self.is_clocked(index) {
                return Ok(0);
            }
            let p = &self.peripherals[index];
            return p.dev.read(addr - p.base);
        }
        Err(SimulationError::MemoryViolation(addr))
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        if self.ram.write_u8(addr, value) {
            return Ok(());
        }
        if self.flash.read_u8(addr).is_some() {
            return Err(SimulationError::FlashWrite(addr));
        }
        if let Some(index) = self.find(addr) {
            if !self.is_clocked(index) {
                tracing::warn!(
                    "Write to {} at {:#x} ignored, clock disabled",
                    self.peripherals[index].name,
                    addr
                );
                return Ok(());
            }
            let p = &mut self.peripherals[index];
            return p.dev.write(addr - p.base, value);
        }
        Err(SimulationError::MemoryViolation(addr))
    }

    fn read_u32(&self, addr: u64) -> SimResult<u32> {
        if let Some(word) = self.flash.read_u32(addr) {
            return Ok(word);
        }
        if let Some(word) = self.ram.read_u32(addr) {
            return Ok(word);
        }
        if let Some(index) = self.find(addr) {
            if addr % 4 != 0 {
                return Err(SimulationError::MemoryViolation(addr));
            }
            if !self.is_clocked(index) {
                return Ok(0);
            }
            let p = &self.peripherals[index];
            return p.dev.read_u32(addr - p.base);
        }
        Err(SimulationError::MemoryViolation(addr))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        if self.ram.write_u32(addr, value) {
            return Ok(());
        }
        if self.flash.read_u8(addr).is_some() {
            return Err(SimulationError::FlashWrite(addr));
        }
        if let Some(index) = self.find(addr) {
            if addr % 4 != 0 {
                return Err(SimulationError::MemoryViolation(addr));
            }
            if !self.is_clocked(index) {
                tracing::warn!(
                    "Write of {:#010x} to {} at {:#x} ignored, clock disabled",
                    value,
                    self.peripherals[index].name,
                    addr
                );
                return Ok(());
            }
            let p = &mut self.peripherals[index];
            return p.dev.write_u32(addr - p.base, value);
        }
        Err(SimulationError::MemoryViolation(addr))
    }
}
