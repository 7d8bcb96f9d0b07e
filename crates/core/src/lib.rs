pub mod bus;
pub mod machine;
pub mod memory;
pub mod metrics;
pub mod peripherals;
pub mod snapshot;

use std::any::Any;

pub use l4blink_hal::startup::HaltReason;
pub use machine::{Machine, MachineState};

mod tests;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Write to flash at {0:#x}")]
    FlashWrite(u64),
    #[error("Machine is halted: {0:?}")]
    Halted(HaltReason),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_reset(&self) {}
    fn on_read(&self, _addr: u32, _value: u32) {}
    fn on_write(&self, _addr: u32, _value: u32) {}
    /// A write arrived after the machine halted and was dropped.
    fn on_write_rejected(&self, _addr: u32, _value: u32) {}
    fn on_halt(&self, _reason: HaltReason) {}
}

/// Trait representing a memory-mapped peripheral
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;

    /// Word read. The default assembles four byte reads, little endian.
    fn read_u32(&self, offset: u64) -> SimResult<u32> {
        let mut value = 0;
        for i in 0..4 {
            value |= (self.read(offset + i)? as u32) << (i * 8);
        }
        Ok(value)
    }

    /// Word write. Peripherals with write-to-act registers override this so
    /// the word takes effect as a single access.
    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        for i in 0..4 {
            self.write(offset + i, (value >> (i * 8)) as u8)?;
        }
        Ok(())
    }

    /// Back to the power-on register values.
    fn reset(&mut self);

    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Trait representing the system bus
pub trait Bus {
    fn read_u8(&self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;

    fn read_u32(&self, addr: u64) -> SimResult<u32> {
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(addr + 1)? as u32;
        let b2 = self.read_u8(addr + 2)? as u32;
        let b3 = self.read_u8(addr + 3)? as u32;
        // Little Endian
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        self.write_u8(addr + 2, ((value >> 16) & 0xFF) as u8)?;
        self.write_u8(addr + 3, ((value >> 24) & 0xFF) as u8)?;
        Ok(())
    }
}
