use crate::SimResult;
use std::collections::BTreeMap;

const CR: u64 = 0x00;
const ICSCR: u64 = 0x04;
const PLLCFGR: u64 = 0x0C;
const AHB1ENR: u64 = 0x48;
const AHB2ENR: u64 = 0x4C;

/// Offsets that hold a register on the L476; everything else in the block is
/// reserved and reads as zero.
const MAPPED: &[u64] = &[
    0x00, 0x04, 0x08, 0x0C, 0x10, 0x14, 0x18, 0x1C, 0x20, 0x28, 0x2C, 0x30, 0x38, 0x3C, 0x40,
    0x48, 0x4C, 0x50, 0x58, 0x5C, 0x60, 0x68, 0x6C, 0x70, 0x78, 0x7C, 0x80, 0x88, 0x90, 0x94,
];

/// (on bit, ready bit) pairs in CR: MSI, HSI16, HSE, PLL.
const OSCILLATORS: [(u32, u32); 4] = [(0, 1), (8, 10), (16, 17), (24, 25)];

/// STM32L4 Reset and Clock Control (RM0351 section 6.4).
///
/// Registers are plain storage apart from CR, whose oscillator ready flags
/// follow the matching enable bits immediately.
#[derive(Debug, Default, serde::Serialize)]
pub struct Rcc {
    regs: BTreeMap<u64, u32>,
}

impl Rcc {
    pub fn new() -> Self {
        let mut rcc = Self::default();
        crate::Peripheral::reset(&mut rcc);
        rcc
    }

    pub fn ahb2enr(&self) -> u32 {
        self.read_reg(AHB2ENR)
    }

    /// Value of the register at `offset`, zero for reserved slots.
    pub fn read_reg(&self, offset: u64) -> u32 {
        self.regs.get(&offset).copied().unwrap_or(0)
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        if !MAPPED.contains(&offset) {
            tracing::debug!("RCC write to reserved offset {:#x} ignored", offset);
            return;
        }
        let value = if offset == CR {
            OSCILLATORS.iter().fold(value, |cr, &(on, ready)| {
                if cr & (1 << on) != 0 {
                    cr | (1 << ready)
                } else {
                    cr & !(1 << ready)
                }
            })
        } else {
            value
        };
        self.regs.insert(offset, value);
    }
}

impl crate::Peripheral for Rcc {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_offset = offset & !3;
        let byte_offset = (offset % 4) as u32;
        let reg_val = self.read_reg(reg_offset);
        Ok(((reg_val >> (byte_offset * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let reg_offset = offset & !3;
        let byte_offset = (offset % 4) as u32;
        let mut reg_val = self.read_reg(reg_offset);

        let mask = 0xFF << (byte_offset * 8);
        reg_val &= !mask;
        reg_val |= (value as u32) << (byte_offset * 8);

        self.write_reg(reg_offset, reg_val);
        Ok(())
    }

    fn read_u32(&self, offset: u64) -> SimResult<u32> {
        Ok(self.read_reg(offset & !3))
    }

    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        self.write_reg(offset & !3, value);
        Ok(())
    }

    fn reset(&mut self) {
        self.regs.clear();
        for &offset in MAPPED {
            self.regs.insert(offset, 0);
        }
        // MSI on at 4 MHz, flash interface clock enabled
        self.write_reg(CR, 0x0000_0061);
        self.write_reg(ICSCR, 0x1000_0000);
        self.write_reg(PLLCFGR, 0x0000_1000);
        self.write_reg(AHB1ENR, 0x0000_0100);
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }
}
