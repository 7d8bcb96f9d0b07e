use crate::SimResult;
use l4blink_config::PeripheralConfig;

const MODER: u64 = 0x00;
const OTYPER: u64 = 0x04;
const OSPEEDR: u64 = 0x08;
const PUPDR: u64 = 0x0C;
const IDR: u64 = 0x10;
const ODR: u64 = 0x14;
const BSRR: u64 = 0x18;
const LCKR: u64 = 0x1C;
const AFRL: u64 = 0x20;
const AFRH: u64 = 0x24;
const BRR: u64 = 0x28;
const ASCR: u64 = 0x2C;

/// Power-on values that differ between ports (PA13/PA14/PA15 and PB3/PB4
/// belong to the debug port and come up in alternate function mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct GpioResetValues {
    pub moder: u32,
    pub ospeedr: u32,
    pub pupdr: u32,
}

impl Default for GpioResetValues {
    fn default() -> Self {
        Self {
            moder: 0xFFFF_FFFF,
            ospeedr: 0,
            pupdr: 0,
        }
    }
}

impl GpioResetValues {
    pub fn from_config(cfg: &PeripheralConfig) -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            moder: cfg.config_u32("moder_reset")?.unwrap_or(defaults.moder),
            ospeedr: cfg.config_u32("ospeedr_reset")?.unwrap_or(defaults.ospeedr),
            pupdr: cfg.config_u32("pupdr_reset")?.unwrap_or(defaults.pupdr),
        })
    }
}

/// STM32L4 GPIO port (RM0351 section 8.5).
#[derive(Debug, Default, serde::Serialize)]
pub struct GpioPort {
    #[serde(skip)]
    reset_values: GpioResetValues,
    moder: u32,
    otyper: u32,
    ospeedr: u32,
    pupdr: u32,
    odr: u32,
    lckr: u32,
    afrl: u32,
    afrh: u32,
    ascr: u32,
    /// Externally driven pin levels, sampled into IDR for non-output pins.
    inputs: u32,
}

impl GpioPort {
    /// A port with every pin in analog mode, as PC..PG come out of reset.
    pub fn new() -> Self {
        Self::with_reset_values(GpioResetValues::default())
    }

    pub fn with_reset_values(reset_values: GpioResetValues) -> Self {
        let mut port = Self {
            reset_values,
            ..Default::default()
        };
        crate::Peripheral::reset(&mut port);
        port
    }

    pub fn moder(&self) -> u32 {
        self.moder
    }

    pub fn odr(&self) -> u32 {
        self.odr
    }

    /// Two-bit MODER field of `pin`.
    pub fn pin_mode(&self, pin: u8) -> u32 {
        (self.moder >> (pin as u32 * 2)) & 0b11
    }

    /// Drives an input pin from outside, e.g. a button.
    pub fn set_input(&mut self, pin: u8, high: bool) {
        let bit = 1 << pin;
        if high {
            self.inputs |= bit;
        } else {
            self.inputs &= !bit;
        }
    }

    /// Pins in general purpose output mode read back their ODR level.
    fn output_mask(&self) -> u32 {
        (0..16u32)
            .filter(|pin| (self.moder >> (pin * 2)) & 0b11 == 0b01)
            .fold(0, |mask, pin| mask | (1 << pin))
    }

    fn idr(&self) -> u32 {
        let outputs = self.output_mask();
        ((self.inputs & !outputs) | (self.odr & outputs)) & 0xFFFF
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset {
            MODER => self.moder,
            OTYPER => self.otyper,
            OSPEEDR => self.ospeedr,
            PUPDR => self.pupdr,
            IDR => self.idr(),
            ODR => self.odr,
            LCKR => self.lckr,
            AFRL => self.afrl,
            AFRH => self.afrh,
            ASCR => self.ascr,
            // BSRR and BRR are write-only
            _ => 0,
        }
    }

    /// `lanes` selects the bytes of `value` that were actually written.
    fn write_reg(&mut self, offset: u64, value: u32, lanes: u32) {
        let merge = |old: u32| (old & !lanes) | (value & lanes);
        match offset {
            MODER => self.moder = merge(self.moder),
            OTYPER => self.otyper = merge(self.otyper) & 0xFFFF,
            OSPEEDR => self.ospeedr = merge(self.ospeedr),
            PUPDR => self.pupdr = merge(self.pupdr),
            ODR => self.odr = merge(self.odr) & 0xFFFF,
            BSRR => {
                // Set wins when both halves name the same pin
                let bits = value & lanes;
                let set = bits & 0xFFFF;
                let reset = bits >> 16;
                self.odr = (self.odr & !reset) | set;
            }
            LCKR => self.lckr = merge(self.lckr) & 0x1_FFFF,
            AFRL => self.afrl = merge(self.afrl),
            AFRH => self.afrh = merge(self.afrh),
            BRR => self.odr &= !(value & lanes & 0xFFFF),
            ASCR => self.ascr = merge(self.ascr) & 0xFFFF,
            _ => tracing::debug!("GPIO write to unmapped offset {:#x} ignored", offset),
        }
    }
}

impl crate::Peripheral for GpioPort {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_offset = offset & !3;
        let byte_offset = (offset % 4) as u32;
        let reg_val = self.read_reg(reg_offset);
        Ok(((reg_val >> (byte_offset * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let reg_offset = offset & !3;
        let shift = (offset % 4) as u32 * 8;
        self.write_reg(reg_offset, (value as u32) << shift, 0xFF << shift);
        Ok(())
    }

    fn read_u32(&self, offset: u64) -> SimResult<u32> {
        Ok(self.read_reg(offset & !3))
    }

    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        self.write_reg(offset & !3, value, u32::MAX);
        Ok(())
    }

    fn reset(&mut self) {
        let reset_values = self.reset_values;
        let inputs = self.inputs;
        *self = Self {
            reset_values,
            moder: reset_values.moder,
            ospeedr: reset_values.ospeedr,
            pupdr: reset_values.pupdr,
            inputs,
            ..Default::default()
        };
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
