use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[serde(alias = "cortex-m4", alias = "cortex-m4f")]
    Arm,
    Unknown,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Duplicate peripheral id '{0}'")]
    DuplicatePeripheral(String),
    #[error("Peripheral '{0}' overlaps '{1}'")]
    Overlap(String, String),
    #[error("Peripheral '{id}' is gated by unknown clock controller '{controller}'")]
    UnknownClockController { id: String, controller: String },
    #[error("Clock gate bit {bit} of peripheral '{id}' is out of range")]
    ClockGateBit { id: String, bit: u8 },
    #[error("Board I/O '{id}' refers to unknown peripheral '{peripheral}'")]
    UnknownBoardPeripheral { id: String, peripheral: String },
    #[error("Address range of '{0}' overflows the 64-bit address space")]
    AddressOverflow(String),
    #[error("Board I/O '{id}' uses pin {pin}, ports have 16 pins")]
    PinOutOfRange { id: String, pin: u8 },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "96KiB"
}

impl MemoryRange {
    pub fn size_bytes(&self) -> Result<u64> {
        parse_size(&self.size)
    }
}

fn default_clock_controller() -> String {
    "rcc".to_string()
}

/// Enable bit that must be set before a peripheral's registers accept writes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClockGate {
    #[serde(default = "default_clock_controller")]
    pub controller: String,
    /// Register offset inside the clock controller, e.g. 0x4C for AHB2ENR.
    pub register: u64,
    pub bit: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeripheralConfig {
    pub id: String,
    pub r#type: String, // "rcc", "gpio"
    pub base_address: u64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub clock_gate: Option<ClockGate>,
    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
}

impl PeripheralConfig {
    /// Mapped size in bytes; 1 KiB when the descriptor leaves it out.
    pub fn size_bytes(&self) -> Result<u64> {
        match &self.size {
            Some(size) => parse_size(size),
            None => Ok(0x400),
        }
    }

    /// Integer option from the free-form `config` map.
    pub fn config_u32(&self, key: &str) -> Result<Option<u32>> {
        let Some(value) = self.config.get(key) else {
            return Ok(None);
        };
        let raw = value
            .as_u64()
            .with_context(|| format!("'{}.{}' must be an unsigned integer", self.id, key))?;
        let value = u32::try_from(raw)
            .with_context(|| format!("'{}.{}' does not fit in 32 bits", self.id, key))?;
        Ok(Some(value))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChipDescriptor {
    pub name: String,
    pub arch: Arch,
    pub flash: MemoryRange,
    pub ram: MemoryRange,
    pub peripherals: Vec<PeripheralConfig>,
}

impl ChipDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|| format!("Failed to open chip descriptor at {:?}", path))?;
        let chip: Self =
            serde_yaml::from_reader(f).context("Failed to parse Chip Descriptor YAML")?;
        chip.validate()?;
        tracing::debug!(
            "Loaded chip '{}' with {} peripherals",
            chip.name,
            chip.peripherals.len()
        );
        Ok(chip)
    }

    pub fn peripheral(&self, id: &str) -> Option<&PeripheralConfig> {
        self.peripherals.iter().find(|p| p.id == id)
    }

    pub fn validate(&self) -> Result<()> {
        let flash_size = self.flash.size_bytes().context("Invalid flash size")?;
        checked_offset("flash", self.flash.base, flash_size)?;
        let ram_size = self.ram.size_bytes().context("Invalid RAM size")?;
        checked_offset("ram", self.ram.base, ram_size)?;

        let mut ids = HashSet::new();
        let mut ranges = Vec::with_capacity(self.peripherals.len());
        for p in &self.peripherals {
            if !ids.insert(p.id.as_str()) {
                return Err(ConfigError::DuplicatePeripheral(p.id.clone()).into());
            }
            let size = p
                .size_bytes()
                .with_context(|| format!("Invalid size for peripheral '{}'", p.id))?;
            let end = checked_offset(&p.id, p.base_address, size)?;
            ranges.push((p.id.as_str(), p.base_address, end));
        }

        for (i, (id, start, end)) in ranges.iter().enumerate() {
            for (other, other_start, other_end) in &ranges[i + 1..] {
                if start < other_end && other_start < end {
                    return Err(ConfigError::Overlap(id.to_string(), other.to_string()).into());
                }
            }
        }

        for p in &self.peripherals {
            let Some(gate) = &p.clock_gate else {
                continue;
            };
            let Some(controller) = self.peripheral(&gate.controller) else {
                return Err(ConfigError::UnknownClockController {
                    id: p.id.clone(),
                    controller: gate.controller.clone(),
                }
                .into());
            };
            checked_offset(&p.id, controller.base_address, gate.register)?;
            if gate.bit >= 32 {
                return Err(ConfigError::ClockGateBit {
                    id: p.id.clone(),
                    bit: gate.bit,
                }
                .into());
            }
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BoardIoKind {
    Led,
    Button,
}

fn default_true() -> bool {
    true
}

/// A board-level signal wired to a GPIO pin, e.g. an LED.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BoardIoBinding {
    pub id: String,
    pub kind: BoardIoKind,
    pub peripheral: String,
    pub pin: u8,
    #[serde(default = "default_true")]
    pub active_high: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SystemManifest {
    pub name: String,
    pub chip: String, // Path relative to the manifest
    #[serde(default)]
    pub board_io: Vec<BoardIoBinding>,
}

impl SystemManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|| format!("Failed to open system manifest at {:?}", path))?;
        serde_yaml::from_reader(f).context("Failed to parse System Manifest")
    }

    /// Location of the chip descriptor, resolved against the manifest's
    /// directory.
    pub fn chip_path(&self, manifest_path: &Path) -> PathBuf {
        manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.chip)
    }

    /// Loads the manifest and the chip it refers to, and checks that every
    /// board binding points at a GPIO port of that chip.
    pub fn load_with_chip<P: AsRef<Path>>(path: P) -> Result<(Self, ChipDescriptor)> {
        let path = path.as_ref();
        let manifest = Self::from_file(path)?;
        let chip_path = manifest.chip_path(path);
        tracing::info!("Loading chip descriptor: {:?}", chip_path);
        let chip = ChipDescriptor::from_file(&chip_path)?;
        manifest.validate_against(&chip)?;
        Ok((manifest, chip))
    }

    pub fn validate_against(&self, chip: &ChipDescriptor) -> Result<()> {
        for io in &self.board_io {
            if chip.peripheral(&io.peripheral).is_none() {
                return Err(ConfigError::UnknownBoardPeripheral {
                    id: io.id.clone(),
                    peripheral: io.peripheral.clone(),
                }
                .into());
            }
            if io.pin >= 16 {
                return Err(ConfigError::PinOutOfRange {
                    id: io.id.clone(),
                    pin: io.pin,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// `base + offset`, or `AddressOverflow` naming `id` when it does not fit.
pub fn checked_offset(id: &str, base: u64, offset: u64) -> Result<u64, ConfigError> {
    base.checked_add(offset)
        .ok_or_else(|| ConfigError::AddressOverflow(id.to_string()))
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
