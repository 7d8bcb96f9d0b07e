//! What the reset handler does before `main`.
//!
//! The sequence runs once per reset and never again:
//!
//! 1. copy the `.data` image from flash to RAM,
//! 2. zero `.bss`,
//! 3. call the entry point,
//! 4. halt if the entry point returns.
//!
//! Every memory write goes through the [`RegisterBus`], so the same code runs
//! on the chip and against the simulator.

use crate::bus::RegisterBus;
use crate::delay;

/// Segment bounds provided by the linker script. All addresses are word
/// aligned and `start <= end` for well-formed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    /// Flash address of the `.data` initial values (`_sidata`).
    pub data_load: u32,
    /// RAM `.data` bounds (`_sdata`, `_edata`).
    pub data_start: u32,
    pub data_end: u32,
    /// RAM `.bss` bounds (`_sbss`, `_ebss`).
    pub bss_start: u32,
    pub bss_end: u32,
}

/// Why the core stopped making progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The entry point returned.
    EntryReturned,
    /// An exception with no handler of its own was taken (vector number).
    UnexpectedException(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    CopyData,
    ZeroBss,
    TransferControl,
}

/// Words needed to cover `[start, end)`; zero when `end <= start`.
fn word_count(start: u32, end: u32) -> u32 {
    end.saturating_sub(start).div_ceil(4)
}

/// Copies words from `data_load` to `[data_start, data_end)`.
///
/// The bounds are not validated. A load address near the top of the address
/// space wraps around like the core's address arithmetic does.
pub fn copy_data<B: RegisterBus + ?Sized>(bus: &mut B, layout: &SegmentLayout) {
    for i in 0..word_count(layout.data_start, layout.data_end) {
        let word = bus.read_u32(layout.data_load.wrapping_add(4 * i));
        bus.write_u32(layout.data_start + 4 * i, word);
    }
}

/// Writes zero to every word of `[bss_start, bss_end)`.
pub fn zero_bss<B: RegisterBus + ?Sized>(bus: &mut B, layout: &SegmentLayout) {
    for i in 0..word_count(layout.bss_start, layout.bss_end) {
        bus.write_u32(layout.bss_start + 4 * i, 0);
    }
}

/// The reset sequence as a state machine.
#[derive(Debug)]
pub struct Startup {
    layout: SegmentLayout,
    state: StartupState,
}

impl Startup {
    pub const fn new(layout: SegmentLayout) -> Self {
        Self {
            layout,
            state: StartupState::CopyData,
        }
    }

    pub fn state(&self) -> StartupState {
        self.state
    }

    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    /// Performs the current memory initialisation state and moves to the next.
    /// Does nothing once control is ready to be transferred.
    pub fn advance<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> StartupState {
        self.state = match self.state {
            StartupState::CopyData => {
                copy_data(bus, &self.layout);
                StartupState::ZeroBss
            }
            StartupState::ZeroBss => {
                zero_bss(bus, &self.layout);
                StartupState::TransferControl
            }
            StartupState::TransferControl => StartupState::TransferControl,
        };
        self.state
    }

    /// Initialises RAM, calls `entry`, and reports why control came back.
    ///
    /// `entry` is not supposed to return. When it does, the caller must stop
    /// (see [`halt`]); nothing is re-initialised.
    pub fn run<B, F>(mut self, bus: &mut B, entry: F) -> HaltReason
    where
        B: RegisterBus + ?Sized,
        F: FnOnce(&mut B),
    {
        while self.state != StartupState::TransferControl {
            self.advance(bus);
        }
        entry(bus);
        HaltReason::EntryReturned
    }
}

/// Stops all forward progress, forever.
///
/// There is no supervisor to restart the core and no console to report to;
/// a debug probe is the only way to see why the firmware stopped.
#[inline(never)]
pub fn halt() -> ! {
    loop {
        delay::nop();
    }
}
