//! Software busy-wait.
//!
//! This is not a timer. The loop executes a fixed number of no-op
//! instructions, so the real delay scales with the core clock (MSI 4 MHz out
//! of reset), flash wait states and optimisation level. Use a hardware timer
//! when the duration matters.

/// Spin iterations per requested millisecond.
pub const SPINS_PER_MS: u32 = 1_000;

/// A single no-op the optimiser cannot remove.
#[inline(always)]
pub fn nop() {
    #[cfg(target_arch = "arm")]
    cortex_m::asm::nop();
    #[cfg(not(target_arch = "arm"))]
    core::hint::spin_loop();
}

pub fn spin(iterations: u32) {
    for _ in 0..iterations {
        nop();
    }
}

/// Roughly `ms` milliseconds. See the module documentation.
pub fn delay_ms(ms: u32) {
    spin(ms.saturating_mul(SPINS_PER_MS));
}
