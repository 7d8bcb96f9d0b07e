use crate::{HaltReason, SimulationObserver};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts bus traffic seen by a [`Machine`](crate::Machine).
#[derive(Debug, Default)]
pub struct AccessMetrics {
    reads: AtomicU64,
    writes: AtomicU64,
    rejected_writes: AtomicU64,
    resets: AtomicU64,
    halts: AtomicU64,
}

impl AccessMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
        self.rejected_writes.store(0, Ordering::SeqCst);
        self.resets.store(0, Ordering::SeqCst);
        self.halts.store(0, Ordering::SeqCst);
    }

    pub fn get_reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn get_writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get_rejected_writes(&self) -> u64 {
        self.rejected_writes.load(Ordering::SeqCst)
    }

    pub fn get_resets(&self) -> u64 {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn get_halts(&self) -> u64 {
        self.halts.load(Ordering::SeqCst)
    }
}

impl SimulationObserver for AccessMetrics {
    fn on_reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn on_read(&self, _addr: u32, _value: u32) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn on_write(&self, _addr: u32, _value: u32) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_write_rejected(&self, _addr: u32, _value: u32) {
        self.rejected_writes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_halt(&self, _reason: HaltReason) {
        self.halts.fetch_add(1, Ordering::SeqCst);
    }
}
