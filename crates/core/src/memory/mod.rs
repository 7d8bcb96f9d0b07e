use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u64,
    pub data: Vec<u8>,
}

/// Raw bytes to place in the address space before reset, usually a flash
/// image starting with the vector table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramImage {
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, start_addr: u64, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }

    /// Convenience for images built from little-endian words.
    pub fn add_words(&mut self, start_addr: u64, words: &[u32]) {
        let data = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.add_segment(start_addr, data);
    }
}

/// A simple flat memory storage
#[derive(Debug, Clone)]
pub struct LinearMemory {
    pub data: Vec<u8>,
    pub base_addr: u64,
}

impl LinearMemory {
    pub fn new(size: usize, base_addr: u64) -> Self {
        Self {
            data: vec![0; size],
            base_addr,
        }
    }

    pub fn end_addr(&self) -> u64 {
        self.base_addr + self.data.len() as u64
    }

    /// Whether `[addr, addr + len)` lies entirely inside this memory.
    pub fn contains(&self, addr: u64, len: u64) -> bool {
        addr >= self.base_addr
            && addr
                .checked_add(len)
                .is_some_and(|end| end <= self.end_addr())
    }

    pub fn read_u8(&self, addr: u64) -> Option<u8> {
        if self.contains(addr, 1) {
            Some(self.data[(addr - self.base_addr) as usize])
        } else {
            None
        }
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> bool {
        if self.contains(addr, 1) {
            self.data[(addr - self.base_addr) as usize] = value;
            true
        } else {
            false
        }
    }

    pub fn read_u32(&self, addr: u64) -> Option<u32> {
        if !self.contains(addr, 4) {
            return None;
        }
        let offset = (addr - self.base_addr) as usize;
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        Some(u32::from_le_bytes(bytes))
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) -> bool {
        if !self.contains(addr, 4) {
            return false;
        }
        let offset = (addr - self.base_addr) as usize;
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        true
    }

    /// Sets every byte to `value`, e.g. to model uninitialised SRAM.
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        if self.contains(segment.start_addr, segment.data.len() as u64) {
            let offset = (segment.start_addr - self.base_addr) as usize;
            self.data[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
            return true;
        }
        false
    }
}
