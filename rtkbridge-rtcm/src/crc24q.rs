//! CRC-24Q (Qualcomm), the checksum that closes every RTCM3 frame.
//!
//! Polynomial 0x1864CFB, initial value 0, no reflection, no final XOR.

/// Generator polynomial including the implicit x^24 term.
pub const POLYNOMIAL: u32 = 0x1864CFB;

const MASK: u32 = 0xFF_FFFF;

const TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 16;
        let mut bit = 0;
        while bit < 8 {
            crc <<= 1;
            if crc & 0x100_0000 != 0 {
                crc ^= POLYNOMIAL;
            }
            bit += 1;
        }
        table[i] = crc & MASK;
        i += 1;
    }
    table
}

/// Incremental CRC-24Q accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc24q(u32);

impl Crc24q {
    pub fn new() -> Self {
        Self(0)
    }

    /// Folds one byte into a running 24-bit value.
    #[inline]
    pub fn update(crc: u32, byte: u8) -> u32 {
        let idx = (((crc >> 16) ^ byte as u32) & 0xFF) as usize;
        ((crc << 8) ^ TABLE[idx]) & MASK
    }

    /// Computes the checksum of a complete byte slice.
    pub fn checksum(data: &[u8]) -> u32 {
        data.iter().fold(0, |crc, &b| Self::update(crc, b))
    }

    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.0 = Self::update(self.0, byte);
    }

    pub fn extend(&mut self, data: &[u8]) {
        for &b in data {
            self.push(b);
        }
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
