//! CRC-16/CCITT link-integrity checksum
//!
//! Polynomial 0x1021, initial register 0xFFFF, MSB-first, no reflection and
//! no final XOR (the variant usually listed as CRC-16/CCITT-FALSE). Every
//! peer on the wire must produce identical values.

/// Generator polynomial
pub const POLYNOMIAL: u16 = 0x1021;

/// Initial register value
pub const INITIAL: u16 = 0xFFFF;

const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Incremental CRC-16/CCITT state
///
/// Lets the header and payload be fed separately without copying them into
/// one contiguous buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    /// Start a new checksum
    pub const fn new() -> Self {
        Crc16 { value: INITIAL }
    }

    /// Feed a single byte
    pub fn update_byte(&mut self, byte: u8) {
        let index = ((self.value >> 8) as u8 ^ byte) as usize;
        self.value = (self.value << 8) ^ TABLE[index];
    }

    /// Feed a slice of bytes
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.update_byte(byte);
        }
    }

    /// Current checksum value
    pub fn finish(&self) -> u16 {
        self.value
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

/// Table-driven checksum of `data`
pub fn checksum(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(data);
    crc.finish()
}

/// Bit-by-bit reference checksum
///
/// Produces exactly the same value as [`checksum`]; kept for targets where
/// the 512-byte table is too expensive.
pub fn checksum_bitwise(data: &[u8]) -> u16 {
    let mut crc = INITIAL;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    crc
}
