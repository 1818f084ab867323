use crate::config::EccLevel;
use crate::HEADER_SIZE;

const RESERVED_BIT: u8 = 0x10;
const CRC_FLAG_BIT: u8 = 0x20;

/// CRC-8 Dallas/Maxim (reflected polynomial 0x8C, init 0)
pub fn crc8(data: &[u8]) -> u8 {
    const POLYNOMIAL: u8 = 0x8C;
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x01 != 0 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// CRC-4 (x^4 + x + 1, reflected polynomial 0x0C), for headers too short to spare a byte
pub fn crc4(data: &[u8]) -> u8 {
    const POLYNOMIAL: u8 = 0x0C;
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x01 != 0 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }
    crc & 0x0F
}

/// Message header
///
/// Wire layout (2 bytes):
/// - byte 0: payload length
/// - byte 1: ECC level (bits 7-6), payload CRC flag (bit 5), reserved zero (bit 4),
///   CRC-4 of the preceding 12 bits (bits 3-0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub length: u8,
    pub ecc_level: EccLevel,
    /// Payload is followed by its CRC-8 before error correction
    pub crc: bool,
}

impl Header {
    pub fn new(length: u8, ecc_level: EccLevel, crc: bool) -> Self {
        Self {
            length,
            ecc_level,
            crc,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut flags = self.ecc_level.ordinal() << 6;
        if self.crc {
            flags |= CRC_FLAG_BIT;
        }
        let checksum = crc4(&[self.length, flags]);
        [self.length, flags | checksum]
    }

    /// Parse a header, `None` when the checksum does not match or the reserved bit is set
    pub fn decode(data: &[u8; HEADER_SIZE]) -> Option<Self> {
        let [length, flags] = *data;
        if flags & RESERVED_BIT != 0 {
            return None;
        }
        if crc4(&[length, flags & 0xF0]) != flags & 0x0F {
            return None;
        }
        Some(Self {
            length,
            ecc_level: EccLevel::from_ordinal(flags >> 6)?,
            crc: flags & CRC_FLAG_BIT != 0,
        })
    }
}
