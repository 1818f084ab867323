use crate::config::EccLevel;
use crate::error::{AudioModemError, Result};
use crate::framing::crc8;
use crate::MAX_PAYLOAD_LENGTH;

/// Bytes protected by error correction: the payload plus its optional CRC-8
fn protected_length(payload_length: usize, crc: bool) -> usize {
    payload_length + usize::from(crc)
}

/// Length of the codeword carrying `payload_length` bytes at `level`
///
/// Full blocks carry `level.block_data_bytes()`, the last one is shortened, and every block
/// carries the full parity.
pub fn codeword_length(payload_length: usize, level: EccLevel, crc: bool) -> usize {
    let data = protected_length(payload_length, crc);
    let blocks = data.div_ceil(level.block_data_bytes());
    data + blocks * level.block_parity_bytes()
}

pub struct FecEncoder {
    level: EccLevel,
    rs: reed_solomon::Encoder,
}

pub struct FecDecoder {
    level: EccLevel,
    rs: reed_solomon::Decoder,
}

impl FecEncoder {
    pub fn new(level: EccLevel) -> Self {
        Self {
            level,
            rs: reed_solomon::Encoder::new(level.block_parity_bytes()),
        }
    }

    pub fn level(&self) -> EccLevel {
        self.level
    }

    /// Encode data block by block, each block followed by its parity bytes
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        let blocks = data.len().div_ceil(self.level.block_data_bytes());
        let mut encoded = Vec::with_capacity(data.len() + blocks * self.level.block_parity_bytes());
        for block in data.chunks(self.level.block_data_bytes()) {
            let buffer = self.rs.encode(block);
            encoded.extend_from_slice(&buffer[..]);
        }
        encoded
    }

    /// Payload to codeword, appending the payload CRC-8 first when `crc` is set
    pub fn encode_payload(&self, payload: &[u8], crc: bool) -> Result<Vec<u8>> {
        if payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(AudioModemError::PayloadTooLarge(payload.len()));
        }
        if crc {
            let mut protected = Vec::with_capacity(payload.len() + 1);
            protected.extend_from_slice(payload);
            protected.push(crc8(payload));
            Ok(self.encode(&protected))
        } else {
            Ok(self.encode(payload))
        }
    }
}

impl FecDecoder {
    pub fn new(level: EccLevel) -> Self {
        Self {
            level,
            rs: reed_solomon::Decoder::new(level.block_parity_bytes()),
        }
    }

    pub fn level(&self) -> EccLevel {
        self.level
    }

    /// Correct and strip the parity of every block
    ///
    /// Each block may hold up to half its parity bytes in errors at unknown positions.
    pub fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        let block_length = self.level.block_data_bytes() + self.level.block_parity_bytes();
        let mut decoded = Vec::with_capacity(encoded.len());
        for block in encoded.chunks(block_length) {
            if block.len() <= self.level.block_parity_bytes() {
                return Err(AudioModemError::InvalidInputSize);
            }
            let mut block = block.to_vec();
            let corrected = self
                .rs
                .correct(&mut block, None)
                .map_err(|_| AudioModemError::FecDecodeFailure)?;
            decoded.extend_from_slice(corrected.data());
        }
        Ok(decoded)
    }

    /// Codeword to payload of `payload_length` bytes, verifying the CRC-8 when `crc` is set
    pub fn decode_payload(
        &self,
        codeword: &[u8],
        payload_length: usize,
        crc: bool,
    ) -> Result<Vec<u8>> {
        if codeword.len() != codeword_length(payload_length, self.level, crc) {
            return Err(AudioModemError::InvalidInputSize);
        }
        let mut decoded = self.decode(codeword)?;
        if crc {
            let expected = decoded.pop().ok_or(AudioModemError::InsufficientData)?;
            if crc8(&decoded) != expected {
                return Err(AudioModemError::PayloadCrcMismatch);
            }
        }
        Ok(decoded)
    }
}
