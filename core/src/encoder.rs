use crate::config::{Configuration, EccLevel};
use crate::error::{AudioModemError, Result};
use crate::framing::Header;
use crate::symbols::{header_to_symbols, payload_symbol_count, payload_to_symbols, HEADER_SYMBOLS};
use crate::tone::ToneModulator;
use crate::MAX_PAYLOAD_LENGTH;
use log::debug;

pub struct Encoder {
    config: Configuration,
    modulator: ToneModulator,
}

impl Encoder {
    pub fn new(config: Configuration) -> Self {
        Self {
            modulator: ToneModulator::new(config.clone()),
            config,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Encode a payload into audio samples
    /// Returns: gate tone + trigger tone + header words + payload words
    pub fn encode(&self, payload: &[u8], ecc_level: EccLevel, crc: bool) -> Result<Vec<f32>> {
        if payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(AudioModemError::PayloadTooLarge(payload.len()));
        }
        let header = Header::new(payload.len() as u8, ecc_level, crc);

        // Header words are not interleaved, they always come first
        let mut symbols = header_to_symbols(&header);
        symbols.extend(payload_to_symbols(payload, ecc_level, crc)?);

        let mut samples = self.modulator.preamble();
        samples.extend(self.modulator.modulate_symbols(&symbols)?);

        debug!(
            "encoded {} bytes at level {} into {} symbols, {} samples",
            payload.len(),
            ecc_level,
            symbols.len(),
            samples.len()
        );
        Ok(samples)
    }

    /// Number of samples `encode` produces for a payload of `payload_length` bytes
    pub fn message_length(&self, payload_length: usize, ecc_level: EccLevel, crc: bool) -> usize {
        let header = Header::new(payload_length.min(MAX_PAYLOAD_LENGTH) as u8, ecc_level, crc);
        let words = (HEADER_SYMBOLS + payload_symbol_count(&header)) / 2;
        2 * self.config.gate_length() + words * self.config.word_length()
    }
}
