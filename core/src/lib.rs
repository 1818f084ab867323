//! Acoustic data transmission over dual-tone symbols
//!
//! A message is a gate tone, a trigger tone, a short header and a Reed-Solomon protected
//! payload. The receiver locates the trigger in a live sample stream with two half-window
//! offset banks of Goertzel analyzers, then demodulates the symbol words that follow.

pub mod error;
pub mod config;
pub mod window;
pub mod goertzel;
pub mod circular;
pub mod percentile;
pub mod peak;
pub mod trigger;
pub mod prng;
pub mod framing;
pub mod fec;
pub mod symbols;
pub mod tone;
pub mod encoder;
pub mod decoder;

pub use config::{Configuration, EccLevel};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{AudioModemError, Result};
pub use framing::Header;
pub use trigger::{TriggerAnalyzer, TriggerCallback, TriggerProgress};

// Frequency table layout
pub const NUM_FREQUENCIES: usize = 32;
pub const FREQUENCY_ROOT: usize = 16; // first frequency of the high symbol band

// Audible preset
pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;
pub const AUDIBLE_FIRST_FREQUENCY: f64 = 1720.0; // Hz
pub const AUDIBLE_FREQUENCY_INCREMENT: f64 = 200.0; // Hz
pub const DEFAULT_WORD_TIME: f64 = 0.06; // 60 ms per symbol pair
pub const DEFAULT_GATE_TIME: f64 = 0.12; // 120 ms per gate tone
pub const DEFAULT_TRIGGER_SNR: f64 = 15.0; // dB
pub const DEFAULT_POWER_PEAK: f64 = 0.5;

// Envelopes
pub const GATE_TUKEY_ALPHA: f64 = 1.0;
pub const WORD_TUKEY_ALPHA: f64 = 0.5;

// Framing
pub const HEADER_SIZE: usize = 2;
pub const MAX_PAYLOAD_LENGTH: usize = 255;

/// Seed of the symbol interleaver, shared by every encoder and decoder
pub const PERMUTATION_SEED: i64 = 717461;
