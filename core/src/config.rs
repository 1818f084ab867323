use crate::error::{AudioModemError, Result};
use crate::{
    AUDIBLE_FIRST_FREQUENCY, AUDIBLE_FREQUENCY_INCREMENT, DEFAULT_GATE_TIME, DEFAULT_POWER_PEAK,
    DEFAULT_TRIGGER_SNR, DEFAULT_WORD_TIME, FREQUENCY_ROOT, NUM_FREQUENCIES,
};
use std::fmt;
use std::str::FromStr;

/// Reed-Solomon redundancy tier, in increasing order of protection
///
/// Every block carries a fixed number of parity bytes; the last block of a payload is
/// shortened but keeps the full parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EccLevel {
    L,
    M,
    Q,
    H,
}

impl EccLevel {
    pub const ALL: [EccLevel; 4] = [EccLevel::L, EccLevel::M, EccLevel::Q, EccLevel::H];

    /// Two-bit value stored in the header
    pub fn ordinal(self) -> u8 {
        match self {
            EccLevel::L => 0,
            EccLevel::M => 1,
            EccLevel::Q => 2,
            EccLevel::H => 3,
        }
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(EccLevel::L),
            1 => Some(EccLevel::M),
            2 => Some(EccLevel::Q),
            3 => Some(EccLevel::H),
            _ => None,
        }
    }

    /// Data bytes carried by one full Reed-Solomon block
    pub fn block_data_bytes(self) -> usize {
        match self {
            EccLevel::L => 26,
            EccLevel::M => 22,
            EccLevel::Q => 16,
            EccLevel::H => 12,
        }
    }

    /// Parity bytes appended to every block (corrects half as many byte errors)
    pub fn block_parity_bytes(self) -> usize {
        match self {
            EccLevel::L => 6,
            EccLevel::M => 10,
            EccLevel::Q => 16,
            EccLevel::H => 20,
        }
    }

    /// Share of a full block that may be corrupted and still be recovered
    pub fn redundancy_ratio(self) -> f64 {
        let total = self.block_data_bytes() + self.block_parity_bytes();
        (self.block_parity_bytes() / 2) as f64 / total as f64
    }
}

impl fmt::Display for EccLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EccLevel::L => "L",
            EccLevel::M => "M",
            EccLevel::Q => "Q",
            EccLevel::H => "H",
        };
        f.write_str(name)
    }
}

impl FromStr for EccLevel {
    type Err = AudioModemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "L" => Ok(EccLevel::L),
            "M" => Ok(EccLevel::M),
            "Q" => Ok(EccLevel::Q),
            "H" => Ok(EccLevel::H),
            other => Err(AudioModemError::InvalidConfig(format!(
                "unknown ECC level '{}', expected one of L, M, Q, H",
                other
            ))),
        }
    }
}

/// Smallest analysis window able to separate `target_frequency` from `closest_frequency`
///
/// The spacing between the two tones must cover two frequency bins, and the window must hold
/// at least five periods of the target tone.
pub fn compute_minimum_window_size(
    sample_rate: f64,
    target_frequency: f64,
    closest_frequency: f64,
) -> usize {
    let max_bin_size = (closest_frequency - target_frequency).abs() / 2.0;
    let window_size = (sample_rate / max_bin_size).ceil() as usize;
    let five_periods = (sample_rate * 5.0 / target_frequency).ceil() as usize;
    window_size.max(five_periods)
}

/// Immutable modem configuration
///
/// Derived lengths (samples) are computed once at construction:
/// - `word_length`: one symbol pair
/// - `gate_length`: one gate or trigger tone
/// - `window_length`: trigger analysis window, always even so the half-window hop is exact
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    sample_rate: f64,
    first_frequency: f64,
    frequency_increment: f64,
    word_time: f64,
    gate_time: f64,
    trigger_snr: f64,
    power_peak: f64,
    word_length: usize,
    gate_length: usize,
    window_length: usize,
    frequencies: Vec<f64>,
}

impl Configuration {
    pub fn new(
        sample_rate: f64,
        first_frequency: f64,
        frequency_increment: f64,
        word_time: f64,
        gate_time: f64,
        trigger_snr: f64,
        power_peak: f64,
    ) -> Result<Self> {
        if !(sample_rate > 0.0 && first_frequency > 0.0 && frequency_increment > 0.0) {
            return Err(AudioModemError::InvalidConfig(
                "sample rate and frequencies must be positive".to_string(),
            ));
        }
        if !(power_peak > 0.0 && trigger_snr >= 0.0) {
            return Err(AudioModemError::InvalidConfig(
                "power peak must be positive and trigger SNR non-negative".to_string(),
            ));
        }

        let frequencies = frequency_table(first_frequency, frequency_increment, NUM_FREQUENCIES);
        let highest = frequencies[NUM_FREQUENCIES - 1];
        if highest >= sample_rate / 2.0 {
            return Err(AudioModemError::InvalidConfig(format!(
                "highest frequency {:.0} Hz is above Nyquist for {:.0} Hz",
                highest, sample_rate
            )));
        }

        let word_length = (word_time * sample_rate) as usize;
        let gate_length = (gate_time * sample_rate) as usize;

        let mut window_length =
            compute_minimum_window_size(sample_rate, frequencies[0], frequencies[1]);
        // Round up to even, window offset must be exactly half a window
        window_length += window_length % 2;

        if window_length > word_length {
            return Err(AudioModemError::InvalidConfig(format!(
                "word length {} is shorter than the analysis window {}",
                word_length, window_length
            )));
        }
        if window_length * 2 > gate_length {
            return Err(AudioModemError::InvalidConfig(format!(
                "gate length {} must hold at least two analysis windows of {}",
                gate_length, window_length
            )));
        }

        Ok(Self {
            sample_rate,
            first_frequency,
            frequency_increment,
            word_time,
            gate_time,
            trigger_snr,
            power_peak,
            word_length,
            gate_length,
            window_length,
            frequencies,
        })
    }

    /// Audible preset: 32 tones from 1720 Hz to 7920 Hz, 60 ms words, 120 ms gates
    pub fn audible(sample_rate: f64) -> Result<Self> {
        Self::new(
            sample_rate,
            AUDIBLE_FIRST_FREQUENCY,
            AUDIBLE_FREQUENCY_INCREMENT,
            DEFAULT_WORD_TIME,
            DEFAULT_GATE_TIME,
            DEFAULT_TRIGGER_SNR,
            DEFAULT_POWER_PEAK,
        )
    }

    /// Evenly spaced frequency table of `count` tones starting at the first frequency
    pub fn compute_frequencies(&self, count: usize) -> Vec<f64> {
        frequency_table(self.first_frequency, self.frequency_increment, count)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn first_frequency(&self) -> f64 {
        self.first_frequency
    }

    pub fn frequency_increment(&self) -> f64 {
        self.frequency_increment
    }

    pub fn word_time(&self) -> f64 {
        self.word_time
    }

    pub fn gate_time(&self) -> f64 {
        self.gate_time
    }

    pub fn trigger_snr(&self) -> f64 {
        self.trigger_snr
    }

    pub fn power_peak(&self) -> f64 {
        self.power_peak
    }

    pub fn word_length(&self) -> usize {
        self.word_length
    }

    pub fn gate_length(&self) -> usize {
        self.gate_length
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn window_offset(&self) -> usize {
        self.window_length / 2
    }

    /// Full table of `NUM_FREQUENCIES` tones
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Tone that opens the gate, quiet while the trigger tone plays
    pub fn gate_frequency(&self) -> f64 {
        self.frequencies[0]
    }

    /// Tone whose peak marks the trigger
    pub fn trigger_frequency(&self) -> f64 {
        self.frequencies[FREQUENCY_ROOT]
    }
}

fn frequency_table(first_frequency: f64, increment: f64, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| first_frequency + i as f64 * increment)
        .collect()
}
