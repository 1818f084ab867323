use crate::config::Configuration;
use crate::error::{AudioModemError, Result};
use crate::goertzel::IterativeGoertzel;
use crate::window::{apply_hann, apply_tukey};
use crate::{FREQUENCY_ROOT, GATE_TUKEY_ALPHA, WORD_TUKEY_ALPHA};
use std::f64::consts::PI;

/// Number of values one symbol can take (one tone out of each half of the table)
pub const SYMBOL_VALUES: u8 = FREQUENCY_ROOT as u8;

/// Add a sine of `frequency` to `signal`, phase zero at `signal[0]`
pub fn add_pitch(signal: &mut [f32], sample_rate: f64, frequency: f64, amplitude: f64) {
    let omega = 2.0 * PI * frequency / sample_rate;
    for (i, sample) in signal.iter_mut().enumerate() {
        *sample += (amplitude * (omega * i as f64).sin()) as f32;
    }
}

/// Synthesizes the gate tones and the symbol words of a transmission
pub struct ToneModulator {
    config: Configuration,
}

impl ToneModulator {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    /// One gate-length burst of a single tone, Hann shaped
    pub fn gate_tone(&self, frequency: f64) -> Vec<f32> {
        let length = self.config.gate_length();
        let mut samples = vec![0.0; length];
        add_pitch(
            &mut samples,
            self.config.sample_rate(),
            frequency,
            self.config.power_peak(),
        );
        apply_tukey(&mut samples, GATE_TUKEY_ALPHA, length, 0);
        samples
    }

    /// The synchronization preamble: gate tone then trigger tone
    pub fn preamble(&self) -> Vec<f32> {
        let mut samples = self.gate_tone(self.config.gate_frequency());
        samples.extend(self.gate_tone(self.config.trigger_frequency()));
        samples
    }

    /// One word carrying two symbols, `low` on the lower half of the table, `high` on the upper
    pub fn modulate_word(&self, low: u8, high: u8) -> Result<Vec<f32>> {
        if low >= SYMBOL_VALUES || high >= SYMBOL_VALUES {
            return Err(AudioModemError::InvalidInputSize);
        }
        let frequencies = self.config.frequencies();
        let length = self.config.word_length();
        let amplitude = self.config.power_peak() / 2.0;
        let sample_rate = self.config.sample_rate();

        let mut samples = vec![0.0; length];
        add_pitch(&mut samples, sample_rate, frequencies[low as usize], amplitude);
        add_pitch(
            &mut samples,
            sample_rate,
            frequencies[FREQUENCY_ROOT + high as usize],
            amplitude,
        );
        apply_tukey(&mut samples, WORD_TUKEY_ALPHA, length, 0);
        Ok(samples)
    }

    /// Modulate a symbol sequence two symbols per word, an odd tail is padded with zero
    pub fn modulate_symbols(&self, symbols: &[u8]) -> Result<Vec<f32>> {
        let mut samples = Vec::with_capacity(symbols.len().div_ceil(2) * self.config.word_length());
        for pair in symbols.chunks(2) {
            let high = pair.get(1).copied().unwrap_or(0);
            samples.extend(self.modulate_word(pair[0], high)?);
        }
        Ok(samples)
    }
}

/// Recovers the two symbols of a word by comparing every tone of the table
pub struct ToneDemodulator {
    analyzers: Vec<IterativeGoertzel>,
    word_length: usize,
    scratch: Vec<f32>,
}

impl ToneDemodulator {
    pub fn new(config: &Configuration) -> Self {
        let word_length = config.word_length();
        let analyzers = config
            .frequencies()
            .iter()
            .map(|&frequency| IterativeGoertzel::new(config.sample_rate(), frequency, word_length))
            .collect();
        Self {
            analyzers,
            word_length,
            scratch: Vec::with_capacity(word_length),
        }
    }

    /// Demodulate one word of exactly `word_length` samples into `(low, high)`
    pub fn demodulate_word(&mut self, samples: &[f32]) -> Result<(u8, u8)> {
        if samples.len() != self.word_length {
            return Err(AudioModemError::InvalidInputSize);
        }
        self.scratch.clear();
        self.scratch.extend_from_slice(samples);
        apply_hann(&mut self.scratch, self.word_length, 0);

        let mut levels = Vec::with_capacity(self.analyzers.len());
        for analyzer in &mut self.analyzers {
            let result = analyzer.process_samples(&self.scratch)?.compute_rms(false)?;
            levels.push(result.rms);
        }

        let low = strongest(&levels[..FREQUENCY_ROOT]);
        let high = strongest(&levels[FREQUENCY_ROOT..]);
        Ok((low, high))
    }

    pub fn word_length(&self) -> usize {
        self.word_length
    }
}

fn strongest(levels: &[f64]) -> u8 {
    let mut best = 0;
    for (i, &level) in levels.iter().enumerate() {
        if level > levels[best] {
            best = i;
        }
    }
    best as u8
}
