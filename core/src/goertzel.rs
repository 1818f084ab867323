use crate::error::{AudioModemError, Result};
use std::f64::consts::PI;

/// Level and phase of one frequency over one analysis window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoertzelResult {
    pub rms: f64,
    /// Radians in [-pi, pi], zero when the phase was not requested
    pub phase: f64,
}

/// Generalized Goertzel filter fed incrementally
///
/// Samples may arrive in chunks of any size; once exactly `window_size` samples have been
/// processed, [`compute_rms`](Self::compute_rms) drains the filter. The target frequency does
/// not need to fall on an integer DFT bin, the final complex correction takes care of it.
#[derive(Debug, Clone)]
pub struct IterativeGoertzel {
    s1: f64,
    s2: f64,
    last_sample: f64,
    pik_term: f64,
    cos_pik_term2: f64,
    window_size: usize,
    processed_samples: usize,
}

impl IterativeGoertzel {
    pub fn new(sample_rate: f64, frequency: f64, window_size: usize) -> Self {
        let pik_term = 2.0 * PI * frequency / sample_rate;
        Self {
            s1: 0.0,
            s2: 0.0,
            last_sample: 0.0,
            pik_term,
            cos_pik_term2: 2.0 * pik_term.cos(),
            window_size,
            processed_samples: 0,
        }
    }

    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
        self.last_sample = 0.0;
        self.processed_samples = 0;
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn processed_samples(&self) -> usize {
        self.processed_samples
    }

    /// Feed the next samples of the window
    ///
    /// The very last sample of the window is held back, it enters the final complex step.
    pub fn process_samples(&mut self, samples: &[f32]) -> Result<&mut Self> {
        let size = samples.len();
        if self.processed_samples + size > self.window_size {
            return Err(AudioModemError::InvalidInputSize);
        }
        let completes_window = self.processed_samples + size == self.window_size;
        let length = if completes_window && size > 0 { size - 1 } else { size };

        for &sample in &samples[..length] {
            let s0 = sample as f64 + self.cos_pik_term2 * self.s1 - self.s2;
            self.s2 = self.s1;
            self.s1 = s0;
        }
        if completes_window && size > 0 {
            self.last_sample = samples[size - 1] as f64;
        }
        self.processed_samples += size;
        Ok(self)
    }

    /// Drain the filter into an RMS estimate (and phase when `compute_phase`), then reset
    pub fn compute_rms(&mut self, compute_phase: bool) -> Result<GoertzelResult> {
        if self.processed_samples != self.window_size {
            return Err(AudioModemError::InsufficientData);
        }
        let s0 = self.last_sample + self.cos_pik_term2 * self.s1 - self.s2;

        // (s0 - s1 * e^-jw) * e^-jw(N-1)
        let part_a_re = s0 - self.s1 * self.pik_term.cos();
        let part_a_im = self.s1 * self.pik_term.sin();
        let shift = self.pik_term * (self.window_size as f64 - 1.0);
        let part_b_re = shift.cos();
        let part_b_im = -shift.sin();
        let y_re = part_a_re * part_b_re - part_a_im * part_b_im;
        let y_im = part_a_re * part_b_im + part_a_im * part_b_re;

        let rms = ((y_re * y_re + y_im * y_im) * 2.0).sqrt() / self.window_size as f64;
        let phase = if compute_phase { y_im.atan2(y_re) } else { 0.0 };

        self.reset();
        Ok(GoertzelResult { rms, phase })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::window::{apply_hann, compute_rms};
    use crate::NUM_FREQUENCIES;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SAMPLE_RATE: f64 = 44100.0;

    fn cosine(frequency: f64, len: usize) -> Vec<f32> {
        let power_peak = 10f64.powf(-26.0 / 20.0) * 2f64.sqrt();
        (0..len)
            .map(|s| ((2.0 * PI * frequency * s as f64 / SAMPLE_RATE).cos() * power_peak) as f32)
            .collect()
    }

    #[test]
    fn test_rms_and_phase_single_call() {
        let audio = cosine(1000.0, 4410);
        let mut goertzel = IterativeGoertzel::new(SAMPLE_RATE, 1000.0, audio.len());
        let result = goertzel.process_samples(&audio).unwrap().compute_rms(true).unwrap();

        assert!((result.rms - compute_rms(&audio)).abs() < 0.1);
        assert!((20.0 * result.rms.log10() + 26.0).abs() < 0.01);
        assert!(result.phase.abs() < 1e-6, "phase {}", result.phase);
    }

    #[test]
    fn test_chunked_matches_single_call() {
        let audio = cosine(1000.0, 44100);
        let mut rng = StdRng::seed_from_u64(1337);

        let mut goertzel = IterativeGoertzel::new(SAMPLE_RATE, 1000.0, audio.len());
        let mut cursor = 0;
        while cursor < audio.len() {
            let size = rng.gen_range(20..135).min(audio.len() - cursor);
            goertzel.process_samples(&audio[cursor..cursor + size]).unwrap();
            cursor += size;
        }
        let chunked = goertzel.compute_rms(true).unwrap();

        let single = goertzel.process_samples(&audio).unwrap().compute_rms(true).unwrap();

        assert!((chunked.rms - single.rms).abs() < 1e-12);
        assert!((chunked.phase - single.phase).abs() < 1e-9);
        assert!((20.0 * chunked.rms.log10() - 20.0 * compute_rms(&audio).log10()).abs() < 0.1);
    }

    #[test]
    fn test_single_sample_chunks() {
        let audio = cosine(1500.0, 441);
        let mut goertzel = IterativeGoertzel::new(SAMPLE_RATE, 1500.0, audio.len());
        for sample in audio.chunks(1) {
            goertzel.process_samples(sample).unwrap();
        }
        let chunked = goertzel.compute_rms(false).unwrap();
        let single = goertzel.process_samples(&audio).unwrap().compute_rms(false).unwrap();
        assert!((chunked.rms - single.rms).abs() < 1e-12);
        assert_eq!(chunked.phase, 0.0);
    }

    #[test]
    fn test_window_overflow_and_underflow() {
        let audio = cosine(1000.0, 100);
        let mut goertzel = IterativeGoertzel::new(SAMPLE_RATE, 1000.0, 64);
        assert!(matches!(
            goertzel.process_samples(&audio),
            Err(AudioModemError::InvalidInputSize)
        ));
        goertzel.process_samples(&audio[..10]).unwrap();
        assert!(matches!(
            goertzel.compute_rms(false),
            Err(AudioModemError::InsufficientData)
        ));
        goertzel.reset();
        assert_eq!(goertzel.processed_samples(), 0);
    }

    #[test]
    fn test_adjacent_frequency_leakage() {
        let config = Configuration::audible(SAMPLE_RATE).unwrap();
        let frequencies = config.frequencies();
        let signal_index = 1;
        let audio = cosine(frequencies[signal_index], 30000);
        let window_size = config.window_length();

        let mut analyzers: Vec<IterativeGoertzel> = frequencies
            .iter()
            .map(|&f| IterativeGoertzel::new(SAMPLE_RATE, f, window_size))
            .collect();
        let mut rms = [0.0f64; NUM_FREQUENCIES];
        let mut pushed = 0;
        let mut s = 0;
        while s < audio.len() - (window_size + window_size / 2) {
            for start in [s, s + window_size / 2] {
                let mut window = audio[start..start + window_size].to_vec();
                apply_hann(&mut window, window_size, 0);
                for (idfreq, analyzer) in analyzers.iter_mut().enumerate() {
                    let result = analyzer.process_samples(&window).unwrap().compute_rms(false);
                    rms[idfreq] += result.unwrap().rms;
                }
            }
            pushed += 1;
            s += window_size;
        }
        assert!(pushed > 0);

        let signal_level = 20.0 * rms[signal_index].log10();
        let leak_below = signal_level - 20.0 * rms[signal_index - 1].log10();
        let leak_above = signal_level - 20.0 * rms[signal_index + 1].log10();
        assert!(leak_below > 35.0, "leak below {:.2} dB", leak_below);
        assert!(leak_above > 35.0, "leak above {:.2} dB", leak_above);
    }
}
