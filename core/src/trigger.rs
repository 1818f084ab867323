//! Trigger detection over a live sample stream
//!
//! Two banks of Goertzel analyzers run half a window apart so that a level is measured every
//! `window_offset` samples. The level of the trigger tone feeds a noise-floor estimate and a
//! peak finder; a confirmed peak is accepted only if the gate tone was quiet at the peak and
//! loud one gate length earlier, while the trigger tone was quiet back then.

use crate::circular::CircularArray;
use crate::config::{compute_minimum_window_size, Configuration};
use crate::error::{AudioModemError, Result};
use crate::goertzel::IterativeGoertzel;
use crate::peak::{PeakElement, PeakFinder};
use crate::percentile::ApproximatePercentile;
use crate::window::HalfHannWindow;
use log::{debug, trace};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Level reported for a window holding digital silence
const MIN_LEVEL_DB: f64 = -240.0;

const NOT_TRIGGERED: u64 = u64::MAX;

/// Observer of the trigger analyzer
///
/// Both methods default to doing nothing; `()` is the no-op observer.
pub trait TriggerCallback {
    /// Called once per completed analysis window with one dB level per configured frequency
    fn on_new_levels(&mut self, _location: u64, _levels: &[f64]) {}

    /// Called at most once per session, `location` is the first sample after the trigger tone
    fn on_trigger(&mut self, _location: u64) {}
}

impl TriggerCallback for () {}

#[derive(Debug)]
struct ProgressState {
    window_length: usize,
    alpha_fill: AtomicUsize,
    beta_fill: AtomicUsize,
    first_tone: AtomicU64,
}

/// Read-only view of the analyzer state, shareable with other threads
#[derive(Debug, Clone)]
pub struct TriggerProgress {
    state: Arc<ProgressState>,
}

impl TriggerProgress {
    fn new(window_length: usize) -> Self {
        Self {
            state: Arc::new(ProgressState {
                window_length,
                alpha_fill: AtomicUsize::new(0),
                beta_fill: AtomicUsize::new(0),
                first_tone: AtomicU64::new(NOT_TRIGGERED),
            }),
        }
    }

    /// Samples that can be fed before the next analysis window completes
    pub fn maximum_window_length(&self) -> usize {
        let alpha = self.state.alpha_fill.load(Ordering::Acquire);
        let beta = self.state.beta_fill.load(Ordering::Acquire);
        self.state.window_length - alpha.max(beta)
    }

    pub fn first_tone_location(&self) -> Option<u64> {
        match self.state.first_tone.load(Ordering::Acquire) {
            NOT_TRIGGERED => None,
            location => Some(location),
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.first_tone_location().is_some()
    }

    fn publish_fill(&self, alpha: usize, beta: usize) {
        self.state.alpha_fill.store(alpha, Ordering::Release);
        self.state.beta_fill.store(beta, Ordering::Release);
    }

    fn publish_trigger(&self, location: Option<u64>) {
        self.state
            .first_tone
            .store(location.unwrap_or(NOT_TRIGGERED), Ordering::Release);
    }
}

/// Parabola fitted through three equally spaced levels around a maximum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakInterpolation {
    /// Offset of the vertex from the middle sample, in sample spacings
    pub offset: f64,
    pub height: f64,
    pub curvature: f64,
}

/// Fit a parabola through `(p0, p1, p2)` where `p1` is the sampled maximum
pub fn quadratic_interpolation(p0: f64, p1: f64, p2: f64) -> PeakInterpolation {
    let denominator = 2.0 * (2.0 * p1 - p2 - p0);
    let offset = if denominator != 0.0 {
        (p2 - p0) / denominator
    } else {
        0.0
    };
    PeakInterpolation {
        offset,
        height: p1 - 0.25 * (p0 - p2) * offset,
        curvature: 0.5 * (p0 - 2.0 * p1 + p2),
    }
}

/// Sub-sample location of the vertex, `spacing` being the distance between the three samples
pub fn find_peak_location(p0: f64, p1: f64, p2: f64, p1_location: u64, spacing: usize) -> i64 {
    let interpolation = quadratic_interpolation(p0, p1, p2);
    p1_location as i64 + (interpolation.offset * spacing as f64).round() as i64
}

/// One set of analyzers, one per frequency, sharing a window fill counter
#[derive(Debug)]
struct AnalyzerBank {
    analyzers: Vec<IterativeGoertzel>,
    fill: usize,
}

impl AnalyzerBank {
    fn new(sample_rate: f64, frequencies: &[f64], window_length: usize) -> Self {
        Self {
            analyzers: frequencies
                .iter()
                .map(|&frequency| IterativeGoertzel::new(sample_rate, frequency, window_length))
                .collect(),
            fill: 0,
        }
    }

    fn process(
        &mut self,
        segment: &[f32],
        window: &HalfHannWindow,
        scratch: &mut Vec<f32>,
    ) -> Result<()> {
        scratch.clear();
        scratch.extend_from_slice(segment);
        window.apply(scratch, self.fill);
        for analyzer in &mut self.analyzers {
            analyzer.process_samples(scratch)?;
        }
        self.fill += segment.len();
        Ok(())
    }

    /// Drain every analyzer into a dB level
    fn flush(&mut self) -> Result<Vec<f64>> {
        self.fill = 0;
        self.analyzers
            .iter_mut()
            .map(|analyzer| {
                let result = analyzer.compute_rms(false)?;
                Ok(if result.rms > 0.0 {
                    (20.0 * result.rms.log10()).max(MIN_LEVEL_DB)
                } else {
                    MIN_LEVEL_DB
                })
            })
            .collect()
    }

    fn reset(&mut self) {
        self.fill = 0;
        for analyzer in &mut self.analyzers {
            analyzer.reset();
        }
    }
}

/// Locates the end of the gate/trigger preamble in a sample stream
///
/// The first configured frequency is the gate tone, the last one the trigger tone. Feed
/// samples with [`process_samples`](Self::process_samples) in any chunk size; once
/// [`first_tone_location`](Self::first_tone_location) is set, further samples are ignored
/// until [`reset`](Self::reset).
#[derive(Debug)]
pub struct TriggerAnalyzer {
    gate_length: usize,
    window_length: usize,
    window_offset: usize,
    trigger_snr: f64,
    window: HalfHannWindow,
    alpha: AnalyzerBank,
    beta: AnalyzerBank,
    origin: Option<u64>,
    noise_floor: ApproximatePercentile,
    level_history: Vec<CircularArray>,
    peak_finder: PeakFinder,
    first_tone_location: Option<u64>,
    progress: TriggerProgress,
    scratch: Vec<f32>,
}

impl TriggerAnalyzer {
    pub fn new(
        sample_rate: f64,
        gate_length: usize,
        frequencies: &[f64],
        window_length: usize,
        trigger_snr: f64,
    ) -> Result<Self> {
        if frequencies.len() < 2 {
            return Err(AudioModemError::InvalidConfig(
                "trigger analyzer needs a gate and a trigger frequency".to_string(),
            ));
        }
        if window_length < 2 || window_length % 2 != 0 {
            return Err(AudioModemError::InvalidConfig(format!(
                "analysis window {} must be even",
                window_length
            )));
        }
        let minimum_window =
            compute_minimum_window_size(sample_rate, frequencies[0], frequencies[1]);
        if window_length < minimum_window {
            return Err(AudioModemError::InvalidConfig(format!(
                "analysis window {} is below the minimum of {} samples",
                window_length, minimum_window
            )));
        }
        if gate_length < 2 * window_length {
            return Err(AudioModemError::InvalidConfig(format!(
                "gate length {} must hold at least two analysis windows of {}",
                gate_length, window_length
            )));
        }

        let window_offset = window_length / 2;
        let history_capacity = (3 * gate_length).div_ceil(window_offset);
        let min_decrease_count = (gate_length / 2) / window_offset;

        Ok(Self {
            gate_length,
            window_length,
            window_offset,
            trigger_snr,
            window: HalfHannWindow::new(window_length),
            alpha: AnalyzerBank::new(sample_rate, frequencies, window_length),
            beta: AnalyzerBank::new(sample_rate, frequencies, window_length),
            origin: None,
            noise_floor: ApproximatePercentile::new(0.5),
            level_history: (0..frequencies.len())
                .map(|_| CircularArray::new(history_capacity))
                .collect(),
            peak_finder: PeakFinder::new(min_decrease_count),
            first_tone_location: None,
            progress: TriggerProgress::new(window_length),
            scratch: Vec::with_capacity(window_length),
        })
    }

    /// Analyzer listening for the gate and trigger tones of `config`
    pub fn from_configuration(config: &Configuration) -> Result<Self> {
        Self::new(
            config.sample_rate(),
            config.gate_length(),
            &[config.gate_frequency(), config.trigger_frequency()],
            config.window_length(),
            config.trigger_snr(),
        )
    }

    /// Feed `samples`, `location` being the absolute stream position of `samples[0]`
    ///
    /// Locations must follow on from the previous call. Processing stops at the window that
    /// fires the trigger.
    pub fn process_samples(
        &mut self,
        samples: &[f32],
        location: u64,
        callback: &mut impl TriggerCallback,
    ) -> Result<()> {
        if self.first_tone_location.is_some() || samples.is_empty() {
            return Ok(());
        }
        let origin = *self.origin.get_or_insert(location);
        let beta_start = origin + self.window_offset as u64;

        let mut cursor = 0;
        while cursor < samples.len() && self.first_tone_location.is_none() {
            let here = location + cursor as u64;
            let beta_active = here >= beta_start;

            // Cut at the next window completion of either bank so levels stay chronological
            let mut step = (samples.len() - cursor).min(self.window_length - self.alpha.fill);
            step = if beta_active {
                step.min(self.window_length - self.beta.fill)
            } else {
                step.min((beta_start - here) as usize)
            };

            let segment = &samples[cursor..cursor + step];
            self.alpha.process(segment, &self.window, &mut self.scratch)?;
            if beta_active {
                self.beta.process(segment, &self.window, &mut self.scratch)?;
            }
            cursor += step;

            let completed = if self.alpha.fill == self.window_length {
                Some(self.alpha.flush()?)
            } else if self.beta.fill == self.window_length {
                Some(self.beta.flush()?)
            } else {
                None
            };
            if let Some(levels) = completed {
                let window_start = location + cursor as u64 - self.window_length as u64;
                self.on_window_complete(window_start, &levels, callback)?;
            }
            self.progress.publish_fill(self.alpha.fill, self.beta.fill);
        }
        Ok(())
    }

    fn on_window_complete(
        &mut self,
        location: u64,
        levels: &[f64],
        callback: &mut impl TriggerCallback,
    ) -> Result<()> {
        trace!("levels at {}: {:?}", location, levels);
        for (history, &level) in self.level_history.iter_mut().zip(levels) {
            history.add(level);
        }
        let trigger_level = levels[levels.len() - 1];
        self.noise_floor.add(trigger_level);

        if self.peak_finder.add(location, trigger_level)? {
            if let Some(peak) = self.peak_finder.last_peak() {
                if let Some(first_tone) = self.check_trigger(peak, location) {
                    debug!(
                        "trigger at {} (peak {:.1} dB, noise floor {:.1} dB)",
                        first_tone,
                        peak.value,
                        self.noise_floor.result()
                    );
                    self.first_tone_location = Some(first_tone);
                    self.progress.publish_trigger(Some(first_tone));
                    callback.on_trigger(first_tone);
                }
            }
        }

        // Observers see the trigger before the levels of the window that fired it
        callback.on_new_levels(location, levels);
        Ok(())
    }

    /// Validate a confirmed peak of the trigger tone, returning the first tone location
    fn check_trigger(&self, peak: PeakElement, location: u64) -> Option<u64> {
        let noise_floor = self.noise_floor.result();
        if peak.value <= noise_floor + self.trigger_snr {
            return None;
        }
        let threshold = peak.value - self.trigger_snr;
        let gate_history = &self.level_history[0];
        let trigger_history = &self.level_history[self.level_history.len() - 1];

        let size = trigger_history.len();
        let slots_back = ((location - peak.index) / self.window_offset as u64) as usize;
        let peak_slot = size.checked_sub(1 + slots_back)?;

        // Gate tone quiet while the trigger tone peaks
        if gate_history.get(peak_slot)? >= threshold {
            return None;
        }

        // One gate length earlier the roles were reversed
        let before_slot = peak_slot.checked_sub(self.gate_length / self.window_offset)?;
        if gate_history.get(before_slot)? <= threshold
            || trigger_history.get(before_slot)? >= threshold
        {
            return None;
        }

        let p0 = trigger_history.get(peak_slot.checked_sub(1)?)?;
        let p2 = trigger_history.get(peak_slot + 1)?;
        let peak_location = find_peak_location(p0, peak.value, p2, peak.index, self.window_offset);
        let first_tone = peak_location + (self.gate_length / 2 + self.window_offset) as i64;
        u64::try_from(first_tone).ok()
    }

    /// Full state reset, the next sample fed becomes the new origin
    pub fn reset(&mut self) {
        self.alpha.reset();
        self.beta.reset();
        self.origin = None;
        self.noise_floor.reset();
        for history in &mut self.level_history {
            history.clear();
        }
        self.peak_finder.reset();
        self.first_tone_location = None;
        self.progress.publish_fill(0, 0);
        self.progress.publish_trigger(None);
    }

    /// First sample after the trigger tone, once detected
    pub fn first_tone_location(&self) -> Option<u64> {
        self.first_tone_location
    }

    /// Samples that can be fed before the next analysis window completes
    pub fn maximum_window_length(&self) -> usize {
        self.progress.maximum_window_length()
    }

    /// Shareable handle on the fill counters and the trigger state
    pub fn progress(&self) -> TriggerProgress {
        self.progress.clone()
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn window_offset(&self) -> usize {
        self.window_offset
    }

    pub fn noise_floor(&self) -> f64 {
        self.noise_floor.result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::ToneModulator;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::{Distribution, Normal};

    #[derive(Default)]
    struct Recorder {
        levels: Vec<(u64, Vec<f64>)>,
        triggers: Vec<u64>,
        windows_before_trigger: Option<usize>,
    }

    impl TriggerCallback for Recorder {
        fn on_new_levels(&mut self, location: u64, levels: &[f64]) {
            self.levels.push((location, levels.to_vec()));
        }

        fn on_trigger(&mut self, location: u64) {
            self.triggers.push(location);
            self.windows_before_trigger = Some(self.levels.len());
        }
    }

    fn config() -> Configuration {
        Configuration::audible(44100.0).unwrap()
    }

    /// Noise with a preamble ending at the returned position
    fn signal_with_preamble(config: &Configuration, seed: u64) -> (Vec<f32>, u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 0.02).unwrap();
        let mut audio: Vec<f32> = (0..44100).map(|_| noise.sample(&mut rng) as f32).collect();
        let start = 15000 + rng.gen_range(0..config.gate_length());
        let preamble = ToneModulator::new(config.clone()).preamble();
        for (sample, tone) in audio[start..].iter_mut().zip(preamble.iter()) {
            *sample += tone;
        }
        (audio, (start + preamble.len()) as u64)
    }

    fn feed_chunks(
        analyzer: &mut TriggerAnalyzer,
        audio: &[f32],
        seed: u64,
        recorder: &mut Recorder,
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut cursor = 0;
        while cursor < audio.len() {
            let size = rng.gen_range(20..600).min(audio.len() - cursor);
            analyzer
                .process_samples(&audio[cursor..cursor + size], cursor as u64, recorder)
                .unwrap();
            cursor += size;
        }
    }

    #[test]
    fn test_quadratic_interpolation() {
        let symmetric = quadratic_interpolation(1.0, 2.0, 1.0);
        assert_eq!(symmetric.offset, 0.0);
        assert_eq!(symmetric.height, 2.0);
        assert_eq!(symmetric.curvature, -1.0);

        // y = -(x - 0.25)^2 sampled at -1, 0, 1
        let skewed = quadratic_interpolation(-1.5625, -0.0625, -0.5625);
        assert!((skewed.offset - 0.25).abs() < 1e-12);
        assert!(skewed.height.abs() < 1e-12);

        let flat = quadratic_interpolation(1.0, 1.0, 1.0);
        assert_eq!(flat.offset, 0.0);

        assert_eq!(find_peak_location(-1.5625, -0.0625, -0.5625, 1000, 200), 1050);
    }

    #[test]
    fn test_rejects_degenerate_construction() {
        assert!(TriggerAnalyzer::new(44100.0, 5292, &[1720.0], 442, 15.0).is_err());
        assert!(TriggerAnalyzer::new(44100.0, 5292, &[1720.0, 4920.0], 441, 15.0).is_err());
        assert!(TriggerAnalyzer::new(44100.0, 800, &[1720.0, 4920.0], 442, 15.0).is_err());
        // Five periods of 1720 Hz need 129 samples
        assert!(matches!(
            TriggerAnalyzer::new(44100.0, 5292, &[1720.0, 4920.0], 100, 15.0),
            Err(AudioModemError::InvalidConfig(_))
        ));
        assert!(TriggerAnalyzer::new(44100.0, 5292, &[1720.0, 4920.0], 130, 15.0).is_ok());
    }

    #[test]
    fn test_detects_preamble() {
        let config = config();
        let (audio, expected) = signal_with_preamble(&config, 3);
        let mut analyzer = TriggerAnalyzer::from_configuration(&config).unwrap();
        let mut recorder = Recorder::default();
        feed_chunks(&mut analyzer, &audio, 11, &mut recorder);

        let location = analyzer.first_tone_location().expect("trigger not found");
        let error = (location as i64 - expected as i64).abs();
        assert!(error <= config.window_offset() as i64, "error {} samples", error);
        assert_eq!(recorder.triggers, vec![location]);
        // The window that fired is reported right after the trigger, then processing stops
        assert_eq!(recorder.windows_before_trigger, Some(recorder.levels.len() - 1));
        assert!(analyzer.progress().is_triggered());
        assert_eq!(analyzer.progress().first_tone_location(), Some(location));
    }

    #[test]
    fn test_levels_are_chronological() {
        let config = config();
        let (audio, _) = signal_with_preamble(&config, 4);
        let mut analyzer = TriggerAnalyzer::from_configuration(&config).unwrap();
        let mut recorder = Recorder::default();
        feed_chunks(&mut analyzer, &audio[..20000], 5, &mut recorder);

        let offset = config.window_offset() as u64;
        assert!(recorder.levels.len() > 10);
        for (k, (location, levels)) in recorder.levels.iter().enumerate() {
            assert_eq!(*location, k as u64 * offset);
            assert_eq!(levels.len(), 2);
        }
    }

    #[test]
    fn test_chunk_size_invariance() {
        let config = config();
        let (audio, _) = signal_with_preamble(&config, 8);

        let mut a = TriggerAnalyzer::from_configuration(&config).unwrap();
        let mut recorder_a = Recorder::default();
        feed_chunks(&mut a, &audio, 1, &mut recorder_a);

        let mut b = TriggerAnalyzer::from_configuration(&config).unwrap();
        let mut recorder_b = Recorder::default();
        b.process_samples(&audio, 0, &mut recorder_b).unwrap();

        assert!(a.first_tone_location().is_some());
        assert_eq!(a.first_tone_location(), b.first_tone_location());
        assert_eq!(recorder_a.levels, recorder_b.levels);
    }

    #[test]
    fn test_lone_tones_do_not_trigger() {
        let config = config();
        let modulator = ToneModulator::new(config.clone());
        let mut rng = StdRng::seed_from_u64(21);
        let noise = Normal::new(0.0, 0.02).unwrap();
        let mut audio: Vec<f32> = (0..44100).map(|_| noise.sample(&mut rng) as f32).collect();
        for (start, frequency) in [
            (10000, config.trigger_frequency()),
            (25000, config.gate_frequency()),
        ] {
            let tone = modulator.gate_tone(frequency);
            for (sample, t) in audio[start..].iter_mut().zip(tone.iter()) {
                *sample += t;
            }
        }

        let mut analyzer = TriggerAnalyzer::from_configuration(&config).unwrap();
        analyzer.process_samples(&audio, 0, &mut ()).unwrap();
        assert_eq!(analyzer.first_tone_location(), None);
    }

    #[test]
    fn test_reset_allows_new_detection() {
        let config = config();
        let (audio, expected) = signal_with_preamble(&config, 13);
        let mut analyzer = TriggerAnalyzer::from_configuration(&config).unwrap();
        let progress = analyzer.progress();

        analyzer.process_samples(&audio, 0, &mut ()).unwrap();
        let first = analyzer.first_tone_location().expect("trigger not found");
        // Ignored until reset
        analyzer.process_samples(&audio, audio.len() as u64, &mut ()).unwrap();
        assert_eq!(analyzer.first_tone_location(), Some(first));

        analyzer.reset();
        assert!(!progress.is_triggered());
        assert_eq!(progress.maximum_window_length(), config.window_length());

        let base = 100_000u64;
        analyzer.process_samples(&audio, base, &mut ()).unwrap();
        let second = analyzer.first_tone_location().expect("trigger not found after reset");
        let error = (second as i64 - (base + expected) as i64).abs();
        assert!(error <= config.window_offset() as i64, "error {} samples", error);
    }

    #[test]
    fn test_maximum_window_length_tracks_fill() {
        let config = config();
        let mut analyzer = TriggerAnalyzer::from_configuration(&config).unwrap();
        assert_eq!(analyzer.maximum_window_length(), 442);
        analyzer.process_samples(&[0.0; 100], 0, &mut ()).unwrap();
        assert_eq!(analyzer.maximum_window_length(), 342);
        analyzer.process_samples(&[0.0; 200], 100, &mut ()).unwrap();
        // Beta started at 221
        assert_eq!(analyzer.maximum_window_length(), 142);
        analyzer.process_samples(&[0.0; 142], 300, &mut ()).unwrap();
        assert_eq!(analyzer.maximum_window_length(), 442 - 221);
    }
}
