//! Window envelopes addressable by absolute position
//!
//! Every function takes the length of the logical window and the offset of the first sample
//! of `signal` inside it, so a window can be applied chunk by chunk as samples arrive and the
//! result matches a one-shot application over the whole buffer.

use std::f64::consts::PI;

/// Hann coefficient for position `index` of a symmetric window of `window_length`
pub fn hann_coefficient(index: usize, window_length: usize) -> f64 {
    if window_length < 2 {
        return 1.0;
    }
    0.5 - 0.5 * (2.0 * PI * index as f64 / (window_length - 1) as f64).cos()
}

/// Multiply `signal` by the Hann window, `signal[0]` being window sample `offset`
pub fn apply_hann(signal: &mut [f32], window_length: usize, offset: usize) {
    for (i, sample) in signal.iter_mut().enumerate() {
        *sample = (*sample as f64 * hann_coefficient(offset + i, window_length)) as f32;
    }
}

/// Multiply `signal` by the Hamming window, `signal[0]` being window sample `offset`
pub fn apply_hamming(signal: &mut [f32], window_length: usize, offset: usize) {
    if window_length < 2 {
        return;
    }
    let span = (window_length - 1) as f64;
    for (i, sample) in signal.iter_mut().enumerate() {
        let weight = 0.54 - 0.46 * (2.0 * PI * (offset + i) as f64 / span).cos();
        *sample = (*sample as f64 * weight) as f32;
    }
}

/// Multiply `signal` by a Tukey (tapered cosine) window
///
/// `alpha` is the tapered share of the window: 0 gives a rectangle, 1 a Hann window.
pub fn apply_tukey(signal: &mut [f32], alpha: f64, window_length: usize, offset: usize) {
    if alpha <= 0.0 || window_length < 2 {
        return;
    }
    let span = (window_length - 1) as f64;
    let index_begin_flat = alpha * span / 2.0;
    let index_end_flat = span * (1.0 - alpha / 2.0);

    for (i, sample) in signal.iter_mut().enumerate() {
        let n = (offset + i) as f64;
        let weight = if n < index_begin_flat {
            0.5 * (1.0 + (PI * (2.0 * n / (alpha * span) - 1.0)).cos())
        } else if n > index_end_flat {
            0.5 * (1.0 + (PI * (2.0 * n / (alpha * span) - 2.0 / alpha + 1.0)).cos())
        } else {
            1.0
        };
        *sample = (*sample as f64 * weight) as f32;
    }
}

/// First half of a Hann window, mirrored on lookup
///
/// The window is symmetric so only `window_length / 2 + 1` coefficients are stored.
#[derive(Debug, Clone)]
pub struct HalfHannWindow {
    window_length: usize,
    cache: Vec<f32>,
}

impl HalfHannWindow {
    pub fn new(window_length: usize) -> Self {
        let cache = (0..window_length / 2 + 1)
            .map(|i| hann_coefficient(i, window_length) as f32)
            .collect();
        Self {
            window_length,
            cache,
        }
    }

    /// Coefficient for `index` in `0..window_length`
    pub fn get(&self, index: usize) -> f32 {
        if index < self.cache.len() {
            self.cache[index]
        } else {
            self.cache[self.window_length - 1 - index]
        }
    }

    /// Window `signal` whose first sample sits at `offset` in the window
    pub fn apply(&self, signal: &mut [f32], offset: usize) {
        for (i, sample) in signal.iter_mut().enumerate() {
            *sample *= self.get(offset + i);
        }
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }
}

/// Root mean square of a signal
pub fn compute_rms(signal: &[f32]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let sum: f64 = signal.iter().map(|&s| s as f64 * s as f64).sum();
    (sum / signal.len() as f64).sqrt()
}
