use crate::error::{AudioModemError, Result};

/// One observation of a streamed series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakElement {
    /// Caller-supplied position, must grow with every observation
    pub index: u64,
    pub value: f64,
}

/// Streaming local-maximum detector with hysteresis
///
/// The running maximum becomes a peak once `min_decrease_count` later observations in a row
/// did not exceed it. A spike immediately followed by a higher value only moves the candidate.
/// After a confirmed peak, the series has to rise again before a new candidate is armed so a
/// slow decay is not reported as a string of peaks.
#[derive(Debug, Clone)]
pub struct PeakFinder {
    min_decrease_count: usize,
    candidate: Option<PeakElement>,
    decrease_count: usize,
    previous_value: Option<f64>,
    last_index: Option<u64>,
    last_peak: Option<PeakElement>,
}

impl Default for PeakFinder {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PeakFinder {
    pub fn new(min_decrease_count: usize) -> Self {
        Self {
            min_decrease_count: min_decrease_count.max(1),
            candidate: None,
            decrease_count: 0,
            previous_value: None,
            last_index: None,
            last_peak: None,
        }
    }

    pub fn set_min_decrease_count(&mut self, min_decrease_count: usize) {
        self.min_decrease_count = min_decrease_count.max(1);
    }

    pub fn min_decrease_count(&self) -> usize {
        self.min_decrease_count
    }

    /// Feed the next observation, returns true when it confirms a peak
    ///
    /// Indices must strictly increase between resets, anything else is `InvalidInputSize`.
    pub fn add(&mut self, index: u64, value: f64) -> Result<bool> {
        if self.last_index.is_some_and(|last| index <= last) {
            return Err(AudioModemError::InvalidInputSize);
        }
        self.last_index = Some(index);
        let mut confirmed = false;
        match self.candidate {
            Some(candidate) if value > candidate.value => {
                self.candidate = Some(PeakElement { index, value });
                self.decrease_count = 0;
            }
            Some(candidate) => {
                self.decrease_count += 1;
                if self.decrease_count >= self.min_decrease_count {
                    self.last_peak = Some(candidate);
                    self.candidate = None;
                    self.decrease_count = 0;
                    confirmed = true;
                }
            }
            None => {
                let rising = self.previous_value.map_or(true, |previous| value > previous);
                if rising {
                    self.candidate = Some(PeakElement { index, value });
                    self.decrease_count = 0;
                }
            }
        }
        self.previous_value = Some(value);
        Ok(confirmed)
    }

    /// Most recently confirmed peak
    pub fn last_peak(&self) -> Option<PeakElement> {
        self.last_peak
    }

    pub fn reset(&mut self) {
        self.candidate = None;
        self.decrease_count = 0;
        self.previous_value = None;
        self.last_index = None;
        self.last_peak = None;
    }
}
