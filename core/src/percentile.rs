/// Running percentile estimate in constant memory (P-square algorithm)
///
/// Five markers track the minimum, the target percentile, the maximum and two intermediate
/// quantiles. Marker heights are adjusted with a piecewise-parabolic fit as observations
/// arrive, no sample history is kept.
#[derive(Debug, Clone)]
pub struct ApproximatePercentile {
    percentile: f64,
    count: usize,
    heights: [f64; 5],
    positions: [f64; 5],
    desired: [f64; 5],
    increments: [f64; 5],
}

impl ApproximatePercentile {
    /// `percentile` in [0, 1], 0.5 tracks the median
    pub fn new(percentile: f64) -> Self {
        let p = percentile.clamp(0.0, 1.0);
        Self {
            percentile: p,
            count: 0,
            heights: [0.0; 5],
            positions: [1.0, 2.0, 3.0, 4.0, 5.0],
            desired: [1.0, 1.0 + 2.0 * p, 1.0 + 4.0 * p, 3.0 + 2.0 * p, 5.0],
            increments: [0.0, p / 2.0, p, (1.0 + p) / 2.0, 1.0],
        }
    }

    pub fn add(&mut self, value: f64) {
        if self.count < 5 {
            self.heights[self.count] = value;
            self.count += 1;
            if self.count == 5 {
                self.heights
                    .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            }
            return;
        }
        self.count += 1;

        // Cell containing the new observation, extremes are widened in place
        let q = &mut self.heights;
        let k = if value < q[0] {
            q[0] = value;
            0
        } else if value < q[1] {
            0
        } else if value < q[2] {
            1
        } else if value < q[3] {
            2
        } else if value <= q[4] {
            3
        } else {
            q[4] = value;
            3
        };

        for position in &mut self.positions[k + 1..] {
            *position += 1.0;
        }
        for (desired, increment) in self.desired.iter_mut().zip(self.increments.iter()) {
            *desired += increment;
        }

        for i in 1..4 {
            let d = self.desired[i] - self.positions[i];
            let room_up = self.positions[i + 1] - self.positions[i] > 1.0;
            let room_down = self.positions[i - 1] - self.positions[i] < -1.0;
            if (d >= 1.0 && room_up) || (d <= -1.0 && room_down) {
                let step = d.signum();
                let candidate = self.parabolic(i, step);
                self.heights[i] = if self.heights[i - 1] < candidate
                    && candidate < self.heights[i + 1]
                {
                    candidate
                } else {
                    self.linear(i, step)
                };
                self.positions[i] += step;
            }
        }
    }

    /// Current estimate, NaN before the first observation
    pub fn result(&self) -> f64 {
        match self.count {
            0 => f64::NAN,
            n if n < 5 => {
                let mut seen = self.heights[..n].to_vec();
                seen.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let index = ((n - 1) as f64 * self.percentile).round() as usize;
                seen[index.min(n - 1)]
            }
            _ => self.heights[2],
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.percentile);
    }

    fn parabolic(&self, i: usize, d: f64) -> f64 {
        let q = &self.heights;
        let n = &self.positions;
        q[i] + d / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + d) * (q[i + 1] - q[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - d) * (q[i] - q[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, d: f64) -> f64 {
        let j = if d > 0.0 { i + 1 } else { i - 1 };
        self.heights[i] + d * (self.heights[j] - self.heights[i]) / (self.positions[j] - self.positions[i])
    }
}
