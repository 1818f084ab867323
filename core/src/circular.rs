/// Fixed-capacity ring of the most recent levels
///
/// Index 0 is the oldest retained value, `len() - 1` the newest. Once full, `add` overwrites
/// the oldest slot.
#[derive(Debug, Clone)]
pub struct CircularArray {
    values: Vec<f64>,
    start: usize,
    len: usize,
}

impl CircularArray {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: vec![0.0; capacity.max(1)],
            start: 0,
            len: 0,
        }
    }

    pub fn add(&mut self, value: f64) {
        let capacity = self.values.len();
        if self.len < capacity {
            self.values[(self.start + self.len) % capacity] = value;
            self.len += 1;
        } else {
            self.values[self.start] = value;
            self.start = (self.start + 1) % capacity;
        }
    }

    /// Value at `index`, counted from the oldest retained value
    pub fn get(&self, index: usize) -> Option<f64> {
        if index >= self.len {
            return None;
        }
        Some(self.values[(self.start + index) % self.values.len()])
    }

    /// Most recently added value
    pub fn last(&self) -> Option<f64> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
    }
}
