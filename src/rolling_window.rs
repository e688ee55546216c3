//! Fixed-size rolling sum
//!
//! Keeps the last `capacity` values in a circular buffer together with their
//! running sum. Pushing into a full window evicts the oldest value first, so
//! every push is O(1).

#[derive(Debug, Clone)]
pub struct RollingSum {
    values: Vec<f64>,
    capacity: usize,
    head: usize,
    sum: f64,
}

impl RollingSum {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "rolling window needs a capacity of at least 1");
        RollingSum {
            values: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            sum: 0.0,
        }
    }

    /// Add `value`, returning the value it evicted if the window was full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.values.len() < self.capacity {
            self.values.push(value);
            self.sum += value;
            return None;
        }
        let evicted = std::mem::replace(&mut self.values[self.head], value);
        self.head = (self.head + 1) % self.capacity;
        self.sum += value - evicted;
        Some(evicted)
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.sum / self.values.len() as f64)
        }
    }
}
