//! Fixed-capacity sliding window of readings.

use std::collections::VecDeque;

/// Keeps the most recent `capacity` readings; older ones fall off the front.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    readings: VecDeque<f64>,
    capacity: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, reading: f64) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    /// Arithmetic mean of the window, or `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.readings.is_empty() {
            return None;
        }
        Some(self.readings.iter().sum::<f64>() / self.readings.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_window_is_none() {
        assert_eq!(SlidingWindow::new(3).mean(), None);
    }

    #[test]
    fn oldest_reading_is_evicted_at_capacity() {
        let mut window = SlidingWindow::new(3);
        for r in [10.0, 20.0, 30.0, 40.0] {
            window.push(r);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.mean(), Some(30.0));
    }
}
