use crate::geometry::Point;
use std::collections::VecDeque;

/// Window size of the pointer smoothing filter.
pub const SMOOTHING_WINDOW: usize = 3;

/// Sliding-window average over the most recent pointer samples.
///
/// Once the window is full, each new sample evicts the oldest one.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: VecDeque<Point>,
    capacity: usize,
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(SMOOTHING_WINDOW)
    }
}

impl MovingAverage {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Adds a sample and returns the average of the current window.
    pub fn push(&mut self, sample: Point) -> Point {
        self.window.push_back(sample);
        if self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.average()
    }

    pub fn average(&self) -> Point {
        let n = self.window.len().max(1) as f64;
        let (sx, sy) = self
            .window
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_slides_by_dropping_oldest() {
        let mut avg = MovingAverage::default();
        assert_eq!(avg.push(Point::new(3.0, 0.0)), Point::new(3.0, 0.0));
        assert_eq!(avg.push(Point::new(6.0, 3.0)), Point::new(4.5, 1.5));
        assert_eq!(avg.push(Point::new(9.0, 0.0)), Point::new(6.0, 1.0));
        // (3,0) is evicted.
        assert_eq!(avg.push(Point::new(12.0, 0.0)), Point::new(9.0, 1.0));
        assert_eq!(avg.len(), 3);
    }

    #[test]
    fn reset_empties_window() {
        let mut avg = MovingAverage::default();
        avg.push(Point::new(1.0, 1.0));
        avg.reset();
        assert!(avg.is_empty());
        assert_eq!(avg.push(Point::new(5.0, 5.0)), Point::new(5.0, 5.0));
    }
}
