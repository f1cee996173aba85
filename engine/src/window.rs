use std::collections::VecDeque;

use corelib::models::VolumePoint;

use crate::error::EngineError;

/// Fixed-capacity FIFO of the most recent volume points.
///
/// The window never sums anything: its only job is to know which point
/// leaves next. Backed by a ring buffer, so push and evict are O(1).
#[derive(Debug, Clone)]
pub struct Window {
    /// Points ordered oldest (front) to newest (back)
    points: VecDeque<VolumePoint>,

    /// Maximum number of points, fixed at construction
    capacity: usize,
}

impl Window {
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        if capacity == 0 {
            return Err(EngineError::InvalidCapacity);
        }

        Ok(Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Insert `point` as the newest entry.
    ///
    /// When the window is already full the oldest entry is evicted first and
    /// handed back to the caller.
    pub fn push(&mut self, point: VolumePoint) -> Option<VolumePoint> {
        let evicted = if self.is_full() {
            self.points.pop_front()
        } else {
            None
        };

        self.points.push_back(point);
        evicted
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.points.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next entry to be evicted.
    pub fn oldest(&self) -> Option<&VolumePoint> {
        self.points.front()
    }

    pub fn latest(&self) -> Option<&VolumePoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VolumePoint> {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(price: f64, volume: f64) -> VolumePoint {
        VolumePoint::new(price, volume)
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(Window::new(0), Err(EngineError::InvalidCapacity)));
    }

    #[test]
    fn push_below_capacity_evicts_nothing() {
        let mut w = Window::new(3).unwrap();

        assert!(w.push(p(1.0, 1.0)).is_none());
        assert!(w.push(p(2.0, 2.0)).is_none());

        assert_eq!(w.len(), 2);
        assert!(!w.is_full());
        assert_eq!(w.oldest(), Some(&p(1.0, 1.0)));
        assert_eq!(w.latest(), Some(&p(2.0, 2.0)));
    }

    #[test]
    fn push_at_capacity_evicts_oldest_first() {
        let mut w = Window::new(2).unwrap();

        w.push(p(1.0, 1.0));
        w.push(p(2.0, 2.0));
        let evicted = w.push(p(3.0, 3.0));

        assert_eq!(evicted, Some(p(1.0, 1.0)));
        assert_eq!(w.len(), 2);

        let remaining: Vec<_> = w.iter().copied().collect();
        assert_eq!(remaining, vec![p(2.0, 2.0), p(3.0, 3.0)]);
    }

    #[test]
    fn len_never_exceeds_capacity() {
        let mut w = Window::new(4).unwrap();

        for i in 0..100 {
            w.push(p(i as f64, 1.0));
            assert!(w.len() <= w.capacity());
        }

        assert!(w.is_full());
        assert_eq!(w.oldest(), Some(&p(96.0, 1.0)));
    }

    #[test]
    fn capacity_one_always_holds_latest() {
        let mut w = Window::new(1).unwrap();

        assert!(w.push(p(1.0, 1.0)).is_none());
        assert_eq!(w.push(p(2.0, 5.0)), Some(p(1.0, 1.0)));
        assert_eq!(w.latest(), Some(&p(2.0, 5.0)));
        assert_eq!(w.len(), 1);
    }
}
