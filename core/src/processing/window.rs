/// Fixed-capacity rolling sum over the last `capacity` observations.
///
/// Backed by a ring buffer: once full, every `add` evicts the oldest value
/// before inserting the new one, so `sum()` always equals the sum of the
/// values currently in the window.
#[derive(Debug, Clone)]
pub struct SlidingWindowCounter {
    slots: Vec<i64>,
    len: usize,
    sum: i64,
    oldest: usize,
}

impl SlidingWindowCounter {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity.max(1)],
            len: 0,
            sum: 0,
            oldest: 0,
        }
    }

    pub fn add(&mut self, value: i64) {
        let capacity = self.slots.len();
        if self.len == capacity {
            self.sum -= self.slots[self.oldest];
            self.oldest = (self.oldest + 1) % capacity;
            self.len -= 1;
        }
        self.slots[(self.oldest + self.len) % capacity] = value;
        self.sum += value;
        self.len += 1;
    }

    /// Records a boolean observation as 0/1.
    pub fn observe(&mut self, hit: bool) {
        self.add(i64::from(hit));
    }

    pub fn sum(&self) -> i64 {
        self.sum
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Zeroes the occupied slots and the sum.
    ///
    /// Occupancy and the eviction cursor are left alone: the window stays
    /// as long as it was, now filled with zeros, and later adds keep
    /// evicting from the same position.
    pub fn reset(&mut self) {
        let capacity = self.slots.len();
        for i in 0..self.len {
            self.slots[(self.oldest + i) % capacity] = 0;
        }
        self.sum = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_tracks_last_capacity_values() {
        let mut counter = SlidingWindowCounter::new(5);
        for v in [1, 0, 1, 1, 0] {
            counter.add(v);
        }
        assert_eq!(counter.sum(), 3);
        assert_eq!(counter.len(), 5);

        counter.add(1);
        assert_eq!(counter.sum(), 3);
        assert_eq!(counter.len(), 5);

        counter.reset();
        assert_eq!(counter.sum(), 0);
        assert_eq!(counter.len(), 5);
    }

    #[test]
    fn sum_matches_tail_of_arbitrary_sequence() {
        let values: Vec<i64> = (0..37).map(|i| (i * 7 % 5) as i64 - 1).collect();
        let mut counter = SlidingWindowCounter::new(8);
        for (count, &v) in values.iter().enumerate() {
            counter.add(v);
            let seen = count + 1;
            let start = seen.saturating_sub(8);
            let expected: i64 = values[start..seen].iter().sum();
            assert_eq!(counter.sum(), expected);
            assert_eq!(counter.len(), seen.min(8));
        }
    }

    #[test]
    fn reset_keeps_partial_occupancy() {
        let mut counter = SlidingWindowCounter::new(4);
        counter.observe(true);
        counter.observe(true);
        counter.reset();
        assert_eq!(counter.len(), 2);

        counter.observe(true);
        counter.observe(true);
        assert_eq!(counter.sum(), 2);
        // The window is full of (two zeroed, two live) values; the next add
        // evicts a zeroed slot rather than a live one.
        counter.observe(true);
        assert_eq!(counter.sum(), 3);
        assert_eq!(counter.len(), 4);
    }

    #[test]
    fn zero_capacity_behaves_as_one() {
        let mut counter = SlidingWindowCounter::new(0);
        counter.add(3);
        counter.add(4);
        assert_eq!(counter.capacity(), 1);
        assert_eq!(counter.sum(), 4);
    }
}
