// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A fixed-length delay line.

/// Ring buffer modelling a pure transport delay of `k` steps.
///
/// The buffer holds `k + 1` values so that pushing the newest sample and
/// reading the one from `k` steps ago happen in a single
/// [`update`](Delay::update).
#[derive(Clone, Debug, Default)]
pub struct Delay {
    buffer: Vec<f64>,
    newest: usize,
    oldest: usize,
}

impl Delay {
    /// Create an uninitialized delay line; call one of the `initialize`
    /// methods before use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the line for a continuous delay `time_delay` at step `ts`,
    /// rounding to the nearest whole number of steps (at least one), and
    /// fill it with `init_value`.
    pub fn initialize_time(&mut self, time_delay: f64, ts: f64, init_value: f64) {
        let steps = (time_delay / ts + 0.5).floor() as usize;
        self.initialize(steps.max(1), init_value);
    }

    /// Size the line for a delay of `steps` steps (at least one) and fill
    /// it with `init_value`.
    pub fn initialize(&mut self, steps: usize, init_value: f64) {
        let steps = steps.max(1);
        self.buffer.clear();
        self.buffer.resize(steps + 1, init_value);
        self.newest = 0;
        self.oldest = 1;
    }

    /// Overwrite every slot with `value`, keeping the size.
    pub fn initialize_values(&mut self, value: f64) {
        self.buffer.fill(value);
    }

    /// Push the newest value and return the oldest (the delayed sample).
    pub fn update(&mut self, new_value: f64) -> f64 {
        let delayed = self.buffer[self.oldest];
        self.buffer[self.newest] = new_value;

        self.newest += 1;
        self.oldest += 1;
        if self.oldest >= self.buffer.len() {
            self.oldest = 0;
        }
        if self.newest >= self.buffer.len() {
            self.newest = 0;
        }

        delayed
    }

    /// The value that will be returned by the next [`update`](Delay::update).
    #[must_use]
    pub fn oldest(&self) -> f64 {
        self.buffer[self.oldest]
    }

    /// The most recently pushed value.
    #[must_use]
    pub fn newest(&self) -> f64 {
        let idx = if self.newest == 0 {
            self.buffer.len() - 1
        } else {
            self.newest - 1
        };
        self.buffer[idx]
    }

    /// The value pushed `age` updates ago (0 = newest). No range check
    /// beyond the buffer's own.
    #[must_use]
    pub fn from_newest(&self, age: usize) -> f64 {
        let len = self.buffer.len();
        let newest = (self.newest + len - 1) % len;
        self.buffer[(newest + len - age % len) % len]
    }

    /// The value `age` slots after the oldest (0 = oldest).
    #[must_use]
    pub fn from_oldest(&self, age: usize) -> f64 {
        self.buffer[(self.oldest + age) % self.buffer.len()]
    }

    /// The modelled delay in steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len().saturating_sub(1)
    }

    /// Whether the line has been initialized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_one_line() {
        let mut delay = Delay::new();
        delay.initialize(1, 42.0);

        // The initial fill comes out exactly once
        assert_eq!(delay.update(7.0), 42.0);
        assert_eq!(delay.update(8.0), 7.0);
        assert_eq!(delay.update(9.0), 8.0);
    }

    #[test]
    fn three_step_transport() {
        let mut delay = Delay::new();
        delay.initialize_time(3.0e-3, 1.0e-3, 0.0);
        assert_eq!(delay.len(), 3);

        for (i, expected) in [(1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 1.0), (5.0, 2.0)] {
            assert_eq!(delay.update(i), expected);
        }
    }

    #[test]
    fn indexed_access() {
        let mut delay = Delay::new();
        delay.initialize(2, 0.0);
        delay.update(1.0);
        delay.update(2.0);

        assert_eq!(delay.newest(), 2.0);
        assert_eq!(delay.from_newest(0), 2.0);
        assert_eq!(delay.from_newest(1), 1.0);
        assert_eq!(delay.from_oldest(0), delay.oldest());
    }

    #[test]
    fn refill() {
        let mut delay = Delay::new();
        delay.initialize(2, 0.0);
        delay.update(5.0);
        delay.initialize_values(1.5);
        assert_eq!(delay.update(0.0), 1.5);
    }

    #[test]
    fn fractional_delay_rounds_to_nearest() {
        let mut delay = Delay::new();
        delay.initialize_time(2.4e-3, 1.0e-3, 0.0);
        assert_eq!(delay.len(), 2);
        delay.initialize_time(2.6e-3, 1.0e-3, 0.0);
        assert_eq!(delay.len(), 3);
        // Never less than one step
        delay.initialize_time(1.0e-5, 1.0e-3, 0.0);
        assert_eq!(delay.len(), 1);
    }
}
