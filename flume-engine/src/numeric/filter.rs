// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Bilinear-transform transfer-function filters.
//!
//! Coefficient arrays are ordered by descending powers of `s`: a first-
//! order numerator `[a1, a0]` stands for `a1 s + a0`, a second-order one
//! `[a2, a1, a0]` for `a2 s^2 + a1 s + a0`.
//!
//! Both filters saturate their output into `[min, max]`; on clipping the
//! internal state is reset to the clipped value so the filter resumes from
//! the limit instead of unwinding hidden state.

/// First-order filter `(a1 s + a0) / (b1 s + b0)`.
#[derive(Clone, Debug, Default)]
pub struct FirstOrderFilter {
    coeff_u: [f64; 2],
    coeff_y: [f64; 2],
    delay_u: f64,
    delay_y: f64,
    value: f64,
    min: f64,
    max: f64,
    ts: f64,
    last_time: f64,
}

impl FirstOrderFilter {
    /// Create an uninitialized filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timestep, transfer function, initial state and output
    /// limits.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        ts: f64,
        num: [f64; 2],
        den: [f64; 2],
        u0: f64,
        y0: f64,
        min: f64,
        max: f64,
    ) {
        self.ts = ts;
        self.min = min;
        self.max = max;
        self.delay_u = u0;
        self.delay_y = y0.clamp(min, max);
        self.value = self.delay_y;
        self.last_time = f64::NAN;
        self.set_num_den(num, den);
    }

    /// Change the transfer function, keeping the state.
    pub fn set_num_den(&mut self, num: [f64; 2], den: [f64; 2]) {
        // Bilinear transform: b1 s + b0 -> (b0 Ts + 2 b1) + (b0 Ts - 2 b1) z^-1
        self.coeff_u[0] = num[1] * self.ts - 2.0 * num[0];
        self.coeff_u[1] = num[1] * self.ts + 2.0 * num[0];
        self.coeff_y[0] = den[1] * self.ts - 2.0 * den[0];
        self.coeff_y[1] = den[1] * self.ts + 2.0 * den[0];
    }

    /// Change the output limits.
    pub fn set_min_max(&mut self, min: f64, max: f64) {
        self.min = min;
        self.max = max;
    }

    /// Overwrite the stored state.
    pub fn initialize_values(&mut self, u0: f64, y0: f64) {
        self.delay_u = u0;
        self.delay_y = y0;
        self.value = y0;
    }

    /// Filter one step at simulation time `t`; repeated calls at the same
    /// `t` are no-ops.
    pub fn update(&mut self, t: f64, u: f64) {
        if self.last_time != t {
            self.value =
                (self.coeff_u[1] * u + self.coeff_u[0] * self.delay_u
                    - self.coeff_y[0] * self.delay_y)
                    / self.coeff_y[1];

            if self.value > self.max {
                self.delay_u = self.max;
                self.delay_y = self.max;
                self.value = self.max;
            } else if self.value < self.min {
                self.delay_u = self.min;
                self.delay_y = self.min;
                self.value = self.min;
            } else {
                self.delay_u = u;
                self.delay_y = self.value;
            }
            self.last_time = t;
        }
    }

    /// Update and return the filtered value.
    pub fn value(&mut self, t: f64, u: f64) -> f64 {
        self.update(t, u);
        self.value
    }

    /// The stored output.
    #[must_use]
    pub fn last_value(&self) -> f64 {
        self.value
    }
}

/// Second-order filter `(a2 s^2 + a1 s + a0) / (b2 s^2 + b1 s + b0)`.
#[derive(Clone, Debug, Default)]
pub struct SecondOrderFilter {
    coeff_u: [f64; 3],
    coeff_y: [f64; 3],
    delay_u: [f64; 2],
    delay_y: [f64; 2],
    value: f64,
    min: f64,
    max: f64,
    ts: f64,
    last_time: f64,
}

impl SecondOrderFilter {
    /// Create an uninitialized filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timestep, transfer function, initial state and output
    /// limits.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        ts: f64,
        num: [f64; 3],
        den: [f64; 3],
        u0: f64,
        y0: f64,
        min: f64,
        max: f64,
    ) {
        self.ts = ts;
        self.min = min;
        self.max = max;
        self.delay_u = [u0, u0];
        let y0 = y0.clamp(min, max);
        self.delay_y = [y0, y0];
        self.value = y0;
        self.last_time = f64::NAN;
        self.set_num_den(num, den);
    }

    /// Change the transfer function, keeping the state.
    pub fn set_num_den(&mut self, num: [f64; 3], den: [f64; 3]) {
        let ts2 = self.ts * self.ts;
        self.coeff_u[0] = num[2] * ts2 - 2.0 * num[1] * self.ts + 4.0 * num[0];
        self.coeff_u[1] = 2.0 * num[2] * ts2 - 8.0 * num[0];
        self.coeff_u[2] = num[2] * ts2 + 2.0 * num[1] * self.ts + 4.0 * num[0];
        self.coeff_y[0] = den[2] * ts2 - 2.0 * den[1] * self.ts + 4.0 * den[0];
        self.coeff_y[1] = 2.0 * den[2] * ts2 - 8.0 * den[0];
        self.coeff_y[2] = den[2] * ts2 + 2.0 * den[1] * self.ts + 4.0 * den[0];
    }

    /// Change the output limits.
    pub fn set_min_max(&mut self, min: f64, max: f64) {
        self.min = min;
        self.max = max;
    }

    /// Overwrite the stored state.
    pub fn initialize_values(&mut self, u0: f64, y0: f64) {
        self.delay_u = [u0, u0];
        self.delay_y = [y0, y0];
        self.value = y0;
    }

    /// Filter one step at simulation time `t`; repeated calls at the same
    /// `t` are no-ops.
    pub fn update(&mut self, t: f64, u: f64) {
        if self.last_time != t {
            self.value = (self.coeff_u[2] * u
                + self.coeff_u[1] * self.delay_u[0]
                + self.coeff_u[0] * self.delay_u[1]
                - (self.coeff_y[1] * self.delay_y[0] + self.coeff_y[0] * self.delay_y[1]))
                / self.coeff_y[2];

            if self.value > self.max {
                self.delay_u = [self.max, self.max];
                self.delay_y = [self.max, self.max];
                self.value = self.max;
            } else if self.value < self.min {
                self.delay_u = [self.min, self.min];
                self.delay_y = [self.min, self.min];
                self.value = self.min;
            } else {
                self.delay_u = [u, self.delay_u[0]];
                self.delay_y = [self.value, self.delay_y[0]];
            }
            self.last_time = t;
        }
    }

    /// Update and return the filtered value.
    pub fn value(&mut self, t: f64, u: f64) -> f64 {
        self.update(t, u);
        self.value
    }

    /// The stored output.
    #[must_use]
    pub fn last_value(&self) -> f64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn first_order_low_pass_settles_on_dc_gain() {
        // G(s) = 1 / (tau s + 1), tau = 10 ms
        let mut filter = FirstOrderFilter::new();
        filter.initialize(
            0.001,
            [0.0, 1.0],
            [0.01, 1.0],
            0.0,
            0.0,
            f64::MIN,
            f64::MAX,
        );
        let mut t = 0.0;
        let mut y = 0.0;
        for _ in 0..1000 {
            y = filter.value(t, 2.0);
            t += 0.001;
        }
        assert_relative_eq!(y, 2.0, max_relative = 1e-9);
    }

    #[test]
    fn unity_filter_passes_input_through() {
        let mut filter = FirstOrderFilter::new();
        filter.initialize(0.001, [0.0, 1.0], [0.0, 1.0], 0.0, 0.0, f64::MIN, f64::MAX);
        assert_relative_eq!(filter.value(0.0, 3.25), 3.25);
    }

    #[test]
    fn saturation_resets_state() {
        let mut filter = FirstOrderFilter::new();
        filter.initialize(0.001, [0.0, 1.0], [0.01, 1.0], 0.0, 0.0, -1.0, 1.0);
        let mut t = 0.0;
        for _ in 0..1000 {
            filter.update(t, 100.0);
            t += 0.001;
        }
        assert_eq!(filter.last_value(), 1.0);

        // After the step disappears the filter starts from the limit, not
        // from an unwound internal state
        let next = filter.value(t, 0.0);
        assert!(next < 1.0 && next > 0.5);
    }

    #[test]
    fn second_order_low_pass_settles_on_dc_gain() {
        // G(s) = 1 / (s^2/w0^2 + 2 d s / w0 + 1), w0 = 100 rad/s, d = 0.7
        let w0: f64 = 100.0;
        let mut filter = SecondOrderFilter::new();
        filter.initialize(
            0.001,
            [0.0, 0.0, 1.0],
            [1.0 / (w0 * w0), 2.0 * 0.7 / w0, 1.0],
            0.0,
            0.0,
            f64::MIN,
            f64::MAX,
        );
        let mut t = 0.0;
        let mut y = 0.0;
        for _ in 0..2000 {
            y = filter.value(t, 5.0);
            t += 0.001;
        }
        assert_relative_eq!(y, 5.0, max_relative = 1e-6);
    }

    #[test]
    fn repeated_update_at_same_time_is_a_no_op() {
        let mut filter = SecondOrderFilter::new();
        filter.initialize(
            0.001,
            [0.0, 0.0, 1.0],
            [1.0e-4, 1.0e-2, 1.0],
            0.0,
            0.0,
            f64::MIN,
            f64::MAX,
        );
        let once = filter.value(0.0, 1.0);
        let twice = filter.value(0.0, 1.0);
        assert_eq!(once, twice);
    }
}
