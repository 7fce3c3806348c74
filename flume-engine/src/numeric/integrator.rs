// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Bilinear-transform integrators.
//!
//! All of them keep the previous input and output and apply the
//! trapezoidal update `y = y' + Ts/2 (u + u')`. Updates are guarded by the
//! simulation time, so driving an integrator twice within one step is a
//! no-op.

/// Plain bilinear integrator.
#[derive(Clone, Debug, Default)]
pub struct Integrator {
    delay_u: f64,
    delay_y: f64,
    ts: f64,
    last_time: f64,
}

impl Integrator {
    /// Create an uninitialized integrator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timestep and the initial input/output state.
    pub fn initialize(&mut self, ts: f64, u0: f64, y0: f64) {
        self.ts = ts;
        self.delay_u = u0;
        self.delay_y = y0;
        self.last_time = f64::NAN;
    }

    /// Overwrite the stored state without touching the timestep.
    pub fn initialize_values(&mut self, u0: f64, y0: f64) {
        self.delay_u = u0;
        self.delay_y = y0;
    }

    /// Integrate one step at simulation time `t`; repeated calls at the
    /// same `t` are no-ops.
    pub fn update(&mut self, t: f64, u: f64) {
        if self.last_time != t {
            self.delay_y += self.ts / 2.0 * (u + self.delay_u);
            self.delay_u = u;
            self.last_time = t;
        }
    }

    /// Update and return the integrated value.
    pub fn value(&mut self, t: f64, u: f64) -> f64 {
        self.update(t, u);
        self.delay_y
    }

    /// The stored output.
    #[must_use]
    pub fn last_value(&self) -> f64 {
        self.delay_y
    }
}

/// Bilinear integrator with output saturation and anti-windup.
///
/// On saturation the stored input is zeroed, so the output leaves the limit
/// as soon as the input changes sign instead of having to unwind first.
#[derive(Clone, Debug, Default)]
pub struct IntegratorLimited {
    delay_u: f64,
    delay_y: f64,
    min: f64,
    max: f64,
    ts: f64,
    last_time: f64,
}

impl IntegratorLimited {
    /// Create an uninitialized integrator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timestep, initial state and output limits.
    pub fn initialize(&mut self, ts: f64, u0: f64, y0: f64, min: f64, max: f64) {
        self.ts = ts;
        self.min = min;
        self.max = max;
        self.delay_u = u0;
        self.delay_y = y0.clamp(min, max);
        self.last_time = f64::NAN;
    }

    /// Overwrite the stored state.
    pub fn initialize_values(&mut self, u0: f64, y0: f64) {
        self.delay_u = u0;
        self.delay_y = y0;
    }

    /// Change the output limits.
    pub fn set_min_max(&mut self, min: f64, max: f64) {
        self.min = min;
        self.max = max;
    }

    /// Integrate one step at simulation time `t`.
    pub fn update(&mut self, t: f64, u: f64) {
        if self.last_time != t {
            let y = self.delay_y + self.ts / 2.0 * (u + self.delay_u);
            if y > self.max {
                self.delay_y = self.max;
                self.delay_u = 0.0;
            } else if y < self.min {
                self.delay_y = self.min;
                self.delay_u = 0.0;
            } else {
                self.delay_y = y;
                self.delay_u = u;
            }
            self.last_time = t;
        }
    }

    /// Update and return the integrated value.
    pub fn value(&mut self, t: f64, u: f64) -> f64 {
        self.update(t, u);
        self.delay_y
    }

    /// The stored output.
    #[must_use]
    pub fn last_value(&self) -> f64 {
        self.delay_y
    }
}

/// Second-order integrator for `y'' + w0 y' = u`.
///
/// Discretised with the bilinear transform:
/// `v = ((2 - w0 Ts) v' + Ts (u + u')) / (2 + w0 Ts)` and
/// `y = y' + Ts/2 (v + v')`, where `v` is the first primitive.
#[derive(Clone, Debug, Default)]
pub struct DoubleIntegratorWithDamping {
    w0: f64,
    delay_u: f64,
    delay_y: f64,
    delay_sy: f64,
    ts: f64,
    last_time: f64,
}

impl DoubleIntegratorWithDamping {
    /// Create an uninitialized integrator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timestep, damping and initial state (`sy0` is the first
    /// primitive, `y0` the second).
    pub fn initialize(&mut self, ts: f64, w0: f64, u0: f64, y0: f64, sy0: f64) {
        self.ts = ts;
        self.w0 = w0;
        self.delay_u = u0;
        self.delay_y = y0;
        self.delay_sy = sy0;
        self.last_time = f64::NAN;
    }

    /// Overwrite the stored state.
    pub fn initialize_values(&mut self, u0: f64, y0: f64, sy0: f64) {
        self.delay_u = u0;
        self.delay_y = y0;
        self.delay_sy = sy0;
    }

    /// Change the damping coefficient.
    pub fn set_damping(&mut self, w0: f64) {
        self.w0 = w0;
    }

    /// Integrate one step at simulation time `t`.
    pub fn integrate(&mut self, t: f64, u: f64) {
        if self.last_time != t {
            let w = self.w0 * self.ts;
            let sy_old = self.delay_sy;
            self.delay_sy = ((2.0 - w) * sy_old + self.ts * (u + self.delay_u)) / (2.0 + w);
            self.delay_y += self.ts / 2.0 * (self.delay_sy + sy_old);
            self.delay_u = u;
            self.last_time = t;
        }
    }

    /// The first primitive (e.g. velocity).
    #[must_use]
    pub fn value_first(&self) -> f64 {
        self.delay_sy
    }

    /// The second primitive (e.g. position).
    #[must_use]
    pub fn value_second(&self) -> f64 {
        self.delay_y
    }
}

/// [`DoubleIntegratorWithDamping`] with a Coulomb friction dead zone.
///
/// The static and kinetic friction forces are divided by the moving mass to
/// give friction accelerations. While the acceleration that would hold the
/// primitive at zero lies within the static band the state sticks; outside
/// it the kinetic friction opposes the motion.
#[derive(Clone, Debug, Default)]
pub struct DoubleIntegratorWithDampingAndCoulombFriction {
    w0: f64,
    us: f64,
    uk: f64,
    delay_u: f64,
    delay_y: f64,
    delay_sy: f64,
    backup_u: f64,
    backup_y: f64,
    backup_sy: f64,
    ts: f64,
    last_time: f64,
}

impl DoubleIntegratorWithDampingAndCoulombFriction {
    /// Create an uninitialized integrator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timestep, damping, mass and the static/kinetic friction forces.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        ts: f64,
        w0: f64,
        mass: f64,
        f_static: f64,
        f_kinetic: f64,
        u0: f64,
        y0: f64,
        sy0: f64,
    ) {
        self.ts = ts;
        self.w0 = w0;
        self.us = f_static / mass;
        self.uk = f_kinetic / mass;
        self.delay_u = u0;
        self.delay_y = y0;
        self.delay_sy = sy0;
        self.last_time = f64::NAN;
    }

    /// Overwrite the stored state.
    pub fn initialize_values(&mut self, u0: f64, y0: f64, sy0: f64) {
        self.delay_u = u0;
        self.delay_y = y0;
        self.delay_sy = sy0;
    }

    /// Change the damping coefficient.
    pub fn set_damping(&mut self, w0: f64) {
        self.w0 = w0;
    }

    fn step(&mut self, u: f64) {
        let w = self.w0 * self.ts;
        let sy_old = self.delay_sy;
        // Acceleration that would exactly stop the motion this step
        let u_stick = -(2.0 - w) / self.ts * sy_old - self.delay_u;

        if u_stick > u - self.us && u_stick < u + self.us {
            // Inside the static band: no movement
            self.delay_sy = 0.0;
            self.delay_u = 0.0;
        } else {
            let u_eff = if u_stick < u - self.us {
                u - self.uk
            } else {
                u + self.uk
            };
            self.delay_sy = ((2.0 - w) * sy_old + self.ts * (u_eff + self.delay_u)) / (2.0 + w);
            self.delay_y += self.ts / 2.0 * (self.delay_sy + sy_old);
            self.delay_u = u_eff;
        }
    }

    /// Integrate one step at simulation time `t`.
    pub fn integrate(&mut self, t: f64, u: f64) {
        if self.last_time != t {
            self.step(u);
            self.last_time = t;
        }
    }

    /// Integrate one step, keeping the previous state so the step can be
    /// re-done with a different input.
    pub fn integrate_with_undo(&mut self, t: f64, u: f64) {
        if self.last_time != t {
            self.backup_u = self.delay_u;
            self.backup_y = self.delay_y;
            self.backup_sy = self.delay_sy;
            self.step(u);
            self.last_time = t;
        }
    }

    /// Re-integrate the last step (taken with
    /// [`integrate_with_undo`](Self::integrate_with_undo)) from the saved
    /// state with a new input.
    pub fn redo_integrate(&mut self, u: f64) {
        let w = self.w0 * self.ts;
        self.delay_sy = ((2.0 - w) * self.backup_sy + self.ts * (u + self.backup_u)) / (2.0 + w);
        self.delay_y = self.backup_y + self.ts / 2.0 * (self.delay_sy + self.backup_sy);
        self.delay_u = u;
    }

    /// The first primitive (e.g. velocity).
    #[must_use]
    pub fn value_first(&self) -> f64 {
        self.delay_sy
    }

    /// The second primitive (e.g. position).
    #[must_use]
    pub fn value_second(&self) -> f64 {
        self.delay_y
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn constant_input_integrates_linearly() {
        let mut int = Integrator::new();
        int.initialize(0.01, 1.0, 0.0);
        let mut t = 0.0;
        for _ in 0..100 {
            int.update(t, 1.0);
            t += 0.01;
        }
        assert_relative_eq!(int.last_value(), 1.0, max_relative = 1e-12);
    }

    #[test]
    fn repeated_update_at_same_time_is_a_no_op() {
        let mut int = Integrator::new();
        int.initialize(0.01, 1.0, 0.0);
        int.update(0.0, 1.0);
        let once = int.last_value();
        int.update(0.0, 1.0);
        assert_eq!(int.last_value(), once);
    }

    #[test]
    fn limited_integrator_saturates_without_windup() {
        let mut int = IntegratorLimited::new();
        int.initialize(0.1, 1.0, 0.0, -0.5, 0.5);
        let mut t = 0.0;
        for _ in 0..20 {
            int.update(t, 1.0);
            t += 0.1;
        }
        assert_eq!(int.last_value(), 0.5);

        // No windup: a sign flip leaves the limit immediately
        int.update(t, -1.0);
        assert!(int.last_value() < 0.5);
    }

    #[test]
    fn double_integrator_tracks_constant_acceleration() {
        // No damping: v = u t, y = u t^2 / 2
        let mut int = DoubleIntegratorWithDamping::new();
        int.initialize(0.001, 0.0, 1.0, 0.0, 0.0);
        let mut t = 0.0;
        for _ in 0..1000 {
            int.integrate(t, 1.0);
            t += 0.001;
        }
        assert_relative_eq!(int.value_first(), 1.0, max_relative = 1e-9);
        assert_relative_eq!(int.value_second(), 0.5, max_relative = 1e-3);
    }

    #[test]
    fn coulomb_friction_sticks_below_breakaway() {
        let mut int = DoubleIntegratorWithDampingAndCoulombFriction::new();
        int.initialize(0.001, 0.0, 1.0, 10.0, 8.0, 0.0, 0.0, 0.0);
        // Acceleration below the static threshold: stays stuck
        let mut t = 0.0;
        for _ in 0..100 {
            int.integrate(t, 5.0);
            t += 0.001;
        }
        assert_eq!(int.value_first(), 0.0);
        assert_eq!(int.value_second(), 0.0);

        // Above it: moves, retarded by kinetic friction
        for _ in 0..100 {
            int.integrate(t, 20.0);
            t += 0.001;
        }
        assert!(int.value_first() > 0.0);
    }

    #[test]
    fn undo_redo_matches_direct_integration() {
        let mut direct = DoubleIntegratorWithDampingAndCoulombFriction::new();
        let mut undone = DoubleIntegratorWithDampingAndCoulombFriction::new();
        direct.initialize(0.001, 0.1, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        undone.initialize(0.001, 0.1, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0);

        direct.integrate(0.0, 3.0);
        undone.integrate_with_undo(0.0, 1.0);
        undone.redo_integrate(3.0);

        assert_relative_eq!(direct.value_first(), undone.value_first(), max_relative = 1e-12);
        assert_relative_eq!(direct.value_second(), undone.value_second(), max_relative = 1e-12);
    }
}
