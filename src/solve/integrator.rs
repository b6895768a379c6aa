use crate::errors::SolverError;
use crate::solve::jacobian::JacobianPrototype;

/// Stepper selection. The stepper is deliberately pluggable: the core
/// only promises the contract of step(), the state layout, and the
/// sparsity prototype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Fixed-step forward Euler.
    Euler,
    /// Fixed-step classic Runge-Kutta.
    Rk4,
    /// Adaptive embedded Bogacki-Shampine 3(2).
    Bs23,
}

impl Algorithm {
    pub fn parse(s: &str) -> Option<Algorithm> {
        match s {
            "Euler" | "euler" => Some(Algorithm::Euler),
            "RK4" | "rk4" => Some(Algorithm::Rk4),
            "BS3" | "bs3" | "bs23" | "adaptive" => Some(Algorithm::Bs23),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntegratorOptions {
    pub algorithm: Algorithm,
    /// Fixed step size; 0 = adaptive (with the adaptive algorithm).
    pub dt: f64,
    pub abstol: f64,
    pub reltol: f64,
    pub maxiters: usize,
    pub sparse: bool,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Bs23,
            dt: 0.0,
            abstol: 1e-6,
            reltol: 1e-5,
            maxiters: 10_000_000,
            sparse: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegratorStats {
    pub naccept: usize,
    pub nreject: usize,
    pub nf: usize,
}

/// Final disposition of the step loop, reported in the closing log
/// line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Success,
    MaxIters,
    DtLessThanMin,
    Failure,
}

/// One accepted step: the interval it covered. The previous state is
/// kept so callers can bisect for zero crossings inside the step.
#[derive(Debug, Clone, Copy)]
pub struct StepResult {
    pub t_prev: f64,
    pub t: f64,
}

/// Explicit ODE stepper over a packed state vector. The rhs is passed
/// as a closure on every call so the caller keeps ownership of the
/// parameter struct between steps.
#[derive(Debug, Clone)]
pub struct Integrator {
    pub t: f64,
    pub u: Vec<f64>,
    /// State at the start of the most recent accepted step.
    pub u_prev: Vec<f64>,
    pub t_prev: f64,
    pub opts: IntegratorOptions,
    pub stats: IntegratorStats,
    pub prototype: Option<JacobianPrototype>,
    dt_next: f64,
    iters: usize,
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    u_tmp: Vec<f64>,
    u_cand: Vec<f64>,
}

impl Integrator {
    pub fn new(u0: Vec<f64>, t0: f64, opts: IntegratorOptions) -> Self {
        let n = u0.len();
        let dt_next = if opts.dt > 0.0 { opts.dt } else { 60.0 };
        Self {
            t: t0,
            u_prev: u0.clone(),
            u: u0,
            t_prev: t0,
            opts,
            stats: IntegratorStats::default(),
            prototype: None,
            dt_next,
            iters: 0,
            k1: vec![0.0; n],
            k2: vec![0.0; n],
            k3: vec![0.0; n],
            k4: vec![0.0; n],
            u_tmp: vec![0.0; n],
            u_cand: vec![0.0; n],
        }
    }

    /// Collapse the last-step window onto the current state. Called
    /// after event handling so stale interpolation data never leaks
    /// into the next step.
    pub fn sync_prev(&mut self) {
        let Integrator { u, u_prev, t, t_prev, .. } = self;
        u_prev.copy_from_slice(u);
        *t_prev = *t;
    }

    /// Linear interpolation of the state inside the last accepted step.
    pub fn interpolate(&self, t: f64, out: &mut [f64]) {
        let span = self.t - self.t_prev;
        let f = if span > 0.0 {
            ((t - self.t_prev) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        for i in 0..self.u.len() {
            out[i] = self.u_prev[i] + f * (self.u[i] - self.u_prev[i]);
        }
    }

    /// Advance by one accepted step, never stepping past t_max (hard
    /// tstop). Returns the covered interval; a zero-length interval
    /// means t_max was already reached.
    pub fn step<F>(&mut self, t_max: f64, f: &mut F) -> Result<StepResult, SolverError>
    where
        F: FnMut(&mut [f64], &[f64], f64),
    {
        if self.t >= t_max {
            return Ok(StepResult {
                t_prev: self.t,
                t: self.t,
            });
        }
        match self.opts.algorithm {
            Algorithm::Euler => self.step_euler(t_max, f),
            Algorithm::Rk4 => self.step_rk4(t_max, f),
            Algorithm::Bs23 => self.step_bs23(t_max, f),
        }
    }

    fn bump_iters(&mut self) -> Result<(), SolverError> {
        self.iters += 1;
        if self.iters > self.opts.maxiters {
            Err(SolverError::MaxItersExceeded {
                t: self.t,
                maxiters: self.opts.maxiters,
            })
        } else {
            Ok(())
        }
    }

    fn fixed_dt(&self, t_max: f64) -> f64 {
        let dt = if self.opts.dt > 0.0 { self.opts.dt } else { 60.0 };
        dt.min(t_max - self.t)
    }

    fn step_euler<F>(&mut self, t_max: f64, f: &mut F) -> Result<StepResult, SolverError>
    where
        F: FnMut(&mut [f64], &[f64], f64),
    {
        self.bump_iters()?;
        let dt = self.fixed_dt(t_max);
        self.t_prev = self.t;
        self.u_prev.copy_from_slice(&self.u);
        f(&mut self.k1, &self.u, self.t);
        self.stats.nf += 1;
        for i in 0..self.u.len() {
            self.u[i] += dt * self.k1[i];
        }
        self.t += dt;
        self.stats.naccept += 1;
        Ok(StepResult {
            t_prev: self.t_prev,
            t: self.t,
        })
    }

    fn step_rk4<F>(&mut self, t_max: f64, f: &mut F) -> Result<StepResult, SolverError>
    where
        F: FnMut(&mut [f64], &[f64], f64),
    {
        self.bump_iters()?;
        let dt = self.fixed_dt(t_max);
        let n = self.u.len();
        self.t_prev = self.t;
        self.u_prev.copy_from_slice(&self.u);
        f(&mut self.k1, &self.u, self.t);
        for i in 0..n {
            self.u_tmp[i] = self.u[i] + 0.5 * dt * self.k1[i];
        }
        f(&mut self.k2, &self.u_tmp, self.t + 0.5 * dt);
        for i in 0..n {
            self.u_tmp[i] = self.u[i] + 0.5 * dt * self.k2[i];
        }
        f(&mut self.k3, &self.u_tmp, self.t + 0.5 * dt);
        for i in 0..n {
            self.u_tmp[i] = self.u[i] + dt * self.k3[i];
        }
        f(&mut self.k4, &self.u_tmp, self.t + dt);
        self.stats.nf += 4;
        for i in 0..n {
            self.u[i] +=
                dt / 6.0 * (self.k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]);
        }
        self.t += dt;
        self.stats.naccept += 1;
        Ok(StepResult {
            t_prev: self.t_prev,
            t: self.t,
        })
    }

    /// Bogacki-Shampine 3(2) with a standard PI-free step controller.
    fn step_bs23<F>(&mut self, t_max: f64, f: &mut F) -> Result<StepResult, SolverError>
    where
        F: FnMut(&mut [f64], &[f64], f64),
    {
        let n = self.u.len();
        let dt_min = 1e-10 * self.t.abs().max(1.0);
        let mut dt = self.dt_next.min(t_max - self.t).max(dt_min);
        loop {
            self.bump_iters()?;
            f(&mut self.k1, &self.u, self.t);
            for i in 0..n {
                self.u_tmp[i] = self.u[i] + 0.5 * dt * self.k1[i];
            }
            f(&mut self.k2, &self.u_tmp, self.t + 0.5 * dt);
            for i in 0..n {
                self.u_tmp[i] = self.u[i] + 0.75 * dt * self.k2[i];
            }
            f(&mut self.k3, &self.u_tmp, self.t + 0.75 * dt);
            for i in 0..n {
                self.u_cand[i] = self.u[i]
                    + dt * (2.0 / 9.0 * self.k1[i] + 1.0 / 3.0 * self.k2[i]
                        + 4.0 / 9.0 * self.k3[i]);
            }
            f(&mut self.k4, &self.u_cand, self.t + dt);
            self.stats.nf += 4;

            // Second-order embedded solution for the error estimate.
            let mut err_sq = 0.0;
            for i in 0..n {
                let z = self.u[i]
                    + dt * (7.0 / 24.0 * self.k1[i]
                        + 0.25 * self.k2[i]
                        + 1.0 / 3.0 * self.k3[i]
                        + 0.125 * self.k4[i]);
                let scale =
                    self.opts.abstol + self.opts.reltol * self.u[i].abs().max(self.u_cand[i].abs());
                let e = (self.u_cand[i] - z) / scale;
                err_sq += e * e;
            }
            let err = (err_sq / n.max(1) as f64).sqrt();

            if err <= 1.0 {
                self.t_prev = self.t;
                self.u_prev.copy_from_slice(&self.u);
                self.u.copy_from_slice(&self.u_cand);
                self.t += dt;
                self.stats.naccept += 1;
                let grow = if err > 0.0 {
                    (0.9 * err.powf(-1.0 / 3.0)).clamp(0.2, 5.0)
                } else {
                    5.0
                };
                self.dt_next = (dt * grow).max(dt_min);
                return Ok(StepResult {
                    t_prev: self.t_prev,
                    t: self.t,
                });
            }
            self.stats.nreject += 1;
            dt *= (0.9 * err.powf(-1.0 / 3.0)).clamp(0.2, 1.0);
            if dt <= dt_min {
                return Err(SolverError::StepSizeTooSmall { t: self.t, dt_min });
            }
        }
    }
}
