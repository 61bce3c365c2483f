// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dense BFGS minimizer with finite-difference gradients.
//!
//! Each iteration computes a central-difference gradient, takes the
//! quasi-Newton direction -H·g and backtracks along it until the Armijo
//! condition holds. Only decreasing steps are accepted, so the returned
//! objective never exceeds the starting one.

use ndarray::{Array1, Array2};
use serde::Serialize;

/// Armijo sufficient-decrease constant.
const ARMIJO_C1: f64 = 1e-4;

/// Backtracking shrink factor.
const BACKTRACK_RHO: f64 = 0.5;

/// Maximum step halvings per line search.
const MAX_BACKTRACKS: usize = 60;

/// Relative finite-difference step.
const FD_STEP: f64 = 1e-6;

/// Smallest curvature s·y accepted for an inverse-Hessian update.
const MIN_CURVATURE: f64 = 1e-14;

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    /// Objective change or gradient fell below tolerance.
    Converged,
    /// Iteration limit reached.
    MaxIterations,
    /// Line search found no decreasing step.
    Stalled,
    /// Objective evaluated to NaN or infinity at the start.
    NumericalError,
}

impl ConvergenceStatus {
    /// Numeric code: 0 converged, 1 iteration limit, 2 stall, 3 non-finite.
    pub fn code(&self) -> i32 {
        match self {
            ConvergenceStatus::Converged => 0,
            ConvergenceStatus::MaxIterations => 1,
            ConvergenceStatus::Stalled => 2,
            ConvergenceStatus::NumericalError => 3,
        }
    }

    /// Human-readable description.
    pub fn message(&self) -> &'static str {
        match self {
            ConvergenceStatus::Converged => "optimization terminated successfully",
            ConvergenceStatus::MaxIterations => "iteration limit reached",
            ConvergenceStatus::Stalled => "line search found no decreasing step",
            ConvergenceStatus::NumericalError => "objective is not finite",
        }
    }

    /// Whether this is [`ConvergenceStatus::Converged`].
    pub fn is_success(&self) -> bool {
        matches!(self, ConvergenceStatus::Converged)
    }
}

/// Stopping rules.
#[derive(Debug, Clone, Copy)]
pub struct BfgsOptions {
    /// Iteration limit.
    pub max_iterations: usize,
    /// Stop when |Δf| ≤ ftol · max(1, |f_old|, |f_new|).
    pub ftol: f64,
    /// Stop when ‖g‖∞ < gtol.
    pub gtol: f64,
}

/// Outcome of a minimization.
#[derive(Debug, Clone)]
pub struct OptimizationReport {
    /// Best point found.
    pub solution: Vec<f64>,
    /// Objective at `solution`.
    pub objective: f64,
    /// Objective at the starting point.
    pub initial_objective: f64,
    /// Completed iterations.
    pub iterations: usize,
    /// Objective evaluations.
    pub function_evaluations: usize,
    /// Stop reason.
    pub status: ConvergenceStatus,
}

struct Counted<F> {
    f: F,
    evaluations: usize,
}

impl<F: FnMut(&[f64]) -> f64> Counted<F> {
    fn eval(&mut self, x: &Array1<f64>) -> f64 {
        self.evaluations += 1;
        match x.as_slice() {
            Some(s) => (self.f)(s),
            None => (self.f)(&x.to_vec()),
        }
    }

    fn gradient(&mut self, x: &Array1<f64>) -> Array1<f64> {
        let mut shifted = x.clone();
        let mut g = Array1::zeros(x.len());
        for i in 0..x.len() {
            let h = FD_STEP * x[i].abs().max(1.0);
            shifted[i] = x[i] + h;
            let up = self.eval(&shifted);
            shifted[i] = x[i] - h;
            let down = self.eval(&shifted);
            shifted[i] = x[i];
            g[i] = (up - down) / (2.0 * h);
        }
        g
    }
}

/// BFGS minimizer.
#[derive(Debug, Clone)]
pub struct Bfgs {
    options: BfgsOptions,
}

impl Bfgs {
    /// Create a minimizer.
    pub fn new(options: BfgsOptions) -> Self {
        Self { options }
    }

    /// Minimize `f` starting from `x0`.
    pub fn minimize<F>(&self, f: F, x0: Vec<f64>) -> OptimizationReport
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = x0.len();
        let mut objective = Counted { f, evaluations: 0 };
        let mut x = Array1::from(x0);
        let mut fx = objective.eval(&x);
        let initial_objective = fx;

        if !fx.is_finite() {
            return OptimizationReport {
                solution: x.to_vec(),
                objective: fx,
                initial_objective,
                iterations: 0,
                function_evaluations: objective.evaluations,
                status: ConvergenceStatus::NumericalError,
            };
        }

        let mut g = objective.gradient(&x);
        let mut h_inv: Array2<f64> = Array2::eye(n);
        let mut status = ConvergenceStatus::MaxIterations;
        let mut iterations = 0;

        for iter in 1..=self.options.max_iterations {
            if inf_norm(&g) < self.options.gtol {
                status = ConvergenceStatus::Converged;
                break;
            }

            let mut direction = -h_inv.dot(&g);
            let mut slope = g.dot(&direction);
            if slope >= 0.0 || slope.is_nan() {
                // Curvature information went bad; restart from steepest descent.
                h_inv = Array2::eye(n);
                direction = -&g;
                slope = -g.dot(&g);
            }

            let Some((x_new, f_new)) = backtrack(&mut objective, &x, fx, &direction, slope) else {
                status = ConvergenceStatus::Stalled;
                break;
            };
            iterations = iter;

            let g_new = objective.gradient(&x_new);
            let s = &x_new - &x;
            let y = &g_new - &g;
            let f_old = fx;

            x = x_new;
            fx = f_new;
            g = g_new;

            if (f_old - fx).abs() <= self.options.ftol * f_old.abs().max(fx.abs()).max(1.0) {
                status = ConvergenceStatus::Converged;
                break;
            }

            let sy = s.dot(&y);
            if sy > MIN_CURVATURE {
                h_inv = bfgs_update(&h_inv, &s, &y, sy);
            }
        }

        OptimizationReport {
            solution: x.to_vec(),
            objective: fx,
            initial_objective,
            iterations,
            function_evaluations: objective.evaluations,
            status,
        }
    }
}

/// Backtrack from α = 1 until f(x + α·p) ≤ f(x) + c₁·α·(g·p).
fn backtrack<F: FnMut(&[f64]) -> f64>(
    objective: &mut Counted<F>,
    x: &Array1<f64>,
    fx: f64,
    direction: &Array1<f64>,
    slope: f64,
) -> Option<(Array1<f64>, f64)> {
    let mut alpha = 1.0;
    for _ in 0..MAX_BACKTRACKS {
        let candidate = x + &(direction * alpha);
        let fc = objective.eval(&candidate);
        if fc.is_finite() && fc < fx && fc <= fx + ARMIJO_C1 * alpha * slope {
            return Some((candidate, fc));
        }
        alpha *= BACKTRACK_RHO;
    }
    None
}

/// H⁺ = (I − ρ·s·yᵀ)·H·(I − ρ·y·sᵀ) + ρ·s·sᵀ with ρ = 1/(s·y).
fn bfgs_update(h: &Array2<f64>, s: &Array1<f64>, y: &Array1<f64>, sy: f64) -> Array2<f64> {
    let n = s.len();
    let rho = 1.0 / sy;
    let s_col = s.view().insert_axis(ndarray::Axis(1));
    let y_row = y.view().insert_axis(ndarray::Axis(0));
    let left = Array2::<f64>::eye(n) - &(s_col.dot(&y_row) * rho);
    let ss = s_col.dot(&s.view().insert_axis(ndarray::Axis(0))) * rho;
    left.dot(h).dot(&left.t()) + ss
}

fn inf_norm(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0_f64, |m, x| m.max(x.abs()))
}
