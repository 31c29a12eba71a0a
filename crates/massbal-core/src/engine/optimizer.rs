use super::config::SolverConfig;
use super::progress::SolverStep;
use nalgebra::{DMatrix, DVector};
use tracing::{trace, warn};

const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const CURVATURE_EPSILON: f64 = 1e-16;
const GRADIENT_NOISE_FACTOR: f64 = 4.0;
/// √ε: gradient norm accepted once the objective cannot decrease any further.
const STALL_TOLERANCE: f64 = 1.490_116_119_384_765_6e-8;

/// Outcome of a minimisation.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: DVector<f64>,
    pub value: f64,
    pub iterations: usize,
    /// Infinity norm of the gradient at `x`.
    pub gradient_norm: f64,
    pub converged: bool,
}

/// Central finite-difference gradient of `f` at `x`.
pub fn central_gradient<F>(f: &F, x: &DVector<f64>, step: f64) -> DVector<f64>
where
    F: Fn(&DVector<f64>) -> f64,
{
    let mut probe = x.clone();
    DVector::from_fn(x.len(), |i, _| {
        let origin = probe[i];
        probe[i] = origin + step;
        let forward = f(&probe);
        probe[i] = origin - step;
        let backward = f(&probe);
        probe[i] = origin;
        (forward - backward) / (2.0 * step)
    })
}

/// BFGS quasi-Newton minimiser over the inverse Hessian.
///
/// The inverse Hessian starts as the identity and is rescaled by `sᵀy / yᵀy`
/// after the first step. Steps come from a backtracking Armijo line search;
/// non-finite trial values are rejected like any other failed trial. An update
/// is skipped when the curvature condition `sᵀy > 0` fails, and the search
/// falls back to steepest descent when the quasi-Newton direction is not a
/// descent direction.
///
/// The search stops once the infinity norm of the gradient is at or below the
/// configured tolerance, or below the finite-difference noise floor
/// `4·ε·|f|/h`, whichever is larger. A line search that cannot move the point
/// is retried once along steepest descent; if that fails too, the result
/// counts as converged only when the gradient norm is within `√ε·max(1, |f|)`.
pub struct Bfgs {
    max_iterations: usize,
    gradient_tolerance: f64,
    step: f64,
}

impl Bfgs {
    pub fn new(settings: &SolverConfig) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            gradient_tolerance: settings.gradient_tolerance,
            step: settings.step,
        }
    }

    /// Minimises `f` starting from `x0`.
    ///
    /// `on_step` is called after every accepted step.
    pub fn minimize<F>(
        &self,
        f: F,
        x0: DVector<f64>,
        mut on_step: impl FnMut(SolverStep),
    ) -> Minimum
    where
        F: Fn(&DVector<f64>) -> f64,
    {
        let n = x0.len();
        let mut x = x0;
        let mut fx = f(&x);
        if n == 0 {
            return Minimum {
                x,
                value: fx,
                iterations: 0,
                gradient_norm: 0.0,
                converged: true,
            };
        }
        let mut g = central_gradient(&f, &x, self.step);
        let mut h_inv = DMatrix::<f64>::identity(n, n);
        let mut is_identity = true;

        for iteration in 0..self.max_iterations {
            let gradient_norm = g.amax();
            if gradient_norm <= self.tolerance_at(fx) {
                return Minimum {
                    x,
                    value: fx,
                    iterations: iteration,
                    gradient_norm,
                    converged: true,
                };
            }

            let (x_new, f_new) = loop {
                let mut direction = -(&h_inv * &g);
                let mut slope = direction.dot(&g);
                if slope >= 0.0 {
                    trace!(iteration, "Resetting to steepest descent.");
                    h_inv = DMatrix::identity(n, n);
                    is_identity = true;
                    direction = -&g;
                    slope = -g.norm_squared();
                }
                if let Some(step) = self.line_search(&f, &x, fx, &direction, slope) {
                    break step;
                }
                if !is_identity {
                    trace!(iteration, "Line search failed; retrying along steepest descent.");
                    h_inv = DMatrix::identity(n, n);
                    is_identity = true;
                    continue;
                }

                // No representable decrease is left along the gradient.
                let converged = gradient_norm <= STALL_TOLERANCE * fx.abs().max(1.0);
                if !converged {
                    warn!(iteration, gradient_norm, "Line search failed to find a decrease.");
                }
                return Minimum {
                    x,
                    value: fx,
                    iterations: iteration,
                    gradient_norm,
                    converged,
                };
            };

            let g_new = central_gradient(&f, &x_new, self.step);
            let s = &x_new - &x;
            let y = &g_new - &g;
            let sy = s.dot(&y);
            if sy > CURVATURE_EPSILON {
                if iteration == 0 {
                    h_inv = DMatrix::identity(n, n) * (sy / y.norm_squared());
                }
                let rho = 1.0 / sy;
                let hy = &h_inv * &y;
                let y_hy = y.dot(&hy);
                h_inv -= (&hy * s.transpose() + &s * hy.transpose()) * rho;
                h_inv += (&s * s.transpose()) * (rho * rho * y_hy + rho);
                is_identity = false;
            } else {
                trace!(iteration, sy, "Skipping update: curvature condition failed.");
            }

            x = x_new;
            fx = f_new;
            g = g_new;
            let step = SolverStep {
                iteration: iteration + 1,
                objective: fx,
                gradient_norm: g.amax(),
            };
            trace!(iteration, objective = fx, gradient_norm = step.gradient_norm, "BFGS step.");
            on_step(step);
        }

        let gradient_norm = g.amax();
        Minimum {
            x,
            value: fx,
            iterations: self.max_iterations,
            gradient_norm,
            converged: gradient_norm <= self.tolerance_at(fx),
        }
    }

    fn tolerance_at(&self, value: f64) -> f64 {
        let noise_floor = GRADIENT_NOISE_FACTOR * f64::EPSILON * value.abs() / self.step;
        self.gradient_tolerance.max(noise_floor)
    }

    fn line_search<F>(
        &self,
        f: &F,
        x: &DVector<f64>,
        fx: f64,
        direction: &DVector<f64>,
        slope: f64,
    ) -> Option<(DVector<f64>, f64)>
    where
        F: Fn(&DVector<f64>) -> f64,
    {
        let mut alpha = 1.0;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = x + direction * alpha;
            if candidate == *x {
                break;
            }
            let value = f(&candidate);
            if value.is_finite() && value <= fx + ARMIJO_C1 * alpha * slope {
                return Some((candidate, value));
            }
            alpha *= 0.5;
        }
        None
    }
}
