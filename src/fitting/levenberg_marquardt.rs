//! # Levenberg–Marquardt least squares
//!
//! Minimises `S(p) = Σ (yᵢ - f(xᵢ; p))²` for a scalar model `f`.
//!
//! ## Algorithm
//! -----------------
//! Each iteration:
//! 1. builds the model Jacobian `J` by central differences,
//!    `hⱼ = ∛ε · max(|pⱼ|, 1)`,
//! 2. solves the Marquardt-scaled normal equations
//!    `(JᵀJ + μ·diag(JᵀJ)) δ = Jᵀr` with `r = y - f(x; p)`,
//! 3. accepts `p + δ` (projected onto the bounds when there are any) if it
//!    lowers `S`, and relaxes the damping `μ`; otherwise raises `μ` and
//!    solves again.
//!
//! ## Stopping rules
//! -----------------
//! * converged – relative decrease of `S` below `ftol`, step below `xtol`
//!   relative to `‖p‖`, `‖Jᵀr‖∞ ≤ gtol`, `S = 0`, or no step can lower `S`
//!   even at the largest damping after at least one accepted step (the point
//!   is a minimum to working precision),
//! * [`FitFailure::Stalled`] – the damping limit is hit before any step was
//!   accepted, so the parameters are still the initial guess,
//! * [`FitFailure::IterationLimit`] – `max_iter` iterations without any of
//!   the above,
//! * [`FitFailure::NonFiniteResidual`] – the model is not finite at the
//!   initial guess.
//!
//! The covariance estimate `s²·(JᵀJ)⁻¹`, `s² = S/(m - n)`, is computed by
//! [`covariance`] from the Jacobian at the solution.
use nalgebra::{DMatrix, DVector};

use crate::constants::{INITIAL_DAMPING, MAX_DAMPING, MIN_DAMPING};
use crate::specfit_errors::FitFailure;

/// Stopping thresholds of one minimisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmSettings {
    pub max_iter: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

/// State at the end of a successful minimisation.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: Vec<f64>,
    pub jacobian: DMatrix<f64>,
    pub rss: f64,
    pub iterations: usize,
}

struct Problem<'a, F> {
    model: F,
    x: &'a [f64],
    y: &'a [f64],
    lower: Option<&'a [f64]>,
    upper: Option<&'a [f64]>,
}

impl<F: Fn(f64, &[f64]) -> f64> Problem<'_, F> {
    fn residuals(&self, p: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            self.x.len(),
            self.x
                .iter()
                .zip(self.y)
                .map(|(&xi, &yi)| yi - (self.model)(xi, p)),
        )
    }

    /// Model Jacobian `∂f(xᵢ)/∂pⱼ` by central differences.
    fn jacobian(&self, p: &[f64]) -> DMatrix<f64> {
        let m = self.x.len();
        let n = p.len();
        let step_scale = f64::EPSILON.cbrt();
        let mut jac = DMatrix::zeros(m, n);
        let mut shifted = p.to_vec();

        for j in 0..n {
            let h = step_scale * p[j].abs().max(1.0);
            shifted[j] = p[j] + h;
            let forward: Vec<f64> = self
                .x
                .iter()
                .map(|&xi| (self.model)(xi, shifted.as_slice()))
                .collect();
            shifted[j] = p[j] - h;
            for (i, &xi) in self.x.iter().enumerate() {
                jac[(i, j)] = (forward[i] - (self.model)(xi, shifted.as_slice())) / (2.0 * h);
            }
            shifted[j] = p[j];
        }
        jac
    }

    fn project(&self, p: &mut DVector<f64>) {
        if let (Some(lo), Some(hi)) = (self.lower, self.upper) {
            for (j, v) in p.iter_mut().enumerate() {
                *v = v.clamp(lo[j], hi[j]);
            }
        }
    }
}

fn solve_damped(a: &DMatrix<f64>, g: &DVector<f64>, mu: f64) -> Option<DVector<f64>> {
    let mut damped = a.clone();
    for j in 0..a.ncols() {
        damped[(j, j)] += mu * a[(j, j)].max(f64::EPSILON);
    }
    match damped.clone().cholesky() {
        Some(chol) => Some(chol.solve(g)),
        None => damped.lu().solve(g),
    }
}

/// Minimise the residual sum of squares of `model` over `(x, y)`.
///
/// Arguments
/// -----------------
/// * `model` – `f(x, p)`.
/// * `x`, `y` – samples, equal lengths.
/// * `p0` – initial parameters; must lie inside the bounds when given.
/// * `bounds` – optional `(lower, upper)` per parameter; steps are projected
///   onto the box.
/// * `settings` – stopping thresholds.
///
/// Return
/// ----------
/// * The final parameters with the Jacobian and residual sum of squares
///   there, or the [`FitFailure`] that stopped the run.
pub fn minimize<F>(
    model: F,
    x: &[f64],
    y: &[f64],
    p0: &[f64],
    bounds: Option<(&[f64], &[f64])>,
    settings: &LmSettings,
) -> Result<LmReport, FitFailure>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let problem = Problem {
        model,
        x,
        y,
        lower: bounds.map(|b| b.0),
        upper: bounds.map(|b| b.1),
    };

    let mut p = DVector::from_column_slice(p0);
    let mut r = problem.residuals(p.as_slice());
    let mut rss = r.norm_squared();
    if !rss.is_finite() {
        return Err(FitFailure::NonFiniteResidual);
    }
    let mut mu = INITIAL_DAMPING;
    let mut accepted = false;

    for iteration in 1..=settings.max_iter {
        let jac = problem.jacobian(p.as_slice());
        if rss == 0.0 {
            return Ok(report(p, jac, rss, iteration));
        }

        let a = jac.transpose() * &jac;
        let g = jac.transpose() * &r;
        if g.amax() <= settings.gtol {
            return Ok(report(p, jac, rss, iteration));
        }

        loop {
            let Some(delta) = solve_damped(&a, &g, mu) else {
                mu *= 10.0;
                if mu > MAX_DAMPING {
                    return stalled(accepted, p, jac, rss, iteration);
                }
                continue;
            };

            let mut trial = &p + &delta;
            problem.project(&mut trial);
            let trial_r = problem.residuals(trial.as_slice());
            let trial_rss = trial_r.norm_squared();

            if trial_rss.is_finite() && trial_rss < rss {
                let step = (&trial - &p).norm();
                let reduction = (rss - trial_rss) / rss;
                p = trial;
                r = trial_r;
                rss = trial_rss;
                mu = (mu * 0.3).max(MIN_DAMPING);
                accepted = true;

                if reduction <= settings.ftol
                    || step <= settings.xtol * (p.norm() + settings.xtol)
                {
                    let jac = problem.jacobian(p.as_slice());
                    return Ok(report(p, jac, rss, iteration));
                }
                break;
            }

            mu *= 10.0;
            if mu > MAX_DAMPING {
                return stalled(accepted, p, jac, rss, iteration);
            }
        }
    }

    Err(FitFailure::IterationLimit(settings.max_iter))
}

fn stalled(
    accepted: bool,
    p: DVector<f64>,
    jacobian: DMatrix<f64>,
    rss: f64,
    iterations: usize,
) -> Result<LmReport, FitFailure> {
    if accepted {
        Ok(report(p, jacobian, rss, iterations))
    } else {
        Err(FitFailure::Stalled)
    }
}

fn report(p: DVector<f64>, jacobian: DMatrix<f64>, rss: f64, iterations: usize) -> LmReport {
    LmReport {
        params: p.as_slice().to_vec(),
        jacobian,
        rss,
        iterations,
    }
}

/// Parameter covariance `s²·(JᵀJ)⁻¹` and the standard errors on its diagonal.
///
/// Return
/// ----------
/// * [`FitFailure::Underdetermined`] when there are no more samples than
///   parameters,
/// * [`FitFailure::SingularCovariance`] when `JᵀJ` has a reciprocal condition
///   number below `n·ε`,
/// * [`FitFailure::NotPositiveSemiDefinite`] when a variance comes out
///   negative or non-finite.
pub fn covariance(
    jacobian: &DMatrix<f64>,
    rss: f64,
) -> Result<(DMatrix<f64>, Vec<f64>), FitFailure> {
    let (m, n) = jacobian.shape();
    if m <= n {
        return Err(FitFailure::Underdetermined {
            points: m,
            params: n,
        });
    }

    let a = jacobian.transpose() * jacobian;
    let singular = a.clone().svd(false, false).singular_values;
    let s_max = singular.max();
    let s_min = singular.min();
    if !(s_max > 0.0) || s_min / s_max < n as f64 * f64::EPSILON {
        return Err(FitFailure::SingularCovariance);
    }
    let inverse = a.try_inverse().ok_or(FitFailure::SingularCovariance)?;

    let s2 = rss / (m - n) as f64;
    let cov = inverse * s2;
    let errors = cov
        .diagonal()
        .iter()
        .map(|&v| {
            if v.is_finite() && v >= 0.0 {
                Ok(v.sqrt())
            } else {
                Err(FitFailure::NotPositiveSemiDefinite)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((cov, errors))
}

#[cfg(test)]
mod levenberg_marquardt_test {
    use super::*;
    use approx::assert_relative_eq;

    fn settings() -> LmSettings {
        LmSettings {
            max_iter: 200,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-14,
        }
    }

    #[test]
    fn test_linear_problem_converges() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v - 1.0).collect();
        let out = minimize(|x, p| p[0] * x + p[1], &x, &y, &[0.0, 0.0], None, &settings()).unwrap();
        assert_relative_eq!(out.params[0], 2.0, epsilon = 1e-8);
        assert_relative_eq!(out.params[1], -1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_bounds_are_respected() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        let lower = [0.0, -1.0];
        let upper = [1.5, 1.0];
        let out = minimize(
            |x, p| p[0] * x + p[1],
            &x,
            &y,
            &[1.0, 0.0],
            Some((&lower[..], &upper[..])),
            &settings(),
        )
        .unwrap();
        assert!(out.params[0] <= 1.5);
        assert!(out.params[1] <= 1.0 && out.params[1] >= -1.0);
    }

    #[test]
    fn test_non_finite_start() {
        let x = [1.0, 2.0, 3.0];
        let y = [1.0, 2.0, 3.0];
        let err = minimize(|x, p| x / p[0], &x, &y, &[0.0], None, &settings()).unwrap_err();
        assert_eq!(err, FitFailure::NonFiniteResidual);
    }

    #[test]
    fn test_no_accepted_step_is_a_failure() {
        // the model jumps at p = 1: the Jacobian is steep there but every
        // step to the right only swaps the sign of the residuals
        let x = [1.0, 2.0, 3.0];
        let y = [1.0, 2.0, 3.0];
        let err = minimize(
            |x, p| if p[0] > 1.0 { 2.0 * x } else { 0.0 },
            &x,
            &y,
            &[1.0],
            None,
            &settings(),
        )
        .unwrap_err();
        assert_eq!(err, FitFailure::Stalled);
    }

    #[test]
    fn test_covariance_failures() {
        let jac = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            covariance(&jac, 1.0).unwrap_err(),
            FitFailure::Underdetermined {
                points: 2,
                params: 2
            }
        );
        let degenerate = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(
            covariance(&degenerate, 1.0).unwrap_err(),
            FitFailure::SingularCovariance
        );
    }

    #[test]
    fn test_covariance_of_line() {
        // y = a·x + b on x = 0, 1, 2 with rss = 1: s² = 1
        let jac = DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 1.0, 1.0, 2.0, 1.0]);
        let (cov, errors) = covariance(&jac, 1.0).unwrap();
        // (JᵀJ)⁻¹ = [[5, 3],[3, 3]]⁻¹ = 1/6 · [[3, -3],[-3, 5]]
        assert_relative_eq!(cov[(0, 0)], 0.5, epsilon = 1e-12);
        assert_relative_eq!(cov[(0, 1)], -0.5, epsilon = 1e-12);
        assert_relative_eq!(errors[1], (5.0_f64 / 6.0).sqrt(), epsilon = 1e-12);
    }
}
