use std::fmt;

use nalgebra::DMatrix;

use crate::fitting::models::ModelKind;
use crate::specfit_errors::SpecFitError;

/// Outcome of one converged fit.
///
/// Fields
/// -----------------
/// * `model` – fitted model.
/// * `params` – fitted parameters, in the model's schema order.
/// * `std_errors` – square roots of the covariance diagonal, parallel to `params`.
/// * `covariance` – `s²·(JᵀJ)⁻¹` at the solution.
/// * `rss` – residual sum of squares.
/// * `dof` – degrees of freedom `m - n`.
/// * `iterations` – optimiser iterations used.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub model: ModelKind,
    pub params: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub covariance: DMatrix<f64>,
    pub rss: f64,
    pub dof: usize,
    pub iterations: usize,
}

impl FitResult {
    /// Residual variance `rss / dof`.
    pub fn reduced_chi2(&self) -> f64 {
        self.rss / self.dof as f64
    }

    /// Value and standard error of a parameter by schema name.
    pub fn param(&self, name: &str) -> Option<(f64, f64)> {
        self.model
            .param_names()
            .iter()
            .position(|n| n == name)
            .map(|i| (self.params[i], self.std_errors[i]))
    }

    /// `(name, value, std_error)` triplets in schema order.
    pub fn named(&self) -> Vec<(String, f64, f64)> {
        self.model
            .param_names()
            .into_iter()
            .zip(self.params.iter().zip(&self.std_errors))
            .map(|(name, (&v, &e))| (name, v, e))
            .collect()
    }

    /// The fitted curve on `x`.
    pub fn evaluate(&self, x: &[f64]) -> Result<Vec<f64>, SpecFitError> {
        self.model.evaluate_all(x, &self.params)
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} fit: rss = {:.6e}, dof = {}, iterations = {}",
            self.model, self.rss, self.dof, self.iterations
        )?;
        for (name, value, error) in self.named() {
            writeln!(f, "  {name:<8} = {value:>14.6e} ± {error:.3e}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod fit_result_test {
    use super::*;

    #[test]
    fn test_named_access() {
        let result = FitResult {
            model: ModelKind::ExpDecay,
            params: vec![5.0, 3.0, 1.0],
            std_errors: vec![0.1, 0.2, 0.3],
            covariance: DMatrix::identity(3, 3),
            rss: 2.0,
            dof: 4,
            iterations: 7,
        };
        assert_eq!(result.param("t1"), Some((3.0, 0.2)));
        assert_eq!(result.param("tau"), None);
        assert_eq!(result.named()[2].0, "offset");
        assert_eq!(result.reduced_chi2(), 0.5);
        assert!(result.to_string().starts_with("exp_decay fit"));
        assert_eq!(result.evaluate(&[0.0]).unwrap(), vec![6.0]);
    }
}
