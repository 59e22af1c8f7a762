mod common;

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use specfit::fitting::guess::{initial_guess, tolerance_bounds};
use specfit::fitting::models::{dbl_exp_decay, exp_decay, gaussian, lorentzian, rise_time};
use specfit::fitting::{fit_model, FitMethod, FitOptions, ModelKind};
use specfit::specfit_errors::{FitFailure, SpecFitError};

use crate::common::assert_params_close;

fn grid(n: usize, start: f64, step: f64) -> Vec<f64> {
    (0..n).map(|i| start + i as f64 * step).collect()
}

#[test]
fn exp_decay_recovers_noiseless_parameters() {
    let x = grid(80, 0.0, 0.15);
    let y: Vec<f64> = x.iter().map(|&t| exp_decay(t, 5.0, 3.0, 1.0)).collect();

    let fit = fit_model(ModelKind::ExpDecay, &x, &y, &[4.0, 2.0, 0.5], &FitOptions::default())
        .unwrap();
    assert_params_close(&fit, &[5.0, 3.0, 1.0], 1e-8);
    assert!(fit.std_errors.iter().all(|e| *e < 1e-6));
    assert_eq!(fit.dof, 77);
}

#[test]
fn noisy_gaussian_errors_cover_truth() {
    let mut rng = StdRng::seed_from_u64(42);
    let x = grid(121, -6.0, 0.1);
    let y: Vec<f64> = x
        .iter()
        .map(|&v| gaussian(v, 2.0, 0.3, 0.5, 1.2) + rng.random_range(-0.02..0.02))
        .collect();

    let guess = initial_guess(ModelKind::Gaussian, &x, &y, 1.0).unwrap();
    let fit = fit_model(ModelKind::Gaussian, &x, &y, &guess, &FitOptions::default()).unwrap();

    for ((&value, &error), truth) in fit.params.iter().zip(&fit.std_errors).zip([2.0, 0.3, 0.5, 1.2]) {
        assert!(error > 0.0);
        assert!(
            (value - truth).abs() < 5.0 * error,
            "{value} ± {error} vs {truth}"
        );
    }
    // uniform noise on ±0.02 has variance 0.02² / 3
    assert_relative_eq!(fit.reduced_chi2(), 0.02_f64.powi(2) / 3.0, max_relative = 0.3);
}

#[test]
fn lorentzian_half_maximum_at_half_width() {
    let v = lorentzian(1.0 + 0.75, 4.0, 0.0, 1.0, 1.5);
    assert_relative_eq!(v, 2.0, epsilon = 1e-12);
    assert_eq!(gaussian(0.7, 3.0, 0.0, 0.7, 1.0), 3.0);
}

#[test]
fn bounded_double_exponential() {
    let x = grid(200, 0.0, 0.1);
    let y: Vec<f64> = x
        .iter()
        .map(|&t| dbl_exp_decay(t, 3.0, 1.0, 0.5, 6.0, 0.2))
        .collect();
    let guess = [2.5, 1.2, 0.6, 5.0, 0.1];
    let options = FitOptions::builder()
        .bounds(tolerance_bounds(&guess, &[0.5, 0.5, 0.5, 0.5, 2.0]).unwrap())
        .build()
        .unwrap();

    let fit = fit_model(ModelKind::DblExpDecay, &x, &y, &guess, &options).unwrap();
    assert_params_close(&fit, &[3.0, 1.0, 0.5, 6.0, 0.2], 1e-4);
}

#[test]
fn rise_time_fit() {
    let x = grid(60, 0.0, 0.25);
    let y: Vec<f64> = x.iter().map(|&t| rise_time(t, 2.0, 1.0, 2.5)).collect();
    let fit = fit_model(ModelKind::RiseTime, &x, &y, &[1.5, 0.5, 2.0], &FitOptions::default())
        .unwrap();
    assert_params_close(&fit, &[2.0, 1.0, 2.5], 1e-6);
}

#[test]
fn lm_rejects_bounds_and_short_data_is_underdetermined() {
    let x = grid(10, 0.0, 1.0);
    let y: Vec<f64> = x.iter().map(|&t| exp_decay(t, 5.0, 3.0, 1.0)).collect();
    let bounded = FitOptions::builder()
        .method(FitMethod::LevenbergMarquardt)
        .bounds(tolerance_bounds(&[5.0, 3.0, 1.0], &[0.5]).unwrap())
        .build();
    assert!(matches!(
        bounded.and_then(|o| fit_model(ModelKind::ExpDecay, &x, &y, &[5.0, 3.0, 1.0], &o)),
        Err(SpecFitError::InvalidBounds(_))
    ));

    assert_eq!(
        fit_model(
            ModelKind::ExpDecay,
            &x[..3],
            &y[..3],
            &[5.0, 3.0, 1.0],
            &FitOptions::default()
        )
        .unwrap_err(),
        SpecFitError::FitDidNotConverge(FitFailure::Underdetermined {
            points: 3,
            params: 3
        })
    );
}

#[test]
fn n_gaussian_parameter_count_is_checked() {
    let x = grid(20, 0.0, 1.0);
    assert_eq!(
        fit_model(ModelKind::NGaussian(2), &x, &x, &[1.0; 6], &FitOptions::default()).unwrap_err(),
        SpecFitError::InvalidParameterCount {
            model: "n_gaussian(2)".into(),
            block: 4,
            got: 6
        }
    );
}
