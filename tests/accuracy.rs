use ndarray::prelude::*;

use lorenz_ivp::field::from_fn;
use lorenz_ivp::trajectory::linspace;
use lorenz_ivp::{solve_ivp, Options};

/// Largest deviation from e^(-t) on [0, 5] at tolerance `tol`.
fn decay_error(tol: f64) -> f64 {
    let field = from_fn(|_t, y, _: &(), mut dy| dy[0] = -y[0]);
    let times = linspace(0., 5., 101);
    let traj = solve_ivp(
        &field,
        &(),
        0.,
        5.,
        array![1.].view(),
        times.view(),
        &Options::default().with_rtol(tol).with_atol(tol),
    )
    .unwrap();
    traj.iter()
        .map(|(t, y)| (y[0] - (-t).exp()).abs())
        .fold(0., f64::max)
}

#[test]
fn error_shrinks_with_tolerance() {
    let errors: Vec<f64> = [1e-4, 1e-5, 1e-6, 1e-7, 1e-8]
        .iter()
        .map(|&tol| decay_error(tol))
        .collect();
    for pair in errors.windows(2) {
        assert!(pair[1] < pair[0], "errors not decreasing: {:?}", errors);
    }
    // Three decades of tolerance: tol^(4/5) predicts a ratio of about 250.
    let ratio = errors[1] / errors[4];
    assert!(ratio > 100. && ratio < 1e3, "ratio {} ({:?})", ratio, errors);
    assert!(errors[4] < 1e-6);
}

#[test]
fn loose_tolerance_is_still_bounded() {
    let err = decay_error(1e-3);
    assert!(err < 1e-2, "error {}", err);
}
