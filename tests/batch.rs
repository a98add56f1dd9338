use ndarray::prelude::*;

use lorenz_ivp::field::from_fn;
use lorenz_ivp::lorenz::{Lorenz, LorenzParams};
use lorenz_ivp::trajectory::linspace;
use lorenz_ivp::{
    solve_batch, solve_ivp, CancelToken, Options, ProblemError, SolveError,
};

fn close_initial_states() -> Vec<Array1<f64>> {
    vec![
        array![5., 5., 5.],
        array![5.1, 5.1, 5.2],
        array![4.8, 5., 4.8],
    ]
}

#[test]
fn three_lorenz_trajectories() {
    let times = linspace(0., 60., 3000);
    let set = solve_batch(
        &Lorenz,
        &LorenzParams::default(),
        0.,
        60.,
        &close_initial_states(),
        times.view(),
        &Options::default(),
    )
    .unwrap();
    assert_eq!(set.len(), 3);
    assert!(set.all_complete());
    for (i, y0) in close_initial_states().iter().enumerate() {
        let traj = set.trajectory(i).unwrap();
        assert_eq!(traj.times(), times);
        assert_eq!(traj.get(0).unwrap().1, *y0);
        // Each run is the same as solving it alone.
        let alone = solve_ivp(
            &Lorenz,
            &LorenzParams::default(),
            0.,
            60.,
            y0.view(),
            times.view(),
            &Options::default(),
        )
        .unwrap();
        assert_eq!(traj, &alone);
    }
}

#[test]
fn dedicated_pool_gives_same_results() {
    let times = linspace(0., 20., 500);
    let run = |opts: &Options| {
        solve_batch(
            &Lorenz,
            &LorenzParams::default(),
            0.,
            20.,
            &close_initial_states(),
            times.view(),
            opts,
        )
        .unwrap()
    };
    assert_eq!(run(&Options::default()), run(&Options::default().with_threads(2)));
}

#[test]
fn failure_is_isolated() {
    // Decay that breaks down past t = 5 for runs tagged by a negative third
    // component. The tag is constant, so stage states never change its sign.
    let field = from_fn(|t, y, _: &(), mut dy| {
        dy[0] = if t > 5. && y[2] < 0. {
            std::f64::NAN
        } else {
            -y[0]
        };
        dy[1] = -y[1];
        dy[2] = 0.;
    });
    let times = linspace(0., 10., 101);
    let set = solve_batch(
        &field,
        &(),
        0.,
        10.,
        &[array![1., 1., 1.], array![-1., 1., -1.], array![2., 2., 1.]],
        times.view(),
        &Options::default(),
    )
    .unwrap();

    assert!(set.is_complete(0));
    assert!(!set.is_complete(1));
    assert!(set.is_complete(2));
    assert_eq!(set.trajectory(0).unwrap().len(), 101);
    assert_eq!(set.trajectory(2).unwrap().len(), 101);

    let failures: Vec<_> = set.failures().collect();
    assert_eq!(failures.len(), 1);
    let (index, failure) = failures[0];
    assert_eq!(index, 1);
    assert!(matches!(
        failure.error,
        SolveError::Evaluation { t, component: 0, .. } if t > 5.
    ));
    let partial = &failure.partial;
    assert!(!partial.is_empty());
    assert!(partial.len() <= 51);
    assert_eq!(partial.times(), times.slice(s![..partial.len()]));
    let (t_last, y_last) = partial.last().unwrap();
    assert!(t_last <= 5.);
    assert!((y_last[0] + (-t_last).exp()).abs() < 1e-3);
}

#[test]
fn shared_input_errors_abort_the_batch() {
    let err = solve_batch(
        &Lorenz,
        &LorenzParams::default(),
        0.,
        10.,
        &close_initial_states(),
        array![0., 5., 10.5].view(),
        &Options::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        SolveError::OutOfRange {
            t: 10.5,
            start: 0.,
            end: 10.
        }
    );

    let err = solve_batch(
        &Lorenz,
        &LorenzParams::default(),
        0.,
        10.,
        &close_initial_states(),
        array![0., 5.].view(),
        &Options::default().with_max_step(-1.),
    )
    .unwrap_err();
    assert_eq!(err, SolveError::Problem(ProblemError::MaxStepZeroOrNeg));
}

#[test]
fn per_run_dimension_mismatch() {
    let set = solve_batch(
        &Lorenz,
        &LorenzParams::default(),
        0.,
        1.,
        &[array![1., 1., 1.], array![1., 1.]],
        array![0., 1.].view(),
        &Options::default(),
    )
    .unwrap();
    assert!(set.is_complete(0));
    let failure = set.get(1).unwrap().as_ref().unwrap_err();
    assert_eq!(
        failure.error,
        SolveError::Problem(ProblemError::DimensionMismatch {
            expected: 3,
            found: 2
        })
    );
}

#[test]
fn cancelled_batch_keeps_initial_points() {
    let token = CancelToken::new();
    token.cancel();
    let set = solve_batch(
        &Lorenz,
        &LorenzParams::default(),
        0.,
        60.,
        &close_initial_states(),
        linspace(0., 60., 3000).view(),
        &Options::default().with_cancel(token),
    )
    .unwrap();
    assert_eq!(set.failures().count(), 3);
    for run in &set {
        let failure = run.as_ref().unwrap_err();
        assert_eq!(failure.error, SolveError::Cancelled { t: 0. });
        assert_eq!(failure.partial.len(), 1);
    }
}
