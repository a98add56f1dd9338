//! Solving a single initial value problem.

use ndarray::prelude::*;
use ndarray::s;
use thiserror::Error;

use crate::dense::DenseOutput;
use crate::error::{ProblemError, SolveError};
use crate::field::VectorField;
use crate::integrator::Integrator;
use crate::options::Options;
use crate::rk::{RKMethod, RK45};
use crate::trajectory::{Stats, Trajectory};
use crate::OdeIntegrate;

/// A solve that stopped early.
///
/// `partial` holds the requested output times that were covered by the
/// accepted steps before `error` occurred. It is empty for errors detected
/// before integrating (invalid problem, output times out of range).
#[derive(Clone, Debug, Error, PartialEq)]
#[error("integration stopped: {error}")]
pub struct SolveFailure {
    pub partial: Trajectory,
    #[source]
    pub error: SolveError,
}

/// An initial value problem: `dy/dt = field(t, y; params)`, `y(t0) = y0`,
/// integrated over `[t0, t1]`.
pub struct IvpProblem<'a, V: ?Sized, P: ?Sized> {
    pub field: &'a V,
    pub params: &'a P,
    pub t0: f64,
    pub t1: f64,
    pub y0: Array1<f64>,
}

impl<'a, V, P> IvpProblem<'a, V, P>
where
    V: VectorField<P> + ?Sized,
    P: ?Sized,
{
    pub fn new(field: &'a V, params: &'a P, t0: f64, t1: f64, y0: Array1<f64>) -> Self {
        IvpProblem {
            field,
            params,
            t0,
            t1,
            y0,
        }
    }

    /// Solves the problem with the Dormand–Prince 5(4) method.
    pub fn solve(
        &self,
        output_times: ArrayView1<'_, f64>,
        options: &Options,
    ) -> Result<Trajectory, SolveFailure> {
        self.solve_with::<RK45>(output_times, options)
    }

    /// Solves the problem with the Runge–Kutta method `O`.
    pub fn solve_with<O: RKMethod>(
        &self,
        output_times: ArrayView1<'_, f64>,
        options: &Options,
    ) -> Result<Trajectory, SolveFailure> {
        let dim = self.y0.len();
        let fail = |error: SolveError| SolveFailure {
            partial: Trajectory::empty(dim, Stats::default()),
            error,
        };
        check_output_times(output_times, self.t0, self.t1).map_err(fail)?;

        let mut integrator = Integrator::<V, P, O>::new(
            self.field,
            self.params,
            self.t0,
            self.t1,
            self.y0.clone(),
            options,
        );
        let outcome = integrator.run_to_bound();
        let stats = integrator.stats();
        let dense = DenseOutput::new(integrator.records());

        match outcome {
            Ok(()) => {
                let states = dense.sample(output_times).map_err(fail)?;
                Ok(Trajectory::new(output_times.to_owned(), states, stats))
            }
            Err(error) => {
                let covered = dense.span().map_or(0, |(_, end)| {
                    output_times.iter().take_while(|&&t| t <= end).count()
                });
                let times = output_times.slice(s![..covered]);
                let partial = if covered == 0 {
                    Trajectory::empty(dim, stats)
                } else {
                    let states = dense.sample(times).map_err(fail)?;
                    Trajectory::new(times.to_owned(), states, stats)
                };
                Err(SolveFailure { partial, error })
            }
        }
    }
}

/// Solves `dy/dt = field(t, y; params)`, `y(t0) = y0` over `[t0, t1]` with the
/// Dormand–Prince 5(4) method and returns the solution at `output_times`.
///
/// `output_times` must be strictly increasing and lie within `[t0, t1]`;
/// otherwise nothing is integrated. On an integration failure the error comes
/// with the part of the trajectory computed before it.
///
/// ```
/// use lorenz_ivp::lorenz::{Lorenz, LorenzParams};
/// use lorenz_ivp::trajectory::linspace;
/// use lorenz_ivp::{solve_ivp, Options};
/// use ndarray::array;
///
/// let times = linspace(0., 40., 5000);
/// let traj = solve_ivp(
///     &Lorenz,
///     &LorenzParams::default(),
///     0.,
///     40.,
///     array![5., 1., 1.].view(),
///     times.view(),
///     &Options::default(),
/// )
/// .unwrap();
/// assert_eq!(traj.times(), times);
/// assert_eq!(traj.states().shape(), &[5000, 3]);
/// ```
pub fn solve_ivp<V, P>(
    field: &V,
    params: &P,
    t0: f64,
    t1: f64,
    y0: ArrayView1<'_, f64>,
    output_times: ArrayView1<'_, f64>,
    options: &Options,
) -> Result<Trajectory, SolveFailure>
where
    V: VectorField<P> + ?Sized,
    P: ?Sized,
{
    IvpProblem::new(field, params, t0, t1, y0.to_owned()).solve(output_times, options)
}

/// Checks the span and that `times` is strictly increasing within it.
pub(crate) fn check_output_times(
    times: ArrayView1<'_, f64>,
    t0: f64,
    t1: f64,
) -> Result<(), SolveError> {
    if !t0.is_finite() || !t1.is_finite() {
        return Err(ProblemError::SpanNotFinite.into());
    }
    if !(t1 > t0) {
        return Err(ProblemError::EmptySpan { t0, t_bound: t1 }.into());
    }
    let mut prev = std::f64::NEG_INFINITY;
    for (index, &t) in times.iter().enumerate() {
        if !(t >= t0 && t <= t1) {
            return Err(SolveError::OutOfRange { t, start: t0, end: t1 });
        }
        if !(t > prev) {
            return Err(SolveError::OutputTimesNotIncreasing { index });
        }
        prev = t;
    }
    Ok(())
}
