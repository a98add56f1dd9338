//! Stepping from the initial time to the boundary time.

use log::{debug, warn};
use ndarray::prelude::*;

use crate::error::SolveError;
use crate::field::VectorField;
use crate::options::Options;
use crate::rk::{RKMethod, RungeKutta, RK45};
use crate::trajectory::Stats;
use crate::OdeIntegrate;

/// Lifecycle of an [`Integrator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// No step taken yet.
    Initializing,
    Stepping,
    /// The boundary time has been reached.
    Completed,
    /// Stopped by an error; the records up to that point are kept.
    Failed,
}

/// One accepted point of the integration.
#[derive(Clone, Debug, PartialEq)]
pub struct StepRecord {
    pub t: f64,
    pub y: Array1<f64>,
    /// Derivative at `(t, y)`.
    pub dy: Array1<f64>,
    /// Size of the step that ended at `t`, zero for the initial point.
    pub h: f64,
    /// Scaled error norm of that step, zero for the initial point.
    pub error: f64,
}

/// Drives a [`RungeKutta`] stepper from `t0` to `t_bound`, recording every
/// accepted step.
///
/// The first call to `step()` evaluates the field at the initial point and
/// records it; each further call records one accepted step. Once
/// [`Status::Failed`], the integrator keeps returning the same error and its
/// records stay available.
pub struct Integrator<'a, V, P, O = RK45>
where
    V: VectorField<P> + ?Sized,
    P: ?Sized,
    O: RKMethod,
{
    field: &'a V,
    params: &'a P,
    options: &'a Options,
    t0: f64,
    t_bound: f64,
    y0: Array1<f64>,
    stepper: Option<RungeKutta<'a, V, P, O>>,
    records: Vec<StepRecord>,
    status: Status,
    error: Option<SolveError>,
}

impl<'a, V, P, O> Integrator<'a, V, P, O>
where
    V: VectorField<P> + ?Sized,
    P: ?Sized,
    O: RKMethod,
{
    pub fn new(
        field: &'a V,
        params: &'a P,
        t0: f64,
        t_bound: f64,
        y0: Array1<f64>,
        options: &'a Options,
    ) -> Integrator<'a, V, P, O> {
        Integrator {
            field,
            params,
            options,
            t0,
            t_bound,
            y0,
            stepper: None,
            records: Vec::new(),
            status: Status::Initializing,
            error: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Accepted points so far, in increasing time order.
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.records
    }

    /// The error that moved the integrator to [`Status::Failed`].
    pub fn error(&self) -> Option<&SolveError> {
        self.error.as_ref()
    }

    pub fn stats(&self) -> Stats {
        self.stepper
            .as_ref()
            .map(RungeKutta::stats)
            .unwrap_or_default()
    }

    fn initialize(&mut self) -> Result<(), SolveError> {
        let stepper = RungeKutta::new(
            self.field,
            self.params,
            self.t0,
            self.y0.clone(),
            self.t_bound,
            self.options,
        )?;
        debug!(
            "integrating over [{}, {}] with initial step {:e}",
            self.t0,
            self.t_bound,
            stepper.next_step_size()
        );
        self.records.push(StepRecord {
            t: self.t0,
            y: self.y0.clone(),
            dy: stepper.state_deriv().to_owned(),
            h: 0.,
            error: 0.,
        });
        self.stepper = Some(stepper);
        self.status = Status::Stepping;
        Ok(())
    }

    fn advance(&mut self) -> Result<(), SolveError> {
        let t = self.time();
        if self.options.is_cancelled() {
            return Err(SolveError::Cancelled { t });
        }
        if let Some(limit) = self.options.max_steps {
            if self.records.len() > limit {
                return Err(SolveError::TooManySteps { t, limit });
            }
        }

        let stepper = match self.stepper.as_mut() {
            Some(stepper) => stepper,
            None => return Ok(()),
        };
        stepper.step()?;
        self.records.push(StepRecord {
            t: stepper.time(),
            y: stepper.state().to_owned(),
            dy: stepper.state_deriv().to_owned(),
            h: stepper.step_size().unwrap_or(0.),
            error: stepper.error_norm().unwrap_or(0.),
        });

        if stepper.finished() {
            self.status = Status::Completed;
            let stats = stepper.stats();
            debug!(
                "reached t = {} after {} steps ({} rejected, {} evaluations)",
                self.t_bound, stats.accepted, stats.rejected, stats.nfev
            );
        }
        Ok(())
    }

    fn fail(&mut self, error: SolveError) -> SolveError {
        warn!(
            "integration failed after {} accepted points: {}",
            self.records.len(),
            error
        );
        self.status = Status::Failed;
        self.error = Some(error.clone());
        error
    }
}

impl<'a, V, P, O> OdeIntegrate for Integrator<'a, V, P, O>
where
    V: VectorField<P> + ?Sized,
    P: ?Sized,
    O: RKMethod,
{
    fn len(&self) -> usize {
        self.y0.len()
    }

    fn step(&mut self) -> Result<(), SolveError> {
        match self.status {
            Status::Initializing => self.initialize().map_err(|e| self.fail(e)),
            Status::Stepping => self.advance().map_err(|e| self.fail(e)),
            Status::Completed => Ok(()),
            Status::Failed => self.error.clone().map_or(Ok(()), Err),
        }
    }

    fn time(&self) -> f64 {
        self.stepper.as_ref().map_or(self.t0, |s| s.time())
    }

    fn time_bound(&self) -> f64 {
        self.t_bound
    }

    fn state(&self) -> ArrayView1<'_, f64> {
        match self.stepper.as_ref() {
            Some(stepper) => stepper.state(),
            None => self.y0.view(),
        }
    }

    fn finished(&self) -> bool {
        self.status == Status::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::from_fn;
    use crate::options::CancelToken;

    #[test]
    fn walks_through_states() {
        let field = from_fn(|_t, y, _: &(), mut dy| dy[0] = -y[0]);
        let opts = Options::default();
        let mut integrator: Integrator<'_, _, _> =
            Integrator::new(&field, &(), 0., 2., array![1.], &opts);
        assert_eq!(integrator.status(), Status::Initializing);
        integrator.step().unwrap();
        assert_eq!(integrator.status(), Status::Stepping);
        assert_eq!(integrator.records().len(), 1);
        assert_eq!(integrator.records()[0].dy, array![-1.]);
        integrator.run_to_bound().unwrap();
        assert_eq!(integrator.status(), Status::Completed);
        assert_eq!(integrator.time(), 2.);

        let records = integrator.records();
        assert_eq!(records.last().unwrap().t, 2.);
        for pair in records.windows(2) {
            assert!(pair[1].t > pair[0].t);
            assert_eq!(pair[1].t - pair[0].t, pair[1].h);
            assert!(pair[1].error <= 1.);
        }
        assert_eq!(integrator.stats().accepted, records.len() - 1);
    }

    #[test]
    fn failure_keeps_records() {
        let field = from_fn(|t, _y, _: &(), mut dy| {
            dy[0] = if t > 1. { std::f64::NAN } else { 1. }
        });
        let opts = Options::default().with_max_step(0.1);
        let mut integrator: Integrator<'_, _, _> =
            Integrator::new(&field, &(), 0., 3., array![0.], &opts);
        let err = integrator.run_to_bound().unwrap_err();
        assert!(matches!(err, SolveError::Evaluation { t, .. } if t > 1.));
        assert_eq!(integrator.status(), Status::Failed);
        assert_eq!(integrator.error(), Some(&err));
        let last = integrator.records().last().unwrap();
        assert!(last.t <= 1. && last.t > 0.8);
        // Stepping again reports the same failure.
        assert_eq!(integrator.step(), Err(err));
    }

    #[test]
    fn cancelled_before_first_step() {
        let field = from_fn(|_t, _y, _: &(), mut dy| dy[0] = 1.);
        let token = CancelToken::new();
        token.cancel();
        let opts = Options::default().with_cancel(token);
        let mut integrator: Integrator<'_, _, _> =
            Integrator::new(&field, &(), 0., 1., array![0.], &opts);
        assert_eq!(
            integrator.run_to_bound(),
            Err(SolveError::Cancelled { t: 0. })
        );
        assert_eq!(integrator.records().len(), 1);
    }

    #[test]
    fn step_limit() {
        let field = from_fn(|_t, y, _: &(), mut dy| dy[0] = -y[0]);
        let opts = Options::default().with_max_step(0.01).with_max_steps(10);
        let mut integrator: Integrator<'_, _, _> =
            Integrator::new(&field, &(), 0., 1., array![1.], &opts);
        let err = integrator.run_to_bound().unwrap_err();
        assert!(matches!(err, SolveError::TooManySteps { limit: 10, .. }));
        assert_eq!(integrator.records().len(), 11);
    }

    #[test]
    fn recorded_steps_grow_at_most_by_max_factor() {
        use crate::lorenz::{Lorenz, LorenzParams};

        let params = LorenzParams::default();
        for &max_factor in &[5., 1.5] {
            let opts = Options::default().with_step_factors(0.9, 0.2, max_factor);
            let mut integrator: Integrator<'_, _, _> =
                Integrator::new(&Lorenz, &params, 0., 40., array![5., 1., 1.], &opts);
            integrator.run_to_bound().unwrap();
            let steps: Vec<f64> = integrator.records()[1..].iter().map(|r| r.h).collect();
            for pair in steps.windows(2) {
                assert!(
                    pair[1] <= pair[0] * max_factor * (1. + 1e-9),
                    "step grew from {:e} to {:e}",
                    pair[0],
                    pair[1]
                );
            }
        }
    }
}
