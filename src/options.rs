//! Solver configuration.

use ndarray::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ProblemError;

/// Default relative tolerance.
pub const DEFAULT_RTOL: f64 = 1e-3;
/// Default absolute tolerance.
pub const DEFAULT_ATOL: f64 = 1e-6;
/// Multiply steps computed from asymptotic behaviour of errors by this.
pub const DEFAULT_SAFETY: f64 = 0.9;
/// Minimum allowed decrease in a step size.
pub const DEFAULT_MIN_FACTOR: f64 = 0.2;
/// Maximum allowed increase in a step size.
pub const DEFAULT_MAX_FACTOR: f64 = 5.;

/// A tolerance shared by all components, or one value per component.
///
/// An absolute tolerance of zero gives pure relative control for that
/// component; a component that sits exactly at zero is then accepted only if
/// its error is exactly zero too.
#[derive(Clone, Debug, PartialEq)]
pub enum Tolerance {
    Scalar(f64),
    Vector(Array1<f64>),
}

impl Tolerance {
    /// Expands the tolerance to one value per state component.
    pub fn broadcast(&self, len: usize) -> Result<Array1<f64>, ProblemError> {
        let tol = match self {
            Tolerance::Scalar(v) => Array1::from_elem(len, *v),
            Tolerance::Vector(v) if v.len() == len => v.clone(),
            Tolerance::Vector(_) => return Err(ProblemError::UnequalLengths),
        };
        if tol.iter().any(|&v| !(v >= 0.)) {
            return Err(ProblemError::NegativeTolerance);
        }
        Ok(tol)
    }
}

impl From<f64> for Tolerance {
    fn from(v: f64) -> Tolerance {
        Tolerance::Scalar(v)
    }
}

impl From<Array1<f64>> for Tolerance {
    fn from(v: Array1<f64>) -> Tolerance {
        Tolerance::Vector(v)
    }
}

impl From<Vec<f64>> for Tolerance {
    fn from(v: Vec<f64>) -> Tolerance {
        Tolerance::Vector(Array1::from(v))
    }
}

/// Cooperative cancellation flag, checked by the integrator between steps.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Requests every integration observing this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for [`solve_ivp`](crate::solve_ivp) and
/// [`solve_batch`](crate::solve_batch).
///
/// The solver keeps the local error estimates less than
/// `atol + rtol * abs(y)`. Here `rtol` controls a relative accuracy (number of
/// correct digits), while `atol` takes over for components that are
/// approximately below it.
#[derive(Clone, Debug)]
pub struct Options {
    /// Relative tolerance.
    pub rtol: Tolerance,
    /// Absolute tolerance.
    pub atol: Tolerance,
    /// Safety factor applied to the asymptotic step size estimate.
    pub safety: f64,
    /// Lower bound of the step size change factor.
    pub min_factor: f64,
    /// Upper bound of the step size change factor.
    pub max_factor: f64,
    /// Initial step size. Chosen automatically when `None`.
    pub first_step: Option<f64>,
    /// Maximum allowed step size.
    pub max_step: f64,
    /// Maximum number of accepted steps, unbounded when `None`.
    pub max_steps: Option<usize>,
    /// Checked before every step.
    pub cancel: Option<CancelToken>,
    /// Size of a dedicated thread pool for batches. `None` uses the global
    /// rayon pool.
    pub threads: Option<usize>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            rtol: Tolerance::Scalar(DEFAULT_RTOL),
            atol: Tolerance::Scalar(DEFAULT_ATOL),
            safety: DEFAULT_SAFETY,
            min_factor: DEFAULT_MIN_FACTOR,
            max_factor: DEFAULT_MAX_FACTOR,
            first_step: None,
            max_step: std::f64::INFINITY,
            max_steps: None,
            cancel: None,
            threads: None,
        }
    }
}

impl Options {
    pub fn with_rtol(mut self, rtol: impl Into<Tolerance>) -> Options {
        self.rtol = rtol.into();
        self
    }

    pub fn with_atol(mut self, atol: impl Into<Tolerance>) -> Options {
        self.atol = atol.into();
        self
    }

    /// Sets the safety factor and the bounds of the step size change factor.
    pub fn with_step_factors(mut self, safety: f64, min_factor: f64, max_factor: f64) -> Options {
        self.safety = safety;
        self.min_factor = min_factor;
        self.max_factor = max_factor;
        self
    }

    pub fn with_first_step(mut self, h: f64) -> Options {
        self.first_step = Some(h);
        self
    }

    pub fn with_max_step(mut self, h: f64) -> Options {
        self.max_step = h;
        self
    }

    pub fn with_max_steps(mut self, n: usize) -> Options {
        self.max_steps = Some(n);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Options {
        self.cancel = Some(token);
        self
    }

    pub fn with_threads(mut self, n: usize) -> Options {
        self.threads = Some(n);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancelToken::is_cancelled)
    }

    /// Checks the options that do not depend on the problem.
    pub(crate) fn validate(&self) -> Result<(), ProblemError> {
        if !(self.max_step > 0.) {
            return Err(ProblemError::MaxStepZeroOrNeg);
        }
        if let Some(h) = self.first_step {
            if !(h > 0.) || !h.is_finite() {
                return Err(ProblemError::FirstStepInvalid);
            }
        }
        if !(self.safety > 0. && self.safety <= 1.)
            || !(self.min_factor > 0. && self.min_factor <= 1.)
            || !(self.max_factor >= 1.)
        {
            return Err(ProblemError::InvalidStepFactors);
        }
        Ok(())
    }
}
