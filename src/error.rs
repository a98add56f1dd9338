use thiserror::Error;

/// Problems with the inputs of a solver, detected before any step is taken.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ProblemError {
    #[error("t0 and t_bound must be finite")]
    SpanNotFinite,
    #[error("t_bound {t_bound} must be greater than t0 {t0}")]
    EmptySpan { t0: f64, t_bound: f64 },
    #[error("max_step is zero or negative")]
    MaxStepZeroOrNeg,
    #[error("first_step must be positive and finite")]
    FirstStepInvalid,
    #[error("array arguments have unequal lengths")]
    UnequalLengths,
    #[error("tolerances must be non-negative")]
    NegativeTolerance,
    #[error("vector field expects a state of dimension {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("step size factors must satisfy 0 < min_factor <= 1 <= max_factor and 0 < safety <= 1")]
    InvalidStepFactors,
}

/// Reasons a solve can stop.
///
/// Equality compares the offending value of an `Evaluation` error by its bit
/// pattern, so an error carrying NaN equals its own clone.
#[derive(Clone, Debug, Error)]
pub enum SolveError {
    /// The vector field produced NaN or an infinity.
    #[error("vector field returned non-finite value {value} in component {component} at t = {t}")]
    Evaluation { t: f64, component: usize, value: f64 },
    /// The error tolerance could not be met with any representable step.
    #[error("required step size {required} is smaller than min allowable step size {allowable} at t = {t}")]
    StepSizeUnderflow { t: f64, required: f64, allowable: f64 },
    /// A sample was requested outside the integrated range.
    #[error("requested time {t} lies outside the covered range [{start}, {end}]")]
    OutOfRange { t: f64, start: f64, end: f64 },
    #[error("output times must be strictly increasing (index {index})")]
    OutputTimesNotIncreasing { index: usize },
    #[error("integration cancelled at t = {t}")]
    Cancelled { t: f64 },
    #[error("maximum number of steps ({limit}) exceeded at t = {t}")]
    TooManySteps { t: f64, limit: usize },
    #[error("thread pool error: {0}")]
    ThreadPool(String),
    #[error(transparent)]
    Problem(#[from] ProblemError),
}

impl PartialEq for SolveError {
    fn eq(&self, other: &Self) -> bool {
        use SolveError::*;
        match (self, other) {
            (
                Evaluation { t, component, value },
                Evaluation {
                    t: t2,
                    component: component2,
                    value: value2,
                },
            ) => t == t2 && component == component2 && value.to_bits() == value2.to_bits(),
            (
                StepSizeUnderflow { t, required, allowable },
                StepSizeUnderflow {
                    t: t2,
                    required: required2,
                    allowable: allowable2,
                },
            ) => t == t2 && required == required2 && allowable == allowable2,
            (OutOfRange { t, start, end }, OutOfRange { t: t2, start: start2, end: end2 }) => {
                t == t2 && start == start2 && end == end2
            }
            (OutputTimesNotIncreasing { index }, OutputTimesNotIncreasing { index: index2 }) => {
                index == index2
            }
            (Cancelled { t }, Cancelled { t: t2 }) => t == t2,
            (TooManySteps { t, limit }, TooManySteps { t: t2, limit: limit2 }) => {
                t == t2 && limit == limit2
            }
            (ThreadPool(a), ThreadPool(b)) => a == b,
            (Problem(a), Problem(b)) => a == b,
            _ => false,
        }
    }
}

impl SolveError {
    /// Returns `true` for errors raised while stepping, which leave a usable
    /// partial result behind.
    pub fn is_integration_failure(&self) -> bool {
        matches!(
            self,
            SolveError::Evaluation { .. }
                | SolveError::StepSizeUnderflow { .. }
                | SolveError::Cancelled { .. }
                | SolveError::TooManySteps { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_evaluation_error_equals_its_clone() {
        let err = SolveError::Evaluation {
            t: 1.5,
            component: 2,
            value: std::f64::NAN,
        };
        assert_eq!(err, err.clone());
        assert_ne!(
            err,
            SolveError::Evaluation {
                t: 1.5,
                component: 2,
                value: std::f64::INFINITY,
            }
        );
        assert_ne!(err, SolveError::Cancelled { t: 1.5 });
    }
}
