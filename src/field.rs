//! Right-hand sides of ODE systems.

use ndarray::prelude::*;
use std::marker::PhantomData;

use crate::error::SolveError;

/// Right-hand side `dy/dt = f(t, y; params)` of an ODE system.
///
/// Implementations must be pure: the same inputs always fill `dy` with the
/// same values, and no state is shared between calls. The parameters are
/// passed at every call rather than stored, so one field can be evaluated for
/// several trajectories at once.
pub trait VectorField<P: ?Sized> {
    /// Fills `dy` with the derivative of `y` at time `t`.
    fn eval(&self, t: f64, y: ArrayView1<'_, f64>, params: &P, dy: ArrayViewMut1<'_, f64>);

    /// Required state dimension, or `None` if any dimension is accepted.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

/// Vector field backed by a closure. Created with [`from_fn`].
pub struct FnField<P: ?Sized, F> {
    f: F,
    params: PhantomData<fn(&P)>,
}

/// Wraps a closure `f(t, y, params, dy)` as a [`VectorField`].
///
/// ```
/// use lorenz_ivp::field::{from_fn, VectorField};
/// use ndarray::array;
///
/// let decay = from_fn(|_t, y, rate: &f64, mut dy| dy[0] = -rate * y[0]);
/// let mut dy = array![0.];
/// decay.eval(0., array![2.].view(), &0.5, dy.view_mut());
/// assert_eq!(dy[0], -1.);
/// ```
pub fn from_fn<P, F>(f: F) -> FnField<P, F>
where
    P: ?Sized,
    F: Fn(f64, ArrayView1<'_, f64>, &P, ArrayViewMut1<'_, f64>),
{
    FnField {
        f,
        params: PhantomData,
    }
}

impl<P, F> VectorField<P> for FnField<P, F>
where
    P: ?Sized,
    F: Fn(f64, ArrayView1<'_, f64>, &P, ArrayViewMut1<'_, f64>),
{
    fn eval(&self, t: f64, y: ArrayView1<'_, f64>, params: &P, dy: ArrayViewMut1<'_, f64>) {
        (self.f)(t, y, params, dy)
    }
}

/// Evaluates `field` and checks that every component of the result is finite.
pub(crate) fn evaluate<V, P>(
    field: &V,
    params: &P,
    t: f64,
    y: ArrayView1<'_, f64>,
    mut dy: ArrayViewMut1<'_, f64>,
) -> Result<(), SolveError>
where
    V: VectorField<P> + ?Sized,
    P: ?Sized,
{
    field.eval(t, y, params, dy.view_mut());
    match dy.iter().position(|v| !v.is_finite()) {
        Some(component) => Err(SolveError::Evaluation {
            t,
            component,
            value: dy[component],
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_reports_first_non_finite_component() {
        let field = from_fn(|_t, _y, _: &(), mut dy| {
            dy[0] = 1.;
            dy[1] = std::f64::INFINITY;
            dy[2] = std::f64::NAN;
        });
        let y = Array1::zeros(3);
        let mut dy = Array1::zeros(3);
        let err = evaluate(&field, &(), 2.5, y.view(), dy.view_mut()).unwrap_err();
        match err {
            SolveError::Evaluation { t, component, value } => {
                assert_eq!(t, 2.5);
                assert_eq!(component, 1);
                assert!(value.is_infinite());
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn closures_accept_any_dimension() {
        let field = from_fn(|_t, _y, _: &(), _dy| {});
        assert_eq!(VectorField::<()>::dimension(&field), None);
    }
}
