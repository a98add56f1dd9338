//! Runge–Kutta solvers.

use lazy_static::lazy_static;
use log::{trace, warn};
use ndarray::prelude::*;
use ndarray::{azip, s, FoldWhile, Zip};
use std::marker::PhantomData;

use crate::error::{ProblemError, SolveError};
use crate::field::{evaluate, VectorField};
use crate::options::Options;
use crate::trajectory::Stats;
use crate::OdeIntegrate;

/// Smallest relative tolerance the solver will honour.
const MIN_RTOL: f64 = 100. * std::f64::EPSILON;

/// Computes RMS norm of scaled values.
///
/// A zero value counts as zero even when its scale is zero, which happens for
/// a component that stays at zero under a zero absolute tolerance.
fn norm(x: ArrayView1<'_, f64>, scale: ArrayView1<'_, f64>) -> f64 {
    debug_assert_eq!(x.len(), scale.len());
    if x.is_empty() {
        return 0.;
    }
    (Zip::from(x)
        .and(scale)
        .fold_while(0., |acc, &x, &scale| {
            let scaled = if x == 0. { 0. } else { x / scale };
            FoldWhile::Continue(acc + scaled * scaled)
        })
        .into_inner()
        / x.len() as f64)
        .sqrt()
}

/// Empirically select a good initial step.
///
/// The algorithm is described in (ref 1).
///
/// # Parameters
///
/// * field, params: Right-hand side of the system.
/// * t0: Initial value of the independent variable.
/// * y0: Initial value of the dependent variable.
/// * f0: Initial value of the derivative, i.e. the result of evaluating the
///   field at `t0` and `y0`.
/// * interval_length: Length of the integration span. Neither the trial
///   evaluation nor the returned step goes beyond it.
/// * order: Method order.
/// * rtol: Desired relative tolerance.
/// * atol: Desired absolute tolerance.
///
/// # Returns
///
/// Absolute value of the suggested initial step.
///
/// # References
///
/// 1. E. Hairer, S. P. Norsett G. Wanner, "Solving Ordinary Differential
///    Equations I: Nonstiff Problems", Sec. II.4.
fn select_initial_step<V, P>(
    field: &V,
    params: &P,
    t0: f64,
    y0: ArrayView1<'_, f64>,
    f0: ArrayView1<'_, f64>,
    interval_length: f64,
    order: usize,
    rtol: ArrayView1<'_, f64>,
    atol: ArrayView1<'_, f64>,
    stats: &mut Stats,
) -> Result<f64, SolveError>
where
    V: VectorField<P> + ?Sized,
    P: ?Sized,
{
    if y0.is_empty() {
        return Ok(std::f64::INFINITY);
    }

    let scale = &y0.mapv(f64::abs) * &rtol + &atol;
    let d0 = norm(y0, scale.view());
    let d1 = norm(f0, scale.view());
    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    }
    .min(interval_length);

    let y1 = h0 * &f0 + &y0;
    let mut f1 = Array1::zeros(y0.len());
    stats.nfev += 1;
    evaluate(field, params, t0 + h0, y1.view(), f1.view_mut())?;
    let d2 = norm((&f1 - &f0).view(), scale.view()) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1. / (order as f64 + 1.))
    };

    Ok((100. * h0).min(h1).min(interval_length))
}

/// Computes the next representable floating-point value following `x` in the
/// direction of `y`.
///
/// Special cases:
///
/// * If `x` equals `y`, then `y` is returned.
/// * If `x` or `y` is NAN, a NAN is returned.
///
/// There is no special handling for overflow of finite values to ±∞ or
/// subnormals.
fn next_after(x: f64, y: f64) -> f64 {
    if x.is_nan() || y.is_nan() {
        std::f64::NAN
    } else if x == y {
        y
    } else if x == 0. {
        if y < 0. {
            -f64::from_bits(1)
        } else {
            f64::from_bits(1)
        }
    } else if (y > x) == (x > 0.) {
        f64::from_bits(x.to_bits().wrapping_add(1))
    } else {
        f64::from_bits(x.to_bits().wrapping_sub(1))
    }
}

/// Adaptive explicit Runge–Kutta stepper.
///
/// Each call to [`OdeIntegrate::step`] performs one accepted step: candidate
/// steps whose error norm exceeds one are rejected and retried with a smaller
/// step size at the same time until one is accepted, or until the step size
/// falls below the spacing of floating-point numbers around `t`.
pub struct RungeKutta<'a, V, P, O>
where
    V: VectorField<P> + ?Sized,
    P: ?Sized,
    O: RKMethod,
{
    field: &'a V,
    params: &'a P,
    method: PhantomData<O>,
    /// Current time.
    t: f64,
    /// Current state.
    y: Array1<f64>,
    /// Derivative at the current time and state.
    f: Array1<f64>,
    /// Previous time, or `None` if there haven't been any steps.
    t_old: Option<f64>,
    /// Boundary time.
    t_bound: f64,
    /// Maximum step size.
    max_step: f64,
    /// Initial step size for next `.step()`.
    h_abs: f64,
    /// Relative tolerance.
    rtol: Array1<f64>,
    /// Absolute tolerance.
    atol: Array1<f64>,
    safety: f64,
    min_factor: f64,
    max_factor: f64,
    /// Storage array for Runge Kutta stages, shape `O::NUM_STAGES + 1, self.len()`.
    k: Array2<f64>,
    /// Error norm of the last accepted step.
    error_norm: Option<f64>,
    stats: Stats,
}

impl<'a, V, P, O> RungeKutta<'a, V, P, O>
where
    V: VectorField<P> + ?Sized,
    P: ?Sized,
    O: RKMethod,
{
    /// Creates a new `RungeKutta` solver.
    ///
    /// # Parameters
    ///
    /// * `field`, `params`: Right-hand side of the system and its parameters.
    ///
    /// * `t0`: Initial value of the independent variable.
    ///
    /// * `y0`: Initial values of the dependent variable.
    ///
    /// * `t_bound`: Boundary time: the integration won't continue beyond
    ///   it. Must be greater than `t0`.
    ///
    /// * `options`: Tolerances and step size control, see [`Options`].
    ///
    /// Evaluates the field once at `(t0, y0)`, and once more to pick the
    /// initial step unless `options.first_step` is set.
    pub fn new(
        field: &'a V,
        params: &'a P,
        t0: f64,
        y0: Array1<f64>,
        t_bound: f64,
        options: &Options,
    ) -> Result<RungeKutta<'a, V, P, O>, SolveError> {
        options.validate()?;
        if !t0.is_finite() || !t_bound.is_finite() {
            return Err(ProblemError::SpanNotFinite.into());
        }
        if !(t_bound > t0) {
            return Err(ProblemError::EmptySpan { t0, t_bound }.into());
        }
        if let Some(expected) = field.dimension() {
            if expected != y0.len() {
                return Err(ProblemError::DimensionMismatch {
                    expected,
                    found: y0.len(),
                }
                .into());
            }
        }
        let n = y0.len();
        let mut rtol = options.rtol.broadcast(n)?;
        let atol = options.atol.broadcast(n)?;
        if rtol.iter().any(|&tol| tol < MIN_RTOL) {
            warn!("rtol below {:e} is too small, raising it to that value", MIN_RTOL);
            rtol.mapv_inplace(|tol| tol.max(MIN_RTOL));
        }

        let mut stats = Stats::default();
        let mut f = Array1::zeros(n);
        stats.nfev += 1;
        evaluate(field, params, t0, y0.view(), f.view_mut())?;

        let h_abs = match options.first_step {
            Some(h) => h,
            None => select_initial_step(
                field,
                params,
                t0,
                y0.view(),
                f.view(),
                t_bound - t0,
                O::ORDER,
                rtol.view(),
                atol.view(),
                &mut stats,
            )?,
        };

        Ok(RungeKutta {
            field,
            params,
            method: PhantomData,
            t: t0,
            y: y0,
            f,
            t_old: None,
            t_bound,
            max_step: options.max_step,
            h_abs,
            rtol,
            atol,
            safety: options.safety,
            min_factor: options.min_factor,
            max_factor: options.max_factor,
            k: Array2::zeros((O::NUM_STAGES + 1, n)),
            error_norm: None,
            stats,
        })
    }

    /// Current state derivative.
    pub fn state_deriv(&self) -> ArrayView1<'_, f64> {
        self.f.view()
    }

    /// Size of last successful step or `None` if no steps were made yet.
    pub fn step_size(&self) -> Option<f64> {
        self.t_old.map(|t_old| self.t - t_old)
    }

    /// Step size that the next `.step()` will try first.
    pub fn next_step_size(&self) -> f64 {
        self.h_abs.min(self.max_step)
    }

    /// Scaled error norm of the last successful step.
    pub fn error_norm(&self) -> Option<f64> {
        self.error_norm
    }

    /// Evaluation and step counters.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Perform a single Runge–Kutta step.
    ///
    /// Computes the prediction of the higher order method, its derivative
    /// (stored in the last row of `k`) and the error estimate of the embedded
    /// lower order method. Notation for Butcher tableau is as in (ref 1).
    ///
    /// # References
    ///
    /// 1. E. Hairer, S. P. Norsett G. Wanner, "Solving Ordinary Differential
    ///    Equations I: Nonstiff Problems", Sec. II.4.
    fn step_by(&mut self, h: f64) -> Result<StepOutput, SolveError> {
        self.k.row_mut(0).assign(&self.f);
        for (s, (a, &c)) in O::a().iter().zip(O::c()).enumerate() {
            let dy = self.k.slice(s![..s + 1, ..]).t().dot(a) * h;
            let y_stage = dy + &self.y;
            self.stats.nfev += 1;
            evaluate(
                self.field,
                self.params,
                self.t + c * h,
                y_stage.view(),
                self.k.row_mut(s + 1),
            )?;
        }

        let y_new = self.k.slice(s![..-1, ..]).t().dot(&O::b()) * h + &self.y;
        self.stats.nfev += 1;
        evaluate(
            self.field,
            self.params,
            self.t + h,
            y_new.view(),
            self.k.row_mut(O::NUM_STAGES),
        )?;

        let error = self.k.t().dot(&O::e()) * h;

        Ok(StepOutput { y_new, error })
    }
}

struct StepOutput {
    /// Solution at `t + h` computed with higher accuracy.
    y_new: Array1<f64>,
    /// Error estimate of less accurate method.
    error: Array1<f64>,
}

impl<'a, V, P, O> OdeIntegrate for RungeKutta<'a, V, P, O>
where
    V: VectorField<P> + ?Sized,
    P: ?Sized,
    O: RKMethod,
{
    fn len(&self) -> usize {
        self.y.len()
    }

    fn step(&mut self) -> Result<(), SolveError> {
        let min_step = 10. * (next_after(self.t, std::f64::INFINITY) - self.t).abs();
        let exponent = -1. / (O::ORDER as f64 + 1.);

        let mut h_abs = self.h_abs.min(self.max_step).max(min_step);
        let mut rejected = false;

        let mut scale = Array1::zeros(self.y.len());
        loop {
            // Update `h_abs` and calculate `t_new` and `h`.
            if h_abs < min_step {
                return Err(SolveError::StepSizeUnderflow {
                    t: self.t,
                    required: h_abs,
                    allowable: min_step,
                });
            }
            let t_new = if h_abs >= self.t_bound - self.t {
                self.t_bound
            } else {
                self.t + h_abs
            };
            let h = t_new - self.t;
            h_abs = h;

            // Perform step and calculate error norm.
            let StepOutput { y_new, error } = self.step_by(h)?;
            azip!((scale in &mut scale, &y in &self.y, &yn in &y_new, &atol in &self.atol, &rtol in &self.rtol)
                *scale = atol + y.abs().max(yn.abs()) * rtol);
            let error_norm = norm(error.view(), scale.view());

            // Accept or reject step based on error norm.
            if error_norm <= 1. {
                let mut factor = if error_norm == 0. {
                    self.max_factor
                } else {
                    (self.safety * error_norm.powf(exponent))
                        .max(self.min_factor)
                        .min(self.max_factor)
                };
                if rejected {
                    factor = factor.min(1.);
                }
                self.t_old = Some(self.t);
                self.t = t_new;
                self.y = y_new;
                self.f.assign(&self.k.row(O::NUM_STAGES));
                self.h_abs = h_abs * factor;
                self.error_norm = Some(error_norm);
                self.stats.accepted += 1;
                return Ok(());
            }

            trace!(
                "rejected step of size {:e} at t = {} (error norm {:e})",
                h,
                self.t,
                error_norm
            );
            self.stats.rejected += 1;
            rejected = true;
            // `f64::max` ignores a NaN norm, shrinking by `min_factor`.
            h_abs *= (self.safety * error_norm.powf(exponent)).max(self.min_factor);
        }
    }

    fn time(&self) -> f64 {
        self.t
    }

    fn time_bound(&self) -> f64 {
        self.t_bound
    }

    fn state(&self) -> ArrayView1<'_, f64> {
        self.y.view()
    }
}

pub trait RKMethod {
    /// Order of the error estimator. Step sizes are adapted assuming a local
    /// error of order `ORDER + 1`.
    const ORDER: usize;

    /// Number of stages in the method.
    const NUM_STAGES: usize;

    /// Coefficients for incrementing time for consecutive RK stages, length
    /// `NUM_STAGES - 1`.
    ///
    /// The value for the first stage is always zero, so it is not included.
    fn c() -> ArrayView1<'static, f64>;

    /// Coefficients for combining previous RK stages to compute the next
    /// stage, length `NUM_STAGES - 1`.
    ///
    /// For explicit methods the coefficients above the main diagonal are
    /// zeros, so `a` is stored as a list of arrays of increasing lengths. The
    /// first stage is always just `f`, thus no coefficients for it are
    /// required.
    fn a() -> &'static [ArrayView1<'static, f64>];

    /// Coefficients for combining RK stages for computing the final
    /// prediction, length `NUM_STAGES`.
    fn b() -> ArrayView1<'static, f64>;

    /// Coefficients for estimating the error of a less accurate method, length
    /// `NUM_STAGES + 1`.
    ///
    /// They are computed as the difference between `b`'s in an extended
    /// tableau.
    fn e() -> ArrayView1<'static, f64>;
}

/// Explicit Runge–Kutta method of order 3(2).
///
/// The Bogacki-Shampine pair of formulas is used (ref 1). The error is
/// controlled assuming 2nd order accuracy, but steps are taken using a 3rd
/// order accurate formula (local extrapolation is done).
///
/// # References
///
/// 1. P. Bogacki, L.F. Shampine, "A 3(2) Pair of Runge-Kutta Formulas",
///    Appl. Math. Lett. Vol. 2, No. 4. pp. 321-325, 1989.
pub struct RK23;

impl RKMethod for RK23 {
    const ORDER: usize = 2;

    const NUM_STAGES: usize = 3;

    fn c() -> ArrayView1<'static, f64> {
        aview1(&[1. / 2., 3. / 4.])
    }

    fn a() -> &'static [ArrayView1<'static, f64>] {
        lazy_static! {
            static ref A: [ArrayView1<'static, f64>; 3 - 1] = [
                aview1(&[1. / 2.]),
                aview1(&[0., 3. / 4.]),
            ];
        }
        &*A
    }

    fn b() -> ArrayView1<'static, f64> {
        aview1(&[2. / 9., 1. / 3., 4. / 9.])
    }

    fn e() -> ArrayView1<'static, f64> {
        aview1(&[5. / 72., -1. / 12., -1. / 9., 1. / 8.])
    }
}

/// Explicit Runge–Kutta method of order 5(4).
///
/// The Dormand-Prince pair of formulas is used (ref 1). The error is
/// controlled assuming 4th order accuracy, but steps are taken using a 5th
/// order accurate formula (local extrapolation is done). The last stage is
/// evaluated at the new point, so it doubles as the first stage of the next
/// step.
///
/// # References
///
/// 1. J. R. Dormand, P. J. Prince, "A family of embedded Runge-Kutta
///    formulae", Journal of Computational and Applied Mathematics, Vol. 6, No.
///    1, pp. 19-26, 1980.
pub struct RK45;

impl RKMethod for RK45 {
    const ORDER: usize = 4;

    const NUM_STAGES: usize = 6;

    fn c() -> ArrayView1<'static, f64> {
        aview1(&[1. / 5., 3. / 10., 4. / 5., 8. / 9., 1.])
    }

    fn a() -> &'static [ArrayView1<'static, f64>] {
        lazy_static! {
            static ref A: [ArrayView1<'static, f64>; 6 - 1] = [
                aview1(&[1. / 5.]),
                aview1(&[3. / 40., 9. / 40.]),
                aview1(&[44. / 45., -56. / 15., 32. / 9.]),
                aview1(&[19372. / 6561., -25360. / 2187., 64448. / 6561., -212. / 729.]),
                aview1(&[9017. / 3168., -355. / 33., 46732. / 5247., 49. / 176., -5103. / 18656.]),
            ];
        }
        &*A
    }

    fn b() -> ArrayView1<'static, f64> {
        aview1(&[35. / 384., 0., 500. / 1113., 125. / 192., -2187. / 6784., 11. / 84.])
    }

    fn e() -> ArrayView1<'static, f64> {
        aview1(&[
            -71. / 57600.,
            0.,
            71. / 16695.,
            -71. / 1920.,
            17253. / 339200.,
            -22. / 525.,
            1. / 40.,
        ])
    }
}
