//! Dense output: the solution between accepted steps.

use ndarray::prelude::*;
use ndarray::azip;

use crate::error::SolveError;
use crate::integrator::StepRecord;

/// Continuous extension of a sequence of accepted steps.
///
/// Between two records the solution is the cubic Hermite polynomial matching
/// both states and both derivatives; at a record it is the recorded state.
#[derive(Clone, Copy, Debug)]
pub struct DenseOutput<'r> {
    records: &'r [StepRecord],
}

impl<'r> DenseOutput<'r> {
    /// `records` must be in strictly increasing time order, as produced by an
    /// [`Integrator`](crate::integrator::Integrator).
    pub fn new(records: &'r [StepRecord]) -> DenseOutput<'r> {
        debug_assert!(records.windows(2).all(|w| w[1].t > w[0].t));
        DenseOutput { records }
    }

    /// Covered time range, or `None` if there are no records.
    pub fn span(&self) -> Option<(f64, f64)> {
        Some((self.records.first()?.t, self.records.last()?.t))
    }

    /// Dimension of the states.
    pub fn dim(&self) -> usize {
        self.records.first().map_or(0, |r| r.y.len())
    }

    /// Solution at time `t`.
    pub fn evaluate(&self, t: f64) -> Result<Array1<f64>, SolveError> {
        let mut y = Array1::zeros(self.dim());
        self.evaluate_into(t, y.view_mut())?;
        Ok(y)
    }

    /// Writes the solution at time `t` into `out`.
    pub fn evaluate_into(&self, t: f64, mut out: ArrayViewMut1<'_, f64>) -> Result<(), SolveError> {
        let (start, end) = self.span().ok_or(SolveError::OutOfRange {
            t,
            start: std::f64::NAN,
            end: std::f64::NAN,
        })?;
        if !(t >= start && t <= end) {
            return Err(SolveError::OutOfRange { t, start, end });
        }

        let i = self.records.partition_point(|r| r.t < t);
        let right = &self.records[i];
        if right.t == t {
            out.assign(&right.y);
        } else {
            hermite(&self.records[i - 1], right, t, out);
        }
        Ok(())
    }

    /// Solution at each of `times`, one row per time.
    pub fn sample(&self, times: ArrayView1<'_, f64>) -> Result<Array2<f64>, SolveError> {
        let mut states = Array2::zeros((times.len(), self.dim()));
        for (&t, row) in times.iter().zip(states.rows_mut()) {
            self.evaluate_into(t, row)?;
        }
        Ok(states)
    }
}

/// Cubic Hermite interpolation between `left` and `right` at `t`.
fn hermite(left: &StepRecord, right: &StepRecord, t: f64, out: ArrayViewMut1<'_, f64>) {
    let h = right.t - left.t;
    let s = (t - left.t) / h;
    let s2 = s * s;
    let s3 = s2 * s;

    let h00 = 2. * s3 - 3. * s2 + 1.;
    let h10 = (s3 - 2. * s2 + s) * h;
    let h01 = -2. * s3 + 3. * s2;
    let h11 = (s3 - s2) * h;

    azip!((out in out, &y0 in &left.y, &d0 in &left.dy, &y1 in &right.y, &d1 in &right.dy)
        *out = h00 * y0 + h10 * d0 + h01 * y1 + h11 * d1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Records of y = t³ - t, which cubic Hermite interpolation reproduces
    /// exactly.
    fn cubic_records() -> Vec<StepRecord> {
        [0., 1., 2.5]
            .iter()
            .map(|&t: &f64| StepRecord {
                t,
                y: array![t.powi(3) - t],
                dy: array![3. * t * t - 1.],
                h: 0.,
                error: 0.,
            })
            .collect()
    }

    #[test]
    fn reproduces_cubic() {
        let records = cubic_records();
        let dense = DenseOutput::new(&records);
        for &t in &[0.25, 0.5, 1.3, 2.2] {
            assert_relative_eq!(dense.evaluate(t).unwrap()[0], t * t * t - t, epsilon = 1e-12);
        }
    }

    #[test]
    fn exact_at_records() {
        let records = cubic_records();
        let dense = DenseOutput::new(&records);
        assert_eq!(dense.evaluate(1.).unwrap(), records[1].y);
        assert_eq!(dense.evaluate(2.5).unwrap(), records[2].y);
        assert_eq!(dense.span(), Some((0., 2.5)));
    }

    #[test]
    fn out_of_range() {
        let records = cubic_records();
        let dense = DenseOutput::new(&records);
        assert_eq!(
            dense.evaluate(2.6),
            Err(SolveError::OutOfRange {
                t: 2.6,
                start: 0.,
                end: 2.5
            })
        );
        assert!(dense.sample(array![0.5, -0.1].view()).is_err());
        assert!(DenseOutput::new(&[]).evaluate(0.).is_err());
    }

    #[test]
    fn sample_rows_follow_times() {
        let records = cubic_records();
        let states = DenseOutput::new(&records)
            .sample(array![0., 1., 2.].view())
            .unwrap();
        assert_eq!(states.shape(), &[3, 1]);
        assert_relative_eq!(states[[2, 0]], 6., epsilon = 1e-12);
    }
}
