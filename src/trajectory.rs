//! Sampled solutions.

use ndarray::prelude::*;
use ndarray::s;

/// Work done by the solver for one trajectory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Number of vector field evaluations.
    pub nfev: usize,
    /// Number of accepted steps.
    pub accepted: usize,
    /// Number of rejected steps.
    pub rejected: usize,
}

/// States of one solution at the requested output times.
///
/// Row `i` of [`states`](Trajectory::states) is the state at `times[i]`.
/// A trajectory is a finite sequence of `(t, state)` pairs: it can be indexed,
/// iterated any number of times, and cut into prefixes for frame-by-frame
/// consumers.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    times: Array1<f64>,
    states: Array2<f64>,
    stats: Stats,
}

impl Trajectory {
    pub(crate) fn new(times: Array1<f64>, states: Array2<f64>, stats: Stats) -> Trajectory {
        debug_assert_eq!(times.len(), states.nrows());
        Trajectory {
            times,
            states,
            stats,
        }
    }

    pub(crate) fn empty(dim: usize, stats: Stats) -> Trajectory {
        Trajectory::new(Array1::zeros(0), Array2::zeros((0, dim)), stats)
    }

    pub fn times(&self) -> ArrayView1<'_, f64> {
        self.times.view()
    }

    /// States, one row per output time.
    pub fn states(&self) -> ArrayView2<'_, f64> {
        self.states.view()
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Dimension of the states.
    pub fn dim(&self) -> usize {
        self.states.ncols()
    }

    pub fn get(&self, index: usize) -> Option<(f64, ArrayView1<'_, f64>)> {
        if index < self.len() {
            Some((self.times[index], self.states.row(index)))
        } else {
            None
        }
    }

    pub fn last(&self) -> Option<(f64, ArrayView1<'_, f64>)> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Time series of one state component.
    ///
    /// **Panics** if `component >= self.dim()`.
    pub fn component(&self, component: usize) -> ArrayView1<'_, f64> {
        self.states.column(component)
    }

    /// The first `n` samples (all of them if `n > self.len()`).
    pub fn prefix(&self, n: usize) -> (ArrayView1<'_, f64>, ArrayView2<'_, f64>) {
        let n = n.min(self.len());
        (self.times.slice(s![..n]), self.states.slice(s![..n, ..]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, ArrayView1<'_, f64>)> + '_ {
        self.times.iter().cloned().zip(self.states.rows())
    }

    pub fn into_parts(self) -> (Array1<f64>, Array2<f64>) {
        (self.times, self.states)
    }
}

/// Returns `num` evenly spaced times over `[start, end]`.
///
/// The last element is exactly `end`, so the grid can be passed as output
/// times for a solve ending at `end`.
pub fn linspace(start: f64, end: f64, num: usize) -> Array1<f64> {
    match num {
        0 => Array1::zeros(0),
        1 => array![start],
        _ => {
            let mut grid = Array1::linspace(start, end, num);
            grid[num - 1] = end;
            grid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Trajectory {
        Trajectory::new(
            array![0., 0.5, 1.],
            array![[1., 2.], [3., 4.], [5., 6.]],
            Stats::default(),
        )
    }

    #[test]
    fn indexing_and_iteration() {
        let traj = sample();
        assert_eq!(traj.len(), 3);
        assert_eq!(traj.dim(), 2);
        let (t, y) = traj.get(1).unwrap();
        assert_eq!(t, 0.5);
        assert_eq!(y, array![3., 4.]);
        assert!(traj.get(3).is_none());
        assert_eq!(traj.last().unwrap().0, 1.);
        assert_eq!(traj.component(1), array![2., 4., 6.]);

        let first: Vec<f64> = traj.iter().map(|(t, _)| t).collect();
        let second: Vec<f64> = traj.iter().map(|(t, _)| t).collect();
        assert_eq!(first, vec![0., 0.5, 1.]);
        assert_eq!(first, second);
    }

    #[test]
    fn prefix_is_clamped() {
        let traj = sample();
        let (times, states) = traj.prefix(2);
        assert_eq!(times, array![0., 0.5]);
        assert_eq!(states.nrows(), 2);
        assert_eq!(traj.prefix(10).0.len(), 3);
        assert!(Trajectory::empty(3, Stats::default()).last().is_none());
    }

    #[test]
    fn linspace_pins_end_point() {
        let grid = linspace(0., 40., 5000);
        assert_eq!(grid.len(), 5000);
        assert_eq!(grid[0], 0.);
        assert_eq!(grid[4999], 40.);
        assert!(grid.windows(2).into_iter().all(|w| w[1] > w[0]));
        assert_eq!(linspace(2., 3., 1), array![2.]);
        assert!(linspace(2., 3., 0).is_empty());
    }
}
