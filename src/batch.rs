//! Solving one problem from several initial states.

use log::debug;
use ndarray::prelude::*;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::error::SolveError;
use crate::field::VectorField;
use crate::options::Options;
use crate::solve::{check_output_times, solve_ivp, SolveFailure};
use crate::trajectory::Trajectory;

/// Outcome of every run of a batch, indexed like the initial states.
#[derive(Clone, Debug, PartialEq)]
pub struct TrajectorySet {
    runs: Vec<Result<Trajectory, SolveFailure>>,
}

impl TrajectorySet {
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Result<Trajectory, SolveFailure>> {
        self.runs.get(index)
    }

    /// The trajectory of run `index`: complete on success, partial on failure.
    pub fn trajectory(&self, index: usize) -> Option<&Trajectory> {
        self.runs.get(index).map(|run| match run {
            Ok(traj) => traj,
            Err(failure) => &failure.partial,
        })
    }

    pub fn is_complete(&self, index: usize) -> bool {
        matches!(self.runs.get(index), Some(Ok(_)))
    }

    pub fn all_complete(&self) -> bool {
        self.runs.iter().all(Result::is_ok)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Result<Trajectory, SolveFailure>> {
        self.runs.iter()
    }

    /// Failed runs with their indices.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &SolveFailure)> + '_ {
        self.runs
            .iter()
            .enumerate()
            .filter_map(|(i, run)| run.as_ref().err().map(|failure| (i, failure)))
    }

    pub fn into_results(self) -> Vec<Result<Trajectory, SolveFailure>> {
        self.runs
    }
}

impl<'s> IntoIterator for &'s TrajectorySet {
    type Item = &'s Result<Trajectory, SolveFailure>;
    type IntoIter = std::slice::Iter<'s, Result<Trajectory, SolveFailure>>;

    fn into_iter(self) -> Self::IntoIter {
        self.runs.iter()
    }
}

/// Solves the same problem from each of `initial_states`, sharing the field,
/// parameters, span, output times and options.
///
/// Runs are independent and executed in parallel on the rayon pool (or on a
/// dedicated pool of `options.threads` threads). A failed run does not affect
/// the others; its entry holds the partial trajectory and the error.
///
/// Errors concerning every run alike (invalid span or output times, invalid
/// options, thread pool creation) are returned before anything is integrated.
pub fn solve_batch<V, P>(
    field: &V,
    params: &P,
    t0: f64,
    t1: f64,
    initial_states: &[Array1<f64>],
    output_times: ArrayView1<'_, f64>,
    options: &Options,
) -> Result<TrajectorySet, SolveError>
where
    V: VectorField<P> + Sync + ?Sized,
    P: Sync + ?Sized,
{
    check_output_times(output_times, t0, t1)?;
    options.validate()?;

    debug!(
        "solving {} trajectories over [{}, {}]",
        initial_states.len(),
        t0,
        t1
    );
    let solve_all = || {
        initial_states
            .par_iter()
            .map(|y0| solve_ivp(field, params, t0, t1, y0.view(), output_times, options))
            .collect::<Vec<_>>()
    };
    let runs = match options.threads {
        Some(n) => ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| SolveError::ThreadPool(e.to_string()))?
            .install(solve_all),
        None => solve_all(),
    };

    let set = TrajectorySet { runs };
    debug!(
        "batch finished: {} of {} trajectories complete",
        set.iter().filter(|run| run.is_ok()).count(),
        set.len()
    );
    Ok(set)
}
