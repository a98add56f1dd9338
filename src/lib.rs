//! Adaptive Runge–Kutta integration of initial value problems, built for the
//! Lorenz system but usable with any [`VectorField`].
//!
//! The pipeline is: a [`rk::RungeKutta`] stepper takes adaptive
//! Dormand–Prince steps, an [`integrator::Integrator`] drives it to the end
//! of the span and records every accepted step, and a
//! [`dense::DenseOutput`] samples those records at the caller's output
//! times. [`solve_ivp`] runs this for one initial state, [`solve_batch`] for
//! many in parallel.
//!
//! ```
//! use lorenz_ivp::lorenz::{Lorenz, LorenzParams};
//! use lorenz_ivp::trajectory::linspace;
//! use lorenz_ivp::{solve_batch, Options};
//! use ndarray::array;
//!
//! let times = linspace(0., 60., 3000);
//! let set = solve_batch(
//!     &Lorenz,
//!     &LorenzParams::default(),
//!     0.,
//!     60.,
//!     &[array![5., 5., 5.], array![5.1, 5.1, 5.2], array![4.8, 5., 4.8]],
//!     times.view(),
//!     &Options::default(),
//! )
//! .unwrap();
//! assert!(set.all_complete());
//! ```

pub mod batch;
pub mod dense;
pub mod error;
pub mod field;
pub mod integrator;
pub mod lorenz;
pub mod options;
pub mod rk;
pub mod solve;
pub mod trajectory;

use ndarray::prelude::*;

pub use crate::batch::{solve_batch, TrajectorySet};
pub use crate::error::{ProblemError, SolveError};
pub use crate::field::VectorField;
pub use crate::options::{CancelToken, Options, Tolerance};
pub use crate::solve::{solve_ivp, IvpProblem, SolveFailure};
pub use crate::trajectory::{Stats, Trajectory};

pub trait OdeIntegrate {
    /// Returns the number of elements in the state.
    fn len(&self) -> usize;
    /// Perform one step (adaptive step size).
    fn step(&mut self) -> Result<(), SolveError>;
    /// Current time.
    fn time(&self) -> f64;
    /// The ending time.
    fn time_bound(&self) -> f64;
    /// Current state.
    fn state(&self) -> ArrayView1<'_, f64>;
    /// Returns `true` if the integration has reached `time_bound`.
    fn finished(&self) -> bool {
        self.time() == self.time_bound()
    }
    /// Integrate until reaching `time_bound`.
    fn run_to_bound(&mut self) -> Result<(), SolveError> {
        while !self.finished() {
            self.step()?;
        }
        Ok(())
    }
}
