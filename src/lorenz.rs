//! The Lorenz system.

use ndarray::prelude::*;

use crate::field::VectorField;

/// Parameters of the Lorenz system.
///
/// * `sigma`: Prandtl number.
/// * `rho`: Rayleigh number.
/// * `beta`: geometric factor of the convection cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LorenzParams {
    pub sigma: f64,
    pub rho: f64,
    pub beta: f64,
}

impl Default for LorenzParams {
    /// The classic chaotic regime: σ = 10, ρ = 28, β = 8/3.
    fn default() -> LorenzParams {
        LorenzParams {
            sigma: 10.,
            rho: 28.,
            beta: 8. / 3.,
        }
    }
}

/// Lorenz equations on the state `[x, y, z]`:
///
/// ```text
/// dx/dt = σ (y − x)
/// dy/dt = x (ρ − z) − y
/// dz/dt = x y − β z
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Lorenz;

impl VectorField<LorenzParams> for Lorenz {
    fn eval(
        &self,
        _t: f64,
        y: ArrayView1<'_, f64>,
        p: &LorenzParams,
        mut dy: ArrayViewMut1<'_, f64>,
    ) {
        let (x, y, z) = (y[0], y[1], y[2]);
        dy[0] = p.sigma * (y - x);
        dy[1] = x * (p.rho - z) - y;
        dy[2] = x * y - p.beta * z;
    }

    fn dimension(&self) -> Option<usize> {
        Some(3)
    }
}
