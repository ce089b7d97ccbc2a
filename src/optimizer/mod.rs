//! Design update rules.
//!
//! Both optimizers solve `min f(x)  s.t.  g_i(x) <= 0,  0 <= x <= 1` one
//! linearized step at a time, inside a move-limit box around the current
//! design, and never touch entries flagged as fixed.

pub mod mma;
pub mod oc;

pub use mma::MovingAsymptotes;
pub use oc::OptimalityCriteria;

use crate::config::OptimizerKind;
use crate::context::DistributedContext;
use crate::error::Result;

/// Problem data of one design update
#[derive(Debug, Clone, Copy)]
pub struct OptimizerInput<'a> {
    pub x: &'a [f64],
    pub objective: f64,
    pub objective_gradient: &'a [f64],
    /// g_i(x), feasible when <= 0
    pub constraints: &'a [f64],
    pub constraint_gradients: &'a [Vec<f64>],
    pub move_limit: f64,
    /// Entries excluded from the update
    pub fixed: &'a [bool],
}

/// Non-fatal conditions and statistics of one update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateDiagnostics {
    /// Bisection steps (OC) or dual sweeps (MMA)
    pub inner_iterations: usize,
    /// Lagrange multipliers of the constraints at the accepted point
    pub multipliers: Vec<f64>,
    /// OC bisection hit its iteration cap before the bracket closed
    pub bisection_capped: bool,
    /// MMA subproblem had no feasible point inside the move-limit box
    pub infeasible: bool,
}

/// Constrained design update
pub trait Optimizer: Send {
    fn name(&self) -> &'static str;

    /// Compute the next design
    ///
    /// # Errors
    /// Only for malformed input (length mismatches, wrong number of
    /// constraints). Numerical trouble is reported in the diagnostics.
    fn update(&mut self, input: &OptimizerInput<'_>) -> Result<(Vec<f64>, UpdateDiagnostics)>;
}

/// Build the optimizer selected in the configuration
pub fn build_optimizer(
    ctx: DistributedContext,
    kind: OptimizerKind,
    num_vars: usize,
    num_constraints: usize,
) -> Box<dyn Optimizer> {
    match kind {
        OptimizerKind::Oc => Box::new(OptimalityCriteria::new(ctx)),
        OptimizerKind::Mma => Box::new(MovingAsymptotes::new(ctx, num_vars, num_constraints)),
    }
}

/// Shared input checks
pub(crate) fn check_input(input: &OptimizerInput<'_>, num_constraints: Option<usize>) -> Result<()> {
    use crate::error::TopOptError;

    let n = input.x.len();
    TopOptError::check_len("objective gradient", n, input.objective_gradient.len())?;
    TopOptError::check_len("fixed mask", n, input.fixed.len())?;
    TopOptError::check_len(
        "constraint gradients",
        input.constraints.len(),
        input.constraint_gradients.len(),
    )?;
    for g in input.constraint_gradients {
        TopOptError::check_len("constraint gradient", n, g.len())?;
    }
    if let Some(m) = num_constraints {
        TopOptError::check_len("constraints", m, input.constraints.len())?;
    }
    Ok(())
}
