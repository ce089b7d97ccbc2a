pub mod direct;
pub mod iterative;
pub mod preconditioner;
pub mod solver;

pub use direct::DirectSolver;
pub use iterative::ConjugateGradient;
pub use preconditioner::{IdentityPreconditioner, JacobiPreconditioner, Preconditioner};
pub use solver::{LinearOperator, LinearSolver, SolveError, SolverStats, SolverUtils};

use crate::config::{LinearSolverConfig, PreconditionerKind, SolverKind};

/// Build the linear solver backend selected in the configuration
pub fn build_solver(config: &LinearSolverConfig) -> Box<dyn LinearSolver> {
    match config.kind {
        SolverKind::Cg => Box::new(
            ConjugateGradient::new()
                .with_tolerance(config.tolerance)
                .with_max_iterations(config.max_iterations)
                .with_preconditioner(config.preconditioner == PreconditionerKind::Jacobi),
        ),
        SolverKind::Direct => Box::new(DirectSolver::new()),
    }
}
