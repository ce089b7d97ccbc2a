use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use sprs::CsMat;
use std::time::Instant;
use tracing::debug;

use super::solver::{LinearSolver, SolveError, SolverStats, SolverUtils};

/// Direct solver using a dense Cholesky factorization
///
/// The stiffness matrix is expanded to a dense nalgebra matrix and factored
/// once per design iteration; the adjoint solve is a pair of triangular
/// substitutions with the same factor.
/// Good for small problems (a few thousand DOF) and for gradient checks where
/// iterative solve error would pollute finite differences.
pub struct DirectSolver {
    /// Solver name
    name: String,
    operator: Option<CsMat<f64>>,
    factor: Option<Cholesky<f64, Dyn>>,
}

impl DirectSolver {
    pub fn new() -> Self {
        Self {
            name: "Direct (dense Cholesky)".to_string(),
            operator: None,
            factor: None,
        }
    }
}

impl Default for DirectSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSolver for DirectSolver {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(non_snake_case)]
    fn factorize(&mut self, A: &CsMat<f64>) -> Result<(), SolveError> {
        SolverUtils::check_square(A)?;
        let n = A.rows();

        let mut a_dense = DMatrix::zeros(n, n);
        for (row_idx, row) in A.outer_iterator().enumerate() {
            for (col_idx, &val) in row.iter() {
                a_dense[(row_idx, col_idx)] = val;
            }
        }

        self.factor = None;
        let factor = a_dense
            .cholesky()
            .ok_or_else(|| SolveError::Singular(format!("Cholesky failed on {n}x{n} stiffness")))?;
        self.factor = Some(factor);
        self.operator = Some(A.clone());
        Ok(())
    }

    fn solve(&self, b: &[f64]) -> Result<(Vec<f64>, SolverStats), SolveError> {
        let (a, factor) = match (&self.operator, &self.factor) {
            (Some(a), Some(factor)) => (a, factor),
            _ => return Err(SolveError::NotFactorized),
        };
        SolverUtils::check_rhs(a.rows(), b)?;
        let start = Instant::now();

        let x_vec = factor.solve(&DVector::from_column_slice(b));
        let x: Vec<f64> = x_vec.iter().copied().collect();
        if x.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::NonFinite("solution"));
        }

        let residual_norm = SolverUtils::residual_norm(a, &x, b);
        let relative_residual = SolverUtils::relative_residual(a, &x, b);
        let stats = SolverStats {
            iterations: 0,
            residual_norm,
            relative_residual,
            converged: true,
            solve_time: start.elapsed().as_secs_f64(),
        };
        debug!(solver = %self.name, relative_residual, "linear solve");

        Ok((x, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    #[test]
    #[allow(non_snake_case)]
    fn test_direct_solver_simple() {
        // [2 1; 1 2] x = [3; 3] has solution x = [1; 1]
        let mut triplets = TriMat::new((2, 2));
        triplets.add_triplet(0, 0, 2.0);
        triplets.add_triplet(0, 1, 1.0);
        triplets.add_triplet(1, 0, 1.0);
        triplets.add_triplet(1, 1, 2.0);
        let A = triplets.to_csr();

        let mut solver = DirectSolver::new();
        solver.factorize(&A).unwrap();
        let (x, stats) = solver.solve(&[3.0, 3.0]).unwrap();

        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);
        assert!(stats.relative_residual < 1e-12);

        // Second right-hand side reuses the factor
        let (y, _) = solver.solve(&[2.0, 1.0]).unwrap();
        assert_relative_eq!(y[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(y[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_indefinite_matrix_is_singular_error() {
        let mut triplets = TriMat::new((2, 2));
        triplets.add_triplet(0, 0, 1.0);
        triplets.add_triplet(1, 1, -1.0);
        let a: CsMat<f64> = triplets.to_csr();

        let mut solver = DirectSolver::new();
        assert!(matches!(solver.factorize(&a), Err(SolveError::Singular(_))));
        assert_eq!(solver.solve(&[1.0, 1.0]).unwrap_err(), SolveError::NotFactorized);
    }
}
