use sprs::CsMat;
use thiserror::Error;

/// Failure of a linear solve. Never recovered from by the optimization loop.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SolveError {
    #[error("solve requested before the operator was factorized")]
    NotFactorized,

    #[error("operator is {rows}x{cols}, expected a square system")]
    NotSquare { rows: usize, cols: usize },

    #[error("right-hand side has length {actual}, operator has {expected} rows")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("operator is singular or not positive definite ({0})")]
    Singular(String),

    #[error("no convergence after {iterations} iterations (relative residual {relative_residual:.3e})")]
    NotConverged {
        iterations: usize,
        relative_residual: f64,
    },

    #[error("non-finite values in {0}")]
    NonFinite(&'static str),
}

/// Statistics from solver execution
#[derive(Debug, Clone)]
pub struct SolverStats {
    /// Number of iterations (0 for direct solvers)
    pub iterations: usize,

    /// Final residual norm ||r|| = ||b - Ax||
    pub residual_norm: f64,

    /// Relative residual ||r|| / ||b||
    pub relative_residual: f64,

    /// Whether solver converged
    pub converged: bool,

    /// Solve time in seconds
    pub solve_time: f64,
}

impl SolverStats {
    pub fn new() -> Self {
        Self {
            iterations: 0,
            residual_norm: 0.0,
            relative_residual: 0.0,
            converged: false,
            solve_time: 0.0,
        }
    }
}

impl Default for SolverStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for a linear operator A that can be applied to a vector x to get Ax
pub trait LinearOperator {
    /// Apply the operator to vector v: out = A * v
    fn apply(&self, v: &[f64]) -> Vec<f64>;

    /// Number of rows (output dimension)
    fn rows(&self) -> usize;

    /// Number of columns (input dimension)
    fn cols(&self) -> usize;
}

impl LinearOperator for CsMat<f64> {
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        let mut result = vec![0.0; self.rows()];
        for (row_idx, row) in self.outer_iterator().enumerate() {
            result[row_idx] = row.iter().map(|(col_idx, &val)| val * v[col_idx]).sum();
        }
        result
    }

    fn rows(&self) -> usize {
        self.rows()
    }

    fn cols(&self) -> usize {
        self.cols()
    }
}

/// Symmetric positive definite solver used for both the state and the adjoint systems.
///
/// The operator is handed over once per design iteration through
/// [`LinearSolver::factorize`]; every subsequent [`LinearSolver::solve`] reuses
/// whatever the backend prepared (factors, preconditioner), so the adjoint
/// solve costs only a back-substitution or a preconditioned iteration.
pub trait LinearSolver: Send + Sync {
    /// Get solver name
    fn name(&self) -> &str;

    /// Prepare the solver for the operator `a`, replacing any previous one
    fn factorize(&mut self, a: &CsMat<f64>) -> Result<(), SolveError>;

    /// Solve `A x = b` with the most recently factorized operator
    ///
    /// # Arguments
    /// * `b` - Right-hand side vector (n)
    ///
    /// # Returns
    /// * Solution vector x (n)
    /// * Solver statistics
    fn solve(&self, b: &[f64]) -> Result<(Vec<f64>, SolverStats), SolveError>;
}

/// Helper functions for solver validation
pub struct SolverUtils;

impl SolverUtils {
    /// Compute residual r = b - Ax
    #[allow(non_snake_case)]
    pub fn compute_residual<O: LinearOperator>(A: &O, x: &[f64], b: &[f64]) -> Vec<f64> {
        let ax = A.apply(x);
        b.iter()
            .zip(ax.iter())
            .map(|(&bi, &axi)| bi - axi)
            .collect()
    }

    /// Compute L2 norm of a vector
    pub fn norm(v: &[f64]) -> f64 {
        v.iter().map(|&x| x * x).sum::<f64>().sqrt()
    }

    /// Compute residual norm ||b - Ax||
    #[allow(non_snake_case)]
    pub fn residual_norm<O: LinearOperator>(A: &O, x: &[f64], b: &[f64]) -> f64 {
        let r = Self::compute_residual(A, x, b);
        Self::norm(&r)
    }

    /// Compute relative residual ||b - Ax|| / ||b||
    #[allow(non_snake_case)]
    pub fn relative_residual<O: LinearOperator>(A: &O, x: &[f64], b: &[f64]) -> f64 {
        let r_norm = Self::residual_norm(A, x, b);
        let b_norm = Self::norm(b);

        if b_norm < 1e-300 {
            r_norm
        } else {
            r_norm / b_norm
        }
    }

    pub(crate) fn check_square(a: &CsMat<f64>) -> Result<(), SolveError> {
        if a.rows() != a.cols() {
            return Err(SolveError::NotSquare {
                rows: a.rows(),
                cols: a.cols(),
            });
        }
        if a.data().iter().any(|v| !v.is_finite()) {
            return Err(SolveError::NonFinite("operator"));
        }
        Ok(())
    }

    pub(crate) fn check_rhs(expected: usize, b: &[f64]) -> Result<(), SolveError> {
        if b.len() != expected {
            return Err(SolveError::DimensionMismatch {
                expected,
                actual: b.len(),
            });
        }
        if b.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::NonFinite("right-hand side"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    #[test]
    fn test_norm() {
        let v = vec![3.0, 4.0];
        let norm = SolverUtils::norm(&v);
        assert_relative_eq!(norm, 5.0, epsilon = 1e-14);
    }

    #[test]
    #[allow(non_snake_case)]
    fn test_residual() {
        // [2 1; 1 2] x = [3; 3] has solution x = [1; 1]
        let mut triplets = TriMat::new((2, 2));
        triplets.add_triplet(0, 0, 2.0);
        triplets.add_triplet(0, 1, 1.0);
        triplets.add_triplet(1, 0, 1.0);
        triplets.add_triplet(1, 1, 2.0);
        let A: CsMat<f64> = triplets.to_csr();

        let r_norm = SolverUtils::residual_norm(&A, &[1.0, 1.0], &[3.0, 3.0]);
        assert_relative_eq!(r_norm, 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_rejects_non_square() {
        let a: CsMat<f64> = TriMat::new((2, 3)).to_csr();
        assert_eq!(
            SolverUtils::check_square(&a),
            Err(SolveError::NotSquare { rows: 2, cols: 3 })
        );
        assert!(SolverUtils::check_rhs(2, &[1.0, f64::NAN]).is_err());
    }
}
