use sprs::CsMat;
use std::time::Instant;
use tracing::debug;

use super::preconditioner::{IdentityPreconditioner, JacobiPreconditioner, Preconditioner};
use super::solver::{LinearOperator, LinearSolver, SolveError, SolverStats, SolverUtils};

/// Preconditioned Conjugate Gradient solver for symmetric positive definite systems
pub struct ConjugateGradient {
    max_iterations: usize,
    tolerance: f64,
    abs_tolerance: f64,
    use_preconditioner: bool,
    name: String,
    operator: Option<CsMat<f64>>,
    precond: Option<Box<dyn Preconditioner>>,
}

impl ConjugateGradient {
    pub fn new() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-10,
            abs_tolerance: 1e-300,
            use_preconditioner: true,
            name: "ConjugateGradient".to_string(),
            operator: None,
            precond: None,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_abs_tolerance(mut self, abs_tolerance: f64) -> Self {
        self.abs_tolerance = abs_tolerance;
        self
    }

    pub fn with_preconditioner(mut self, use_precond: bool) -> Self {
        self.use_preconditioner = use_precond;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Run PCG on an arbitrary operator
    ///
    /// Returns the iterate and statistics even when the iteration did not
    /// converge; callers decide whether that is an error.
    pub fn solve_with_operator<O, P>(&self, a: &O, b: &[f64], precond: &P) -> (Vec<f64>, SolverStats)
    where
        O: LinearOperator + ?Sized,
        P: Preconditioner + ?Sized,
    {
        let n = b.len();
        let start = Instant::now();
        let b_norm = SolverUtils::norm(b);

        if b_norm < 1e-300 {
            return (
                vec![0.0; n],
                SolverStats {
                    iterations: 0,
                    residual_norm: 0.0,
                    relative_residual: 0.0,
                    converged: true,
                    solve_time: start.elapsed().as_secs_f64(),
                },
            );
        }

        let mut x = vec![0.0; n];
        let mut r = b.to_vec();

        let mut z = precond.apply(&r);
        let mut p = z.clone();
        let mut rz = r.iter().zip(z.iter()).map(|(&ri, &zi)| ri * zi).sum::<f64>();

        let mut iteration = 0;
        let mut converged = false;
        let mut final_res = b_norm;

        while iteration < self.max_iterations {
            let ap = a.apply(&p);
            let p_ap = p.iter().zip(ap.iter()).map(|(&pi, &api)| pi * api).sum::<f64>();

            // Loss of positive definiteness: stop and report non-convergence.
            if !(p_ap > 0.0) {
                break;
            }
            let alpha = rz / p_ap;

            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }
            iteration += 1;

            let r_norm = SolverUtils::norm(&r);
            final_res = r_norm;
            if r_norm < self.tolerance * b_norm || r_norm < self.abs_tolerance {
                converged = true;
                break;
            }

            z = precond.apply(&r);
            let rz_new = r.iter().zip(z.iter()).map(|(&ri, &zi)| ri * zi).sum::<f64>();
            let beta = rz_new / rz;
            rz = rz_new;

            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }

        (
            x,
            SolverStats {
                iterations: iteration,
                residual_norm: final_res,
                relative_residual: final_res / b_norm,
                converged,
                solve_time: start.elapsed().as_secs_f64(),
            },
        )
    }
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSolver for ConjugateGradient {
    fn name(&self) -> &str {
        &self.name
    }

    fn factorize(&mut self, a: &CsMat<f64>) -> Result<(), SolveError> {
        SolverUtils::check_square(a)?;
        let precond: Box<dyn Preconditioner> = if self.use_preconditioner {
            Box::new(JacobiPreconditioner::new(a))
        } else {
            Box::new(IdentityPreconditioner)
        };
        self.precond = Some(precond);
        self.operator = Some(a.clone());
        Ok(())
    }

    fn solve(&self, b: &[f64]) -> Result<(Vec<f64>, SolverStats), SolveError> {
        let (a, precond) = match (&self.operator, &self.precond) {
            (Some(a), Some(precond)) => (a, precond.as_ref()),
            _ => return Err(SolveError::NotFactorized),
        };
        SolverUtils::check_rhs(a.rows(), b)?;

        let (x, stats) = self.solve_with_operator(a, b, precond);
        debug!(
            solver = %self.name,
            iterations = stats.iterations,
            relative_residual = stats.relative_residual,
            "linear solve"
        );
        if !stats.converged {
            return Err(SolveError::NotConverged {
                iterations: stats.iterations,
                relative_residual: stats.relative_residual,
            });
        }
        Ok((x, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    /// 1D Laplacian with Dirichlet ends, SPD
    fn laplacian(n: usize) -> CsMat<f64> {
        let mut triplets = TriMat::new((n, n));
        for i in 0..n {
            triplets.add_triplet(i, i, 2.0);
            if i > 0 {
                triplets.add_triplet(i, i - 1, -1.0);
            }
            if i + 1 < n {
                triplets.add_triplet(i, i + 1, -1.0);
            }
        }
        triplets.to_csr()
    }

    #[test]
    fn test_cg_solves_laplacian() {
        let n = 50;
        let a = laplacian(n);
        let x_true: Vec<f64> = (0..n).map(|i| (i as f64 * 0.1).sin()).collect();
        let b = a.apply(&x_true);

        let mut cg = ConjugateGradient::new().with_tolerance(1e-12);
        cg.factorize(&a).unwrap();
        let (x, stats) = cg.solve(&b).unwrap();

        assert!(stats.converged);
        for (xi, ti) in x.iter().zip(&x_true) {
            assert_relative_eq!(*xi, *ti, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_zero_rhs_returns_zero() {
        let mut cg = ConjugateGradient::new();
        cg.factorize(&laplacian(4)).unwrap();
        let (x, stats) = cg.solve(&[0.0; 4]).unwrap();

        assert!(x.iter().all(|&v| v == 0.0));
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn test_iteration_cap_is_an_error() {
        let a = laplacian(100);
        let b = vec![1.0; 100];
        let mut cg = ConjugateGradient::new()
            .with_max_iterations(3)
            .with_preconditioner(false);
        cg.factorize(&a).unwrap();

        assert!(matches!(cg.solve(&b), Err(SolveError::NotConverged { iterations: 3, .. })));
    }

    #[test]
    fn test_solve_before_factorize() {
        let cg = ConjugateGradient::new();
        assert_eq!(cg.solve(&[1.0]).unwrap_err(), SolveError::NotFactorized);
    }
}
