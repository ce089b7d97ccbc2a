use sprs::CsMat;

/// Preconditioner trait for iterative solvers
///
/// Solves M z = r approximately (where M ≈ A)
pub trait Preconditioner: Send + Sync {
    /// Apply preconditioner: solve M z = r
    ///
    /// # Arguments
    /// * `r` - Input vector
    ///
    /// # Returns
    /// * z - Preconditioned vector
    fn apply(&self, r: &[f64]) -> Vec<f64>;
}

/// Jacobi (diagonal) preconditioner
///
/// M = diag(A). The stiffness diagonal spans the SIMP contrast (ε to 1), so
/// scaling by it removes most of the conditioning loss from void regions.
pub struct JacobiPreconditioner {
    /// Inverse of diagonal entries: 1/A_ii
    diag_inv: Vec<f64>,
}

impl JacobiPreconditioner {
    /// Create Jacobi preconditioner from matrix A
    #[allow(non_snake_case)]
    pub fn new(A: &CsMat<f64>) -> Self {
        let n = A.rows();
        let mut diag_inv = vec![1.0; n];

        for (i, d) in diag_inv.iter_mut().enumerate() {
            if let Some(&val) = A.get(i, i) {
                if val.abs() > 1e-300 {
                    *d = 1.0 / val;
                }
            }
        }

        Self { diag_inv }
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[f64]) -> Vec<f64> {
        r.iter()
            .zip(self.diag_inv.iter())
            .map(|(&ri, &di)| ri * di)
            .collect()
    }
}

/// Identity preconditioner (no preconditioning)
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[f64]) -> Vec<f64> {
        r.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    #[test]
    fn test_jacobi_scales_by_diagonal() {
        let mut triplets = TriMat::new((3, 3));
        triplets.add_triplet(0, 0, 2.0);
        triplets.add_triplet(1, 1, 1e-6);
        triplets.add_triplet(2, 2, 4.0);
        triplets.add_triplet(0, 2, 1.0);
        let a: CsMat<f64> = triplets.to_csr();

        let z = JacobiPreconditioner::new(&a).apply(&[1.0, 1.0, 1.0]);
        assert_relative_eq!(z[0], 0.5);
        assert_relative_eq!(z[1], 1e6, max_relative = 1e-12);
        assert_relative_eq!(z[2], 0.25);
    }
}
