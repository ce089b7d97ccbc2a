/// Constitutive model for linear elasticity
///
/// Implements the material stiffness matrix (D) that relates stress to strain.

use nalgebra::DMatrix;

/// Isotropic linear elastic material
///
/// Characterized by Young's modulus E and Poisson's ratio ν.
/// Valid for small strains and linear elastic behavior. Two-dimensional
/// problems use the plane strain form.
///
/// # References
/// - Timoshenko & Goodier, "Theory of Elasticity"
/// - Zienkiewicz & Taylor, "The Finite Element Method", Vol. 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotropicElasticity {
    pub youngs_modulus: f64, // E
    pub poisson_ratio: f64,  // ν (dimensionless)
}

impl IsotropicElasticity {
    /// Create new isotropic elastic material
    ///
    /// # Arguments
    /// * `youngs_modulus` - Young's modulus E, must be > 0
    /// * `poisson_ratio` - Poisson's ratio ν, must be in (-1, 0.5)
    ///
    /// Ranges are enforced by configuration validation.
    pub fn new(youngs_modulus: f64, poisson_ratio: f64) -> Self {
        debug_assert!(youngs_modulus > 0.0);
        debug_assert!(poisson_ratio > -1.0 && poisson_ratio < 0.5);
        Self {
            youngs_modulus,
            poisson_ratio,
        }
    }

    /// Compute the constitutive matrix D in Voigt notation: σ = D ε
    ///
    /// 3D ordering: [σ_xx, σ_yy, σ_zz, σ_xy, σ_yz, σ_zx]^T
    /// ```text
    /// D = (E / ((1+ν)(1-2ν))) ×
    ///     [1-ν    ν    ν    0      0      0   ]
    ///     [ ν   1-ν    ν    0      0      0   ]
    ///     [ ν    ν   1-ν    0      0      0   ]
    ///     [ 0    0    0  (1-2ν)/2  0      0   ]
    ///     [ 0    0    0    0   (1-2ν)/2   0   ]
    ///     [ 0    0    0    0      0   (1-2ν)/2]
    /// ```
    ///
    /// 2D plane strain ordering: [σ_xx, σ_yy, σ_xy]^T, the upper-left normal
    /// block restricted to x, y plus one shear term.
    ///
    /// # Returns
    /// 3×3 (dim = 2) or 6×6 (dim = 3) symmetric positive-definite matrix
    #[allow(non_snake_case)]
    pub fn constitutive_matrix(&self, dim: usize) -> DMatrix<f64> {
        let E = self.youngs_modulus;
        let nu = self.poisson_ratio;

        let factor = E / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let diag = 1.0 - nu;
        let off_diag = nu;
        let shear = (1.0 - 2.0 * nu) / 2.0;

        let n_normal = dim;
        let n_shear = if dim == 2 { 1 } else { 3 };
        let size = n_normal + n_shear;
        let mut D = DMatrix::zeros(size, size);

        for i in 0..n_normal {
            for j in 0..n_normal {
                D[(i, j)] = if i == j { diag } else { off_diag };
            }
        }
        for k in n_normal..size {
            D[(k, k)] = shear;
        }

        D * factor
    }

    /// Compute Lamé parameters (λ, μ)
    ///
    /// # Returns
    /// (λ, μ) where:
    /// - λ = E ν / ((1+ν)(1-2ν)) - First Lamé parameter
    /// - μ = E / (2(1+ν)) - Shear modulus (second Lamé parameter)
    #[allow(non_snake_case)]
    pub fn lame_parameters(&self) -> (f64, f64) {
        let E = self.youngs_modulus;
        let nu = self.poisson_ratio;

        let lambda = (E * nu) / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let mu = E / (2.0 * (1.0 + nu));

        (lambda, mu)
    }
}
