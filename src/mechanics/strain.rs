/// Strain-displacement relationships for solid mechanics
///
/// Implements the B-matrix that relates nodal displacements to element strains.

use nalgebra::DMatrix;

/// Strain-displacement matrix computations
pub struct StrainDisplacement;

impl StrainDisplacement {
    /// Compute the strain-displacement matrix B from Cartesian shape derivatives
    ///
    /// Relates nodal displacements to element strains: ε = B · u_e
    ///
    /// # Arguments
    /// * `dN_dx` - Shape function derivatives, one row per node, one column per direction
    ///
    /// # Returns
    /// B matrix, 3×2n in 2D or 6×3n in 3D. Columns are interleaved by node:
    /// [u_0x, u_0y, (u_0z,) u_1x, ...].
    ///
    /// 3D rows per node i (Voigt [ε_xx, ε_yy, ε_zz, γ_xy, γ_yz, γ_zx]):
    /// ```text
    ///     [∂N_i/∂x    0         0      ]
    ///     [  0      ∂N_i/∂y     0      ]
    ///     [  0        0      ∂N_i/∂z   ]
    ///     [∂N_i/∂y  ∂N_i/∂x     0      ]
    ///     [  0      ∂N_i/∂z  ∂N_i/∂y   ]
    ///     [∂N_i/∂z    0      ∂N_i/∂x   ]
    /// ```
    /// 2D rows per node i ([ε_xx, ε_yy, γ_xy]):
    /// ```text
    ///     [∂N_i/∂x    0      ]
    ///     [  0      ∂N_i/∂y  ]
    ///     [∂N_i/∂y  ∂N_i/∂x  ]
    /// ```
    ///
    /// # References
    /// - Zienkiewicz & Taylor, "The Finite Element Method", Vol. 1, Ch. 6
    #[allow(non_snake_case)]
    pub fn compute_b_matrix(dN_dx: &DMatrix<f64>) -> DMatrix<f64> {
        let n_nodes = dN_dx.nrows();
        let dim = dN_dx.ncols();

        if dim == 2 {
            let mut B = DMatrix::zeros(3, 2 * n_nodes);
            for i in 0..n_nodes {
                let c = 2 * i;
                let (dx, dy) = (dN_dx[(i, 0)], dN_dx[(i, 1)]);
                B[(0, c)] = dx;
                B[(1, c + 1)] = dy;
                B[(2, c)] = dy;
                B[(2, c + 1)] = dx;
            }
            B
        } else {
            let mut B = DMatrix::zeros(6, 3 * n_nodes);
            for i in 0..n_nodes {
                let c = 3 * i;
                let (dx, dy, dz) = (dN_dx[(i, 0)], dN_dx[(i, 1)], dN_dx[(i, 2)]);
                B[(0, c)] = dx;
                B[(1, c + 1)] = dy;
                B[(2, c + 2)] = dz;
                B[(3, c)] = dy;
                B[(3, c + 1)] = dx;
                B[(4, c + 1)] = dz;
                B[(4, c + 2)] = dy;
                B[(5, c)] = dz;
                B[(5, c + 2)] = dx;
            }
            B
        }
    }
}
