/// Element matrices for linear elasticity
///
/// Implements element stiffness, body-load and volume integrals for Q4 and H8
/// cells with Gauss quadrature.

use nalgebra::{DMatrix, DVector, Point3};

use super::StrainDisplacement;
use crate::fem::{GaussQuadrature, LagrangeBasis};

/// Element matrix computations for linear elasticity
pub struct ElasticityElement;

impl ElasticityElement {
    /// Compute element stiffness matrix for linear elasticity
    ///
    /// K_e = ∫ B^T D B dV
    ///
    /// where:
    /// - B is the strain-displacement matrix
    /// - D is the constitutive matrix
    /// - Integration over element volume using Gaussian quadrature
    ///
    /// # Arguments
    /// * `coords` - Physical coordinates of the element nodes
    /// * `d_matrix` - Constitutive matrix matching the element dimension
    /// * `quad` - Volume quadrature rule
    ///
    /// # Returns
    /// Symmetric element stiffness matrix (dim·n × dim·n), or a message when
    /// the element is degenerate or inverted
    ///
    /// # References
    /// - Zienkiewicz & Taylor, "The Finite Element Method", Vol. 1
    /// - Bathe, "Finite Element Procedures", Ch. 6
    #[allow(non_snake_case)]
    pub fn stiffness_matrix(
        coords: &[Point3<f64>],
        d_matrix: &DMatrix<f64>,
        quad: &GaussQuadrature,
    ) -> Result<DMatrix<f64>, String> {
        let dim = if d_matrix.nrows() == 3 { 2 } else { 3 };
        let basis = LagrangeBasis::new(dim);
        let n_dofs = dim * coords.len();
        let mut K_elem = DMatrix::zeros(n_dofs, n_dofs);

        for (qp, weight) in quad.points.iter().zip(quad.weights.iter()) {
            let (dN_dx, det_J) = basis.shape_derivatives_cartesian(qp, coords)?;
            let B = StrainDisplacement::compute_b_matrix(&dN_dx);

            let DB = d_matrix * &B;
            K_elem += B.transpose() * DB * (weight * det_J);
        }

        Ok(K_elem)
    }

    /// Consistent nodal load of a constant body force: f_e = ∫ N^T b dV
    ///
    /// # Arguments
    /// * `coords` - Physical coordinates of the element nodes
    /// * `body_force` - Force per unit volume (first `dim` components used)
    /// * `dim` - Spatial dimension
    /// * `quad` - Volume quadrature rule
    #[allow(non_snake_case)]
    pub fn body_load(
        coords: &[Point3<f64>],
        body_force: &[f64; 3],
        dim: usize,
        quad: &GaussQuadrature,
    ) -> Result<DVector<f64>, String> {
        let basis = LagrangeBasis::new(dim);
        let mut f = DVector::zeros(dim * coords.len());

        for (qp, weight) in quad.points.iter().zip(quad.weights.iter()) {
            let (_, det_J) = basis.shape_derivatives_cartesian(qp, coords)?;
            let N = basis.shape_functions(qp);
            for (a, &na) in N.iter().enumerate() {
                for c in 0..dim {
                    f[dim * a + c] += na * body_force[c] * weight * det_J;
                }
            }
        }

        Ok(f)
    }

    /// Element volume (area in 2D)
    #[allow(non_snake_case)]
    pub fn volume(coords: &[Point3<f64>], dim: usize, quad: &GaussQuadrature) -> Result<f64, String> {
        let basis = LagrangeBasis::new(dim);
        let mut volume = 0.0;
        for (qp, weight) in quad.points.iter().zip(quad.weights.iter()) {
            let (_, det_J) = basis.shape_derivatives_cartesian(qp, coords)?;
            volume += weight * det_J;
        }
        Ok(volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanics::IsotropicElasticity;
    use approx::assert_relative_eq;

    fn unit_square() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_q4_stiffness_symmetric_with_rigid_modes() {
        let d = IsotropicElasticity::new(1.0, 0.3).constitutive_matrix(2);
        let quad = GaussQuadrature::tensor(2, 2);
        let k = ElasticityElement::stiffness_matrix(&unit_square(), &d, &quad).unwrap();

        assert_eq!(k.nrows(), 8);
        assert_relative_eq!(k.clone(), k.transpose(), epsilon = 1e-12);

        // Translation in x and infinitesimal rotation produce no forces
        let tx = DVector::from_row_slice(&[1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        let rot = DVector::from_row_slice(&[0.0, 0.0, 0.0, 1.0, -1.0, 1.0, -1.0, 0.0]);
        assert!((&k * tx).norm() < 1e-12);
        assert!((&k * rot).norm() < 1e-12);
    }

    #[test]
    fn test_h8_volume_and_body_load() {
        let coords: Vec<Point3<f64>> = [
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [2.0, 0.0, 1.0],
            [2.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ]
        .iter()
        .map(|p| Point3::new(p[0], p[1], p[2]))
        .collect();
        let quad = GaussQuadrature::tensor(3, 2);

        assert_relative_eq!(ElasticityElement::volume(&coords, 3, &quad).unwrap(), 2.0, epsilon = 1e-12);

        let f = ElasticityElement::body_load(&coords, &[0.0, 0.0, -3.0], 3, &quad).unwrap();
        let total_z: f64 = (0..8).map(|a| f[3 * a + 2]).sum();
        assert_relative_eq!(total_z, -6.0, epsilon = 1e-12);
        assert_relative_eq!(f[2], -0.75, epsilon = 1e-12);
    }
}
