use nalgebra::{DMatrix, Point3, Vector3};

/// Sign of each reference node coordinate, in local node order
const SIGNS_1D: [[f64; 3]; 2] = [[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];

const SIGNS_2D: [[f64; 3]; 4] = [
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
];

const SIGNS_3D: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

/// Multilinear Lagrange basis on the reference cell `[-1, 1]^dim`
///
/// `dim = 1` is the two-node line (Q4 edges), `dim = 2` the four-node
/// quadrilateral (Q4 cells, H8 faces), `dim = 3` the eight-node hexahedron.
///
/// Shape functions:
///   N_a(ξ) = Π_i (1 + s_ai ξ_i) / 2
/// where s_a are the reference coordinates of node a.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LagrangeBasis {
    dim: usize,
}

impl LagrangeBasis {
    pub fn new(dim: usize) -> Self {
        debug_assert!((1..=3).contains(&dim));
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn signs(&self) -> &'static [[f64; 3]] {
        match self.dim {
            1 => &SIGNS_1D,
            2 => &SIGNS_2D,
            _ => &SIGNS_3D,
        }
    }

    pub fn num_nodes(&self) -> usize {
        1 << self.dim
    }

    /// Evaluate all shape functions at reference point `xi`
    pub fn shape_functions(&self, xi: &[f64; 3]) -> Vec<f64> {
        self.signs()
            .iter()
            .map(|s| (0..self.dim).map(|i| 0.5 * (1.0 + s[i] * xi[i])).product())
            .collect()
    }

    /// Reference derivatives, `num_nodes × dim`
    #[allow(non_snake_case)]
    pub fn shape_derivatives(&self, xi: &[f64; 3]) -> DMatrix<f64> {
        let signs = self.signs();
        let mut dN = DMatrix::zeros(signs.len(), self.dim);
        for (a, s) in signs.iter().enumerate() {
            for j in 0..self.dim {
                let mut value = 0.5 * s[j];
                for i in (0..self.dim).filter(|&i| i != j) {
                    value *= 0.5 * (1.0 + s[i] * xi[i]);
                }
                dN[(a, j)] = value;
            }
        }
        dN
    }

    /// Jacobian `J_ij = ∂x_i/∂ξ_j` of a cell whose dimension matches the basis
    #[allow(non_snake_case)]
    pub fn jacobian(&self, dN: &DMatrix<f64>, coords: &[Point3<f64>]) -> DMatrix<f64> {
        let mut J = DMatrix::zeros(self.dim, self.dim);
        for (a, x) in coords.iter().enumerate() {
            for i in 0..self.dim {
                for j in 0..self.dim {
                    J[(i, j)] += x[i] * dN[(a, j)];
                }
            }
        }
        J
    }

    /// Cartesian shape derivatives `∂N_a/∂x_i` (`num_nodes × dim`) and `det J`
    ///
    /// # Errors
    /// Returns a message when the Jacobian is singular or inverted (det J ≤ 0).
    #[allow(non_snake_case)]
    pub fn shape_derivatives_cartesian(
        &self,
        xi: &[f64; 3],
        coords: &[Point3<f64>],
    ) -> Result<(DMatrix<f64>, f64), String> {
        let dN = self.shape_derivatives(xi);
        let J = self.jacobian(&dN, coords);
        let det = J.determinant();
        if !(det > 0.0) {
            return Err(format!("non-positive Jacobian determinant {det:.3e}"));
        }
        let J_inv = J
            .try_inverse()
            .ok_or_else(|| "singular Jacobian".to_string())?;
        // dN/dx = dN/dξ · J⁻¹
        Ok((dN * J_inv, det))
    }

    /// Measure density of a facet embedded one dimension higher
    ///
    /// Length of the tangent for a line in 2D, area of the tangent
    /// parallelogram for a quadrilateral face in 3D.
    #[allow(non_snake_case)]
    pub fn facet_measure(&self, xi: &[f64; 3], coords: &[Point3<f64>]) -> f64 {
        let dN = self.shape_derivatives(xi);
        let tangent = |j: usize| {
            coords
                .iter()
                .enumerate()
                .fold(Vector3::zeros(), |acc, (a, x)| acc + x.coords * dN[(a, j)])
        };
        match self.dim {
            1 => tangent(0).norm(),
            _ => tangent(0).cross(&tangent(1)).norm(),
        }
    }

    /// Map a reference point to physical coordinates
    pub fn map_point(&self, xi: &[f64; 3], coords: &[Point3<f64>]) -> Point3<f64> {
        let n = self.shape_functions(xi);
        let sum = coords
            .iter()
            .zip(&n)
            .fold(Vector3::zeros(), |acc, (x, &na)| acc + x.coords * na);
        Point3::from(sum)
    }
}
