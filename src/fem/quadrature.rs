use crate::mesh::CellType;

/// Gauss-Legendre quadrature on the reference segment, square or cube `[-1, 1]^d`
#[derive(Debug, Clone)]
pub struct GaussQuadrature {
    /// Integration point coordinates (unused trailing components are 0)
    pub points: Vec<[f64; 3]>,
    /// Integration weights
    pub weights: Vec<f64>,
}

/// 1D Gauss-Legendre points and weights on [-1, 1]
///
/// `n` points integrate polynomials of degree `2n - 1` exactly. Supported
/// `n` is 1 to 4; larger requests are clamped to 4.
pub fn gauss_legendre_1d(n: usize) -> (Vec<f64>, Vec<f64>) {
    match n {
        0 | 1 => (vec![0.0], vec![2.0]),
        2 => {
            let a = 1.0 / 3f64.sqrt();
            (vec![-a, a], vec![1.0, 1.0])
        }
        3 => {
            let a = (3.0f64 / 5.0).sqrt();
            (vec![-a, 0.0, a], vec![5.0 / 9.0, 8.0 / 9.0, 5.0 / 9.0])
        }
        _ => {
            let a = (3.0 / 7.0 - 2.0 / 7.0 * (6.0f64 / 5.0).sqrt()).sqrt();
            let b = (3.0 / 7.0 + 2.0 / 7.0 * (6.0f64 / 5.0).sqrt()).sqrt();
            let wa = (18.0 + 30f64.sqrt()) / 36.0;
            let wb = (18.0 - 30f64.sqrt()) / 36.0;
            (vec![-b, -a, a, b], vec![wb, wa, wa, wb])
        }
    }
}

impl GaussQuadrature {
    /// Tensor-product rule with `n` points per direction in `dim` dimensions
    pub fn tensor(dim: usize, n: usize) -> Self {
        let (xi, wi) = gauss_legendre_1d(n);
        let mut points = vec![[0.0; 3]];
        let mut weights = vec![1.0];

        for d in 0..dim {
            let mut next_points = Vec::with_capacity(points.len() * xi.len());
            let mut next_weights = Vec::with_capacity(points.len() * xi.len());
            for (p, w) in points.iter().zip(&weights) {
                for (x, wx) in xi.iter().zip(&wi) {
                    let mut q = *p;
                    q[d] = *x;
                    next_points.push(q);
                    next_weights.push(w * wx);
                }
            }
            points = next_points;
            weights = next_weights;
        }

        Self { points, weights }
    }

    /// Volume rule for a cell
    pub fn for_cell(cell: CellType, n: usize) -> Self {
        Self::tensor(cell.dim(), n)
    }

    /// Surface rule for the facets of a cell (edges in 2D, faces in 3D)
    pub fn for_facet(cell: CellType, n: usize) -> Self {
        Self::tensor(cell.dim() - 1, n)
    }

    pub fn num_points(&self) -> usize {
        self.weights.len()
    }
}
