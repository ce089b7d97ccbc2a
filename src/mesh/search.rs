use nalgebra::{Point3, Vector3};

/// Uniform bucket grid over a point cloud for fixed-radius neighbour queries.
///
/// Bucket edges equal the query radius (clamped so the grid stays small), so a
/// radius query only has to visit the 3x3(x3) block of buckets around the
/// query point.
#[derive(Debug, Clone)]
pub struct SearchGrid {
    pub min: Point3<f64>,
    pub cell_size: Vector3<f64>,
    pub dims: [usize; 3],
    /// Point indices per bucket
    pub cells: Vec<Vec<usize>>,
}

impl SearchGrid {
    /// Build a search grid with buckets of roughly `bucket` edge length
    pub fn build(points: &[Point3<f64>], bucket: f64) -> Self {
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
        if points.is_empty() {
            min = Point3::origin();
            max = Point3::origin();
        }

        // At most ~256 buckets per direction
        let mut dims = [1usize; 3];
        let mut cell_size = Vector3::new(1.0, 1.0, 1.0);
        for i in 0..3 {
            let extent = max[i] - min[i];
            if extent > 0.0 && bucket > 0.0 {
                dims[i] = ((extent / bucket).ceil() as usize).clamp(1, 256);
                cell_size[i] = (extent / dims[i] as f64).max(bucket);
            }
        }

        let mut cells = vec![Vec::new(); dims[0] * dims[1] * dims[2]];
        let mut grid = Self {
            min,
            cell_size,
            dims,
            cells: Vec::new(),
        };
        for (idx, p) in points.iter().enumerate() {
            let [ix, iy, iz] = grid.bucket_of(p);
            cells[grid.linear(ix, iy, iz)].push(idx);
        }
        grid.cells = cells;
        grid
    }

    fn bucket_of(&self, p: &Point3<f64>) -> [usize; 3] {
        let mut b = [0usize; 3];
        for i in 0..3 {
            let t = ((p[i] - self.min[i]) / self.cell_size[i]).floor();
            b[i] = if t <= 0.0 {
                0
            } else {
                (t as usize).min(self.dims[i] - 1)
            };
        }
        b
    }

    fn linear(&self, ix: usize, iy: usize, iz: usize) -> usize {
        ix + iy * self.dims[0] + iz * self.dims[0] * self.dims[1]
    }

    /// Indices of points in the buckets that can hold a point within `radius` of `p`.
    ///
    /// Candidates must still be distance-checked by the caller.
    pub fn candidates(&self, p: &Point3<f64>, radius: f64) -> Vec<usize> {
        let mut lo = [0usize; 3];
        let mut hi = [0usize; 3];
        for i in 0..3 {
            let reach = (radius / self.cell_size[i]).ceil() as usize;
            let center = self.bucket_of(p)[i];
            lo[i] = center.saturating_sub(reach);
            hi[i] = (center + reach).min(self.dims[i] - 1);
        }

        let mut found = Vec::new();
        for iz in lo[2]..=hi[2] {
            for iy in lo[1]..=hi[1] {
                for ix in lo[0]..=hi[0] {
                    found.extend_from_slice(&self.cells[self.linear(ix, iy, iz)]);
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_include_all_neighbours() {
        let points: Vec<Point3<f64>> = (0..20)
            .flat_map(|i| (0..10).map(move |j| Point3::new(i as f64 * 0.5, j as f64 * 0.5, 0.0)))
            .collect();
        let grid = SearchGrid::build(&points, 1.2);
        let query = Point3::new(4.0, 2.0, 0.0);

        let candidates = grid.candidates(&query, 1.2);
        for (idx, p) in points.iter().enumerate() {
            if (p - query).norm() < 1.2 {
                assert!(candidates.contains(&idx), "missing neighbour {idx}");
            }
        }
        assert!(candidates.len() < points.len());
    }
}
