use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use std::collections::HashMap;

use super::topology::{CellType, Connectivity, Facet};

/// Geometric information for the mesh
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    /// Node coordinates; 2D meshes carry z = 0
    pub nodes: Vec<Point3<f64>>,
}

impl Geometry {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn add_node(&mut self, x: f64, y: f64, z: f64) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Point3::new(x, y, z));
        idx
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn get_node(&self, idx: usize) -> Option<&Point3<f64>> {
        self.nodes.get(idx)
    }
}

/// Complete mesh with geometry and topology
///
/// Immutable for the duration of a run and shared by the state solver and the
/// density filter through an `Arc`.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: Geometry,
    pub connectivity: Connectivity,
}

impl Mesh {
    pub fn new(cell_type: CellType) -> Self {
        Self {
            geometry: Geometry::new(),
            connectivity: Connectivity::new(cell_type),
        }
    }

    pub fn dim(&self) -> usize {
        self.connectivity.cell_type.dim()
    }

    pub fn cell_type(&self) -> CellType {
        self.connectivity.cell_type
    }

    pub fn num_nodes(&self) -> usize {
        self.geometry.num_nodes()
    }

    pub fn num_elements(&self) -> usize {
        self.connectivity.num_elements()
    }

    pub fn element_nodes(&self, elem: usize) -> &[usize] {
        &self.connectivity.cells[elem]
    }

    pub fn element_coords(&self, elem: usize) -> Vec<Point3<f64>> {
        self.element_nodes(elem)
            .iter()
            .map(|&n| self.geometry.nodes[n])
            .collect()
    }

    /// Arithmetic mean of the element's vertices
    pub fn centroid(&self, elem: usize) -> Point3<f64> {
        let nodes = self.element_nodes(elem);
        let sum = nodes
            .iter()
            .fold(Vector3::zeros(), |acc, &n| acc + self.geometry.nodes[n].coords);
        Point3::from(sum / nodes.len() as f64)
    }

    pub fn centroids(&self) -> Vec<Point3<f64>> {
        (0..self.num_elements())
            .into_par_iter()
            .map(|e| self.centroid(e))
            .collect()
    }

    /// Smallest edge length of the element's bounding box
    pub fn element_size(&self, elem: usize) -> f64 {
        let (min, max) = bounding_box(self.element_nodes(elem).iter().map(|&n| &self.geometry.nodes[n]));
        (0..self.dim())
            .map(|i| max[i] - min[i])
            .fold(f64::INFINITY, f64::min)
    }

    /// Smallest element size over the mesh
    pub fn min_element_size(&self) -> f64 {
        (0..self.num_elements())
            .into_par_iter()
            .map(|e| self.element_size(e))
            .reduce(|| f64::INFINITY, f64::min)
    }

    pub fn bounding_box(&self) -> (Point3<f64>, Point3<f64>) {
        bounding_box(self.geometry.nodes.iter())
    }

    /// Facets that belong to exactly one cell
    ///
    /// Facets are matched by their sorted global node lists. The result is
    /// ordered by owning element, then by local facet index.
    pub fn boundary_facets(&self) -> Vec<Facet> {
        let cell_type = self.cell_type();
        let mut counts: HashMap<Vec<usize>, usize> = HashMap::new();
        for cell in &self.connectivity.cells {
            for local in cell_type.facets() {
                let mut key: Vec<usize> = local.iter().map(|&i| cell[i]).collect();
                key.sort_unstable();
                *counts.entry(key).or_insert(0) += 1;
            }
        }

        let mut facets = Vec::new();
        for (element, cell) in self.connectivity.cells.iter().enumerate() {
            for local in cell_type.facets() {
                let nodes: Vec<usize> = local.iter().map(|&i| cell[i]).collect();
                let mut key = nodes.clone();
                key.sort_unstable();
                if counts.get(&key) == Some(&1) {
                    facets.push(Facet { element, nodes });
                }
            }
        }
        facets
    }
}

fn bounding_box<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> (Point3<f64>, Point3<f64>) {
    let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
    let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        for i in 0..3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshGenerator;
    use approx::assert_relative_eq;

    #[test]
    fn test_centroid_and_size() {
        let mesh = MeshGenerator::rectangle([0.0, 0.0], [4.0, 1.0], [4, 2]);

        let c = mesh.centroid(0);
        assert_relative_eq!(c.x, 0.5);
        assert_relative_eq!(c.y, 0.25);
        assert_relative_eq!(mesh.element_size(0), 0.5);
        assert_relative_eq!(mesh.min_element_size(), 0.5);
    }

    #[test]
    fn test_boundary_facet_counts() {
        let quad = MeshGenerator::rectangle([0.0, 0.0], [3.0, 2.0], [3, 2]);
        assert_eq!(quad.boundary_facets().len(), 2 * (3 + 2));

        let hex = MeshGenerator::cuboid([0.0; 3], [2.0, 2.0, 1.0], [2, 2, 1]);
        assert_eq!(hex.boundary_facets().len(), 2 * (4 + 2 + 2));
    }
}
