use super::geometry::Mesh;
use super::topology::CellType;
use crate::config::MeshConfig;

/// Structured mesh generator for axis-aligned domains
pub struct MeshGenerator;

impl MeshGenerator {
    /// Generate a Q4 mesh of the rectangle `[min, max]`
    ///
    /// Nodes are numbered x-fastest; elements likewise.
    ///
    /// # Arguments
    /// * `min`, `max` - Opposite corners of the domain
    /// * `divisions` - Number of elements in x and y
    pub fn rectangle(min: [f64; 2], max: [f64; 2], divisions: [usize; 2]) -> Mesh {
        let [nx, ny] = divisions;
        let dx = (max[0] - min[0]) / nx as f64;
        let dy = (max[1] - min[1]) / ny as f64;
        let mut mesh = Mesh::new(CellType::Quadrilateral);

        for iy in 0..=ny {
            for ix in 0..=nx {
                mesh.geometry
                    .add_node(min[0] + ix as f64 * dx, min[1] + iy as f64 * dy, 0.0);
            }
        }

        let node = |ix: usize, iy: usize| ix + iy * (nx + 1);
        for iy in 0..ny {
            for ix in 0..nx {
                mesh.connectivity.add_element(vec![
                    node(ix, iy),
                    node(ix + 1, iy),
                    node(ix + 1, iy + 1),
                    node(ix, iy + 1),
                ]);
            }
        }
        mesh
    }

    /// Generate an H8 mesh of the box `[min, max]`
    ///
    /// # Arguments
    /// * `min`, `max` - Opposite corners of the domain
    /// * `divisions` - Number of elements in x, y and z
    pub fn cuboid(min: [f64; 3], max: [f64; 3], divisions: [usize; 3]) -> Mesh {
        let [nx, ny, nz] = divisions;
        let dx = (max[0] - min[0]) / nx as f64;
        let dy = (max[1] - min[1]) / ny as f64;
        let dz = (max[2] - min[2]) / nz as f64;
        let mut mesh = Mesh::new(CellType::Hexahedron);

        for iz in 0..=nz {
            for iy in 0..=ny {
                for ix in 0..=nx {
                    mesh.geometry.add_node(
                        min[0] + ix as f64 * dx,
                        min[1] + iy as f64 * dy,
                        min[2] + iz as f64 * dz,
                    );
                }
            }
        }

        let node = |ix: usize, iy: usize, iz: usize| ix + iy * (nx + 1) + iz * (nx + 1) * (ny + 1);
        for iz in 0..nz {
            for iy in 0..ny {
                for ix in 0..nx {
                    mesh.connectivity.add_element(vec![
                        node(ix, iy, iz),
                        node(ix + 1, iy, iz),
                        node(ix + 1, iy + 1, iz),
                        node(ix, iy + 1, iz),
                        node(ix, iy, iz + 1),
                        node(ix + 1, iy, iz + 1),
                        node(ix + 1, iy + 1, iz + 1),
                        node(ix, iy + 1, iz + 1),
                    ]);
                }
            }
        }
        mesh
    }

    pub fn from_config(config: &MeshConfig) -> Mesh {
        match *config {
            MeshConfig::Rectangle {
                min,
                max,
                divisions,
            } => Self::rectangle(min, max, divisions),
            MeshConfig::Cuboid {
                min,
                max,
                divisions,
            } => Self::cuboid(min, max, divisions),
        }
    }
}
