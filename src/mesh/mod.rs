pub mod generator;
pub mod geometry;
pub mod search;
pub mod topology;

pub use generator::MeshGenerator;
pub use geometry::{Geometry, Mesh};
pub use search::SearchGrid;
pub use topology::{CellType, Connectivity, Facet};
