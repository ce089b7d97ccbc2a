/// Linear Lagrange cell shapes supported by the mesh
///
/// Local node numbering follows the reference element:
///
/// Quadrilateral (Q4), counter-clockwise:
///   0: (-1,-1)  1: (1,-1)  2: (1,1)  3: (-1,1)
///
/// Hexahedron (H8), bottom face (ζ = -1) counter-clockwise, then top face:
///   0: (-1,-1,-1)  1: (1,-1,-1)  2: (1,1,-1)  3: (-1,1,-1)
///   4: (-1,-1, 1)  5: (1,-1, 1)  6: (1,1, 1)  7: (-1,1, 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    Quadrilateral,
    Hexahedron,
}

const QUAD_FACETS: [&[usize]; 4] = [&[0, 1], &[1, 2], &[2, 3], &[3, 0]];

const HEX_FACETS: [&[usize]; 6] = [
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[3, 0, 4, 7],
];

impl CellType {
    pub fn dim(self) -> usize {
        match self {
            CellType::Quadrilateral => 2,
            CellType::Hexahedron => 3,
        }
    }

    pub fn nodes_per_cell(self) -> usize {
        match self {
            CellType::Quadrilateral => 4,
            CellType::Hexahedron => 8,
        }
    }

    /// Local node lists of the cell facets, each ordered cyclically
    pub fn facets(self) -> &'static [&'static [usize]] {
        match self {
            CellType::Quadrilateral => &QUAD_FACETS,
            CellType::Hexahedron => &HEX_FACETS,
        }
    }
}

/// Connectivity information for the mesh
#[derive(Debug, Clone)]
pub struct Connectivity {
    pub cell_type: CellType,
    /// Global node indices of each cell, in local numbering order
    pub cells: Vec<Vec<usize>>,
}

impl Connectivity {
    pub fn new(cell_type: CellType) -> Self {
        Self {
            cell_type,
            cells: Vec::new(),
        }
    }

    pub fn add_element(&mut self, nodes: Vec<usize>) -> usize {
        debug_assert_eq!(nodes.len(), self.cell_type.nodes_per_cell());
        self.cells.push(nodes);
        self.cells.len() - 1
    }

    pub fn num_elements(&self) -> usize {
        self.cells.len()
    }
}

/// A boundary facet: an edge (2D) or face (3D) owned by exactly one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    /// Cell the facet belongs to
    pub element: usize,
    /// Global node indices, ordered cyclically
    pub nodes: Vec<usize>,
}
