use std::collections::HashSet;

/// Degree of Freedom (DOF) manager
///
/// Handles DOF numbering and support tracking for vector-valued (displacement)
/// problems. DOFs are interleaved by node: `dof = node * dofs_per_node + component`.
/// Supports are homogeneous: a constrained DOF is fixed to zero.
#[derive(Debug, Clone)]
pub struct DofManager {
    /// Number of nodes in the mesh
    num_nodes: usize,

    /// Displacement components per node (2 or 3)
    dofs_per_node: usize,

    /// Set of DOFs fixed to zero
    dirichlet_dofs: HashSet<usize>,
}

impl DofManager {
    pub fn new(num_nodes: usize, dofs_per_node: usize) -> Self {
        Self {
            num_nodes,
            dofs_per_node,
            dirichlet_dofs: HashSet::new(),
        }
    }

    /// Global DOF index of component `local_dof` at node `node_id`
    pub fn global_dof(&self, node_id: usize, local_dof: usize) -> usize {
        node_id * self.dofs_per_node + local_dof
    }

    /// Global DOF indices of a cell, interleaved to match the element matrices
    pub fn element_dofs(&self, nodes: &[usize]) -> Vec<usize> {
        nodes
            .iter()
            .flat_map(|&n| (0..self.dofs_per_node).map(move |c| n * self.dofs_per_node + c))
            .collect()
    }

    /// Fix a DOF to zero
    pub fn set_dirichlet(&mut self, dof: usize) {
        debug_assert!(dof < self.total_dofs(), "DOF index out of bounds");
        self.dirichlet_dofs.insert(dof);
    }

    /// Fix every component of a node
    pub fn set_dirichlet_node(&mut self, node_id: usize) {
        for local_dof in 0..self.dofs_per_node {
            let dof = self.global_dof(node_id, local_dof);
            self.set_dirichlet(dof);
        }
    }

    /// Check if a DOF is fixed
    pub fn is_dirichlet(&self, dof: usize) -> bool {
        self.dirichlet_dofs.contains(&dof)
    }

    /// Fixed DOFs in increasing order
    pub fn dirichlet_dofs(&self) -> Vec<usize> {
        let mut dofs: Vec<usize> = self.dirichlet_dofs.iter().copied().collect();
        dofs.sort_unstable();
        dofs
    }

    /// Zero the entries of `v` that belong to fixed DOFs
    pub fn zero_dirichlet(&self, v: &mut [f64]) {
        for &dof in &self.dirichlet_dofs {
            v[dof] = 0.0;
        }
    }

    pub fn total_dofs(&self) -> usize {
        self.num_nodes * self.dofs_per_node
    }

    pub fn num_free_dofs(&self) -> usize {
        self.total_dofs() - self.dirichlet_dofs.len()
    }

    pub fn num_constrained_dofs(&self) -> usize {
        self.dirichlet_dofs.len()
    }

    pub fn dofs_per_node(&self) -> usize {
        self.dofs_per_node
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }
}
