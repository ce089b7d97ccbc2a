use nalgebra::DMatrix;
use rayon::prelude::*;
use sprs::{CsMat, TriMat};

use super::boundary::{facet_traction_load, BoundaryConditions};
use super::dof::DofManager;
use super::quadrature::GaussQuadrature;
use crate::error::{Result, TopOptError};
use crate::mechanics::{ElasticityElement, IsotropicElasticity};
use crate::mesh::Mesh;

/// Global assembly for linear elasticity
pub struct Assembler;

impl Assembler {
    /// Compute the unscaled element stiffness matrices K0_e (parallel)
    ///
    /// Each K0_e is the stiffness of a fully solid element (multiplier 1).
    /// Design-dependent stiffness is then `K_e = E(x̂_e) K0_e`.
    ///
    /// # Arguments
    /// * `mesh` - The mesh
    /// * `material` - Elastic material properties of the solid phase
    /// * `quad` - Volume quadrature rule
    ///
    /// # Errors
    /// [`TopOptError::Assembly`] naming the first degenerate element.
    #[allow(non_snake_case)]
    pub fn element_stiffness_matrices(
        mesh: &Mesh,
        material: &IsotropicElasticity,
        quad: &GaussQuadrature,
    ) -> Result<Vec<DMatrix<f64>>> {
        let D = material.constitutive_matrix(mesh.dim());

        (0..mesh.num_elements())
            .into_par_iter()
            .map(|e| {
                ElasticityElement::stiffness_matrix(&mesh.element_coords(e), &D, quad)
                    .map_err(|msg| TopOptError::Assembly(format!("element {e}: {msg}")))
            })
            .collect()
    }

    /// Element volumes (areas in 2D), parallel
    pub fn element_volumes(mesh: &Mesh, quad: &GaussQuadrature) -> Result<Vec<f64>> {
        let dim = mesh.dim();
        (0..mesh.num_elements())
            .into_par_iter()
            .map(|e| {
                ElasticityElement::volume(&mesh.element_coords(e), dim, quad)
                    .map_err(|msg| TopOptError::Assembly(format!("element {e}: {msg}")))
            })
            .collect()
    }

    /// Assemble the global stiffness K = Σ_e s_e K0_e + springs, with supports applied
    ///
    /// Rows and columns of fixed DOFs are dropped and replaced by a unit
    /// diagonal, so the returned matrix stays symmetric positive definite and
    /// the solution at fixed DOFs is whatever the right-hand side holds there
    /// (zero, after [`DofManager::zero_dirichlet`]).
    ///
    /// # Arguments
    /// * `mesh` - The mesh
    /// * `bcs` - Resolved boundary conditions (DOF numbering, supports, springs)
    /// * `element_matrices` - K0_e per element
    /// * `scale` - Stiffness multiplier s_e per element
    ///
    /// # Returns
    /// Global stiffness matrix in CSR format
    #[allow(non_snake_case)]
    pub fn assemble_stiffness(
        mesh: &Mesh,
        bcs: &BoundaryConditions,
        element_matrices: &[DMatrix<f64>],
        scale: &[f64],
    ) -> Result<CsMat<f64>> {
        TopOptError::check_len("stiffness multipliers", mesh.num_elements(), scale.len())?;
        let dofs = &bcs.dofs;
        let n_dofs = dofs.total_dofs();

        let element_dofs: Vec<Vec<usize>> = (0..mesh.num_elements())
            .into_par_iter()
            .map(|e| dofs.element_dofs(mesh.element_nodes(e)))
            .collect();

        let nnz_estimate = element_matrices.iter().map(|k| k.len()).sum::<usize>();
        let mut triplets = TriMat::with_capacity((n_dofs, n_dofs), nnz_estimate + n_dofs);

        for (e, K_elem) in element_matrices.iter().enumerate() {
            let s = scale[e];
            let edofs = &element_dofs[e];
            for (i, &gi) in edofs.iter().enumerate() {
                if dofs.is_dirichlet(gi) {
                    continue;
                }
                for (j, &gj) in edofs.iter().enumerate() {
                    if !dofs.is_dirichlet(gj) {
                        triplets.add_triplet(gi, gj, s * K_elem[(i, j)]);
                    }
                }
            }
        }

        for spring in bcs.springs() {
            let k = spring.stiffness_per_dof();
            for &dof in &spring.dofs {
                triplets.add_triplet(dof, dof, k);
            }
        }

        for dof in dofs.dirichlet_dofs() {
            triplets.add_triplet(dof, dof, 1.0);
        }

        Ok(triplets.to_csr())
    }

    /// Assemble the design-independent load vector: tractions plus body force
    ///
    /// Entries of fixed DOFs are zero.
    pub fn assemble_load(
        mesh: &Mesh,
        bcs: &BoundaryConditions,
        cell_quad: &GaussQuadrature,
        facet_quad: &GaussQuadrature,
    ) -> Result<Vec<f64>> {
        let dim = mesh.dim();
        let dofs = &bcs.dofs;
        let mut f = vec![0.0; dofs.total_dofs()];

        for load in &bcs.tractions {
            for facet in &load.facets {
                let coords: Vec<_> = facet.nodes.iter().map(|&n| mesh.geometry.nodes[n]).collect();
                let fe = facet_traction_load(&coords, &load.traction, dim, facet_quad);
                for (k, gdof) in dofs.element_dofs(&facet.nodes).into_iter().enumerate() {
                    f[gdof] += fe[k];
                }
            }
        }

        if bcs.body_force.iter().any(|&b| b != 0.0) {
            let element_loads = (0..mesh.num_elements())
                .into_par_iter()
                .map(|e| {
                    ElasticityElement::body_load(&mesh.element_coords(e), &bcs.body_force, dim, cell_quad)
                        .map_err(|msg| TopOptError::Assembly(format!("element {e}: {msg}")))
                })
                .collect::<Result<Vec<_>>>()?;
            for (e, fe) in element_loads.iter().enumerate() {
                for (k, gdof) in dofs.element_dofs(mesh.element_nodes(e)).into_iter().enumerate() {
                    f[gdof] += fe[k];
                }
            }
        }

        dofs.zero_dirichlet(&mut f);
        Ok(f)
    }

    /// Per-element contraction c_e = a_eᵀ K0_e b_e (parallel)
    ///
    /// With a = b = u this is the solid-phase strain energy density used by
    /// the compliance sensitivity; with a = λ, b = u it is the adjoint term.
    pub fn element_contractions(
        mesh: &Mesh,
        dofs: &DofManager,
        element_matrices: &[DMatrix<f64>],
        a: &[f64],
        b: &[f64],
    ) -> Vec<f64> {
        element_matrices
            .par_iter()
            .enumerate()
            .map(|(e, k)| {
                let edofs = dofs.element_dofs(mesh.element_nodes(e));
                let mut sum = 0.0;
                for (i, &gi) in edofs.iter().enumerate() {
                    let ai = a[gi];
                    if ai == 0.0 {
                        continue;
                    }
                    let row: f64 = edofs
                        .iter()
                        .enumerate()
                        .map(|(j, &gj)| k[(i, j)] * b[gj])
                        .sum();
                    sum += ai * row;
                }
                sum
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FemConfig, OptConfig, TractionBc};
    use crate::linalg::LinearOperator;
    use crate::mesh::{CellType, MeshGenerator};
    use crate::region::{Axis, Region};
    use approx::assert_relative_eq;

    fn setup() -> (Mesh, BoundaryConditions) {
        let mesh = MeshGenerator::rectangle([0.0, 0.0], [3.0, 1.0], [3, 1]);
        let fem = FemConfig {
            youngs_modulus: 1.0,
            poisson_ratio: 0.3,
            disp_bc: Region::plane(Axis::X, 0.0),
            traction_bcs: vec![TractionBc {
                traction: vec![0.0, -1.0],
                region: Region::plane(Axis::X, 3.0),
            }],
            body_force: vec![0.0, -0.5],
            quadrature_degree: 2,
            linear_solver: Default::default(),
        };
        let opt: OptConfig = toml::from_str("max_iter = 1\nvol_frac = 0.5\nfilter_radius = 1.0").unwrap();
        let bcs = BoundaryConditions::resolve(&mesh, &fem, &opt).unwrap();
        (mesh, bcs)
    }

    #[test]
    fn test_assembled_stiffness_is_symmetric_with_unit_supports() {
        let (mesh, bcs) = setup();
        let quad = GaussQuadrature::for_cell(CellType::Quadrilateral, 2);
        let material = IsotropicElasticity::new(1.0, 0.3);
        let ke = Assembler::element_stiffness_matrices(&mesh, &material, &quad).unwrap();

        let k = Assembler::assemble_stiffness(&mesh, &bcs, &ke, &[1.0, 0.5, 1e-3]).unwrap();
        for (row, vec) in k.outer_iterator().enumerate() {
            for (col, &val) in vec.iter() {
                let transposed = k.get(col, row).copied().unwrap_or(0.0);
                assert_relative_eq!(val, transposed, epsilon = 1e-14);
            }
        }
        for dof in bcs.dofs.dirichlet_dofs() {
            assert_eq!(k.get(dof, dof).copied(), Some(1.0));
            assert_eq!(k.outer_view(dof).map(|r| r.nnz()), Some(1));
        }
    }

    #[test]
    fn test_load_totals() {
        let (mesh, bcs) = setup();
        let cell_quad = GaussQuadrature::for_cell(CellType::Quadrilateral, 2);
        let facet_quad = GaussQuadrature::for_facet(CellType::Quadrilateral, 2);
        let f = Assembler::assemble_load(&mesh, &bcs, &cell_quad, &facet_quad).unwrap();

        // Traction: -1 over an edge of length 1; body: -0.5 over area 3,
        // minus the share that lands on the two supported nodes (0.125 each)
        let total_y: f64 = f.iter().skip(1).step_by(2).sum();
        assert_relative_eq!(total_y, -1.0 - 1.5 + 2.0 * 0.5 / 4.0, epsilon = 1e-12);
        for dof in bcs.dofs.dirichlet_dofs() {
            assert_eq!(f[dof], 0.0);
        }
    }

    #[test]
    fn test_contraction_matches_energy() {
        let (mesh, bcs) = setup();
        let quad = GaussQuadrature::for_cell(CellType::Quadrilateral, 2);
        let ke = Assembler::element_stiffness_matrices(&mesh, &IsotropicElasticity::new(1.0, 0.3), &quad).unwrap();
        let k = Assembler::assemble_stiffness(&mesh, &bcs, &ke, &[1.0; 3]).unwrap();

        let mut u: Vec<f64> = (0..bcs.dofs.total_dofs()).map(|i| (i as f64 * 0.37).sin()).collect();
        bcs.dofs.zero_dirichlet(&mut u);
        let c = Assembler::element_contractions(&mesh, &bcs.dofs, &ke, &u, &u);

        let energy: f64 = u.iter().zip(k.apply(&u)).map(|(a, b)| a * b).sum();
        assert_relative_eq!(c.iter().sum::<f64>(), energy, epsilon = 1e-12);
    }
}
