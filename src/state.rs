//! Linear elastic state solve `K(x̂) u = f`.
//!
//! The optimization core only sees the [`StateSolver`] trait: it hands over
//! one stiffness multiplier per element and reads back displacements, adjoint
//! solutions and per-element energy contractions. [`FemStateSolver`] is the
//! reference implementation on structured Q4/H8 meshes.

use nalgebra::DMatrix;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::{ConfigError, TopOptConfig};
use crate::context::DistributedContext;
use crate::error::{Result, TopOptError};
use crate::fem::{Assembler, BoundaryConditions, GaussQuadrature};
use crate::linalg::{build_solver, LinearSolver};
use crate::mechanics::IsotropicElasticity;
use crate::mesh::Mesh;

/// Discrete state problem seen by the evaluator and the adjoint engine.
///
/// One call to [`solve_state`](StateSolver::solve_state) per design iteration
/// prepares the operator; [`solve_adjoint`](StateSolver::solve_adjoint) then
/// reuses it (factor or preconditioner) for any number of adjoint systems.
pub trait StateSolver: Send {
    /// Number of locally owned elements (design variables)
    fn num_elements(&self) -> usize;

    /// Number of locally owned DOFs
    fn num_dofs(&self) -> usize;

    /// Design-independent load vector f (zero on supported DOFs)
    fn load(&self) -> &[f64];

    /// Element volumes (areas in 2D)
    fn element_volumes(&self) -> &[f64];

    /// DOFs of the output spring, if the problem has one
    fn output_dofs(&self) -> Option<&[usize]>;

    /// Assemble `K = Σ s_e K0_e + springs` and solve `K u = f`
    fn solve_state(&mut self, stiffness: &[f64]) -> Result<()>;

    /// Displacements from the last successful [`solve_state`](StateSolver::solve_state)
    fn displacement(&self) -> &[f64];

    /// Solve `K λ = rhs` with the operator of the last state solve.
    /// Supported DOFs of `rhs` are ignored; they are zero in the result.
    fn solve_adjoint(&self, rhs: &[f64]) -> Result<Vec<f64>>;

    /// `a_eᵀ K0_e b_e` for every element
    fn element_contractions(&self, a: &[f64], b: &[f64]) -> Vec<f64>;
}

/// Reference state solver: sprs assembly of isotropic elasticity
pub struct FemStateSolver {
    ctx: DistributedContext,
    mesh: Arc<Mesh>,
    bcs: BoundaryConditions,
    element_matrices: Vec<DMatrix<f64>>,
    element_volumes: Vec<f64>,
    load: Vec<f64>,
    solver: Box<dyn LinearSolver>,
    displacement: Vec<f64>,
    factorized: bool,
}

impl std::fmt::Debug for FemStateSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FemStateSolver")
            .field("ctx", &self.ctx)
            .field("factorized", &self.factorized)
            .finish_non_exhaustive()
    }
}

impl FemStateSolver {
    /// Resolve boundary conditions and precompute everything that does not
    /// depend on the design: element matrices, volumes and the load vector.
    ///
    /// # Errors
    /// [`TopOptError::Config`] when locators select nothing or the mesh and
    /// configuration disagree on the dimension, [`TopOptError::Assembly`] for
    /// degenerate elements.
    pub fn new(ctx: DistributedContext, mesh: Arc<Mesh>, config: &TopOptConfig) -> Result<Self> {
        if mesh.dim() != config.dim() {
            return Err(ConfigError::Incompatible(format!(
                "mesh is {}D but the configuration describes a {}D problem",
                mesh.dim(),
                config.dim()
            ))
            .into());
        }
        let fem = &config.fem;
        let bcs = BoundaryConditions::resolve(&mesh, fem, &config.opt)?;

        let n = fem.gauss_points_per_direction();
        let cell_quad = GaussQuadrature::for_cell(mesh.cell_type(), n);
        let facet_quad = GaussQuadrature::for_facet(mesh.cell_type(), n);
        let material = IsotropicElasticity::new(fem.youngs_modulus, fem.poisson_ratio);

        let start = Instant::now();
        let element_matrices = Assembler::element_stiffness_matrices(&mesh, &material, &cell_quad)?;
        let element_volumes = Assembler::element_volumes(&mesh, &cell_quad)?;
        let load = Assembler::assemble_load(&mesh, &bcs, &cell_quad, &facet_quad)?;

        debug!(
            elements = mesh.num_elements(),
            dofs = bcs.dofs.total_dofs(),
            fixed_dofs = bcs.dofs.num_constrained_dofs(),
            quadrature_points = cell_quad.num_points(),
            setup_time = start.elapsed().as_secs_f64(),
            "state solver ready"
        );

        let solver = build_solver(&fem.linear_solver);
        let displacement = vec![0.0; bcs.dofs.total_dofs()];
        Ok(Self {
            ctx,
            mesh,
            bcs,
            element_matrices,
            element_volumes,
            load,
            solver,
            displacement,
            factorized: false,
        })
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn boundary_conditions(&self) -> &BoundaryConditions {
        &self.bcs
    }

    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }
}

impl StateSolver for FemStateSolver {
    fn num_elements(&self) -> usize {
        self.mesh.num_elements()
    }

    fn num_dofs(&self) -> usize {
        self.bcs.dofs.total_dofs()
    }

    fn load(&self) -> &[f64] {
        &self.load
    }

    fn element_volumes(&self) -> &[f64] {
        &self.element_volumes
    }

    fn output_dofs(&self) -> Option<&[usize]> {
        self.bcs.out_spring.as_ref().map(|s| s.dofs.as_slice())
    }

    fn solve_state(&mut self, stiffness: &[f64]) -> Result<()> {
        let k = Assembler::assemble_stiffness(&self.mesh, &self.bcs, &self.element_matrices, stiffness)?;

        self.factorized = false;
        self.solver.factorize(&k)?;
        self.factorized = true;

        let (u, stats) = self.solver.solve(&self.load)?;
        debug!(
            solver = self.solver.name(),
            iterations = stats.iterations,
            relative_residual = stats.relative_residual,
            solve_time = stats.solve_time,
            "state solve"
        );
        self.displacement = u;
        self.ctx.barrier();
        Ok(())
    }

    fn displacement(&self) -> &[f64] {
        &self.displacement
    }

    fn solve_adjoint(&self, rhs: &[f64]) -> Result<Vec<f64>> {
        TopOptError::check_len("adjoint right-hand side", self.num_dofs(), rhs.len())?;
        if !self.factorized {
            return Err(crate::linalg::SolveError::NotFactorized.into());
        }
        let mut b = rhs.to_vec();
        self.bcs.dofs.zero_dirichlet(&mut b);

        let (lambda, stats) = self.solver.solve(&b)?;
        debug!(
            iterations = stats.iterations,
            relative_residual = stats.relative_residual,
            "adjoint solve"
        );
        Ok(lambda)
    }

    fn element_contractions(&self, a: &[f64], b: &[f64]) -> Vec<f64> {
        Assembler::element_contractions(&self.mesh, &self.bcs.dofs, &self.element_matrices, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{LinearOperator, SolverUtils};
    use crate::mesh::MeshGenerator;
    use approx::assert_relative_eq;

    const CONFIG: &str = r#"
[mesh]
kind = "rectangle"
min = [0.0, 0.0]
max = [4.0, 1.0]
divisions = [8, 2]

[fem]
youngs_modulus = 1.0
poisson_ratio = 0.3
disp_bc = { type = "plane", axis = "x", value = 0.0 }
traction_bcs = [{ traction = [0.0, -1.0], region = { type = "plane", axis = "x", value = 4.0 } }]

[fem.linear_solver]
kind = "direct"

[opt]
max_iter = 1
vol_frac = 0.5
filter_radius = 0.8
"#;

    fn solver() -> (FemStateSolver, TopOptConfig) {
        let config = TopOptConfig::from_toml_str(CONFIG).unwrap();
        let mesh = Arc::new(MeshGenerator::from_config(&config.mesh));
        let state = FemStateSolver::new(DistributedContext::serial(), mesh, &config).unwrap();
        (state, config)
    }

    #[test]
    fn test_stiffer_material_reduces_compliance() {
        let (mut state, _) = solver();
        let n = state.num_elements();

        state.solve_state(&vec![0.5; n]).unwrap();
        let soft: f64 = state.load().iter().zip(state.displacement()).map(|(f, u)| f * u).sum();
        state.solve_state(&vec![1.0; n]).unwrap();
        let stiff: f64 = state.load().iter().zip(state.displacement()).map(|(f, u)| f * u).sum();

        assert!(stiff > 0.0);
        // Uniform scaling of K scales u inversely
        assert_relative_eq!(soft, 2.0 * stiff, max_relative = 1e-10);
    }

    #[test]
    fn test_adjoint_reuses_operator() {
        let (mut state, _) = solver();
        let n = state.num_elements();
        let stiffness: Vec<f64> = (0..n).map(|e| 0.2 + 0.05 * e as f64).collect();
        state.solve_state(&stiffness).unwrap();

        // Solving with the load as right-hand side reproduces u
        let lambda = state.solve_adjoint(state.load()).unwrap();
        for (a, b) in lambda.iter().zip(state.displacement()) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
        for dof in state.boundary_conditions().dofs.dirichlet_dofs() {
            assert_eq!(state.displacement()[dof], 0.0);
        }

        let k = Assembler::assemble_stiffness(
            state.mesh(),
            state.boundary_conditions(),
            &state.element_matrices,
            &stiffness,
        )
        .unwrap();
        assert!(SolverUtils::relative_residual(&k, state.displacement(), state.load()) < 1e-10);
        assert_eq!(k.apply(state.displacement()).len(), state.num_dofs());
    }

    #[test]
    fn test_adjoint_before_state_is_error() {
        let (state, _) = solver();
        let rhs = vec![0.0; state.num_dofs()];
        assert!(matches!(
            state.solve_adjoint(&rhs),
            Err(TopOptError::Solve(crate::linalg::SolveError::NotFactorized))
        ));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let (_, config) = solver();
        let mesh = Arc::new(MeshGenerator::cuboid([0.0; 3], [1.0; 3], [1, 1, 1]));
        let err = FemStateSolver::new(DistributedContext::serial(), mesh, &config).unwrap_err();
        assert!(matches!(err, TopOptError::Config(ConfigError::Incompatible(_))));
    }
}
