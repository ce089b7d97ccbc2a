/// Boundary condition handling for FEM
///
/// Resolves the region locators of a configuration against a mesh into
/// concrete DOF sets and facet lists: homogeneous supports, surface tractions,
/// a constant body force and the optional input/output springs.

use nalgebra::Point3;

use super::dof::DofManager;
use super::basis::LagrangeBasis;
use super::quadrature::GaussQuadrature;
use crate::config::{ConfigError, FemConfig, OptConfig, SpringConfig};
use crate::mesh::{Facet, Mesh};
use crate::region::Region;

/// Constant traction applied over a set of boundary facets
#[derive(Debug, Clone)]
pub struct TractionLoad {
    pub facets: Vec<Facet>,
    pub traction: [f64; 3],
}

/// Linear spring acting on one displacement component of the located nodes
///
/// The spring's stiffness is shared equally among its DOFs, so the total
/// stiffness does not depend on mesh resolution.
#[derive(Debug, Clone)]
pub struct SpringSupport {
    /// Free DOFs the spring acts on
    pub dofs: Vec<usize>,
    /// Total stiffness
    pub stiffness: f64,
}

impl SpringSupport {
    /// Diagonal stiffness added to each located DOF
    pub fn stiffness_per_dof(&self) -> f64 {
        self.stiffness / self.dofs.len() as f64
    }
}

/// Boundary condition set, immutable for the run
#[derive(Debug, Clone)]
pub struct BoundaryConditions {
    pub dofs: DofManager,
    pub tractions: Vec<TractionLoad>,
    pub body_force: [f64; 3],
    pub in_spring: Option<SpringSupport>,
    pub out_spring: Option<SpringSupport>,
}

impl BoundaryConditions {
    /// Locate supports, loads and springs on the mesh
    ///
    /// # Errors
    /// [`ConfigError::EmptyRegion`] when a locator selects nothing, and
    /// [`ConfigError::Incompatible`] when the problem carries no load at all.
    pub fn resolve(mesh: &Mesh, fem: &FemConfig, opt: &OptConfig) -> Result<Self, ConfigError> {
        let dim = mesh.dim();
        let mut dofs = DofManager::new(mesh.num_nodes(), dim);

        let fixed = nodes_in(mesh, &fem.disp_bc);
        if fixed.is_empty() {
            return Err(ConfigError::EmptyRegion {
                name: "fem.disp_bc",
                what: "nodes",
            });
        }
        for node in fixed {
            dofs.set_dirichlet_node(node);
        }

        let boundary = mesh.boundary_facets();
        let mut tractions = Vec::with_capacity(fem.traction_bcs.len());
        for bc in &fem.traction_bcs {
            let facets = Self::find_boundary_facets(mesh, &boundary, &bc.region);
            if facets.is_empty() {
                return Err(ConfigError::EmptyRegion {
                    name: "fem.traction_bcs",
                    what: "boundary facets",
                });
            }
            let mut traction = [0.0; 3];
            for (dst, &src) in traction.iter_mut().zip(&bc.traction) {
                *dst = src;
            }
            tractions.push(TractionLoad { facets, traction });
        }

        let body_force = fem.body_force_vector();
        let loaded = tractions
            .iter()
            .any(|t| t.traction.iter().any(|&v| v != 0.0))
            || body_force.iter().any(|&v| v != 0.0);
        if !loaded {
            return Err(ConfigError::Incompatible(
                "no traction or body force is applied".into(),
            ));
        }

        let in_spring = opt
            .in_spring
            .as_ref()
            .map(|s| locate_spring(mesh, &dofs, s, "opt.in_spring"))
            .transpose()?;
        let out_spring = opt
            .out_spring
            .as_ref()
            .map(|s| locate_spring(mesh, &dofs, s, "opt.out_spring"))
            .transpose()?;

        Ok(Self {
            dofs,
            tractions,
            body_force,
            in_spring,
            out_spring,
        })
    }

    /// Boundary facets whose nodes all lie inside `region`
    pub fn find_boundary_facets(mesh: &Mesh, boundary: &[Facet], region: &Region) -> Vec<Facet> {
        boundary
            .iter()
            .filter(|facet| {
                facet
                    .nodes
                    .iter()
                    .all(|&n| region.contains(&mesh.geometry.nodes[n]))
            })
            .cloned()
            .collect()
    }

    /// Springs in assembly order
    pub fn springs(&self) -> impl Iterator<Item = &SpringSupport> {
        self.in_spring.iter().chain(self.out_spring.iter())
    }
}

fn nodes_in(mesh: &Mesh, region: &Region) -> Vec<usize> {
    mesh.geometry
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, p)| region.contains(p))
        .map(|(i, _)| i)
        .collect()
}

fn locate_spring(
    mesh: &Mesh,
    dofs: &DofManager,
    spring: &SpringConfig,
    name: &'static str,
) -> Result<SpringSupport, ConfigError> {
    let axis = spring.axis.index();
    let located: Vec<usize> = nodes_in(mesh, &spring.region)
        .into_iter()
        .map(|n| dofs.global_dof(n, axis))
        .filter(|&dof| !dofs.is_dirichlet(dof))
        .collect();
    if located.is_empty() {
        return Err(ConfigError::EmptyRegion {
            name,
            what: "free DOFs",
        });
    }
    Ok(SpringSupport {
        dofs: located,
        stiffness: spring.stiffness,
    })
}

/// Consistent nodal forces of a constant traction on one facet: f = ∫ N^T t dS
///
/// # Arguments
/// * `coords` - Facet node coordinates, ordered cyclically
/// * `traction` - Force per unit area (first `dim` components used)
/// * `dim` - Spatial dimension of the mesh
/// * `quad` - Facet quadrature rule
///
/// # Returns
/// Nodal forces interleaved by node (`dim` entries per facet node)
pub fn facet_traction_load(
    coords: &[Point3<f64>],
    traction: &[f64; 3],
    dim: usize,
    quad: &GaussQuadrature,
) -> Vec<f64> {
    let basis = LagrangeBasis::new(dim - 1);
    let mut f = vec![0.0; dim * coords.len()];

    for (qp, weight) in quad.points.iter().zip(quad.weights.iter()) {
        let measure = basis.facet_measure(qp, coords);
        let n = basis.shape_functions(qp);
        for (a, &na) in n.iter().enumerate() {
            for c in 0..dim {
                f[dim * a + c] += na * traction[c] * weight * measure;
            }
        }
    }
    f
}
