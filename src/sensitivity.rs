//! Adjoint sensitivity analysis.
//!
//! For a response R(u(x̂), x̂) with K(x̂) u = f:
//!
//! ```text
//! K λ = −∂R/∂u
//! dR/dx̂_e = ∂R/∂x̂_e + E'(x̂_e) λ_eᵀ K0_e u_e
//! dR/dx   = Wᵀ (dx̂/dx̃ ⊙ dR/dx̂)
//! ```
//!
//! Compliance is self-adjoint (λ = −u) and needs no extra solve. Every other
//! state-dependent response costs one adjoint solve with the operator already
//! prepared for the state solve.

use rayon::prelude::*;
use tracing::debug;

use crate::context::DistributedContext;
use crate::design::{DensityFilter, DesignZones, HeavisideProjection, SimpInterpolation};
use crate::error::Result;
use crate::response::{Response, ResponseGradients};
use crate::state::StateSolver;

/// Chain-rule inputs of the current iteration
#[derive(Debug, Clone, Copy)]
pub struct DesignChain<'a> {
    pub filter: &'a DensityFilter,
    pub zones: &'a DesignZones,
    /// x̃
    pub filtered: &'a [f64],
    /// x̂
    pub physical: &'a [f64],
    pub beta: f64,
}

#[derive(Debug, Clone)]
pub struct AdjointEngine {
    ctx: DistributedContext,
    simp: SimpInterpolation,
    projection: HeavisideProjection,
    volume_weights: Vec<f64>,
}

impl AdjointEngine {
    pub fn new(
        ctx: DistributedContext,
        simp: SimpInterpolation,
        projection: HeavisideProjection,
        volume_weights: Vec<f64>,
    ) -> Self {
        Self {
            ctx,
            simp,
            projection,
            volume_weights,
        }
    }

    /// Design gradients of the requested responses
    pub fn gradients(
        &self,
        state: &dyn StateSolver,
        chain: &DesignChain<'_>,
        responses: &[Response],
    ) -> Result<ResponseGradients> {
        let stiffness_derivative = self.simp.stiffness_derivative(chain.physical, chain.zones);
        let projection_derivative =
            self.projection
                .derivative_field(chain.filtered, chain.beta, chain.zones);

        let mut gradients = ResponseGradients::default();
        for &response in responses {
            let physical_gradient = match response {
                Response::Compliance => self.compliance_physical(state, &stiffness_derivative),
                Response::VolumeFraction => self.volume_weights.clone(),
                Response::OutputDisplacement => {
                    self.output_displacement_physical(state, &stiffness_derivative)?
                }
            };
            let gradient = self.to_design(&physical_gradient, &projection_derivative, chain);
            debug!(
                ?response,
                max_abs = gradient.iter().fold(0.0_f64, |m, g| m.max(g.abs())),
                "sensitivity"
            );
            gradients.set(response, gradient);
        }
        Ok(gradients)
    }

    /// dC/dx̂_e = −E'(x̂_e) u_eᵀ K0_e u_e
    fn compliance_physical(&self, state: &dyn StateSolver, stiffness_derivative: &[f64]) -> Vec<f64> {
        let u = state.displacement();
        state
            .element_contractions(u, u)
            .par_iter()
            .zip(stiffness_derivative.par_iter())
            .map(|(energy, de)| -de * energy)
            .collect()
    }

    /// u_out = (1/n) Σ_{d ∈ out} u_d, no explicit dependence on x̂
    fn output_displacement_physical(
        &self,
        state: &dyn StateSolver,
        stiffness_derivative: &[f64],
    ) -> Result<Vec<f64>> {
        let mut rhs = vec![0.0; state.num_dofs()];
        if let Some(dofs) = state.output_dofs() {
            let count = self.ctx.sum(dofs.len() as f64);
            for &d in dofs {
                rhs[d] = -1.0 / count;
            }
        }
        self.adjoint_physical(state, &rhs, stiffness_derivative)
    }

    /// Adjoint path for a response without explicit x̂ dependence;
    /// `neg_dr_du` is −∂R/∂u
    fn adjoint_physical(
        &self,
        state: &dyn StateSolver,
        neg_dr_du: &[f64],
        stiffness_derivative: &[f64],
    ) -> Result<Vec<f64>> {
        let lambda = state.solve_adjoint(neg_dr_du)?;
        let contractions = state.element_contractions(&lambda, state.displacement());
        Ok(contractions
            .par_iter()
            .zip(stiffness_derivative.par_iter())
            .map(|(c, de)| de * c)
            .collect())
    }

    /// Pull dR/dx̂ back through the projection and the filter
    fn to_design(&self, physical_gradient: &[f64], projection_derivative: &[f64], chain: &DesignChain<'_>) -> Vec<f64> {
        let filtered_gradient: Vec<f64> = physical_gradient
            .par_iter()
            .zip(projection_derivative.par_iter())
            .map(|(g, d)| g * d)
            .collect();
        let mut gradient = chain.filter.apply_transpose(&filtered_gradient);
        chain.zones.zero_fixed(&mut gradient);
        gradient
    }
}
