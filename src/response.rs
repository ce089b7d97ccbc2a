//! Objective and constraint evaluation.
//!
//! Raw structural responses (compliance, volume fraction, output
//! displacement) are computed once per iteration from the physical density
//! and the state. [`Evaluator::formulate`] then turns responses and their
//! design gradients into the optimizer's `min f  s.t.  g_i <= 0` form for the
//! configured [`ObjectiveMode`].

use tracing::debug;

use crate::config::{ConfigError, ObjectiveMode, OptConfig};
use crate::context::DistributedContext;
use crate::error::{Result, TopOptError};
use crate::state::StateSolver;

/// Structural response that can be differentiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// C = fᵀu
    Compliance,
    /// Volume-weighted mean of x̂
    VolumeFraction,
    /// Mean displacement of the output spring DOFs along the spring axis
    OutputDisplacement,
}

/// Response values of one iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseValues {
    pub compliance: f64,
    pub volume_fraction: f64,
    pub output_displacement: Option<f64>,
}

/// Design-space gradients (with respect to x) of the responses a mode needs
#[derive(Debug, Clone, Default)]
pub struct ResponseGradients {
    pub compliance: Option<Vec<f64>>,
    pub volume_fraction: Option<Vec<f64>>,
    pub output_displacement: Option<Vec<f64>>,
}

impl ResponseGradients {
    pub fn get(&self, response: Response) -> Option<&[f64]> {
        match response {
            Response::Compliance => self.compliance.as_deref(),
            Response::VolumeFraction => self.volume_fraction.as_deref(),
            Response::OutputDisplacement => self.output_displacement.as_deref(),
        }
    }

    pub fn set(&mut self, response: Response, gradient: Vec<f64>) {
        match response {
            Response::Compliance => self.compliance = Some(gradient),
            Response::VolumeFraction => self.volume_fraction = Some(gradient),
            Response::OutputDisplacement => self.output_displacement = Some(gradient),
        }
    }
}

/// Optimization problem of one iteration in `min f  s.t.  g_i <= 0` form
#[derive(Debug, Clone)]
pub struct Formulation {
    /// Objective scaled by its first-iteration magnitude
    pub objective: f64,
    pub objective_gradient: Vec<f64>,
    pub constraints: Vec<f64>,
    pub constraint_gradients: Vec<Vec<f64>>,
}

/// Responses needed by `mode`: the objective first, then the constrained ones
pub fn responses_for(mode: ObjectiveMode) -> &'static [Response] {
    match mode {
        ObjectiveMode::Compliance => &[Response::Compliance, Response::VolumeFraction],
        ObjectiveMode::Mechanism => &[
            Response::OutputDisplacement,
            Response::VolumeFraction,
            Response::Compliance,
        ],
        ObjectiveMode::Volume => &[Response::VolumeFraction, Response::Compliance],
    }
}

/// Computes responses and assembles the optimizer's problem statement
#[derive(Debug, Clone)]
pub struct Evaluator {
    ctx: DistributedContext,
    mode: ObjectiveMode,
    vol_frac: f64,
    compliance_bound: Option<f64>,
    /// ∂V/∂x̂_e = v_e / Σ v
    volume_weights: Vec<f64>,
    objective_scale: Option<f64>,
}

impl Evaluator {
    pub fn new(ctx: DistributedContext, opt: &OptConfig, element_volumes: &[f64]) -> Self {
        let total = ctx.sum_slice(element_volumes);
        let volume_weights = element_volumes.iter().map(|v| v / total).collect();
        Self {
            ctx,
            mode: opt.objective_mode(),
            vol_frac: opt.vol_frac,
            compliance_bound: opt.compliance_bound,
            volume_weights,
            objective_scale: None,
        }
    }

    pub fn mode(&self) -> ObjectiveMode {
        self.mode
    }

    pub fn responses(&self) -> &'static [Response] {
        responses_for(self.mode)
    }

    pub fn volume_weights(&self) -> &[f64] {
        &self.volume_weights
    }

    pub fn volume_fraction(&self, x_phys: &[f64]) -> f64 {
        self.ctx.dot(&self.volume_weights, x_phys)
    }

    /// Evaluate all responses for the current state
    pub fn evaluate(&self, state: &dyn StateSolver, x_phys: &[f64]) -> Result<ResponseValues> {
        TopOptError::check_len("physical density", self.volume_weights.len(), x_phys.len())?;
        let u = state.displacement();
        let compliance = self.ctx.dot(state.load(), u);
        let volume_fraction = self.volume_fraction(x_phys);
        let output_displacement = state.output_dofs().map(|dofs| {
            let local: f64 = dofs.iter().map(|&d| u[d]).sum();
            self.ctx.sum(local) / self.ctx.sum(dofs.len() as f64)
        });

        let values = ResponseValues {
            compliance,
            volume_fraction,
            output_displacement,
        };
        debug!(?values, "responses");
        Ok(values)
    }

    /// Value of a single response
    pub fn value(values: &ResponseValues, response: Response) -> Result<f64> {
        match response {
            Response::Compliance => Ok(values.compliance),
            Response::VolumeFraction => Ok(values.volume_fraction),
            Response::OutputDisplacement => values
                .output_displacement
                .ok_or_else(|| TopOptError::Evaluation("problem has no output spring".into())),
        }
    }

    /// Build `min f  s.t.  g <= 0` from responses and design gradients
    ///
    /// The first call fixes the objective scale to the magnitude of the first
    /// objective value. Constraints are normalized: `V/v* − 1` and `C/C̄ − 1`.
    pub fn formulate(&mut self, values: &ResponseValues, gradients: &ResponseGradients) -> Result<Formulation> {
        let responses = responses_for(self.mode);
        let objective_response = responses[0];
        let f = Self::value(values, objective_response)?;
        let scale = *self.objective_scale.get_or_insert_with(|| {
            if f.abs() > f64::MIN_POSITIVE {
                f.abs()
            } else {
                1.0
            }
        });
        let objective_gradient = gradient(gradients, objective_response)?
            .iter()
            .map(|g| g / scale)
            .collect();

        let mut constraints = Vec::with_capacity(responses.len() - 1);
        let mut constraint_gradients = Vec::with_capacity(responses.len() - 1);
        for &response in &responses[1..] {
            let bound = match response {
                Response::VolumeFraction => self.vol_frac,
                Response::Compliance => self
                    .compliance_bound
                    .ok_or(ConfigError::Missing("opt.compliance_bound"))?,
                Response::OutputDisplacement => {
                    return Err(TopOptError::Evaluation(
                        "output displacement cannot be constrained".into(),
                    ))
                }
            };
            constraints.push(Self::value(values, response)? / bound - 1.0);
            constraint_gradients.push(gradient(gradients, response)?.iter().map(|g| g / bound).collect());
        }

        Ok(Formulation {
            objective: f / scale,
            objective_gradient,
            constraints,
            constraint_gradients,
        })
    }
}

fn gradient(gradients: &ResponseGradients, response: Response) -> Result<&[f64]> {
    gradients
        .get(response)
        .ok_or_else(|| TopOptError::Evaluation(format!("missing sensitivity of {response:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn opt(extra: &str) -> OptConfig {
        toml::from_str(&format!("max_iter = 1\nvol_frac = 0.4\nfilter_radius = 1.0\n{extra}")).unwrap()
    }

    #[test]
    fn test_volume_fraction_is_weighted_mean() {
        let evaluator = Evaluator::new(DistributedContext::serial(), &opt(""), &[1.0, 3.0]);
        assert_relative_eq!(evaluator.volume_fraction(&[1.0, 0.0]), 0.25);
        assert_relative_eq!(evaluator.volume_fraction(&[0.5, 0.5]), 0.5);
    }

    #[test]
    fn test_compliance_formulation() {
        let mut evaluator = Evaluator::new(DistributedContext::serial(), &opt(""), &[1.0, 1.0]);
        let values = ResponseValues {
            compliance: 8.0,
            volume_fraction: 0.5,
            output_displacement: None,
        };
        let mut gradients = ResponseGradients::default();
        gradients.set(Response::Compliance, vec![-4.0, -2.0]);
        gradients.set(Response::VolumeFraction, vec![0.5, 0.5]);

        let first = evaluator.formulate(&values, &gradients).unwrap();
        assert_relative_eq!(first.objective, 1.0);
        assert_eq!(first.objective_gradient, vec![-0.5, -0.25]);
        assert_relative_eq!(first.constraints[0], 0.25, epsilon = 1e-14);
        assert_relative_eq!(first.constraint_gradients[0][0], 1.25, epsilon = 1e-14);

        // Scale is frozen after the first call
        let later = ResponseValues { compliance: 4.0, ..values };
        assert_relative_eq!(evaluator.formulate(&later, &gradients).unwrap().objective, 0.5);
    }

    #[test]
    fn test_mechanism_has_two_constraints() {
        let mode_opt = opt("optimizer = \"mma\"\nopt_compliance = false\ncompliance_bound = 2.0\n\
             out_spring = { region = { type = \"everywhere\" }, axis = \"x\", stiffness = 1.0 }");
        let mut evaluator = Evaluator::new(DistributedContext::serial(), &mode_opt, &[1.0]);
        assert_eq!(evaluator.mode(), ObjectiveMode::Mechanism);

        let values = ResponseValues {
            compliance: 3.0,
            volume_fraction: 0.2,
            output_displacement: Some(-0.1),
        };
        let mut gradients = ResponseGradients::default();
        gradients.set(Response::OutputDisplacement, vec![0.3]);
        gradients.set(Response::VolumeFraction, vec![1.0]);
        gradients.set(Response::Compliance, vec![-1.0]);

        let f = evaluator.formulate(&values, &gradients).unwrap();
        assert_relative_eq!(f.objective, -1.0);
        assert_relative_eq!(f.constraints[0], -0.5);
        assert_relative_eq!(f.constraints[1], 0.5);
        assert_relative_eq!(f.constraint_gradients[1][0], -0.5);
    }

    #[test]
    fn test_missing_gradient_is_error() {
        let mut evaluator = Evaluator::new(DistributedContext::serial(), &opt(""), &[1.0]);
        let values = ResponseValues {
            compliance: 1.0,
            volume_fraction: 0.4,
            output_displacement: None,
        };
        assert!(evaluator.formulate(&values, &ResponseGradients::default()).is_err());
    }
}
