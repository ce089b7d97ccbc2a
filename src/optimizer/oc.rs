use rayon::prelude::*;
use tracing::{trace, warn};

use super::{check_input, Optimizer, OptimizerInput, UpdateDiagnostics};
use crate::context::DistributedContext;
use crate::error::Result;

const LAMBDA_LOWER: f64 = 0.0;
const LAMBDA_UPPER: f64 = 1e9;
/// Relative bracket width (l2 − l1)/(l1 + l2) at which bisection stops
const BRACKET_TOL: f64 = 1e-6;
const MAX_BISECTIONS: usize = 200;
/// Floor for the constraint gradient in the update ratio
const MIN_CONSTRAINT_GRADIENT: f64 = 1e-30;

/// Optimality Criteria update for a single (volume) constraint
///
/// x' = clamp(x · sqrt(−∂f/∂x / (λ ∂g/∂x)), max(0, x − m), min(1, x + m)),
/// with λ found by bisection so that the linearized constraint
/// g + ∂gᵀ(x' − x) is active.
///
/// # References
/// - Bendsøe & Sigmund, "Topology Optimization: Theory, Methods and
///   Applications", Springer (2003), §1.2.2
/// - Andreassen et al., "Efficient topology optimization in MATLAB using 88
///   lines of code", SMO 43 (2011)
#[derive(Debug, Clone)]
pub struct OptimalityCriteria {
    ctx: DistributedContext,
}

impl OptimalityCriteria {
    pub fn new(ctx: DistributedContext) -> Self {
        Self { ctx }
    }

    fn candidate(input: &OptimizerInput<'_>, lambda: f64) -> Vec<f64> {
        let m = input.move_limit;
        let dg = &input.constraint_gradients[0];
        input
            .x
            .par_iter()
            .enumerate()
            .map(|(j, &xj)| {
                if input.fixed[j] {
                    return xj;
                }
                let ratio = (-input.objective_gradient[j]).max(0.0)
                    / (lambda * dg[j].max(MIN_CONSTRAINT_GRADIENT));
                let lo = (xj - m).max(0.0);
                let hi = (xj + m).min(1.0);
                (xj * ratio.sqrt()).clamp(lo, hi)
            })
            .collect()
    }

    /// Linearized constraint at a candidate
    fn linearized(&self, input: &OptimizerInput<'_>, candidate: &[f64]) -> f64 {
        let dg = &input.constraint_gradients[0];
        let local: f64 = candidate
            .par_iter()
            .zip(input.x.par_iter())
            .zip(dg.par_iter())
            .map(|((xn, x), g)| g * (xn - x))
            .sum();
        input.constraints[0] + self.ctx.sum(local)
    }
}

impl Optimizer for OptimalityCriteria {
    fn name(&self) -> &'static str {
        "OC"
    }

    fn update(&mut self, input: &OptimizerInput<'_>) -> Result<(Vec<f64>, UpdateDiagnostics)> {
        check_input(input, Some(1))?;

        let (mut l1, mut l2) = (LAMBDA_LOWER, LAMBDA_UPPER);
        let mut iterations = 0;
        let mut closed = false;
        while iterations < MAX_BISECTIONS {
            iterations += 1;
            let lmid = 0.5 * (l1 + l2);
            let candidate = Self::candidate(input, lmid);
            if self.linearized(input, &candidate) > 0.0 {
                l1 = lmid;
            } else {
                l2 = lmid;
            }
            if (l2 - l1) / (l1 + l2) < BRACKET_TOL || l2 < 1e-40 {
                closed = true;
                break;
            }
        }

        if !closed {
            warn!(
                iterations,
                l1,
                l2,
                "OC bisection reached its iteration cap, using the current estimate"
            );
        }

        let lambda = 0.5 * (l1 + l2);
        let x_new = Self::candidate(input, lambda);
        trace!(lambda, iterations, "OC multiplier");

        Ok((
            x_new,
            UpdateDiagnostics {
                inner_iterations: iterations,
                multipliers: vec![lambda],
                bisection_capped: !closed,
                infeasible: false,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn volume_problem(n: usize) -> (Vec<f64>, Vec<f64>, Vec<Vec<f64>>) {
        let x = vec![0.5; n];
        let df: Vec<f64> = (0..n).map(|j| -1.0 - (j as f64 * 0.37).sin().abs()).collect();
        let dg = vec![vec![1.0 / (0.5 * n as f64); n]];
        (x, df, dg)
    }

    #[test]
    fn test_linearized_volume_is_active() {
        let n = 40;
        let (x, df, dg) = volume_problem(n);
        let fixed = vec![false; n];
        let input = OptimizerInput {
            x: &x,
            objective: 1.0,
            objective_gradient: &df,
            constraints: &[0.0],
            constraint_gradients: &dg,
            move_limit: 0.2,
            fixed: &fixed,
        };
        let mut oc = OptimalityCriteria::new(DistributedContext::serial());
        let (x_new, diag) = oc.update(&input).unwrap();

        assert!(!diag.bisection_capped);
        let mean: f64 = x_new.iter().sum::<f64>() / n as f64;
        assert_relative_eq!(mean, 0.5, epsilon = 1e-5);
        for (a, b) in x_new.iter().zip(&x) {
            assert!((a - b).abs() <= 0.2 + 1e-15);
            assert!((0.0..=1.0).contains(a));
        }
        // Elements with larger sensitivity gain material
        let most = (0..n).min_by(|&a, &b| df[a].partial_cmp(&df[b]).unwrap()).unwrap();
        let least = (0..n).max_by(|&a, &b| df[a].partial_cmp(&df[b]).unwrap()).unwrap();
        assert!(x_new[most] > x_new[least]);
    }

    #[test]
    fn test_fixed_entries_untouched() {
        let n = 10;
        let (mut x, df, dg) = volume_problem(n);
        x[0] = 1.0;
        x[9] = 0.0;
        let mut fixed = vec![false; n];
        fixed[0] = true;
        fixed[9] = true;
        let input = OptimizerInput {
            x: &x,
            objective: 1.0,
            objective_gradient: &df,
            constraints: &[0.3],
            constraint_gradients: &dg,
            move_limit: 0.1,
            fixed: &fixed,
        };
        let (x_new, _) = OptimalityCriteria::new(DistributedContext::serial()).update(&input).unwrap();
        assert_eq!(x_new[0].to_bits(), 1.0f64.to_bits());
        assert_eq!(x_new[9].to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn test_requires_single_constraint() {
        let (x, df, mut dg) = volume_problem(4);
        dg.push(dg[0].clone());
        let fixed = vec![false; 4];
        let input = OptimizerInput {
            x: &x,
            objective: 1.0,
            objective_gradient: &df,
            constraints: &[0.0, 0.0],
            constraint_gradients: &dg,
            move_limit: 0.1,
            fixed: &fixed,
        };
        assert!(OptimalityCriteria::new(DistributedContext::serial()).update(&input).is_err());
    }
}
