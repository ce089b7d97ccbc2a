use rayon::prelude::*;
use tracing::{trace, warn};

use super::{check_input, Optimizer, OptimizerInput, UpdateDiagnostics};
use crate::context::DistributedContext;
use crate::error::Result;

const ASYINIT: f64 = 0.5;
const ASYINCR: f64 = 1.2;
const ASYDECR: f64 = 0.7;
/// Asymptote distance bounds as multiples of the variable range
const ASY_MIN: f64 = 0.01;
const ASY_MAX: f64 = 10.0;
const ALBEFA: f64 = 0.1;
const RAA0: f64 = 1e-5;
/// Multipliers above this mean the subproblem has no feasible point
const LAMBDA_MAX: f64 = 1e9;
const DUAL_TOL: f64 = 1e-8;
const MAX_SWEEPS: usize = 100;
const MAX_BISECTIONS: usize = 200;

const X_MIN: f64 = 0.0;
const X_MAX: f64 = 1.0;

/// Method of Moving Asymptotes
///
/// Each update replaces objective and constraints by separable convex
/// approximations `Σ_j p_ij/(U_j − x_j) + q_ij/(x_j − L_j) + r_i`, whose
/// minimizer for fixed multipliers has a closed form. The dual is maximized
/// by coordinate-wise bisection on each multiplier. If a constraint cannot be
/// satisfied inside the move-limit box its multiplier saturates, the design
/// ends up at the box point that most reduces that constraint, and the update
/// is flagged infeasible.
///
/// # References
/// - Svanberg, "The method of moving asymptotes: a new method for structural
///   optimization", IJNME 24 (1987)
/// - Svanberg, "MMA and GCMMA, versions September 2007", KTH lecture notes
#[derive(Debug, Clone)]
pub struct MovingAsymptotes {
    ctx: DistributedContext,
    num_constraints: usize,
    iteration: usize,
    xold1: Vec<f64>,
    xold2: Vec<f64>,
    low: Vec<f64>,
    upp: Vec<f64>,
}

/// Separable approximation of one update
struct Subproblem<'a> {
    low: &'a [f64],
    upp: &'a [f64],
    alpha: Vec<f64>,
    beta: Vec<f64>,
    p0: Vec<f64>,
    q0: Vec<f64>,
    /// p[i][j], q[i][j] for constraint i
    p: Vec<Vec<f64>>,
    q: Vec<Vec<f64>>,
    r: Vec<f64>,
    free: &'a [bool],
}

impl MovingAsymptotes {
    pub fn new(ctx: DistributedContext, num_vars: usize, num_constraints: usize) -> Self {
        Self {
            ctx,
            num_constraints,
            iteration: 0,
            xold1: vec![0.0; num_vars],
            xold2: vec![0.0; num_vars],
            low: vec![X_MIN; num_vars],
            upp: vec![X_MAX; num_vars],
        }
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn asymptotes(&self) -> (&[f64], &[f64]) {
        (&self.low, &self.upp)
    }

    fn update_asymptotes(&mut self, x: &[f64]) {
        let range = X_MAX - X_MIN;
        if self.iteration < 2 {
            for j in 0..x.len() {
                self.low[j] = x[j] - ASYINIT * range;
                self.upp[j] = x[j] + ASYINIT * range;
            }
            return;
        }
        for j in 0..x.len() {
            let trend = (x[j] - self.xold1[j]) * (self.xold1[j] - self.xold2[j]);
            let factor = if trend < 0.0 {
                ASYDECR
            } else if trend > 0.0 {
                ASYINCR
            } else {
                1.0
            };
            let low = x[j] - factor * (self.xold1[j] - self.low[j]);
            let upp = x[j] + factor * (self.upp[j] - self.xold1[j]);
            self.low[j] = low.clamp(x[j] - ASY_MAX * range, x[j] - ASY_MIN * range);
            self.upp[j] = upp.clamp(x[j] + ASY_MIN * range, x[j] + ASY_MAX * range);
        }
    }
}

/// p, q coefficients of one function about x
fn coefficients(x: &[f64], low: &[f64], upp: &[f64], grad: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let range = X_MAX - X_MIN;
    x.par_iter()
        .zip(grad.par_iter())
        .enumerate()
        .map(|(j, (&xj, &dj))| {
            let ux = upp[j] - xj;
            let xl = xj - low[j];
            let pos = dj.max(0.0);
            let neg = (-dj).max(0.0);
            let p = ux * ux * (1.001 * pos + 0.001 * neg + RAA0 / range);
            let q = xl * xl * (0.001 * pos + 1.001 * neg + RAA0 / range);
            (p, q)
        })
        .unzip()
}

impl<'a> Subproblem<'a> {
    /// Minimizer of the Lagrangian approximation for multipliers `lambda`
    fn primal(&self, lambda: &[f64]) -> Vec<f64> {
        (0..self.alpha.len())
            .into_par_iter()
            .map(|j| {
                if !self.free[j] {
                    return self.alpha[j];
                }
                let mut p = self.p0[j];
                let mut q = self.q0[j];
                for (i, &l) in lambda.iter().enumerate() {
                    p += l * self.p[i][j];
                    q += l * self.q[i][j];
                }
                let (sp, sq) = (p.sqrt(), q.sqrt());
                let x = (sp * self.low[j] + sq * self.upp[j]) / (sp + sq);
                x.clamp(self.alpha[j], self.beta[j])
            })
            .collect()
    }

    /// Approximated value of constraint i at x
    fn constraint(&self, ctx: &DistributedContext, i: usize, x: &[f64]) -> f64 {
        let local: f64 = (0..x.len())
            .into_par_iter()
            .filter(|&j| self.free[j])
            .map(|j| self.p[i][j] / (self.upp[j] - x[j]) + self.q[i][j] / (x[j] - self.low[j]))
            .sum();
        ctx.sum(local) + self.r[i]
    }

    /// Constraint i at the primal minimizer with λ_i set to `value`
    fn residual_along(&self, ctx: &DistributedContext, lambda: &mut [f64], i: usize, value: f64) -> f64 {
        lambda[i] = value;
        let x = self.primal(lambda);
        self.constraint(ctx, i, &x)
    }
}

impl Optimizer for MovingAsymptotes {
    fn name(&self) -> &'static str {
        "MMA"
    }

    fn update(&mut self, input: &OptimizerInput<'_>) -> Result<(Vec<f64>, UpdateDiagnostics)> {
        check_input(input, Some(self.num_constraints))?;
        crate::error::TopOptError::check_len("design", self.low.len(), input.x.len())?;
        let x = input.x;
        let n = x.len();
        let m = self.num_constraints;
        let range = X_MAX - X_MIN;

        self.update_asymptotes(x);

        let free: Vec<bool> = input.fixed.iter().map(|f| !f).collect();
        let (alpha, beta): (Vec<f64>, Vec<f64>) = (0..n)
            .map(|j| {
                if !free[j] {
                    return (x[j], x[j]);
                }
                let lo = X_MIN
                    .max(self.low[j] + ALBEFA * (x[j] - self.low[j]))
                    .max(x[j] - input.move_limit * range);
                let hi = X_MAX
                    .min(self.upp[j] - ALBEFA * (self.upp[j] - x[j]))
                    .min(x[j] + input.move_limit * range);
                (lo, hi.max(lo))
            })
            .unzip();

        let (p0, q0) = coefficients(x, &self.low, &self.upp, input.objective_gradient);
        let mut p = Vec::with_capacity(m);
        let mut q = Vec::with_capacity(m);
        let mut r = Vec::with_capacity(m);
        for i in 0..m {
            let (pi, qi) = coefficients(x, &self.low, &self.upp, &input.constraint_gradients[i]);
            let local: f64 = (0..n)
                .filter(|&j| free[j])
                .map(|j| pi[j] / (self.upp[j] - x[j]) + qi[j] / (x[j] - self.low[j]))
                .sum();
            r.push(input.constraints[i] - self.ctx.sum(local));
            p.push(pi);
            q.push(qi);
        }

        let sub = Subproblem {
            low: &self.low,
            upp: &self.upp,
            alpha,
            beta,
            p0,
            q0,
            p,
            q,
            r,
            free: &free,
        };

        let mut lambda = vec![0.0; m];
        let mut infeasible = vec![false; m];
        let mut sweeps = 0;
        while sweeps < MAX_SWEEPS {
            sweeps += 1;
            let mut delta = 0.0_f64;
            for i in 0..m {
                let previous = lambda[i];
                let (value, saturated) = solve_multiplier(&sub, &self.ctx, &mut lambda, i);
                lambda[i] = value;
                infeasible[i] = saturated;
                delta = delta.max((value - previous).abs() / (1.0 + previous.abs()));
            }
            if delta < DUAL_TOL || m <= 1 {
                break;
            }
        }

        let x_new = sub.primal(&lambda);
        let any_infeasible = infeasible.iter().any(|&f| f);
        if any_infeasible {
            warn!(
                iteration = self.iteration,
                ?lambda,
                "MMA subproblem infeasible inside the move limits, taking the clamped step"
            );
        }
        trace!(?lambda, sweeps, "MMA multipliers");

        self.xold2 = std::mem::replace(&mut self.xold1, x.to_vec());
        self.iteration += 1;

        Ok((
            x_new,
            UpdateDiagnostics {
                inner_iterations: sweeps,
                multipliers: lambda,
                bisection_capped: false,
                infeasible: any_infeasible,
            },
        ))
    }
}

/// Maximize the dual along multiplier i with the others held fixed.
///
/// The dual's derivative along λ_i is the approximated constraint value at
/// the primal minimizer, which decreases monotonically in λ_i. Returns the
/// multiplier and whether it saturated at [`LAMBDA_MAX`].
fn solve_multiplier(
    sub: &Subproblem<'_>,
    ctx: &DistributedContext,
    lambda: &mut [f64],
    i: usize,
) -> (f64, bool) {
    if sub.residual_along(ctx, lambda, i, 0.0) <= 0.0 {
        return (0.0, false);
    }

    let mut lo = 0.0;
    let mut hi = 1.0;
    while sub.residual_along(ctx, lambda, i, hi) > 0.0 {
        lo = hi;
        hi *= 2.0;
        if hi > LAMBDA_MAX {
            return (LAMBDA_MAX, true);
        }
    }

    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        if sub.residual_along(ctx, lambda, i, mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= DUAL_TOL * (1.0 + hi) {
            break;
        }
    }
    (hi, false)
}
