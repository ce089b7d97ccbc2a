//! Outer optimization loop.
//!
//! ```text
//! INIT → (FILTER → PROJECT → SOLVE → EVALUATE → SENSITIVITY → UPDATE → CHECK)* → TERMINATED
//! ```
//!
//! The design field only changes at the end of UPDATE, so after a fatal
//! error the controller still holds the last valid design.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{ConfigError, OptConfig, TopOptConfig};
use crate::context::DistributedContext;
use crate::design::{DensityFilter, DesignZones, HeavisideProjection, SimpInterpolation, ZoneKind};
use crate::error::{Result, Stage, TopOptError};
use crate::mesh::{Mesh, MeshGenerator};
use crate::optimizer::{build_optimizer, Optimizer, OptimizerInput, UpdateDiagnostics};
use crate::response::{Evaluator, ResponseGradients, ResponseValues};
use crate::sensitivity::{AdjointEngine, DesignChain};
use crate::state::{FemStateSolver, StateSolver};

/// Constraint values up to this are reported as satisfied
const CONSTRAINT_TOL: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Init,
    Filter,
    Project,
    Solve,
    Evaluate,
    Sensitivity,
    Update,
    Check,
    Terminated,
}

/// Why the loop stopped; both are normal completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// max |x − x_old| fell below `opt_tol`
    Converged,
    MaxIterations,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged => f.write_str("converged"),
            Termination::MaxIterations => f.write_str("iteration limit reached"),
        }
    }
}

/// Heaviside sharpness continuation
///
/// β starts at 1 (or `max` if smaller) and doubles after every `interval`
/// completed iterations until it reaches `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaSchedule {
    interval: usize,
    max: f64,
    value: f64,
}

impl BetaSchedule {
    pub fn new(interval: usize, max: f64) -> Self {
        Self {
            interval: interval.max(1),
            max,
            value: 1.0_f64.min(max),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Advance after `iteration` (1-based) completed; returns the new β if it changed
    pub fn advance(&mut self, iteration: usize) -> Option<f64> {
        if iteration % self.interval != 0 || self.value >= self.max {
            return None;
        }
        self.value = (2.0 * self.value).min(self.max);
        Some(self.value)
    }
}

/// Everything observed in one outer iteration
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    /// 1-based
    pub iteration: usize,
    /// Unscaled objective value
    pub objective: f64,
    pub compliance: f64,
    pub volume_fraction: f64,
    pub output_displacement: Option<f64>,
    /// g_i <= 0 form
    pub constraints: Vec<f64>,
    pub beta: f64,
    /// max |x − x_old|
    pub change: f64,
    pub converged: bool,
    pub diagnostics: UpdateDiagnostics,
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub design: Vec<f64>,
    /// x̂ of the final design at the β of the last iteration
    pub physical: Vec<f64>,
    pub volume_fraction: f64,
    pub history: Vec<IterationRecord>,
    pub termination: Termination,
    pub iterations: usize,
    /// All constraints of the last evaluated design were within tolerance
    pub constraints_satisfied: bool,
}

impl OptimizationResult {
    pub fn objective_history(&self) -> Vec<f64> {
        self.history.iter().map(|r| r.objective).collect()
    }
}

/// Callback invoked once per iteration and once at the end of a run
pub trait IterationObserver: Send {
    fn on_iteration(&mut self, record: &IterationRecord, design: &[f64], physical: &[f64]) -> Result<()>;

    fn on_finish(&mut self, _result: &OptimizationResult) -> Result<()> {
        Ok(())
    }
}

/// Responses and design gradients of one design
#[derive(Debug, Clone)]
pub struct Analysis {
    pub filtered: Vec<f64>,
    pub physical: Vec<f64>,
    pub values: ResponseValues,
    pub gradients: ResponseGradients,
}

/// Drives the optimization
pub struct Controller {
    ctx: DistributedContext,
    opt: OptConfig,
    state: Box<dyn StateSolver>,
    zones: DesignZones,
    filter: DensityFilter,
    projection: HeavisideProjection,
    simp: SimpInterpolation,
    evaluator: Evaluator,
    adjoint: AdjointEngine,
    optimizer: Box<dyn Optimizer>,
    beta: BetaSchedule,
    fixed: Vec<bool>,
    design: Vec<f64>,
    physical: Vec<f64>,
    iteration: usize,
    phase: ControllerState,
    termination: Option<Termination>,
    history: Vec<IterationRecord>,
    observers: Vec<Box<dyn IterationObserver>>,
}

impl Controller {
    /// Build the structured mesh and reference state solver described by `config`
    pub fn from_config(ctx: DistributedContext, config: &TopOptConfig) -> Result<Self> {
        config.validate()?;
        let mesh = Arc::new(MeshGenerator::from_config(&config.mesh));
        let state = FemStateSolver::new(ctx.clone(), Arc::clone(&mesh), config)
            .map_err(|e| tag_solve_error(e, 0))?;
        Self::build(ctx, mesh, Box::new(state), config)
    }

    /// Set up zones, filter, evaluator and optimizer around an existing state solver
    ///
    /// # Errors
    /// Configuration errors, including overlapping zones and a design without
    /// free elements.
    pub fn new(
        ctx: DistributedContext,
        mesh: Arc<Mesh>,
        state: Box<dyn StateSolver>,
        config: &TopOptConfig,
    ) -> Result<Self> {
        config.validate()?;
        Self::build(ctx, mesh, state, config)
    }

    fn build(
        ctx: DistributedContext,
        mesh: Arc<Mesh>,
        state: Box<dyn StateSolver>,
        config: &TopOptConfig,
    ) -> Result<Self> {
        let opt = config.opt.clone();
        let n = mesh.num_elements();
        TopOptError::check_len("state solver elements", n, state.num_elements())?;

        let centroids = mesh.centroids();
        let zones = DesignZones::from_regions(&centroids, &opt.solid_zone, &opt.void_zone)?;
        if zones.count(ZoneKind::Free) == 0 {
            return Err(ConfigError::Incompatible("solid and void zones cover every element".into()).into());
        }
        let filter = DensityFilter::new(&centroids, opt.filter_radius)?;
        let projection = HeavisideProjection::new(opt.projection_threshold);
        let simp = SimpInterpolation::new(opt.penalty, opt.epsilon);

        let evaluator = Evaluator::new(ctx.clone(), &opt, state.element_volumes());
        let adjoint = AdjointEngine::new(ctx.clone(), simp, projection, evaluator.volume_weights().to_vec());
        let mode = opt.objective_mode();
        let optimizer = build_optimizer(ctx.clone(), opt.optimizer, n, mode.num_constraints());

        let design = zones.initial_design(opt.vol_frac);
        let physical = projection.project(&filter.apply(&design, &zones), 1.0, &zones);

        info!(
            elements = n,
            solid = zones.count(ZoneKind::Solid),
            void = zones.count(ZoneKind::Void),
            identity_filter = filter.is_identity(),
            optimizer = optimizer.name(),
            ?mode,
            "controller initialized"
        );

        Ok(Self {
            ctx,
            beta: BetaSchedule::new(opt.beta_interval, opt.beta_max),
            fixed: zones.fixed_mask(),
            opt,
            state,
            zones,
            filter,
            projection,
            simp,
            evaluator,
            adjoint,
            optimizer,
            design,
            physical,
            iteration: 0,
            phase: ControllerState::Init,
            termination: None,
            history: Vec::new(),
            observers: Vec::new(),
        })
    }

    pub fn with_observer(mut self, observer: Box<dyn IterationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn IterationObserver>) {
        self.observers.push(observer);
    }

    /// Current (last valid) design field x
    pub fn design(&self) -> &[f64] {
        &self.design
    }

    /// Physical density of the last analysed design
    pub fn physical(&self) -> &[f64] {
        &self.physical
    }

    pub fn zones(&self) -> &DesignZones {
        &self.zones
    }

    pub fn beta(&self) -> f64 {
        self.beta.value()
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn state(&self) -> ControllerState {
        self.phase
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Filter, project, solve and differentiate an arbitrary design at the current β
    ///
    /// Does not change the controller's design or history.
    pub fn analyze(&mut self, design: &[f64]) -> Result<Analysis> {
        let iteration = self.iteration + 1;
        TopOptError::check_len("design field", self.design.len(), design.len())
            .map_err(|e| e.at(Stage::Filter, iteration))?;
        let beta = self.beta.value();

        self.phase = ControllerState::Filter;
        let mut x = design.to_vec();
        self.zones.enforce(&mut x);
        let filtered = self.filter.apply(&x, &self.zones);

        self.phase = ControllerState::Project;
        let physical = self.projection.project(&filtered, beta, &self.zones);

        self.phase = ControllerState::Solve;
        let stiffness = self.simp.stiffness(&physical, &self.zones);
        self.state
            .solve_state(&stiffness)
            .map_err(|e| tag_solve_error(e, iteration))?;

        self.phase = ControllerState::Evaluate;
        let values = self
            .evaluator
            .evaluate(self.state.as_ref(), &physical)
            .map_err(|e| e.at(Stage::Evaluate, iteration))?;

        self.phase = ControllerState::Sensitivity;
        let chain = DesignChain {
            filter: &self.filter,
            zones: &self.zones,
            filtered: &filtered,
            physical: &physical,
            beta,
        };
        let gradients = self
            .adjoint
            .gradients(self.state.as_ref(), &chain, self.evaluator.responses())
            .map_err(|e| tag_solve_error(e, iteration).at(Stage::Sensitivity, iteration))?;

        Ok(Analysis {
            filtered,
            physical,
            values,
            gradients,
        })
    }

    /// Run one outer iteration
    ///
    /// Returns `Some` once the run has terminated; further calls are no-ops.
    pub fn step(&mut self) -> Result<Option<Termination>> {
        if let Some(termination) = self.termination {
            return Ok(Some(termination));
        }
        let iteration = self.iteration + 1;
        let beta = self.beta.value();
        let start = Instant::now();

        let design = self.design.clone();
        let analysis = self.analyze(&design)?;
        self.physical = analysis.physical;

        let formulation = self
            .evaluator
            .formulate(&analysis.values, &analysis.gradients)
            .map_err(|e| e.at(Stage::Sensitivity, iteration))?;

        self.phase = ControllerState::Update;
        let input = OptimizerInput {
            x: &self.design,
            objective: formulation.objective,
            objective_gradient: &formulation.objective_gradient,
            constraints: &formulation.constraints,
            constraint_gradients: &formulation.constraint_gradients,
            move_limit: self.opt.move_limit,
            fixed: &self.fixed,
        };
        let (mut x_new, diagnostics) = self
            .optimizer
            .update(&input)
            .map_err(|e| e.at(Stage::Update, iteration))?;
        for v in x_new.iter_mut() {
            *v = v.clamp(0.0, 1.0);
        }
        self.zones.enforce(&mut x_new);

        self.phase = ControllerState::Check;
        let change = self.ctx.max_abs_diff(&x_new, &self.design);
        self.design = x_new;
        self.iteration = iteration;
        let converged = change < self.opt.opt_tol;

        let objective_response = self.evaluator.responses()[0];
        let record = IterationRecord {
            iteration,
            objective: Evaluator::value(&analysis.values, objective_response)
                .map_err(|e| e.at(Stage::Check, iteration))?,
            compliance: analysis.values.compliance,
            volume_fraction: analysis.values.volume_fraction,
            output_displacement: analysis.values.output_displacement,
            constraints: formulation.constraints,
            beta,
            change,
            converged,
            diagnostics,
        };
        info!(
            iteration,
            objective = record.objective,
            compliance = record.compliance,
            volume = record.volume_fraction,
            beta,
            change,
            time = start.elapsed().as_secs_f64(),
            "iteration"
        );
        for observer in self.observers.iter_mut() {
            observer
                .on_iteration(&record, &self.design, &self.physical)
                .map_err(|e| e.at(Stage::Check, iteration))?;
        }
        self.history.push(record);

        if let Some(new_beta) = self.beta.advance(iteration) {
            debug!(iteration, beta = new_beta, "projection sharpened");
        }

        let termination = if converged {
            Some(Termination::Converged)
        } else if iteration >= self.opt.max_iter {
            Some(Termination::MaxIterations)
        } else {
            None
        };
        if termination.is_some() {
            self.phase = ControllerState::Terminated;
            self.termination = termination;
        }
        Ok(termination)
    }

    /// Iterate until convergence or the iteration limit
    pub fn run(&mut self) -> Result<OptimizationResult> {
        let start = Instant::now();
        let termination = loop {
            if let Some(termination) = self.step()? {
                break termination;
            }
        };

        // Report the final design at the β its last update was computed with
        let beta = self.history.last().map_or(self.beta.value(), |r| r.beta);
        let filtered = self.filter.apply(&self.design, &self.zones);
        self.physical = self.projection.project(&filtered, beta, &self.zones);
        let volume_fraction = self.evaluator.volume_fraction(&self.physical);
        let constraints_satisfied = self
            .history
            .last()
            .map_or(false, |r| r.constraints.iter().all(|&g| g <= CONSTRAINT_TOL));

        let result = OptimizationResult {
            design: self.design.clone(),
            physical: self.physical.clone(),
            volume_fraction,
            history: self.history.clone(),
            termination,
            iterations: self.iteration,
            constraints_satisfied,
        };
        info!(
            %termination,
            iterations = self.iteration,
            volume = volume_fraction,
            constraints_satisfied,
            time = start.elapsed().as_secs_f64(),
            "optimization finished"
        );
        for observer in self.observers.iter_mut() {
            observer
                .on_finish(&result)
                .map_err(|e| e.at(Stage::Check, self.iteration))?;
        }
        Ok(result)
    }
}

/// Assembly failures and solver failures are reported as separate stages
fn tag_solve_error(err: TopOptError, iteration: usize) -> TopOptError {
    match err {
        e @ TopOptError::Assembly(_) => e.at(Stage::Assembly, iteration),
        e @ TopOptError::Solve(_) => e.at(Stage::Solve, iteration),
        e => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beta_schedule_doubles_and_caps() {
        let mut schedule = BetaSchedule::new(3, 10.0);
        let mut values = Vec::new();
        for iteration in 1..=15 {
            values.push(schedule.value());
            schedule.advance(iteration);
        }
        assert_eq!(
            values,
            vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 4.0, 4.0, 4.0, 8.0, 8.0, 8.0, 10.0, 10.0, 10.0]
        );
    }

    #[test]
    fn test_beta_schedule_never_decreases() {
        let mut schedule = BetaSchedule::new(1, 128.0);
        let mut previous = schedule.value();
        for iteration in 1..20 {
            schedule.advance(iteration);
            assert!(schedule.value() >= previous);
            previous = schedule.value();
        }
        assert_eq!(previous, 128.0);
    }
}
