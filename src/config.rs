//! Configuration management for topology optimization runs
//!
//! Reads TOML configuration files into typed, validated structures covering the
//! mesh, the finite-element problem (material, supports, loads, solver) and the
//! optimization parameters (volume target, filter, projection schedule,
//! optimizer choice, objective mode). A configuration is frozen once the
//! controller is built from it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::region::{Axis, Region};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("missing required parameter: {0}")]
    Missing(&'static str),

    #[error("incompatible settings: {0}")]
    Incompatible(String),

    #[error("locator `{name}` selects no {what}")]
    EmptyRegion {
        name: &'static str,
        what: &'static str,
    },
}

/// Main run configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopOptConfig {
    pub mesh: MeshConfig,
    pub fem: FemConfig,
    pub opt: OptConfig,
}

/// Structured mesh description
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeshConfig {
    /// Quadrilateral (Q4) mesh of an axis-aligned rectangle
    Rectangle {
        min: [f64; 2],
        max: [f64; 2],
        divisions: [usize; 2],
    },
    /// Hexahedral (H8) mesh of an axis-aligned box
    Cuboid {
        min: [f64; 3],
        max: [f64; 3],
        divisions: [usize; 3],
    },
}

impl MeshConfig {
    pub fn dim(&self) -> usize {
        match self {
            MeshConfig::Rectangle { .. } => 2,
            MeshConfig::Cuboid { .. } => 3,
        }
    }

    pub fn num_elements(&self) -> usize {
        match self {
            MeshConfig::Rectangle { divisions, .. } => divisions.iter().product(),
            MeshConfig::Cuboid { divisions, .. } => divisions.iter().product(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let (min, max, divisions): (&[f64], &[f64], &[usize]) = match self {
            MeshConfig::Rectangle {
                min,
                max,
                divisions,
            } => (min, max, divisions),
            MeshConfig::Cuboid {
                min,
                max,
                divisions,
            } => (min, max, divisions),
        };
        if min.iter().zip(max).any(|(lo, hi)| !(hi > lo)) {
            return Err(ConfigError::Invalid {
                field: "mesh.max",
                reason: format!("every component must exceed mesh.min ({min:?} vs {max:?})"),
            });
        }
        if divisions.iter().any(|&n| n == 0) {
            return Err(ConfigError::Invalid {
                field: "mesh.divisions",
                reason: "every direction needs at least one element".into(),
            });
        }
        Ok(())
    }
}

/// Finite-element problem parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FemConfig {
    pub youngs_modulus: f64,
    pub poisson_ratio: f64,
    /// Nodes inside this region have every displacement component fixed to 0
    pub disp_bc: Region,
    #[serde(default)]
    pub traction_bcs: Vec<TractionBc>,
    /// Constant body force per unit volume; empty means none
    #[serde(default)]
    pub body_force: Vec<f64>,
    #[serde(default = "default_quadrature_degree")]
    pub quadrature_degree: usize,
    #[serde(default)]
    pub linear_solver: LinearSolverConfig,
}

/// Traction vector applied on the boundary facets whose nodes all lie in `region`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TractionBc {
    pub traction: Vec<f64>,
    pub region: Region,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Cg,
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreconditionerKind {
    #[default]
    Jacobi,
    None,
}

/// Options passed through to the linear solver backend
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LinearSolverConfig {
    #[serde(default)]
    pub kind: SolverKind,
    #[serde(default = "default_solver_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_solver_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub preconditioner: PreconditionerKind,
}

impl Default for LinearSolverConfig {
    fn default() -> Self {
        Self {
            kind: SolverKind::default(),
            tolerance: default_solver_tolerance(),
            max_iterations: default_solver_max_iterations(),
            preconditioner: PreconditionerKind::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Optimality Criteria, single volume constraint only
    #[default]
    Oc,
    /// Method of Moving Asymptotes
    Mma,
}

/// Linear spring attached to the DOFs of `axis` on the nodes inside `region`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SpringConfig {
    pub region: Region,
    pub axis: Axis,
    pub stiffness: f64,
}

/// Optimization parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptConfig {
    pub max_iter: usize,
    #[serde(default = "default_opt_tol")]
    pub opt_tol: f64,
    pub vol_frac: f64,
    #[serde(default)]
    pub solid_zone: Region,
    #[serde(default)]
    pub void_zone: Region,
    #[serde(default = "default_penalty")]
    pub penalty: f64,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    pub filter_radius: f64,
    #[serde(default = "default_beta_interval")]
    pub beta_interval: usize,
    #[serde(default = "default_beta_max")]
    pub beta_max: f64,
    /// Heaviside threshold η
    #[serde(default = "default_projection_threshold")]
    pub projection_threshold: f64,
    #[serde(default)]
    pub optimizer: OptimizerKind,
    #[serde(default = "default_move_limit", alias = "move")]
    pub move_limit: f64,
    #[serde(default = "default_true")]
    pub opt_compliance: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_spring: Option<SpringConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_spring: Option<SpringConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_bound: Option<f64>,
}

/// What is minimized and which constraints apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveMode {
    /// min C  s.t.  V <= v*
    Compliance,
    /// min u_out  s.t.  V <= v*,  C <= C_bound
    Mechanism,
    /// min V  s.t.  C <= C_bound
    Volume,
}

impl ObjectiveMode {
    pub fn num_constraints(self) -> usize {
        match self {
            ObjectiveMode::Compliance | ObjectiveMode::Volume => 1,
            ObjectiveMode::Mechanism => 2,
        }
    }
}

fn default_quadrature_degree() -> usize { 2 }
fn default_solver_tolerance() -> f64 { 1e-10 }
fn default_solver_max_iterations() -> usize { 20_000 }
fn default_opt_tol() -> f64 { 1e-5 }
fn default_penalty() -> f64 { 3.0 }
fn default_epsilon() -> f64 { 1e-6 }
fn default_beta_interval() -> usize { 50 }
fn default_beta_max() -> f64 { 128.0 }
fn default_projection_threshold() -> f64 { 0.5 }
fn default_move_limit() -> f64 { 0.02 }
fn default_true() -> bool { true }

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl OptConfig {
    /// Compliance minimization with every optional parameter at its default
    pub fn new(max_iter: usize, vol_frac: f64, filter_radius: f64) -> Self {
        Self {
            max_iter,
            opt_tol: default_opt_tol(),
            vol_frac,
            solid_zone: Region::Nowhere,
            void_zone: Region::Nowhere,
            penalty: default_penalty(),
            epsilon: default_epsilon(),
            filter_radius,
            beta_interval: default_beta_interval(),
            beta_max: default_beta_max(),
            projection_threshold: default_projection_threshold(),
            optimizer: OptimizerKind::default(),
            move_limit: default_move_limit(),
            opt_compliance: true,
            in_spring: None,
            out_spring: None,
            compliance_bound: None,
        }
    }

    pub fn objective_mode(&self) -> ObjectiveMode {
        if self.opt_compliance {
            ObjectiveMode::Compliance
        } else if self.out_spring.is_some() {
            ObjectiveMode::Mechanism
        } else {
            ObjectiveMode::Volume
        }
    }

    fn validate(&self, dim: usize) -> Result<(), ConfigError> {
        if self.max_iter == 0 {
            return Err(invalid("opt.max_iter", "must be at least 1"));
        }
        if !(self.opt_tol >= 0.0) {
            return Err(invalid("opt.opt_tol", format!("must be >= 0, got {}", self.opt_tol)));
        }
        if !(self.vol_frac > 0.0 && self.vol_frac <= 1.0) {
            return Err(invalid("opt.vol_frac", format!("must lie in (0, 1], got {}", self.vol_frac)));
        }
        if !(self.penalty >= 1.0) {
            return Err(invalid("opt.penalty", format!("must be >= 1, got {}", self.penalty)));
        }
        if !(self.epsilon > 0.0 && self.epsilon < 1.0) {
            return Err(invalid("opt.epsilon", format!("must lie in (0, 1), got {}", self.epsilon)));
        }
        if !(self.filter_radius > 0.0) {
            return Err(invalid(
                "opt.filter_radius",
                format!("must be > 0, got {}", self.filter_radius),
            ));
        }
        if self.beta_interval == 0 {
            return Err(invalid("opt.beta_interval", "must be at least 1"));
        }
        if !(self.beta_max >= 1.0) {
            return Err(invalid("opt.beta_max", format!("must be >= 1, got {}", self.beta_max)));
        }
        if !(self.projection_threshold > 0.0 && self.projection_threshold < 1.0) {
            return Err(invalid(
                "opt.projection_threshold",
                format!("must lie in (0, 1), got {}", self.projection_threshold),
            ));
        }
        if !(self.move_limit > 0.0 && self.move_limit <= 1.0) {
            return Err(invalid("opt.move_limit", format!("must lie in (0, 1], got {}", self.move_limit)));
        }

        self.solid_zone.validate("opt.solid_zone")?;
        self.void_zone.validate("opt.void_zone")?;

        for (field, spring) in [("opt.in_spring", &self.in_spring), ("opt.out_spring", &self.out_spring)] {
            if let Some(spring) = spring {
                spring.region.validate(field)?;
                if !(spring.stiffness >= 0.0) {
                    return Err(invalid(field, format!("stiffness must be >= 0, got {}", spring.stiffness)));
                }
                if spring.axis.index() >= dim {
                    return Err(invalid(field, format!("axis {:?} does not exist in {dim}D", spring.axis)));
                }
            }
        }
        if self.in_spring.is_some() && self.out_spring.is_none() {
            return Err(ConfigError::Incompatible(
                "an input spring requires an output spring".into(),
            ));
        }

        match self.objective_mode() {
            ObjectiveMode::Compliance => Ok(()),
            mode => {
                if self.optimizer != OptimizerKind::Mma {
                    return Err(ConfigError::Incompatible(format!(
                        "{mode:?} objective has a compliance constraint and needs optimizer = \"mma\""
                    )));
                }
                match self.compliance_bound {
                    None => Err(ConfigError::Missing("opt.compliance_bound")),
                    Some(bound) if !(bound > 0.0) => Err(invalid(
                        "opt.compliance_bound",
                        format!("must be > 0, got {bound}"),
                    )),
                    Some(_) => Ok(()),
                }
            }
        }
    }
}

impl FemConfig {
    /// Supported but unloaded problem with default quadrature and solver
    pub fn new(youngs_modulus: f64, poisson_ratio: f64, disp_bc: Region) -> Self {
        Self {
            youngs_modulus,
            poisson_ratio,
            disp_bc,
            traction_bcs: Vec::new(),
            body_force: Vec::new(),
            quadrature_degree: default_quadrature_degree(),
            linear_solver: LinearSolverConfig::default(),
        }
    }

    fn validate(&self, dim: usize) -> Result<(), ConfigError> {
        if !(self.youngs_modulus > 0.0) {
            return Err(invalid(
                "fem.youngs_modulus",
                format!("must be > 0, got {}", self.youngs_modulus),
            ));
        }
        if !(self.poisson_ratio > -1.0 && self.poisson_ratio < 0.5) {
            return Err(invalid(
                "fem.poisson_ratio",
                format!("must lie in (-1, 0.5), got {}", self.poisson_ratio),
            ));
        }
        if matches!(self.disp_bc, Region::Nowhere) {
            return Err(ConfigError::Missing("fem.disp_bc"));
        }
        self.disp_bc.validate("fem.disp_bc")?;
        for bc in &self.traction_bcs {
            bc.region.validate("fem.traction_bcs")?;
            if bc.traction.len() != dim {
                return Err(invalid(
                    "fem.traction_bcs",
                    format!("traction needs {dim} components, got {}", bc.traction.len()),
                ));
            }
        }
        if !self.body_force.is_empty() && self.body_force.len() != dim {
            return Err(invalid(
                "fem.body_force",
                format!("needs {dim} components, got {}", self.body_force.len()),
            ));
        }
        if self.quadrature_degree == 0 || self.quadrature_degree > 7 {
            return Err(invalid(
                "fem.quadrature_degree",
                format!("must lie in 1..=7, got {}", self.quadrature_degree),
            ));
        }
        let solver = &self.linear_solver;
        if !(solver.tolerance > 0.0) || solver.max_iterations == 0 {
            return Err(invalid(
                "fem.linear_solver",
                "tolerance must be > 0 and max_iterations >= 1",
            ));
        }
        Ok(())
    }

    /// Body force padded to three components.
    pub fn body_force_vector(&self) -> [f64; 3] {
        let mut b = [0.0; 3];
        for (dst, &src) in b.iter_mut().zip(&self.body_force) {
            *dst = src;
        }
        b
    }

    /// Gauss points per direction that integrate a polynomial of this degree exactly.
    pub fn gauss_points_per_direction(&self) -> usize {
        (self.quadrature_degree + 2) / 2
    }
}

impl TopOptConfig {
    /// Load and validate a configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: TopOptConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn dim(&self) -> usize {
        self.mesh.dim()
    }

    /// Check every field; the first problem found is reported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dim = self.dim();
        self.mesh.validate()?;
        self.fem.validate(dim)?;
        self.opt.validate(dim)
    }

    pub fn log_summary(&self) {
        let mode = self.opt.objective_mode();
        info!(
            dim = self.dim(),
            elements = self.mesh.num_elements(),
            youngs_modulus = self.fem.youngs_modulus,
            poisson_ratio = self.fem.poisson_ratio,
            tractions = self.fem.traction_bcs.len(),
            "finite-element problem"
        );
        info!(
            ?mode,
            optimizer = ?self.opt.optimizer,
            vol_frac = self.opt.vol_frac,
            filter_radius = self.opt.filter_radius,
            penalty = self.opt.penalty,
            beta_interval = self.opt.beta_interval,
            beta_max = self.opt.beta_max,
            move_limit = self.opt.move_limit,
            max_iter = self.opt.max_iter,
            opt_tol = self.opt.opt_tol,
            "optimization setup"
        );
    }
}
