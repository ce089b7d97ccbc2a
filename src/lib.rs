pub mod mesh;
pub mod fem;
pub mod linalg;
pub mod mechanics;
pub mod config;
pub mod region;
pub mod error;
pub mod context;
pub mod design;   // Filter, projection, SIMP, zones
pub mod state;
pub mod response;
pub mod sensitivity;
pub mod optimizer;
pub mod controller;
pub mod history;
pub mod problems;

pub use mesh::{Mesh, MeshGenerator, CellType, SearchGrid};
pub use fem::{GaussQuadrature, DofManager, Assembler, BoundaryConditions};
pub use linalg::{LinearSolver, DirectSolver, ConjugateGradient, SolveError};
pub use mechanics::{IsotropicElasticity, StrainDisplacement, ElasticityElement};
pub use config::{TopOptConfig, MeshConfig, FemConfig, OptConfig, ConfigError, ObjectiveMode, OptimizerKind};
pub use region::{Axis, Region};
pub use error::{Result, Stage, TopOptError};
pub use context::{Communicator, DistributedContext, SerialCommunicator};
pub use design::{DensityFilter, DesignZones, HeavisideProjection, SimpInterpolation, ZoneKind};
pub use state::{FemStateSolver, StateSolver};
pub use response::{Evaluator, Response, ResponseValues};
pub use sensitivity::AdjointEngine;
pub use optimizer::{MovingAsymptotes, OptimalityCriteria, Optimizer, UpdateDiagnostics};
pub use controller::{BetaSchedule, Controller, ControllerState, IterationObserver, IterationRecord, OptimizationResult, Termination};
pub use history::HistoryWriter;
