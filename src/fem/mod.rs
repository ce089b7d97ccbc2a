pub mod assembly;
pub mod basis;
pub mod boundary;
pub mod dof;
pub mod quadrature;

pub use assembly::Assembler;
pub use basis::LagrangeBasis;
pub use boundary::{facet_traction_load, BoundaryConditions, SpringSupport, TractionLoad};
pub use dof::DofManager;
pub use quadrature::GaussQuadrature;
