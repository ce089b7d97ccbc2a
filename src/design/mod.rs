//! Design field transforms: x → x̃ (filter) → x̂ (projection) → E(x̂) (SIMP)
//!
//! Every transform re-imposes the fixed solid and void zones on its output.

pub mod filter;
pub mod material;
pub mod projection;
pub mod zones;

pub use filter::DensityFilter;
pub use material::SimpInterpolation;
pub use projection::HeavisideProjection;
pub use zones::{DesignZones, ZoneKind};
