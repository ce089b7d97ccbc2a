/// Solid mechanics module for linear elasticity
///
/// This module provides implementations for:
/// - The isotropic linear elastic constitutive model
/// - Strain-displacement relationships
/// - Element stiffness, body-load and volume integrals

pub mod constitutive;
pub mod element;
pub mod strain;

pub use constitutive::IsotropicElasticity;
pub use element::ElasticityElement;
pub use strain::StrainDisplacement;
