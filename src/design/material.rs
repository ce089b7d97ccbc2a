use rayon::prelude::*;

use super::zones::{DesignZones, ZoneKind};

/// SIMP (Solid Isotropic Material with Penalization) stiffness interpolation
///
/// E(x̂) = ε + (1 − ε) x̂^p, a multiplier on the solid-phase stiffness.
/// The floor ε keeps void elements from making the stiffness singular.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpInterpolation {
    pub penalty: f64,
    pub epsilon: f64,
}

impl SimpInterpolation {
    pub fn new(penalty: f64, epsilon: f64) -> Self {
        Self { penalty, epsilon }
    }

    pub fn value(&self, x: f64) -> f64 {
        self.epsilon + (1.0 - self.epsilon) * x.powf(self.penalty)
    }

    /// dE/dx̂ = (1 − ε) p x̂^(p−1)
    pub fn derivative(&self, x: f64) -> f64 {
        if x <= 0.0 && self.penalty > 1.0 {
            return 0.0;
        }
        (1.0 - self.epsilon) * self.penalty * x.powf(self.penalty - 1.0)
    }

    /// Stiffness multipliers of the physical field; solid zones give 1, void zones ε
    pub fn stiffness(&self, x_phys: &[f64], zones: &DesignZones) -> Vec<f64> {
        x_phys
            .par_iter()
            .zip(zones.kinds().par_iter())
            .map(|(&x, kind)| match kind {
                ZoneKind::Solid => 1.0,
                ZoneKind::Void => self.epsilon,
                ZoneKind::Free => self.value(x),
            })
            .collect()
    }

    /// Derivatives of the multipliers; zero on zone elements
    pub fn stiffness_derivative(&self, x_phys: &[f64], zones: &DesignZones) -> Vec<f64> {
        x_phys
            .par_iter()
            .zip(zones.kinds().par_iter())
            .map(|(&x, kind)| match kind {
                ZoneKind::Free => self.derivative(x),
                _ => 0.0,
            })
            .collect()
    }
}
