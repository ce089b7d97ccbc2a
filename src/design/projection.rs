use rayon::prelude::*;

use super::zones::DesignZones;

/// Below this sharpness the projection is the identity.
const BETA_IDENTITY: f64 = 1e-12;

/// Smoothed Heaviside projection of the filtered density
///
/// x̂ = (tanh(βη) + tanh(β(x̃ − η))) / (tanh(βη) + tanh(β(1 − η)))
///
/// maps 0 to 0 and 1 to 1 for every β, tends to the identity as β → 0 and to
/// a step at η as β → ∞.
///
/// # References
/// - Wang, Lazarov & Sigmund, "On projection methods, convergence and robust
///   formulations in topology optimization", SMO 43 (2011)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeavisideProjection {
    /// Threshold η
    pub threshold: f64,
}

impl HeavisideProjection {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn value(&self, x: f64, beta: f64) -> f64 {
        if beta < BETA_IDENTITY {
            return x.clamp(0.0, 1.0);
        }
        let eta = self.threshold;
        let a = (beta * eta).tanh();
        let denom = a + (beta * (1.0 - eta)).tanh();
        ((a + (beta * (x - eta)).tanh()) / denom).clamp(0.0, 1.0)
    }

    /// dx̂/dx̃ = β sech²(β(x̃ − η)) / (tanh(βη) + tanh(β(1 − η)))
    pub fn derivative(&self, x: f64, beta: f64) -> f64 {
        if beta < BETA_IDENTITY {
            return 1.0;
        }
        let eta = self.threshold;
        let denom = (beta * eta).tanh() + (beta * (1.0 - eta)).tanh();
        let sech = 1.0 / (beta * (x - eta)).cosh();
        beta * sech * sech / denom
    }

    /// Project a filtered field; zone entries are forced to 1/0
    pub fn project(&self, x_filtered: &[f64], beta: f64, zones: &DesignZones) -> Vec<f64> {
        let mut out: Vec<f64> = x_filtered.par_iter().map(|&x| self.value(x, beta)).collect();
        zones.enforce(&mut out);
        out
    }

    /// Pointwise derivative of [`project`](Self::project); zero on zone entries
    pub fn derivative_field(&self, x_filtered: &[f64], beta: f64, zones: &DesignZones) -> Vec<f64> {
        let mut out: Vec<f64> = x_filtered
            .par_iter()
            .map(|&x| self.derivative(x, beta))
            .collect();
        zones.zero_fixed(&mut out);
        out
    }
}
