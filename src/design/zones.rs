use nalgebra::Point3;
use rayon::prelude::*;

use crate::config::ConfigError;
use crate::region::Region;

/// Role of an element in the design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneKind {
    Free,
    /// Density fixed to 1
    Solid,
    /// Density fixed to 0
    Void,
}

/// Per-element zone classification, fixed for the run
///
/// Membership is decided at the element centroid. Every stage that writes a
/// density field calls [`DesignZones::enforce`], which stores the exact
/// values `1.0` and `0.0`, so zone entries are bit-identical after each pass.
#[derive(Debug, Clone)]
pub struct DesignZones {
    kinds: Vec<ZoneKind>,
}

impl DesignZones {
    pub fn all_free(num_elements: usize) -> Self {
        Self {
            kinds: vec![ZoneKind::Free; num_elements],
        }
    }

    /// Classify elements by centroid
    ///
    /// # Errors
    /// [`ConfigError::Incompatible`] when an element lies in both zones.
    pub fn from_regions(
        centroids: &[Point3<f64>],
        solid: &Region,
        void: &Region,
    ) -> Result<Self, ConfigError> {
        let kinds: Vec<ZoneKind> = centroids
            .par_iter()
            .map(|c| match (solid.contains(c), void.contains(c)) {
                (true, true) => Err(ConfigError::Incompatible(format!(
                    "element centroid ({:.4}, {:.4}, {:.4}) lies in both solid_zone and void_zone",
                    c.x, c.y, c.z
                ))),
                (true, false) => Ok(ZoneKind::Solid),
                (false, true) => Ok(ZoneKind::Void),
                (false, false) => Ok(ZoneKind::Free),
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { kinds })
    }

    pub fn from_kinds(kinds: Vec<ZoneKind>) -> Self {
        Self { kinds }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kind(&self, elem: usize) -> ZoneKind {
        self.kinds[elem]
    }

    pub fn kinds(&self) -> &[ZoneKind] {
        &self.kinds
    }

    pub fn is_fixed(&self, elem: usize) -> bool {
        self.kinds[elem] != ZoneKind::Free
    }

    /// `true` for every element excluded from optimizer updates
    pub fn fixed_mask(&self) -> Vec<bool> {
        self.kinds.iter().map(|&k| k != ZoneKind::Free).collect()
    }

    pub fn count(&self, kind: ZoneKind) -> usize {
        self.kinds.iter().filter(|&&k| k == kind).count()
    }

    /// Overwrite zone entries with their fixed densities
    pub fn enforce(&self, x: &mut [f64]) {
        for (xi, kind) in x.iter_mut().zip(&self.kinds) {
            match kind {
                ZoneKind::Solid => *xi = 1.0,
                ZoneKind::Void => *xi = 0.0,
                ZoneKind::Free => {}
            }
        }
    }

    /// Zero derivative entries of zone elements
    pub fn zero_fixed(&self, g: &mut [f64]) {
        for (gi, kind) in g.iter_mut().zip(&self.kinds) {
            if *kind != ZoneKind::Free {
                *gi = 0.0;
            }
        }
    }

    /// Starting design: the target volume fraction everywhere, zones enforced
    pub fn initial_design(&self, vol_frac: f64) -> Vec<f64> {
        let mut x = vec![vol_frac; self.kinds.len()];
        self.enforce(&mut x);
        x
    }
}
