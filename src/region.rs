//! Geometric regions used to locate supports, loads, springs and fixed zones.
//!
//! A region is a pure predicate from a coordinate to `bool`, expressed as a
//! closed set of geometric primitives and boolean combinators so that it can
//! be validated, serialized and compared. Coordinates are always `Point3`;
//! 2D meshes carry `z = 0`.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

fn default_plane_tol() -> f64 {
    1e-8
}

/// Typed locator predicate.
///
/// Deserialized from an inline table tagged by `type`, e.g.
/// `{ type = "plane", axis = "x", value = 0.0 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Region {
    Everywhere,
    Nowhere,
    /// `|p[axis] - value| <= tol`
    Plane {
        axis: Axis,
        value: f64,
        #[serde(default = "default_plane_tol")]
        tol: f64,
    },
    /// Open axis-aligned box. Missing trailing components are unbounded.
    Box { min: Vec<f64>, max: Vec<f64> },
    /// Open ball `|p - center| < radius`.
    Ball { center: Vec<f64>, radius: f64 },
    /// Closed spherical shell `inner <= |p - center| <= outer`.
    Shell {
        center: Vec<f64>,
        inner: f64,
        outer: f64,
    },
    All { regions: Vec<Region> },
    Any { regions: Vec<Region> },
    Not { region: std::boxed::Box<Region> },
}

impl Default for Region {
    fn default() -> Self {
        Region::Nowhere
    }
}

fn coord(p: &Point3<f64>, i: usize) -> f64 {
    match i {
        0 => p.x,
        1 => p.y,
        _ => p.z,
    }
}

fn distance_to(p: &Point3<f64>, center: &[f64]) -> f64 {
    center
        .iter()
        .enumerate()
        .map(|(i, &c)| (coord(p, i) - c).powi(2))
        .sum::<f64>()
        .sqrt()
}

impl Region {
    pub fn plane(axis: Axis, value: f64) -> Self {
        Region::Plane {
            axis,
            value,
            tol: default_plane_tol(),
        }
    }

    pub fn open_box(min: &[f64], max: &[f64]) -> Self {
        Region::Box {
            min: min.to_vec(),
            max: max.to_vec(),
        }
    }

    pub fn ball(center: &[f64], radius: f64) -> Self {
        Region::Ball {
            center: center.to_vec(),
            radius,
        }
    }

    pub fn and(self, other: Region) -> Self {
        match self {
            Region::All { mut regions } => {
                regions.push(other);
                Region::All { regions }
            }
            first => Region::All {
                regions: vec![first, other],
            },
        }
    }

    pub fn or(self, other: Region) -> Self {
        match self {
            Region::Any { mut regions } => {
                regions.push(other);
                Region::Any { regions }
            }
            first => Region::Any {
                regions: vec![first, other],
            },
        }
    }

    pub fn complement(self) -> Self {
        Region::Not {
            region: std::boxed::Box::new(self),
        }
    }

    /// Evaluate the predicate at `p`.
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        match self {
            Region::Everywhere => true,
            Region::Nowhere => false,
            Region::Plane { axis, value, tol } => (coord(p, axis.index()) - value).abs() <= *tol,
            Region::Box { min, max } => {
                min.iter().enumerate().all(|(i, &lo)| coord(p, i) > lo)
                    && max.iter().enumerate().all(|(i, &hi)| coord(p, i) < hi)
            }
            Region::Ball { center, radius } => distance_to(p, center) < *radius,
            Region::Shell {
                center,
                inner,
                outer,
            } => {
                let r = distance_to(p, center);
                r >= *inner && r <= *outer
            }
            Region::All { regions } => regions.iter().all(|r| r.contains(p)),
            Region::Any { regions } => regions.iter().any(|r| r.contains(p)),
            Region::Not { region } => !region.contains(p),
        }
    }

    /// Structural checks; `field` names the configuration entry for errors.
    pub fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid { field, reason };
        match self {
            Region::Everywhere | Region::Nowhere => Ok(()),
            Region::Plane { value, tol, .. } => {
                if !value.is_finite() || !(*tol >= 0.0) {
                    return Err(invalid(format!(
                        "plane needs a finite value and tol >= 0 (value = {value}, tol = {tol})"
                    )));
                }
                Ok(())
            }
            Region::Box { min, max } => {
                if min.len() > 3 || max.len() > 3 {
                    return Err(invalid("box bounds have more than 3 components".into()));
                }
                Ok(())
            }
            Region::Ball { center, radius } => {
                if center.is_empty() || center.len() > 3 || !(*radius > 0.0) {
                    return Err(invalid(format!(
                        "ball needs 1-3 center components and radius > 0 (radius = {radius})"
                    )));
                }
                Ok(())
            }
            Region::Shell {
                center,
                inner,
                outer,
            } => {
                if center.is_empty() || center.len() > 3 || !(*inner >= 0.0) || !(outer >= inner) {
                    return Err(invalid(format!(
                        "shell needs 1-3 center components and 0 <= inner <= outer ({inner}, {outer})"
                    )));
                }
                Ok(())
            }
            Region::All { regions } | Region::Any { regions } => {
                regions.iter().try_for_each(|r| r.validate(field))
            }
            Region::Not { region } => region.validate(field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_and_box() {
        let edge = Region::plane(Axis::X, 60.0).and(Region::open_box(&[f64::MIN, 8.0], &[f64::MAX, 12.0]));

        assert!(edge.contains(&Point3::new(60.0, 10.0, 0.0)));
        assert!(!edge.contains(&Point3::new(60.0, 12.0, 0.0)));
        assert!(!edge.contains(&Point3::new(59.0, 10.0, 0.0)));
    }

    #[test]
    fn test_ball_shell_and_not() {
        let hole = Region::ball(&[2.5, 3.0], 0.5);
        assert!(hole.contains(&Point3::new(2.5, 3.2, 0.0)));
        assert!(!hole.contains(&Point3::new(2.5, 3.6, 0.0)));

        let ring = Region::Shell {
            center: vec![0.0, 0.0],
            inner: 1.0,
            outer: 2.0,
        };
        assert!(ring.contains(&Point3::new(1.5, 0.0, 0.0)));
        assert!(!ring.complement().contains(&Point3::new(1.5, 0.0, 0.0)));
    }

    #[test]
    fn test_deserialize_tagged_region() {
        #[derive(Deserialize)]
        struct Wrapper {
            region: Region,
        }
        let text = r#"
            region = { type = "any", regions = [
                { type = "plane", axis = "y", value = 0.0 },
                { type = "ball", center = [0.0, 0.0], radius = 1.0 },
            ] }
        "#;
        let parsed: Wrapper = toml::from_str(text).unwrap();

        assert!(parsed.region.contains(&Point3::new(5.0, 0.0, 0.0)));
        assert!(parsed.region.contains(&Point3::new(0.1, 0.1, 0.0)));
        assert!(!parsed.region.contains(&Point3::new(5.0, 5.0, 0.0)));
    }

    #[test]
    fn test_validate_rejects_bad_ball() {
        let bad = Region::ball(&[0.0], -1.0);
        assert!(bad.validate("void_zone").is_err());
        assert!(Region::Everywhere.validate("solid_zone").is_ok());
    }
}
