//! Reference problems.
//!
//! Full-size configurations of the classic benchmark cases. Their meshes are
//! sized for long runs; tests shrink `mesh.divisions` before building a
//! controller.

use std::f64::consts::FRAC_PI_4;

use crate::config::{
    FemConfig, MeshConfig, OptConfig, OptimizerKind, SpringConfig, TopOptConfig, TractionBc,
};
use crate::region::{Axis, Region};

pub const NAMES: [&str; 4] = ["beam_2d", "beam_3d", "disk_2d", "mechanism_2d"];

/// Look up a reference problem by name
pub fn by_name(name: &str) -> Option<TopOptConfig> {
    match name {
        "beam_2d" => Some(beam_2d()),
        "beam_3d" => Some(beam_3d()),
        "disk_2d" => Some(disk_2d()),
        "mechanism_2d" => Some(mechanism_2d()),
        _ => None,
    }
}

/// 60 × 20 cantilever clamped at x = 0, loaded downwards on the middle of the free end
pub fn beam_2d() -> TopOptConfig {
    let mut fem = FemConfig::new(100.0, 0.25, Region::plane(Axis::X, 0.0));
    fem.traction_bcs.push(TractionBc {
        traction: vec![0.0, -0.2],
        region: Region::plane(Axis::X, 60.0).and(Region::open_box(&[59.0, 8.0], &[61.0, 12.0])),
    });

    let mut opt = OptConfig::new(400, 0.5, 1.2);
    opt.move_limit = 0.02;

    TopOptConfig {
        mesh: MeshConfig::Rectangle {
            min: [0.0, 0.0],
            max: [60.0, 20.0],
            divisions: [200, 60],
        },
        fem,
        opt,
    }
}

/// 10 × 30 × 10 box on two strip supports at y = 0, point-like load on the top face
pub fn beam_3d() -> TopOptConfig {
    let supports = Region::open_box(&[-1.0, -1.0], &[1.5, 1.0])
        .or(Region::open_box(&[8.5, -1.0], &[11.0, 1.0]));
    let mut fem = FemConfig::new(100.0, 0.25, Region::plane(Axis::Y, 0.0).and(supports));
    fem.traction_bcs.push(TractionBc {
        traction: vec![0.0, 0.0, -2.0],
        region: Region::plane(Axis::Y, 30.0)
            .and(Region::open_box(&[4.5, 29.0, 4.5], &[5.5, 31.0, 5.5])),
    });

    let mut opt = OptConfig::new(400, 0.08, 0.6);
    opt.move_limit = 0.02;

    TopOptConfig {
        mesh: MeshConfig::Cuboid {
            min: [0.0, 0.0, 0.0],
            max: [10.0, 30.0, 10.0],
            divisions: [75, 225, 75],
        },
        fem,
        opt,
    }
}

/// Disk of radius 4 held at a hub of radius 0.8, loaded on four rim patches
///
/// The square mesh around the disk is made void outside radius 4, so the
/// loaded patches are where the rim touches the square's edges. Volume
/// fractions count the whole square; the target is half of the disk.
pub fn disk_2d() -> TopOptConfig {
    let mut fem = FemConfig::new(100.0, 0.25, Region::ball(&[0.0, 0.0], 0.8 + 1e-4));
    fem.traction_bcs.push(TractionBc {
        traction: vec![0.0, -1.0],
        region: Region::Shell {
            center: vec![0.0, 0.0],
            inner: 4.0 - 1e-4,
            outer: 4.02,
        },
    });

    let mut opt = OptConfig::new(400, 0.5 * FRAC_PI_4, 0.32);
    opt.beta_interval = 30;
    opt.move_limit = 0.02;
    opt.void_zone = Region::ball(&[0.0, 0.0], 4.0).complement();

    TopOptConfig {
        mesh: MeshConfig::Rectangle {
            min: [-4.0, -4.0],
            max: [4.0, 4.0],
            divisions: [160, 160],
        },
        fem,
        opt,
    }
}

/// Displacement inverter: push at the left port, the right port should move left
pub fn mechanism_2d() -> TopOptConfig {
    let port = |x: f64| Region::plane(Axis::X, x).and(Region::open_box(&[x - 1.0, -1.5], &[x + 1.0, 1.5]));

    let clamps = Region::open_box(&[-1.0, 3.5], &[1.0, 6.0]).or(Region::open_box(&[-1.0, -6.0], &[1.0, -3.5]));
    let mut fem = FemConfig::new(100.0, 0.25, Region::plane(Axis::X, 0.0).and(clamps));
    fem.traction_bcs.push(TractionBc {
        traction: vec![1.0, 0.0],
        region: port(0.0),
    });

    let mut opt = OptConfig::new(500, 0.25, 0.5);
    opt.solid_zone = Region::open_box(&[-1.0, -1.0], &[0.5, 1.0]).or(Region::open_box(&[9.5, -1.0], &[11.0, 1.0]));
    opt.void_zone = Region::ball(&[2.5, 3.0], 0.5).or(Region::ball(&[2.5, -3.0], 0.5));
    opt.optimizer = OptimizerKind::Mma;
    opt.move_limit = 0.05;
    opt.opt_compliance = false;
    opt.in_spring = Some(SpringConfig {
        region: port(0.0),
        axis: Axis::X,
        stiffness: 0.2,
    });
    opt.out_spring = Some(SpringConfig {
        region: port(10.0),
        axis: Axis::X,
        stiffness: 0.2,
    });
    opt.compliance_bound = Some(0.5);

    TopOptConfig {
        mesh: MeshConfig::Rectangle {
            min: [0.0, -5.0],
            max: [10.0, 5.0],
            divisions: [200, 200],
        },
        fem,
        opt,
    }
}
