use approx::assert_relative_eq;
use topopt::{Controller, ControllerState, DistributedContext, Termination, TopOptConfig};

const BEAM: &str = r#"
[mesh]
kind = "rectangle"
min = [0.0, 0.0]
max = [8.0, 4.0]
divisions = [8, 4]

[fem]
youngs_modulus = 1.0
poisson_ratio = 0.3
disp_bc = { type = "plane", axis = "x", value = 0.0 }
traction_bcs = [{ traction = [0.0, -1.0], region = { type = "plane", axis = "x", value = 8.0 } }]

[fem.linear_solver]
kind = "direct"

[opt]
max_iter = 6
opt_tol = 0.0
vol_frac = 0.5
filter_radius = 1.5
move = 0.1
beta_interval = 2
beta_max = 4.0
"#;

#[test]
fn test_beta_doubles_every_interval_up_to_max() {
    let config = TopOptConfig::from_toml_str(BEAM).unwrap();
    let mut controller = Controller::from_config(DistributedContext::serial(), &config).unwrap();
    assert_eq!(controller.state(), ControllerState::Init);

    let result = controller.run().unwrap();
    let betas: Vec<f64> = result.history.iter().map(|r| r.beta).collect();
    assert_eq!(betas, vec![1.0, 1.0, 2.0, 2.0, 4.0, 4.0]);
    assert_eq!(controller.beta(), 4.0);
    assert_eq!(result.termination, Termination::MaxIterations);
    assert_eq!(controller.state(), ControllerState::Terminated);

    let iterations: Vec<usize> = result.history.iter().map(|r| r.iteration).collect();
    assert_eq!(iterations, (1..=6).collect::<Vec<_>>());
}

#[test]
fn test_projection_pushes_physical_density_apart() {
    // Same design seen through a soft and a sharp projection
    let config = TopOptConfig::from_toml_str(BEAM).unwrap();
    let mut controller = Controller::from_config(DistributedContext::serial(), &config).unwrap();
    for _ in 0..2 {
        controller.step().unwrap();
    }
    let design = controller.design().to_vec();
    let soft = controller.analyze(&design).unwrap();

    for _ in 0..2 {
        controller.step().unwrap();
    }
    assert_eq!(controller.beta(), 4.0);
    let sharp = controller.analyze(&design).unwrap();

    assert_eq!(soft.filtered, sharp.filtered);
    for (&x_tilde, (&a, &b)) in soft.filtered.iter().zip(soft.physical.iter().zip(&sharp.physical)) {
        if x_tilde > 0.5 {
            assert!(b >= a, "{x_tilde}: {a} -> {b}");
        } else if x_tilde < 0.5 {
            assert!(b <= a, "{x_tilde}: {a} -> {b}");
        }
    }
}

#[test]
fn test_loose_tolerance_converges_immediately() {
    let text = BEAM.replace("opt_tol = 0.0", "opt_tol = 1.0");
    let config = TopOptConfig::from_toml_str(&text).unwrap();
    let mut controller = Controller::from_config(DistributedContext::serial(), &config).unwrap();
    let result = controller.run().unwrap();

    assert_eq!(result.termination, Termination::Converged);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.history.len(), 1);
    assert!(result.constraints_satisfied);
}

#[test]
fn test_final_field_uses_beta_of_last_iteration() {
    // The run ends on an interval boundary, so β advances to 4 after the last update
    let text = BEAM
        .replace("max_iter = 6", "max_iter = 4")
        .replace("beta_max = 4.0", "beta_max = 8.0");
    let config = TopOptConfig::from_toml_str(&text).unwrap();
    let mut controller = Controller::from_config(DistributedContext::serial(), &config).unwrap();
    let result = controller.run().unwrap();
    assert_eq!(result.history.last().unwrap().beta, 2.0);
    assert_eq!(controller.beta(), 4.0);

    let mut twin = Controller::from_config(DistributedContext::serial(), &config).unwrap();
    twin.step().unwrap();
    twin.step().unwrap();
    assert_eq!(twin.beta(), 2.0);
    let at_last_beta = twin.analyze(&result.design).unwrap();

    assert_eq!(result.physical, at_last_beta.physical);
    assert_relative_eq!(result.volume_fraction, at_last_beta.values.volume_fraction, epsilon = 1e-12);
}
