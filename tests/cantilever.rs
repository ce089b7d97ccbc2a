use approx::assert_relative_eq;
use topopt::{
    Controller, DistributedContext, OptimizerKind, Stage, Termination, TopOptConfig, TopOptError,
};

const CANTILEVER: &str = r#"
[mesh]
kind = "rectangle"
min = [0.0, 0.0]
max = [20.0, 10.0]
divisions = [20, 10]

[fem]
youngs_modulus = 1.0
poisson_ratio = 0.3
disp_bc = { type = "plane", axis = "x", value = 0.0 }

[[fem.traction_bcs]]
traction = [0.0, -1.0]

[fem.traction_bcs.region]
type = "all"
regions = [
    { type = "plane", axis = "x", value = 20.0 },
    { type = "box", min = [19.0, 3.5], max = [21.0, 6.5] },
]

[fem.linear_solver]
kind = "direct"

[opt]
max_iter = 5
opt_tol = 0.0
vol_frac = 0.5
filter_radius = 1.5
move = 0.1
"#;

#[test]
fn test_cantilever_five_iterations() {
    let config = TopOptConfig::from_toml_str(CANTILEVER).unwrap();
    let mut controller = Controller::from_config(DistributedContext::serial(), &config).unwrap();
    let result = controller.run().unwrap();

    assert_eq!(result.termination, Termination::MaxIterations);
    assert_eq!(result.iterations, 5);
    assert_eq!(result.history.len(), 5);

    let compliance: Vec<f64> = result.history.iter().map(|r| r.compliance).collect();
    println!("Compliance history: {:?}", compliance);
    assert!(compliance[1] < compliance[0], "{compliance:?}");
    assert!(compliance[2] < compliance[1], "{compliance:?}");

    // Uniform start sits exactly on the volume target
    assert_relative_eq!(result.history[0].volume_fraction, 0.5, epsilon = 1e-12);
    for record in &result.history {
        assert!((record.volume_fraction - 0.5).abs() < 1e-3, "{record:?}");
        assert!(!record.diagnostics.bisection_capped);
        assert_eq!(record.beta, 1.0);
    }
    assert!((result.volume_fraction - 0.5).abs() < 1e-3, "{}", result.volume_fraction);

    for (x, xh) in result.design.iter().zip(&result.physical) {
        assert!((0.0..=1.0).contains(x));
        assert!((0.0..=1.0).contains(xh));
    }
    // Material has been redistributed
    assert!(result.history.iter().all(|r| r.change > 0.0));
}

#[test]
fn test_converged_run_stops_early() {
    let text = CANTILEVER.replace("opt_tol = 0.0", "opt_tol = 0.5");
    let config = TopOptConfig::from_toml_str(&text).unwrap();
    let mut controller = Controller::from_config(DistributedContext::serial(), &config).unwrap();
    let result = controller.run().unwrap();

    // Changes never exceed the move limit, so the first check passes
    assert_eq!(result.termination, Termination::Converged);
    assert_eq!(result.iterations, 1);
    assert!(result.history[0].converged);

    // Stepping a terminated controller does nothing
    assert_eq!(controller.step().unwrap(), Some(Termination::Converged));
    assert_eq!(controller.iteration(), 1);
}

#[test]
fn test_solver_failure_keeps_last_design() {
    let text = CANTILEVER.replace(
        "kind = \"direct\"",
        "kind = \"cg\"\ntolerance = 1e-14\nmax_iterations = 1",
    );
    let config = TopOptConfig::from_toml_str(&text).unwrap();
    let mut controller = Controller::from_config(DistributedContext::serial(), &config).unwrap();
    let initial = controller.design().to_vec();

    let err = controller.run().unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Solve));
    assert!(matches!(err, TopOptError::Stage { iteration: 1, .. }));
    assert_eq!(controller.design(), initial.as_slice());
    assert_eq!(controller.iteration(), 0);
    assert!(controller.history().is_empty());
}

#[test]
fn test_three_dimensional_cantilever_runs() {
    let text = r#"
[mesh]
kind = "cuboid"
min = [0.0, 0.0, 0.0]
max = [6.0, 2.0, 2.0]
divisions = [6, 2, 2]

[fem]
youngs_modulus = 1.0
poisson_ratio = 0.3
disp_bc = { type = "plane", axis = "x", value = 0.0 }
traction_bcs = [{ traction = [0.0, 0.0, -1.0], region = { type = "plane", axis = "x", value = 6.0 } }]

[opt]
max_iter = 2
vol_frac = 0.4
filter_radius = 1.5
"#;
    let config = TopOptConfig::from_toml_str(text).unwrap();
    let mut controller = Controller::from_config(DistributedContext::serial(), &config).unwrap();
    let result = controller.run().unwrap();

    assert_eq!(result.iterations, 2);
    assert!(result.history[0].compliance > 0.0);
    assert!(result.history[1].compliance < result.history[0].compliance);
}

#[test]
fn test_volume_minimization_with_loose_compliance_bound() {
    let mut config = TopOptConfig::from_toml_str(CANTILEVER).unwrap();
    let mut reference = Controller::from_config(DistributedContext::serial(), &config).unwrap();
    let start = reference.design().to_vec();
    let c0 = reference.analyze(&start).unwrap().values.compliance;

    config.opt.opt_compliance = false;
    config.opt.optimizer = OptimizerKind::Mma;
    config.opt.compliance_bound = Some(10.0 * c0);
    config.opt.move_limit = 0.02;
    config.opt.max_iter = 8;
    let mut controller = Controller::from_config(DistributedContext::serial(), &config).unwrap();
    let result = controller.run().unwrap();

    assert_eq!(result.iterations, 8);
    assert_relative_eq!(result.history[0].compliance, c0, max_relative = 1e-12);
    for record in &result.history {
        assert_eq!(record.objective, record.volume_fraction);
        assert!(record.output_displacement.is_none());
        assert_eq!(record.constraints.len(), 1);
        assert!(record.constraints[0] < 0.0, "{record:?}");
        assert!(!record.diagnostics.infeasible);
    }
    // Inactive bound: material is removed at the move limit, stiffness drops with it
    for pair in result.history.windows(2) {
        assert!(pair[1].volume_fraction < pair[0].volume_fraction, "{pair:?}");
        assert!(pair[1].compliance > pair[0].compliance, "{pair:?}");
    }
    assert!(result.volume_fraction < 0.4, "{}", result.volume_fraction);
    assert!(result.constraints_satisfied);
}
