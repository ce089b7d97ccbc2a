use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use topopt::{Controller, DistributedContext, Evaluator, Response, Stage, TopOptConfig};

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
max_iter = 10
opt_tol = 0.0
vol_frac = 0.5
filter_radius = 1.6
beta_interval = 1
"#;

const INVERTER: &str = r#"
[mesh]
kind = "rectangle"
min = [0.0, -3.0]
max = [12.0, 3.0]
divisions = [12, 6]

[fem]
youngs_modulus = 1.0
poisson_ratio = 0.3

[fem.disp_bc]
type = "all"
regions = [
    { type = "plane", axis = "x", value = 0.0 },
    { type = "any", regions = [{ type = "box", min = [-1.0, 2.5], max = [1.0, 3.5] }, { type = "box", min = [-1.0, -3.5], max = [1.0, -2.5] }] },
]

[[fem.traction_bcs]]
traction = [1.0, 0.0]

[fem.traction_bcs.region]
type = "all"
regions = [
    { type = "plane", axis = "x", value = 0.0 },
    { type = "box", min = [-1.0, -1.5], max = [1.0, 1.5] },
]

[fem.linear_solver]
kind = "direct"

[opt]
max_iter = 10
vol_frac = 0.3
filter_radius = 1.5
optimizer = "mma"
opt_compliance = false
compliance_bound = 100.0

[opt.in_spring]
axis = "x"
stiffness = 0.1
region = { type = "all", regions = [{ type = "plane", axis = "x", value = 0.0 }, { type = "box", min = [-1.0, -1.5], max = [1.0, 1.5] }] }

[opt.out_spring]
axis = "x"
stiffness = 0.1
region = { type = "all", regions = [{ type = "plane", axis = "x", value = 12.0 }, { type = "box", min = [11.0, -1.5], max = [13.0, 1.5] }] }
"#;

const STEP: f64 = 1e-6;
const SAMPLES: usize = 5;

fn controller(text: &str) -> Controller {
    let config = TopOptConfig::from_toml_str(text).unwrap();
    Controller::from_config(DistributedContext::serial(), &config).unwrap()
}

fn random_design(n: usize, rng: &mut StdRng) -> Vec<f64> {
    (0..n).map(|_| rng.gen_range(0.2..0.8)).collect()
}

/// Compare adjoint gradients against central differences at a few random entries
fn check_gradients(controller: &mut Controller, responses: &[Response], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let design = random_design(controller.design().len(), &mut rng);
    let analysis = controller.analyze(&design).unwrap();

    for &response in responses {
        let gradient = analysis
            .gradients
            .get(response)
            .unwrap_or_else(|| panic!("{response:?} gradient missing"))
            .to_vec();
        let scale = gradient.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
        assert!(scale > 0.0, "{response:?} gradient vanishes");

        for _ in 0..SAMPLES {
            let e = rng.gen_range(0..design.len());
            let mut plus = design.clone();
            plus[e] += STEP;
            let mut minus = design.clone();
            minus[e] -= STEP;

            let f_plus = Evaluator::value(&controller.analyze(&plus).unwrap().values, response).unwrap();
            let f_minus = Evaluator::value(&controller.analyze(&minus).unwrap().values, response).unwrap();
            let fd = (f_plus - f_minus) / (2.0 * STEP);

            println!("{response:?} element {e}: adjoint {} fd {fd}", gradient[e]);
            assert_relative_eq!(gradient[e], fd, epsilon = 1e-6 * scale, max_relative = 1e-5);
        }
    }
}

#[test]
fn test_compliance_and_volume_gradients() {
    let mut controller = controller(BEAM);
    assert_eq!(controller.beta(), 1.0);
    check_gradients(&mut controller, &[Response::Compliance, Response::VolumeFraction], 11);
}

#[test]
fn test_gradients_through_sharp_projection() {
    let mut controller = controller(BEAM);
    controller.step().unwrap();
    controller.step().unwrap();
    assert_eq!(controller.beta(), 4.0);
    check_gradients(&mut controller, &[Response::Compliance, Response::VolumeFraction], 23);
}

#[test]
fn test_output_displacement_gradient() {
    let mut controller = controller(INVERTER);
    check_gradients(
        &mut controller,
        &[
            Response::OutputDisplacement,
            Response::VolumeFraction,
            Response::Compliance,
        ],
        5,
    );
}

#[test]
fn test_analysis_leaves_design_untouched() {
    let mut controller = controller(BEAM);
    let before = controller.design().to_vec();
    let mut rng = StdRng::seed_from_u64(3);
    let design = random_design(before.len(), &mut rng);

    let analysis = controller.analyze(&design).unwrap();
    assert_eq!(controller.design(), before.as_slice());
    assert!(controller.history().is_empty());
    assert_eq!(analysis.physical.len(), before.len());
    assert!(analysis.values.compliance > 0.0);
    assert!(analysis.values.output_displacement.is_none());
}

#[test]
fn test_wrong_design_length_fails_in_filter_stage() {
    let mut controller = controller(BEAM);
    let short = vec![0.5; controller.design().len() - 1];
    let err = controller.analyze(&short).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Filter));
    assert!(err.to_string().contains("design field"), "{err}");
}
