/// Benchmark 1: Cantilever Beam - Compliance Minimization
///
/// **Goal:** Reproduce the classic cantilever layout with OC updates
///
/// **Problem Setup:**
/// - 60 × 20 plate clamped at x = 0
/// - Downward traction on the middle of the free end
/// - 50% material, cone filter r = 1.2, SIMP p = 3
///
/// **Success Criteria:**
/// - Compliance drops by more than half from the uniform start
/// - Final volume fraction within 1% of the target
/// - Physical density is mostly black and white (gray fraction < 25%)

use topopt::{problems, Controller, DistributedContext, HistoryWriter, MeshConfig};

fn main() {
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Cantilever Beam: Compliance Minimization");
    println!("═══════════════════════════════════════════════════════════════\n");

    let mut config = problems::beam_2d();
    if let MeshConfig::Rectangle { divisions, .. } = &mut config.mesh {
        *divisions = [90, 30];
    }
    config.opt.max_iter = 120;
    config.opt.beta_interval = 20;
    config.opt.beta_max = 16.0;
    config.opt.move_limit = 0.1;

    println!("Parameters:");
    println!("  Elements: {}", config.mesh.num_elements());
    println!("  Volume fraction: {:.2}", config.opt.vol_frac);
    println!("  Filter radius: {:.2}", config.opt.filter_radius);
    println!("  β continuation: ×2 every {} iterations up to {}\n", config.opt.beta_interval, config.opt.beta_max);

    std::fs::create_dir_all("output/cantilever_beam").ok();
    let writer = HistoryWriter::from_path("output/cantilever_beam/history.csv").unwrap();

    let mut controller = Controller::from_config(DistributedContext::serial(), &config)
        .unwrap()
        .with_observer(Box::new(writer));
    let result = controller.run().unwrap();

    // =====================================================================
    // Results
    // =====================================================================

    let compliance: Vec<f64> = result.history.iter().map(|r| r.compliance).collect();
    for record in result.history.iter().step_by(10) {
        println!(
            "  Iter {:4}: C = {:.4e}, V = {:.4}, β = {:5.1}, change = {:.3e}",
            record.iteration, record.compliance, record.volume_fraction, record.beta, record.change
        );
    }

    let first = compliance[0];
    let last = compliance[compliance.len() - 1];
    let gray = result.physical.iter().filter(|&&x| x > 0.1 && x < 0.9).count() as f64
        / result.physical.len() as f64;

    println!("\n  Termination: {} after {} iterations", result.termination, result.iterations);
    println!("  Compliance: {:.4e} → {:.4e}", first, last);
    println!("  Volume fraction: {:.4}", result.volume_fraction);
    println!("  Gray fraction: {:.1}%\n", 100.0 * gray);

    if last < 0.5 * first {
        println!("  ✓ Compliance reduced by {:.1}%", 100.0 * (1.0 - last / first));
    } else {
        println!("  ✗ FAILED: compliance only reduced to {:.1}% of the start", 100.0 * last / first);
    }
    if (result.volume_fraction - config.opt.vol_frac).abs() < 0.01 {
        println!("  ✓ Volume constraint satisfied");
    } else {
        println!("  ✗ FAILED: volume fraction {:.4} misses target", result.volume_fraction);
    }
    if gray < 0.25 {
        println!("  ✓ Design is nearly black and white");
    } else {
        println!("  ✗ FAILED: too many intermediate densities");
    }

    println!("\n  History: output/cantilever_beam/history.csv");
    println!("\n═══════════════════════════════════════════════════════════════");
    println!("  Cantilever Benchmark Complete");
    println!("═══════════════════════════════════════════════════════════════");
}
