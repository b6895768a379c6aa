use crate::solve::integrator::{Algorithm, Integrator, IntegratorOptions};

fn decay_opts(algorithm: Algorithm, dt: f64) -> IntegratorOptions {
    IntegratorOptions {
        algorithm,
        dt,
        abstol: 1e-8,
        reltol: 1e-8,
        maxiters: 1_000_000,
        sparse: false,
    }
}

/// du/dt = -u integrated to t = 1 against exp(-1).
fn run_decay(algorithm: Algorithm, dt: f64) -> f64 {
    let mut integrator = Integrator::new(vec![1.0], 0.0, decay_opts(algorithm, dt));
    let mut rhs = |du: &mut [f64], u: &[f64], _t: f64| du[0] = -u[0];
    while integrator.t < 1.0 - 1e-12 {
        integrator.step(1.0, &mut rhs).unwrap();
    }
    integrator.u[0]
}

#[test]
fn euler_converges_first_order() {
    let value = run_decay(Algorithm::Euler, 0.0005);
    assert!((value - (-1.0f64).exp()).abs() < 2e-4);
}

#[test]
fn rk4_is_accurate_at_coarse_steps() {
    let value = run_decay(Algorithm::Rk4, 0.1);
    assert!((value - (-1.0f64).exp()).abs() < 1e-7);
}

#[test]
fn adaptive_bs23_honors_tolerances() {
    let value = run_decay(Algorithm::Bs23, 0.0);
    assert!((value - (-1.0f64).exp()).abs() < 1e-5);
}

#[test]
fn steps_never_pass_the_stop_time() {
    let mut integrator = Integrator::new(vec![1.0], 0.0, decay_opts(Algorithm::Bs23, 0.0));
    let mut rhs = |du: &mut [f64], u: &[f64], _t: f64| du[0] = -u[0];
    for _ in 0..1000 {
        integrator.step(0.5, &mut rhs).unwrap();
        assert!(integrator.t <= 0.5 + 1e-12);
        if integrator.t >= 0.5 {
            break;
        }
    }
    assert!((integrator.t - 0.5).abs() < 1e-12);
}

#[test]
fn maxiters_exhaustion_is_an_error() {
    let mut opts = decay_opts(Algorithm::Euler, 1e-6);
    opts.maxiters = 10;
    let mut integrator = Integrator::new(vec![1.0], 0.0, opts);
    let mut rhs = |du: &mut [f64], u: &[f64], _t: f64| du[0] = -u[0];
    let mut failed = false;
    for _ in 0..20 {
        if integrator.step(1.0, &mut rhs).is_err() {
            failed = true;
            break;
        }
    }
    assert!(failed);
}

#[test]
fn interpolate_is_linear_inside_the_last_step() {
    let mut integrator = Integrator::new(vec![0.0], 0.0, decay_opts(Algorithm::Euler, 1.0));
    let mut rhs = |du: &mut [f64], _u: &[f64], _t: f64| du[0] = 2.0;
    integrator.step(1.0, &mut rhs).unwrap();
    let mut mid = vec![0.0];
    integrator.interpolate(0.5, &mut mid);
    assert!((mid[0] - 1.0).abs() < 1e-12);
}
