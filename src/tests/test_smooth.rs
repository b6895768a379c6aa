use crate::numerical::smooth::{manning_slope_term, reduction_factor};

#[test]
fn ramp_endpoints_and_midpoint() {
    assert_eq!(reduction_factor(-1.0, 10.0), 0.0);
    assert_eq!(reduction_factor(0.0, 10.0), 0.0);
    assert_eq!(reduction_factor(5.0, 10.0), 0.5);
    assert_eq!(reduction_factor(10.0, 10.0), 1.0);
    assert_eq!(reduction_factor(1e9, 10.0), 1.0);
}

/// The ramp is C1: finite differences of the slope vanish at both
/// joins.
#[test]
fn ramp_is_smooth_at_the_joins() {
    let t = 10.0;
    let h = 1e-6;
    let slope_below = (reduction_factor(h, t) - reduction_factor(0.0, t)) / h;
    assert!(slope_below.abs() < 1e-5);
    let slope_above = (reduction_factor(t, t) - reduction_factor(t - h, t)) / h;
    assert!(slope_above.abs() < 1e-5);
    // Monotone on [0, T].
    let mut prev = 0.0;
    for i in 0..=100 {
        let v = reduction_factor(i as f64 * t / 100.0, t);
        assert!(v >= prev);
        prev = v;
    }
}

#[test]
fn manning_term_is_signless_and_finite_at_zero_head() {
    let at_zero = manning_slope_term(0.0, 100.0);
    assert!(at_zero >= 0.0 && at_zero < 1e-50);
    // atan(k*dh)*dh is even, so the term is the same for both signs.
    let pos = manning_slope_term(0.5, 100.0);
    let neg = manning_slope_term(-0.5, 100.0);
    assert!((pos - neg).abs() < 1e-12);
    assert!(pos > 0.0);
}
