use crate::numerical::interpolation::Interpolation;

#[test]
fn samples_inside_and_between_points() {
    let itp = Interpolation::new(vec![0.0, 10.0, 20.0], vec![1.0, 3.0, 3.0]).unwrap();
    assert_eq!(itp.sample(0.0), 1.0);
    assert_eq!(itp.sample(5.0), 2.0);
    assert_eq!(itp.sample(10.0), 3.0);
    assert_eq!(itp.sample(15.0), 3.0);
}

/// Sampling outside the domain returns the nearest endpoint value.
#[test]
fn extrapolates_constant_at_both_ends() {
    let itp = Interpolation::new(vec![100.0, 200.0], vec![5.0, 7.0]).unwrap();
    assert_eq!(itp.sample(-1e9), 5.0);
    assert_eq!(itp.sample(99.9), 5.0);
    assert_eq!(itp.sample(200.1), 7.0);
    assert_eq!(itp.sample(1e9), 7.0);
}

#[test]
fn derivative_is_zero_outside_the_domain() {
    let itp = Interpolation::new(vec![0.0, 1.0], vec![0.0, 2.0]).unwrap();
    assert_eq!(itp.derivative(0.5), 2.0);
    assert_eq!(itp.derivative(-1.0), 0.0);
    assert_eq!(itp.derivative(2.0), 0.0);
}

#[test]
fn single_point_is_a_constant_function() {
    let itp = Interpolation::constant(4.2);
    assert_eq!(itp.sample(-5.0), 4.2);
    assert_eq!(itp.sample(5.0), 4.2);
}

#[test]
fn rejects_non_increasing_abscissae() {
    assert!(Interpolation::new(vec![0.0, 0.0], vec![1.0, 2.0]).is_err());
    assert!(Interpolation::new(vec![1.0, 0.5], vec![1.0, 2.0]).is_err());
    assert!(Interpolation::new(vec![], vec![]).is_err());
}

#[test]
fn replace_swaps_the_curve_wholesale() {
    let mut itp = Interpolation::constant(1.0);
    itp.replace(Interpolation::new(vec![0.0, 1.0], vec![0.0, 10.0]).unwrap());
    assert_eq!(itp.sample(0.5), 5.0);
}
