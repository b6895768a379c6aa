use std::f64::consts::PI;

/// C1 ramp used to damp fluxes near empty storages and small head
/// differences. Zero below x=0, one above x=threshold, and the cubic
/// (-2*(x/T) + 3) * (x/T)^2 in between. Continuous first derivative at
/// both ends.
pub fn reduction_factor(x: f64, threshold: f64) -> f64 {
    if x < 0.0 {
        0.0
    } else if x < threshold {
        let u = x / threshold;
        (-2.0 * u + 3.0) * u * u
    } else {
        1.0
    }
}

/// Storage damping for nodes abstracting from a basin. The 10 m3 ramp
/// width matches the pump and outlet laws.
pub fn low_storage_factor(storage: f64) -> f64 {
    reduction_factor(storage, 10.0)
}

/// Regularized square-root slope term for the Manning law:
/// sqrt(2/pi * atan(1000 * dh) * dh / L + 1e-200). The arctangent keeps
/// the derivative finite at dh = 0; the product atan(k*dh)*dh is
/// non-negative for any dh so the root is always real.
pub fn manning_slope_term(dh: f64, length: f64) -> f64 {
    libm::sqrt(2.0 / PI * libm::atan(1000.0 * dh) * dh / length + 1e-200)
}
