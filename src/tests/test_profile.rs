use crate::nodes::basin::Profile;

#[test]
fn rectangular_profile_round_trips() {
    let p = Profile::new(vec![0.0, 10.0], vec![1000.0, 1000.0]).unwrap();
    assert_eq!(p.bottom(), 0.0);
    assert_eq!(p.top_area(), 1000.0);
    assert_eq!(p.storage_from_level(1.0), 1000.0);
    assert_eq!(p.level_from_storage(1000.0), 1.0);
    assert_eq!(p.area_from_level(5.0), 1000.0);
}

#[test]
fn trapezoidal_profile_round_trips() {
    let p = Profile::new(vec![0.0, 1.0, 2.0], vec![0.0, 100.0, 100.0]).unwrap();
    // Triangle up to level 1, rectangle above.
    assert!((p.storage_from_level(1.0) - 50.0).abs() < 1e-12);
    assert!((p.storage_from_level(2.0) - 150.0).abs() < 1e-12);
    assert!((p.level_from_storage(50.0) - 1.0).abs() < 1e-9);
    assert!((p.level_from_storage(150.0) - 2.0).abs() < 1e-9);
    // Half the triangle storage sits at level 1/sqrt(2).
    let h = p.level_from_storage(25.0);
    assert!((h - 0.5f64.sqrt()).abs() < 1e-9);
}

#[test]
fn extrapolates_above_the_top_with_the_top_area() {
    let p = Profile::new(vec![0.0, 1.0], vec![100.0, 100.0]).unwrap();
    assert!((p.storage_from_level(3.0) - 300.0).abs() < 1e-12);
    assert!((p.level_from_storage(300.0) - 3.0).abs() < 1e-12);
}

/// Slightly negative storages (solver transients) map to slightly
/// negative levels, even when the profile pinches to zero area at the
/// bottom.
#[test]
fn negative_storage_stays_near_the_bottom() {
    let p = Profile::new(vec![0.0, 1.0, 2.0], vec![0.0, 100.0, 100.0]).unwrap();
    let level = p.level_from_storage(-1e-6);
    assert!(level < 0.0);
    assert!(level > -1e-6);
}

#[test]
fn rejects_bad_profiles() {
    assert!(Profile::new(vec![0.0], vec![1.0]).is_err());
    assert!(Profile::new(vec![0.0, 0.0], vec![1.0, 1.0]).is_err());
    assert!(Profile::new(vec![0.0, 1.0], vec![-1.0, 1.0]).is_err());
}
