use crate::allocation::solver::{LpProblem, LpStatus, RowSense};

#[test]
fn maximizes_a_bounded_variable() {
    let mut lp = LpProblem::new(1);
    lp.add_linear(0, -1.0);
    lp.add_row(vec![(0, 1.0)], RowSense::Le, 3.0);
    let solution = lp.solve();
    assert_eq!(solution.status, LpStatus::Optimal);
    assert!((solution.x[0] - 3.0).abs() < 1e-4);
}

#[test]
fn quadratic_objective_finds_the_vertex() {
    // min x^2 - 4x  ->  x = 2.
    let mut lp = LpProblem::new(1);
    lp.add_quadratic(0, 0, 1.0);
    lp.add_linear(0, -4.0);
    let solution = lp.solve();
    assert_eq!(solution.status, LpStatus::Optimal);
    assert!((solution.x[0] - 2.0).abs() < 1e-4);
}

#[test]
fn equality_rows_bind() {
    // min x + 2y  s.t.  x + y = 4, x <= 1  ->  x = 1, y = 3.
    let mut lp = LpProblem::new(2);
    lp.add_linear(0, 1.0);
    lp.add_linear(1, 2.0);
    lp.add_row(vec![(0, 1.0), (1, 1.0)], RowSense::Eq, 4.0);
    lp.add_row(vec![(0, 1.0)], RowSense::Le, 1.0);
    let solution = lp.solve();
    assert_eq!(solution.status, LpStatus::Optimal);
    assert!((solution.x[0] - 1.0).abs() < 1e-4);
    assert!((solution.x[1] - 3.0).abs() < 1e-4);
}

#[test]
fn infeasible_rows_are_reported_as_such() {
    let mut lp = LpProblem::new(1);
    lp.add_row(vec![(0, 1.0)], RowSense::Le, -1.0);
    // x >= 0 and x <= -1 cannot hold together.
    let solution = lp.solve();
    assert_eq!(solution.status, LpStatus::Infeasible);
}

#[test]
fn rhs_edits_take_effect_between_solves() {
    let mut lp = LpProblem::new(1);
    lp.add_linear(0, -1.0);
    let row = lp.add_row(vec![(0, 1.0)], RowSense::Le, 3.0);
    let first = lp.solve();
    lp.set_rhs(row, 1.0);
    let second = lp.solve();
    assert!((first.x[0] - 3.0).abs() < 1e-4);
    assert!((second.x[0] - 1.0).abs() < 1e-4);
}

#[test]
fn vacuous_rows_with_infinite_rhs_are_skipped() {
    let mut lp = LpProblem::new(1);
    lp.add_linear(0, -1.0);
    lp.add_row(vec![(0, 1.0)], RowSense::Le, f64::INFINITY);
    lp.add_row(vec![(0, 1.0)], RowSense::Le, 2.0);
    let solution = lp.solve();
    assert_eq!(solution.status, LpStatus::Optimal);
    assert!((solution.x[0] - 2.0).abs() < 1e-4);
}
