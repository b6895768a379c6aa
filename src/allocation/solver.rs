use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{NonnegativeConeT, ZeroConeT},
};

/// Termination status of one LP/QP solve, reduced to what the
/// allocation layer needs to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
    TimeLimit,
    NumericalError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSense {
    Eq,
    Le,
}

#[derive(Debug, Clone)]
pub struct LpRow {
    pub coeffs: Vec<(usize, f64)>,
    pub sense: RowSense,
    pub rhs: f64,
}

#[derive(Debug, Clone)]
pub struct LpSolution {
    pub status: LpStatus,
    pub x: Vec<f64>,
    pub objective: f64,
}

/// A linear/quadratic program in the editable form the allocation layer
/// wants: rows and objective coefficients are adjusted in place between
/// solves, and each solve lowers everything into the conic solver's
/// matrices. Minimizes 0.5 x'Px + q'x.
#[derive(Debug, Clone)]
pub struct LpProblem {
    n_vars: usize,
    quadratic: Vec<(usize, usize, f64)>,
    linear: Vec<f64>,
    rows: Vec<LpRow>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    /// Wall-clock budget per solve in seconds.
    pub time_limit: f64,
    pub max_iter: u32,
}

impl LpProblem {
    pub fn new(n_vars: usize) -> Self {
        Self {
            n_vars,
            quadratic: vec![],
            linear: vec![0.0; n_vars],
            rows: vec![],
            lower: vec![0.0; n_vars],
            upper: vec![f64::INFINITY; n_vars],
            time_limit: 60.0,
            max_iter: 200_000,
        }
    }

    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    pub fn set_bounds(&mut self, var: usize, lower: f64, upper: f64) {
        self.lower[var] = lower;
        self.upper[var] = upper;
    }

    pub fn add_row(&mut self, coeffs: Vec<(usize, f64)>, sense: RowSense, rhs: f64) -> usize {
        self.rows.push(LpRow { coeffs, sense, rhs });
        self.rows.len() - 1
    }

    pub fn set_rhs(&mut self, row: usize, rhs: f64) {
        self.rows[row].rhs = rhs;
    }

    /// Overwrite the coefficient of `var` in `row`; the variable must
    /// already appear there.
    pub fn set_row_coeff(&mut self, row: usize, var: usize, coeff: f64) {
        for entry in &mut self.rows[row].coeffs {
            if entry.0 == var {
                entry.1 = coeff;
            }
        }
    }

    pub fn rhs(&self, row: usize) -> f64 {
        self.rows[row].rhs
    }

    pub fn clear_objective(&mut self) {
        self.quadratic.clear();
        self.linear.iter_mut().for_each(|v| *v = 0.0);
    }

    pub fn add_linear(&mut self, var: usize, coeff: f64) {
        self.linear[var] += coeff;
    }

    /// Add coeff * x_i * x_j to the objective (so a squared term
    /// a*x_i^2 is add_quadratic(i, i, a)).
    pub fn add_quadratic(&mut self, i: usize, j: usize, coeff: f64) {
        let (a, b) = if i <= j { (i, j) } else { (j, i) };
        self.quadratic.push((a, b, coeff));
    }

    /// Lower the editable form into CSC matrices and run the
    /// interior-point solve.
    pub fn solve(&self) -> LpSolution {
        let n = self.n_vars;

        // P holds 2 * the quadratic coefficients since the solver
        // minimizes 0.5 x'Px. Duplicate triplets are summed.
        let mut p_triplets: Vec<(usize, usize, f64)> = self
            .quadratic
            .iter()
            .map(|&(i, j, c)| if i == j { (i, j, 2.0 * c) } else { (i, j, c) })
            .collect();
        let p = csc_from_triplets(n, n, &mut p_triplets);

        // Rows: equalities first (zero cone), then all inequalities
        // (nonnegative cone), then the variable bounds as extra
        // inequality rows. Rows with an infinite rhs are vacuous and
        // skipped.
        let mut a_triplets: Vec<(usize, usize, f64)> = vec![];
        let mut b = vec![];
        let mut n_eq = 0;
        for row in self.rows.iter().filter(|r| r.sense == RowSense::Eq) {
            for &(var, coeff) in &row.coeffs {
                a_triplets.push((n_eq, var, coeff));
            }
            b.push(row.rhs);
            n_eq += 1;
        }
        let mut m = n_eq;
        for row in self.rows.iter().filter(|r| r.sense == RowSense::Le) {
            if row.rhs.is_infinite() && row.rhs > 0.0 {
                continue;
            }
            for &(var, coeff) in &row.coeffs {
                a_triplets.push((m, var, coeff));
            }
            b.push(row.rhs);
            m += 1;
        }
        for var in 0..n {
            if self.upper[var].is_finite() {
                a_triplets.push((m, var, 1.0));
                b.push(self.upper[var]);
                m += 1;
            }
            if self.lower[var].is_finite() {
                a_triplets.push((m, var, -1.0));
                b.push(-self.lower[var]);
                m += 1;
            }
        }
        let a = csc_from_triplets(m, n, &mut a_triplets);
        let cones = [ZeroConeT(n_eq), NonnegativeConeT(m - n_eq)];

        let settings = DefaultSettings {
            verbose: false,
            max_iter: self.max_iter,
            time_limit: self.time_limit,
            ..DefaultSettings::default()
        };
        let mut solver = DefaultSolver::new(&p, &self.linear, &a, &b, &cones, settings);
        solver.solve();

        let status = match solver.solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => LpStatus::Optimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                LpStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                LpStatus::Unbounded
            }
            SolverStatus::MaxIterations => LpStatus::IterationLimit,
            SolverStatus::MaxTime => LpStatus::TimeLimit,
            _ => LpStatus::NumericalError,
        };
        LpSolution {
            status,
            x: solver.solution.x.clone(),
            objective: solver.solution.obj_val,
        }
    }
}

/// Build a CSC matrix from unordered triplets, summing duplicates.
fn csc_from_triplets(m: usize, n: usize, triplets: &mut Vec<(usize, usize, f64)>) -> CscMatrix {
    triplets.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));
    let mut colptr = vec![0usize; n + 1];
    let mut rowval: Vec<usize> = vec![];
    let mut nzval: Vec<f64> = vec![];
    let mut last: Option<(usize, usize)> = None;
    for &(row, col, val) in triplets.iter() {
        if last == Some((col, row)) {
            *nzval.last_mut().unwrap() += val;
        } else {
            rowval.push(row);
            nzval.push(val);
            colptr[col + 1] += 1;
            last = Some((col, row));
        }
    }
    for c in 0..n {
        colptr[c + 1] += colptr[c];
    }
    CscMatrix::new(m, n, colptr, rowval, nzval)
}
