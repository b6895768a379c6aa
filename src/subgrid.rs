use crate::nodes::basin::Basins;
use crate::numerical::interpolation::Interpolation;

/// Higher-resolution water levels derived from basin levels through
/// per-element piecewise-linear curves. Refreshed at output instants
/// only; the ODE never reads these.
#[derive(Debug, Clone, Default)]
pub struct Subgrid {
    pub subgrid_id: Vec<i32>,
    pub basin_index: Vec<usize>,
    pub basin_to_subgrid: Vec<Interpolation>,
    pub level: Vec<f64>,
}

impl Subgrid {
    pub fn n(&self) -> usize {
        self.subgrid_id.len()
    }

    pub fn push(&mut self, subgrid_id: i32, basin_index: usize, curve: Interpolation) {
        self.subgrid_id.push(subgrid_id);
        self.basin_index.push(basin_index);
        self.level.push(curve.sample(f64::NEG_INFINITY));
        self.basin_to_subgrid.push(curve);
    }

    pub fn update(&mut self, basins: &Basins) {
        for i in 0..self.n() {
            let basin_level = basins.current_level[self.basin_index[i]];
            self.level[i] = self.basin_to_subgrid[i].sample(basin_level);
        }
    }
}
