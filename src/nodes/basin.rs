use crate::graph::NodeId;
use crate::numerical::mathfn::quadratic_plus;
use crate::numerical::smooth::reduction_factor;

/// Piecewise-linear (level, area, storage) triple of one basin. Storage
/// is the integral of area over level, precomputed per profile row, so
/// level <-> storage conversion stays within one quadratic segment.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    level: Vec<f64>,
    area: Vec<f64>,
    storage: Vec<f64>,
}

impl Profile {
    /// Build from (level, area) rows sorted by level. Levels must be
    /// strictly increasing and areas non-negative.
    pub fn new(level: Vec<f64>, area: Vec<f64>) -> Result<Self, String> {
        if level.len() != area.len() || level.len() < 2 {
            return Err("profile needs at least two (level, area) rows".to_string());
        }
        for i in 1..level.len() {
            if level[i] <= level[i - 1] {
                return Err(format!("repeated or decreasing profile level {}", level[i]));
            }
        }
        if area.iter().any(|&a| a < 0.0) {
            return Err("profile areas must be non-negative".to_string());
        }
        // Trapezoid integration of area over level gives storage per row.
        let mut storage = vec![0.0; level.len()];
        for i in 1..level.len() {
            let dl = level[i] - level[i - 1];
            storage[i] = storage[i - 1] + 0.5 * (area[i] + area[i - 1]) * dl;
        }
        Ok(Self {
            level,
            area,
            storage,
        })
    }

    pub fn bottom(&self) -> f64 {
        self.level[0]
    }

    pub fn top_area(&self) -> f64 {
        *self.area.last().unwrap()
    }

    pub fn max_storage(&self) -> f64 {
        *self.storage.last().unwrap()
    }

    fn segment_by_level(&self, level: f64) -> usize {
        let n = self.level.len();
        let mut lo = 0;
        let mut hi = n - 1;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if self.level[mid] <= level {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo.min(n - 2)
    }

    fn segment_by_storage(&self, storage: f64) -> usize {
        let n = self.storage.len();
        let mut lo = 0;
        let mut hi = n - 1;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if self.storage[mid] <= storage {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo.min(n - 2)
    }

    pub fn area_from_level(&self, level: f64) -> f64 {
        let n = self.level.len();
        if level <= self.level[0] {
            return self.area[0];
        }
        if level >= self.level[n - 1] {
            return self.area[n - 1];
        }
        let i = self.segment_by_level(level);
        let f = (level - self.level[i]) / (self.level[i + 1] - self.level[i]);
        self.area[i] + f * (self.area[i + 1] - self.area[i])
    }

    pub fn storage_from_level(&self, level: f64) -> f64 {
        let n = self.level.len();
        if level <= self.level[0] {
            // Below the bottom storage extrapolates linearly with the
            // bottom area, going negative below zero.
            return (level - self.level[0]) * self.area[0];
        }
        if level >= self.level[n - 1] {
            return self.storage[n - 1] + (level - self.level[n - 1]) * self.area[n - 1];
        }
        let i = self.segment_by_level(level);
        let dl = level - self.level[i];
        let slope = (self.area[i + 1] - self.area[i]) / (self.level[i + 1] - self.level[i]);
        self.storage[i] + self.area[i] * dl + 0.5 * slope * dl * dl
    }

    /// Reference area for extrapolating below the bottom: the bottom
    /// area, or the first non-degenerate one when the profile pinches
    /// to zero at the bottom.
    fn bottom_area(&self) -> f64 {
        self.area
            .iter()
            .copied()
            .find(|&a| a > 1e-10)
            .unwrap_or(1.0)
    }

    /// Invert the storage integral back to a level. Within a profile
    /// segment the storage is quadratic in level, so the larger
    /// quadratic root recovers the level exactly.
    pub fn level_from_storage(&self, storage: f64) -> f64 {
        let n = self.storage.len();
        if storage <= 0.0 {
            return self.level[0] + storage / self.bottom_area();
        }
        if storage >= self.storage[n - 1] {
            let area = self.area[n - 1].max(1e-10);
            return self.level[n - 1] + (storage - self.storage[n - 1]) / area;
        }
        let i = self.segment_by_storage(storage);
        let ds = storage - self.storage[i];
        let slope = (self.area[i + 1] - self.area[i]) / (self.level[i + 1] - self.level[i]);
        if slope.abs() < 1e-12 {
            return self.level[i] + ds / self.area[i].max(1e-10);
        }
        // Solve 0.5*slope*dl^2 + area_i*dl - ds = 0 for dl >= 0.
        let dl = quadratic_plus(0.5 * slope, self.area[i], -ds);
        self.level[i] + dl
    }
}

/// Per-timestamp forcing row. Missing values leave the previous value
/// of the slot in place.
#[derive(Debug, Clone, Default)]
pub struct ForcingRow {
    pub time: f64,
    pub basin_idx: usize,
    pub precipitation: Option<f64>,
    pub potential_evaporation: Option<f64>,
    pub drainage: Option<f64>,
    pub infiltration: Option<f64>,
    pub urban_runoff: Option<f64>,
}

/// Basin forcing time table, sorted by (time, basin), played forward by
/// the forcing callback with a cursor so each row is applied once.
#[derive(Debug, Clone, Default)]
pub struct ForcingTable {
    pub rows: Vec<ForcingRow>,
    cursor: usize,
}

impl ForcingTable {
    pub fn new(mut rows: Vec<ForcingRow>) -> Self {
        rows.sort_by(|a, b| {
            a.time
                .partial_cmp(&b.time)
                .unwrap()
                .then(a.basin_idx.cmp(&b.basin_idx))
        });
        Self { rows, cursor: 0 }
    }

    /// Distinct row times, used to pre-schedule forcing callbacks.
    pub fn times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self.rows.iter().map(|r| r.time).collect();
        times.dedup();
        times
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Running totals of the vertical fluxes, used for the basin water
/// balance report.
#[derive(Debug, Clone, Default)]
pub struct BasinCumulatives {
    pub inflow: Vec<f64>,
    pub outflow: Vec<f64>,
    pub precipitation: Vec<f64>,
    pub evaporation: Vec<f64>,
    pub drainage: Vec<f64>,
    pub infiltration: Vec<f64>,
}

impl BasinCumulatives {
    pub fn new(n: usize) -> Self {
        Self {
            inflow: vec![0.0; n],
            outflow: vec![0.0; n],
            precipitation: vec![0.0; n],
            evaporation: vec![0.0; n],
            drainage: vec![0.0; n],
            infiltration: vec![0.0; n],
        }
    }
}

/// The basin table: storage state lives in the state vector, everything
/// else in parallel arrays here.
#[derive(Debug, Clone, Default)]
pub struct Basins {
    pub node_id: Vec<NodeId>,
    pub profile: Vec<Profile>,
    // Forcing slots, overwritten by the forcing callback.
    pub precipitation: Vec<f64>,
    pub potential_evaporation: Vec<f64>,
    pub drainage: Vec<f64>,
    pub infiltration: Vec<f64>,
    pub urban_runoff: Vec<f64>,
    // Caches refreshed from the state vector at the top of every rhs
    // evaluation.
    pub current_storage: Vec<f64>,
    pub current_level: Vec<f64>,
    pub current_area: Vec<f64>,
    pub forcing: ForcingTable,
    pub cumulative: BasinCumulatives,
}

impl Basins {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    pub fn push(&mut self, node_id: NodeId, profile: Profile) {
        self.node_id.push(node_id);
        self.profile.push(profile);
        self.precipitation.push(0.0);
        self.potential_evaporation.push(0.0);
        self.drainage.push(0.0);
        self.infiltration.push(0.0);
        self.urban_runoff.push(0.0);
        self.current_storage.push(0.0);
        self.current_level.push(0.0);
        self.current_area.push(0.0);
    }

    /// Refresh the level and area caches from the storages in the state
    /// vector.
    pub fn set_current_properties(&mut self, storages: &[f64]) {
        for i in 0..self.n() {
            let s = storages[i];
            self.current_storage[i] = s;
            self.current_level[i] = self.profile[i].level_from_storage(s);
            self.current_area[i] = self.profile[i].area_from_level(self.current_level[i]);
        }
    }

    /// Apply all forcing rows up to and including time t. The most
    /// recent non-missing value per column wins.
    pub fn apply_forcing(&mut self, t: f64) {
        while self.forcing.cursor < self.forcing.rows.len()
            && self.forcing.rows[self.forcing.cursor].time <= t + 1e-9
        {
            let row = self.forcing.rows[self.forcing.cursor].clone();
            let i = row.basin_idx;
            if let Some(v) = row.precipitation {
                self.precipitation[i] = v;
            }
            if let Some(v) = row.potential_evaporation {
                self.potential_evaporation[i] = v;
            }
            if let Some(v) = row.drainage {
                self.drainage[i] = v;
            }
            if let Some(v) = row.infiltration {
                self.infiltration[i] = v;
            }
            if let Some(v) = row.urban_runoff {
                self.urban_runoff[i] = v;
            }
            self.forcing.cursor += 1;
        }
    }

    /// Vertical fluxes into du and the per-basin flux channels.
    /// Precipitation falls on the fixed top area; evaporation acts on
    /// the current wet area and is damped towards zero depth, as is
    /// infiltration.
    pub fn formulate_vertical_fluxes(
        &self,
        du: &mut [f64],
        precipitation: &mut [f64],
        evaporation: &mut [f64],
        drainage: &mut [f64],
        infiltration: &mut [f64],
    ) {
        for i in 0..self.n() {
            let depth = self.current_level[i] - self.profile[i].bottom();
            let factor = reduction_factor(depth, 0.1);
            let p = self.precipitation[i] * self.profile[i].top_area();
            let e = self.potential_evaporation[i] * self.current_area[i] * factor;
            // Urban runoff is a lateral inflow like drainage and is
            // reported through the same channel.
            let d = self.drainage[i] + self.urban_runoff[i];
            let inf = self.infiltration[i] * factor;
            precipitation[i] = p;
            evaporation[i] = e;
            drainage[i] = d;
            infiltration[i] = inf;
            du[i] += p + d - e - inf;
        }
    }
}
