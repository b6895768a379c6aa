use chrono::NaiveDate;

use crate::catalog::{BasinProfileRow, BasinStateRow, MemoryCatalog};
use crate::config::Config;
use crate::model::Model;

/// A config over `duration` seconds of 2020, with results going to a
/// per-test temp directory so parallel tests do not collide.
pub fn test_config(duration: f64, name: &str) -> Config {
    let starttime = NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    Config {
        starttime,
        endtime: starttime + chrono::Duration::seconds(duration as i64),
        input_dir: ".".into(),
        results_dir: std::env::temp_dir().join(format!("torne-test-{name}")),
        database: None,
        allocation: Default::default(),
        solver: Default::default(),
        logging: Default::default(),
        results: Default::default(),
        tables: Default::default(),
    }
}

/// Rectangular (level, area) profile rows for one basin.
pub fn profile(node_id: i32, points: &[(f64, f64)]) -> Vec<BasinProfileRow> {
    points
        .iter()
        .map(|&(level, area)| BasinProfileRow {
            node_id,
            area,
            level,
        })
        .collect()
}

pub fn state(node_id: i32, level: f64) -> BasinStateRow {
    BasinStateRow { node_id, level }
}

pub fn build(config: Config, catalog: &MemoryCatalog) -> Model {
    Model::from_catalog(config, catalog).expect("model should build")
}
