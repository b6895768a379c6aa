use dyn_clone::{clone_trait_object, DynClone};

use crate::network::Network;

/// Adapter to an external groundwater model. The core only needs the
/// two exchange directions; everything else (its own time stepping,
/// unit handling) is the adapter's business. Drainage and infiltration
/// written back are positive-into-model.
pub trait GroundwaterExchange: DynClone + Send {
    fn ingest(&mut self, basin_storage: &[f64]);
    fn extract(&mut self, drainage: &mut [f64], infiltration: &mut [f64]);
}

clone_trait_object!(GroundwaterExchange);

/// One periodic exchange: storages out, drainage and infiltration back
/// into the basin forcing slots.
pub fn exchange(net: &mut Network, adapter: &mut dyn GroundwaterExchange) {
    adapter.ingest(&net.basins.current_storage);
    adapter.extract(&mut net.basins.drainage, &mut net.basins.infiltration);
}
