pub use control::{ControlMapping, ControlUpdate};

//List all the node kind submodules here
pub mod basin;
pub mod control;
pub mod discrete_control;
pub mod flow_boundary;
pub mod flow_demand;
pub mod fractional_flow;
pub mod level_boundary;
pub mod level_demand;
pub mod linear_resistance;
pub mod manning_resistance;
pub mod outlet;
pub mod pid_control;
pub mod pump;
pub mod tabulated_rating_curve;
pub mod terminal;
pub mod user_demand;
