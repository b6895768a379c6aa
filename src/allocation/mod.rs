pub use graph::{AllocEdge, AllocationGraph};
pub use problem::{AllocationModel, AllocationRecord, FlowRecord, ObjectiveType, OptimizationType};

pub mod graph;
pub mod problem;
pub mod solver;
