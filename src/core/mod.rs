pub mod backend;
pub mod formula;
pub mod grid;
pub mod notes;
pub mod peak_extraction;
pub mod pipeline;
pub mod roughness_kernel;
pub mod snapping;
pub mod spectrum;
pub mod sweep;
pub mod sweep_worker;
