pub mod runs;
pub mod sweeps;

pub use runs::run_routes;
pub use sweeps::sweep_routes;
