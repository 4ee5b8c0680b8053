pub mod history_handlers;
pub mod run_handlers;
pub mod sweep_handlers;

pub use history_handlers::*;
pub use run_handlers::*;
pub use sweep_handlers::*;
