pub mod table;
pub mod telemetry;

pub use table::*;
pub use telemetry::*;
