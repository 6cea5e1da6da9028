//! CLI command implementations.

mod config;
mod doctor;
mod probe;
mod run;
mod serve;
mod split;

pub use config::run_config;
pub use doctor::run_doctor;
pub use probe::run_probe;
pub use run::run_bot;
pub use serve::run_serve;
pub use split::run_split;
