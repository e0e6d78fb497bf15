// Library root for the APM test agent

pub mod api;
pub mod checks;
pub mod config;
pub mod core;
pub mod span_validation;
pub mod trace;
pub mod utils;

pub use crate::config::environment::EnvironmentVariables;
pub use crate::config::state::AppState;
pub use crate::core::server::create_app;
