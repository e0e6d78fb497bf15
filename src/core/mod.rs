// Server assembly and process level setup

pub mod logging;
pub mod server;
