// Start of file: /src/utils/mod.rs

/*
    * Layer error mapping and the session response envelope.
*/

pub mod error_handler;
pub mod response_handler;

// End of file: /src/utils/mod.rs
