/*
* Test session endpoints: stored traces, checks, failures, reset and agent info.
*/

pub mod handler;
pub mod routes;

pub use routes::session_routes;
