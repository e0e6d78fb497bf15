/*
* Trace intake endpoint and the check pipeline it runs.
*/

pub mod handler;
pub mod routes;

pub use routes::trace_routes;
