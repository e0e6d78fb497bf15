/*
* HTTP surface of the agent: trace intake and test session endpoints.
*/

pub mod session;
pub mod traces;
