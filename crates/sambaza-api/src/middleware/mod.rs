//! Tower middleware for the API.

pub mod rate_limit;
