pub mod config;
pub mod envelope;
pub mod routes;
pub mod types;
