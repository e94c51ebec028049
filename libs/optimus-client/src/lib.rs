//! Optimus client core
//!
//! Drives code execution against the Optimus sandbox and judge:
//!
//! - [`registry`] resolves language identifiers, aliases included
//! - [`run`] runs playground code once per request, newest result wins
//! - [`submission`] submits for judging and polls to a final verdict
//! - [`cache`] keeps list and detail views coherent through tag invalidation
//! - [`console`] holds what a run slot currently shows
//!
//! [`OptimusClient`] wires them to one backend and one shared cache.

pub mod api;
pub mod cache;
pub mod client;
pub mod console;
pub mod error;
pub mod http;
pub mod metrics;
pub mod registry;
pub mod run;
pub mod submission;
pub mod tags;

#[cfg(test)]
mod lifecycle_tests;
#[cfg(test)]
pub(crate) mod testing;

pub use client::OptimusClient;
pub use error::{ApiError, ClientError, ClientResult, ValidationError};
