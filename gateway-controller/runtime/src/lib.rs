#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Process wiring: argument parsing, the kubert runtime, reflector stores,
//! and the three reconcilers.

mod args;
mod gateway;
mod mappers;
mod routes;
mod stores;

pub use self::args::Args;
pub use self::stores::Stores;

/// Errors a reconcile can surface to the controller runtime. Anything else
/// is handled in place with an explicit requeue.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("status update failed: {0}")]
    Status(#[source] anyhow::Error),
}
