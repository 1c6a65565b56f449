#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The proxy's `routing.v1` control protocol: message types, the unary
//! client, and transport construction.

pub mod proto;
mod transport;

pub use self::proto::routing_service_client::RoutingServiceClient;
pub use self::transport::{connect, ConnectOptions, TlsOptions};
