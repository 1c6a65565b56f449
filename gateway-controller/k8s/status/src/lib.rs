#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Writers for the status subresources this controller owns: HTTPRoute and
//! GRPCRoute parent statuses, Gateway status, and PingoraConfig status.

pub mod conditions;
mod config;
mod gateway;
pub mod retry;
mod routes;

#[cfg(test)]
mod test_client;

pub use self::config::ConfigStatusWriter;
pub use self::gateway::GatewayStatusWriter;
pub use self::routes::RouteStatusWriter;
