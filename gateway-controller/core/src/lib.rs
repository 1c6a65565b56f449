#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod binding;
pub mod hostname;
pub mod weight;

pub use self::binding::{BindingReason, BindingResult, ParentBindings, RouteInfo, RouteKind};
