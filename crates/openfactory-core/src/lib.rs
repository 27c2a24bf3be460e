//! Shared domain types, configuration primitives, and plugin selection for
//! the OpenFactory routing and streaming core.

pub mod controller;
pub mod deployment;
pub mod domain;
pub mod env;
pub mod error;
pub mod grouping;
pub mod hash;
pub mod ksql;
pub mod plugins;

pub use controller::RoutingController;
pub use domain::{AssetUuid, GroupName};
pub use error::{CoreError, CoreResult};
