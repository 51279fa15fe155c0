#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod authz;
mod key;
pub mod sync;

pub use self::key::ResourceKey;

/// Label set on every object the agent materializes from platform state.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

pub const MANAGED_BY: &str = "traefik-hub";
