//! Access control policies.
//!
//! Policies are compiled into authorization handlers and published, as a
//! whole, in a [`RoutingTable`]. The [`HandlerSwitcher`] serves forward-auth
//! requests against whichever table is current:
//!
//! ```text
//! watch events --> PolicyEvents --queue--> PolicyWatcher --replace--> HandlerSwitcher <-- requests
//! ```

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod compile;
mod policy;
mod switcher;
mod table;
mod watcher;

#[cfg(test)]
mod tests;

pub use self::{
    compile::{Compile, CompileError, Compiler, RejectTokens, ValidateToken},
    policy::{Policy, PolicyEvent},
    switcher::{Body, HandlerSwitcher},
    table::{RoutingEntry, RoutingTable},
    watcher::{PolicyEvents, PolicyWatcher, WatcherMetrics},
};
