//! Platform to cluster synchronization.
//!
//! A [`ResourceSyncer`] periodically converges one kind of cluster object
//! toward the state declared by the platform:
//!
//! ```text
//! [ platform list ] --materialize--> [ desired ] --diff by key--> create / update / delete
//!                                        ^
//! [ cluster list ] ----------------------'
//! ```
//!
//! The syncer knows nothing about the kinds it synchronizes. Each kind plugs in
//! a lister and a handler; [`KubeHandler`] is a handler for any custom resource
//! carrying a spec hash in its status, and [`EdgeIngressHandler`] extends it to
//! maintain each edge ingress' child `Ingress`.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod edge_ingress;
mod handler;
mod metrics;
mod syncer;


pub use self::{
    edge_ingress::{EdgeIngressHandler, IngressConfig},
    handler::{KubeHandler, SyncedResource},
    metrics::SyncMetrics,
    syncer::ResourceSyncer,
};

/// The field manager used for server-side apply patches.
pub const FIELD_MANAGER: &str = "hub-agent";
