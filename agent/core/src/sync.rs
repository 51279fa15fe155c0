//! Capabilities consumed by the reconciliation engine.
//!
//! The engine is kind-agnostic: each synchronized kind provides a
//! [`ResourceLister`] that reads desired state from the platform and a
//! [`ResourceHandler`] that reads and writes the cluster.

use crate::ResourceKey;
use anyhow::Result;

/// An object stored in the cluster.
pub trait ClusterResource {
    fn key(&self) -> ResourceKey;
}

impl<K: kube::Resource> ClusterResource for K {
    fn key(&self) -> ResourceKey {
        ResourceKey::of(self)
    }
}

/// A desired-state record read from the platform.
pub trait PlatformResource {
    type Resource: ClusterResource;

    /// Materializes the record into the object that should exist in the cluster.
    fn resource(&self) -> Result<Self::Resource>;
}

/// Lists the desired state of one kind from the platform.
#[async_trait::async_trait]
pub trait ResourceLister: Send + Sync {
    type Item: PlatformResource + Send;

    async fn list(&self) -> Result<Vec<Self::Item>>;
}

/// Reads and writes one kind of object in the cluster.
///
/// `update` is invoked for every object that exists on both sides, whether or
/// not its content changed. Implementations must detect unchanged content
/// themselves and skip the write.
#[async_trait::async_trait]
pub trait ResourceHandler: Send + Sync {
    type Resource: ClusterResource + Send;

    async fn list(&self) -> Result<Vec<Self::Resource>>;

    async fn create(&self, new: Self::Resource) -> Result<()>;

    async fn update(&self, old: Self::Resource, new: Self::Resource) -> Result<()>;

    /// Deletes the object and, transitively, the objects it owns.
    async fn delete(&self, old: Self::Resource) -> Result<()>;
}
