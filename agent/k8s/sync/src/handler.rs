use anyhow::{Context, Result};
use hub_agent_core::{sync::ResourceHandler, MANAGED_BY, MANAGED_BY_LABEL};
use hub_agent_k8s_api::{
    hub::{Catalog, EdgeIngress},
    Api, Client, DeleteParams, ListParams, Patch, PatchParams, PostParams, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, marker::PhantomData};
use tracing::{debug, trace};

/// A custom resource that records the hash of the spec it was last synced
/// with in its status.
pub trait SyncedResource:
    Resource<DynamicType = ()>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Returns an API client scoped to the object's namespace, if any.
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;

    fn spec_hash(&self) -> Option<&str>;

    /// Copies the spec of `desired` onto this object.
    fn set_spec(&mut self, desired: &Self);
}

/// Synchronizes a [`SyncedResource`] kind through the Kubernetes API.
///
/// Only objects labeled as managed by the agent are listed, so objects
/// created by other means are never considered for deletion.
pub struct KubeHandler<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

// === impl KubeHandler ===

impl<K: SyncedResource> KubeHandler<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub async fn list_managed(&self) -> Result<Vec<K>> {
        let params = ListParams::default().labels(&format!("{MANAGED_BY_LABEL}={MANAGED_BY}"));
        let list = Api::<K>::all(self.client.clone())
            .list(&params)
            .await
            .with_context(|| format!("failed to list {}", K::kind(&())))?;
        Ok(list.items)
    }

    /// Creates the object and then writes its status, returning the object as
    /// stored in the cluster.
    pub async fn create_object(&self, new: K) -> Result<K> {
        let api = K::api(self.client.clone(), new.namespace().as_deref());
        let status = status_of(&new)?;
        let created = api
            .create(&PostParams::default(), &new)
            .await
            .with_context(|| format!("failed to create {}", new.name_any()))?;
        self.patch_status(&api, created, status).await
    }

    /// Replaces the object when its spec hash differs from the one recorded in
    /// the cluster, returning the object as stored in the cluster.
    pub async fn update_object(&self, old: K, new: K) -> Result<K> {
        if old.spec_hash().is_some() && old.spec_hash() == new.spec_hash() {
            trace!(name = %old.name_any(), "Unchanged");
            return Ok(old);
        }

        let name = old.name_any();
        let api = K::api(self.client.clone(), old.namespace().as_deref());
        let status = status_of(&new)?;
        let obj = replacement(old, &new);
        let replaced = api
            .replace(&name, &PostParams::default(), &obj)
            .await
            .with_context(|| format!("failed to replace {name}"))?;
        debug!(name = %replaced.name_any(), "Replaced");
        self.patch_status(&api, replaced, status).await
    }

    pub async fn delete_object(&self, old: K) -> Result<()> {
        let api = K::api(self.client.clone(), old.namespace().as_deref());
        api.delete(&old.name_any(), &DeleteParams::foreground())
            .await
            .with_context(|| format!("failed to delete {}", old.name_any()))?;
        Ok(())
    }

    async fn patch_status(
        &self,
        api: &Api<K>,
        obj: K,
        status: Option<serde_json::Value>,
    ) -> Result<K> {
        let Some(status) = status else {
            return Ok(obj);
        };
        let name = obj.name_any();
        let patch = serde_json::json!({ "status": status });
        api.patch_status(&name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .with_context(|| format!("failed to patch status of {name}"))
    }
}

impl<K> Clone for KubeHandler<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _kind: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<K: SyncedResource> ResourceHandler for KubeHandler<K> {
    type Resource = K;

    async fn list(&self) -> Result<Vec<K>> {
        self.list_managed().await
    }

    async fn create(&self, new: K) -> Result<()> {
        self.create_object(new).await.map(|_| ())
    }

    async fn update(&self, old: K, new: K) -> Result<()> {
        self.update_object(old, new).await.map(|_| ())
    }

    async fn delete(&self, old: K) -> Result<()> {
        self.delete_object(old).await
    }
}

/// Applies the desired spec and labels to the live object. The rest of its
/// metadata, including the resource version, is kept as stored.
fn replacement<K: SyncedResource>(old: K, desired: &K) -> K {
    let mut obj = old;
    obj.set_spec(desired);
    if let Some(labels) = &desired.meta().labels {
        obj.meta_mut()
            .labels
            .get_or_insert_with(Default::default)
            .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    obj
}

/// Extracts the status of an object from its serialized form; the status
/// subresource ignores it on create and replace.
fn status_of<K: Serialize>(obj: &K) -> Result<Option<serde_json::Value>> {
    let mut value = serde_json::to_value(obj).context("failed to serialize resource")?;
    Ok(value
        .as_object_mut()
        .and_then(|o| o.remove("status"))
        .filter(|s| !s.is_null()))
}

// === impl SyncedResource ===

impl SyncedResource for EdgeIngress {
    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::default_namespaced(client),
        }
    }

    fn spec_hash(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.spec_hash.as_str())
            .filter(|h| !h.is_empty())
    }

    fn set_spec(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
    }
}

impl SyncedResource for Catalog {
    fn api(client: Client, _: Option<&str>) -> Api<Self> {
        Api::all(client)
    }

    fn spec_hash(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.spec_hash.as_str())
            .filter(|h| !h.is_empty())
    }

    fn set_spec(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
    }
}
