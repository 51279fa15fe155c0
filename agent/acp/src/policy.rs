use anyhow::{bail, Result};
use hub_agent_core::ResourceKey;
use hub_agent_k8s_api::{
    hub::{AccessControlPolicy, AccessControlPolicySpec},
    spec_hash, ResourceExt,
};

/// A policy as read from the cluster, identified by its key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policy {
    pub key: ResourceKey,
    pub spec: AccessControlPolicySpec,
}

/// A change to the set of policies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyEvent {
    Upsert(Policy),
    Delete(ResourceKey),
}

// === impl Policy ===

impl Policy {
    pub fn new(key: ResourceKey, spec: AccessControlPolicySpec) -> Self {
        Self { key, spec }
    }

    /// Fails if the resource lacks a name or a namespace.
    pub fn from_resource(acp: AccessControlPolicy) -> Result<Self> {
        let name = acp.metadata.name.clone().unwrap_or_default();
        let namespace = acp.namespace().unwrap_or_default();
        if name.is_empty() || namespace.is_empty() {
            bail!("access control policy must have a name and a namespace");
        }
        Ok(Self {
            key: ResourceKey::new(name, Some(&namespace)),
            spec: acp.spec,
        })
    }

    /// Returns the hex SHA-256 of the policy's JSON-encoded spec.
    pub fn fingerprint(&self) -> Result<String> {
        spec_hash(&self.spec)
    }
}

// === impl PolicyEvent ===

impl PolicyEvent {
    pub fn key(&self) -> &ResourceKey {
        match self {
            Self::Upsert(policy) => &policy.key,
            Self::Delete(key) => key,
        }
    }
}
