use crate::Client;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use hub_agent_core::sync::{PlatformResource, ResourceLister};
use hub_agent_k8s_api::{hub as k8s, spec_hash};
use serde::Deserialize;

/// An edge ingress as declared on the platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeIngress {
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default)]
    pub cluster_id: String,

    pub name: String,
    pub namespace: String,

    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub custom_domains: Vec<String>,
    #[serde(default)]
    pub version: String,

    pub service: EdgeIngressService,
    #[serde(default)]
    pub acp: Option<EdgeIngressAcp>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct EdgeIngressService {
    pub name: String,
    pub port: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct EdgeIngressAcp {
    pub name: String,
}

/// Lists edge ingresses from the platform.
#[derive(Clone, Debug)]
pub struct EdgeIngresses(Client);

// === impl EdgeIngress ===

impl PlatformResource for EdgeIngress {
    type Resource = k8s::EdgeIngress;

    fn resource(&self) -> Result<k8s::EdgeIngress> {
        if self.name.is_empty() || self.namespace.is_empty() {
            bail!("edge ingress must have a name and a namespace");
        }
        if self.domain.is_empty() {
            bail!("edge ingress {}@{} has no domain", self.name, self.namespace);
        }

        let spec = k8s::EdgeIngressSpec {
            service: k8s::EdgeIngressService {
                name: self.service.name.clone(),
                port: self.service.port,
            },
            acp: self.acp.as_ref().map(|acp| k8s::EdgeIngressAcp {
                name: acp.name.clone(),
            }),
            custom_domains: self.custom_domains.clone(),
        };
        let spec_hash = spec_hash(&spec)
            .with_context(|| format!("failed to hash edge ingress {}", self.name))?;

        let mut obj = k8s::EdgeIngress::new(&self.name, spec);
        obj.metadata.namespace = Some(self.namespace.clone());
        obj.metadata.labels = Some(crate::managed_labels());
        obj.status = Some(k8s::EdgeIngressStatus {
            version: self.version.clone(),
            synced_at: Some(Utc::now()),
            domain: self.domain.clone(),
            custom_domains: self.custom_domains.clone(),
            url: format!("https://{}", self.domain),
            spec_hash,
            connection: None,
        });
        Ok(obj)
    }
}

// === impl EdgeIngresses ===

impl EdgeIngresses {
    pub fn new(client: Client) -> Self {
        Self(client)
    }
}

#[async_trait::async_trait]
impl ResourceLister for EdgeIngresses {
    type Item = EdgeIngress;

    async fn list(&self) -> Result<Vec<EdgeIngress>> {
        Ok(self.0.edge_ingresses().await?)
    }
}
