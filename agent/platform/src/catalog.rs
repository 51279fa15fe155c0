use crate::Client;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use hub_agent_core::sync::{PlatformResource, ResourceLister};
use hub_agent_k8s_api::{hub as k8s, spec_hash};
use serde::Deserialize;

/// A catalog of services as declared on the platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default)]
    pub cluster_id: String,

    pub name: String,
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub custom_domains: Vec<String>,
    #[serde(default)]
    pub services: Vec<k8s::CatalogService>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Lists catalogs from the platform.
#[derive(Clone, Debug)]
pub struct Catalogs(Client);

// === impl Catalog ===

impl Catalog {
    /// Returns the domains a catalog is served on, with their URLs.
    ///
    /// Custom domains replace the platform-generated domain.
    fn domains(&self) -> (Vec<String>, Vec<String>) {
        let domains = if self.custom_domains.is_empty() {
            vec![self.domain.clone()]
        } else {
            self.custom_domains.clone()
        };
        let urls = domains.iter().map(|d| format!("https://{d}")).collect();
        (domains, urls)
    }
}

impl PlatformResource for Catalog {
    type Resource = k8s::Catalog;

    fn resource(&self) -> Result<k8s::Catalog> {
        if self.name.is_empty() {
            bail!("catalog must have a name");
        }

        let spec = k8s::CatalogSpec {
            custom_domains: self.custom_domains.clone(),
            services: self.services.clone(),
        };
        let spec_hash =
            spec_hash(&spec).with_context(|| format!("failed to hash catalog {}", self.name))?;
        let (domains, urls) = self.domains();

        let mut obj = k8s::Catalog::new(&self.name, spec);
        obj.metadata.labels = Some(crate::managed_labels());
        obj.status = Some(k8s::CatalogStatus {
            version: self.version.clone(),
            synced_at: Some(Utc::now()),
            domains,
            urls,
            spec_hash,
        });
        Ok(obj)
    }
}

// === impl Catalogs ===

impl Catalogs {
    pub fn new(client: Client) -> Self {
        Self(client)
    }
}

#[async_trait::async_trait]
impl ResourceLister for Catalogs {
    type Item = Catalog;

    async fn list(&self) -> Result<Vec<Catalog>> {
        Ok(self.0.catalogs().await?)
    }
}
