//! Maintains the `Ingress` through which an edge ingress receives traffic.

use crate::{handler::KubeHandler, FIELD_MANAGER};
use anyhow::{anyhow, Context, Result};
use hub_agent_core::{sync::ResourceHandler, MANAGED_BY, MANAGED_BY_LABEL};
use hub_agent_k8s_api::{
    hub::{ConnectionStatus, EdgeIngress},
    Api, Client, HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ObjectMeta, Patch, PatchParams, Resource,
    ResourceExt, ServiceBackendPort,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const ROUTER_TLS_ANNOTATION: &str = "traefik.ingress.kubernetes.io/router.tls";
pub const ROUTER_ENTRY_POINTS_ANNOTATION: &str = "traefik.ingress.kubernetes.io/router.entrypoints";
pub const ACP_ANNOTATION: &str = "hub.traefik.io/access-control-policy";

/// Settings applied to every child `Ingress`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngressConfig {
    pub ingress_class_name: String,
    pub entry_point: String,
}

/// Synchronizes `EdgeIngress` objects and keeps each one's child `Ingress`
/// up to date.
///
/// The child is owned by its `EdgeIngress`, so the foreground deletion of the
/// parent removes it.
#[derive(Clone)]
pub struct EdgeIngressHandler {
    inner: KubeHandler<EdgeIngress>,
    config: IngressConfig,
}

// === impl EdgeIngressHandler ===

impl EdgeIngressHandler {
    pub fn new(client: Client, config: IngressConfig) -> Self {
        Self {
            inner: KubeHandler::new(client),
            config,
        }
    }

    async fn upsert_ingress(&self, edge: EdgeIngress) -> Result<()> {
        let name = edge.name_any();
        let res = self.apply_ingress(&edge).await;
        let connection = if res.is_ok() {
            ConnectionStatus::Up
        } else {
            ConnectionStatus::Down
        };

        let current = edge.status.as_ref().and_then(|s| s.connection);
        if current != Some(connection) {
            if let Err(error) = self.patch_connection(&edge, connection).await {
                warn!(%name, %error, "Failed to update connection status");
            }
        }

        res
    }

    async fn apply_ingress(&self, edge: &EdgeIngress) -> Result<()> {
        let ingress = build_ingress(edge, &self.config)?;
        let ns = ingress.namespace().unwrap_or_default();
        let name = ingress.name_any();
        Api::<Ingress>::namespaced(self.inner.client().clone(), &ns)
            .patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&ingress),
            )
            .await
            .with_context(|| format!("failed to apply ingress {name}"))?;
        debug!(%name, %ns, "Applied ingress");
        Ok(())
    }

    async fn patch_connection(&self, edge: &EdgeIngress, connection: ConnectionStatus) -> Result<()> {
        let ns = edge.namespace().unwrap_or_default();
        let patch = serde_json::json!({ "status": { "connection": connection } });
        Api::<EdgeIngress>::namespaced(self.inner.client().clone(), &ns)
            .patch_status(&edge.name_any(), &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResourceHandler for EdgeIngressHandler {
    type Resource = EdgeIngress;

    async fn list(&self) -> Result<Vec<EdgeIngress>> {
        self.inner.list_managed().await
    }

    async fn create(&self, new: EdgeIngress) -> Result<()> {
        let created = self.inner.create_object(new).await?;
        self.upsert_ingress(created).await
    }

    async fn update(&self, old: EdgeIngress, new: EdgeIngress) -> Result<()> {
        let updated = self.inner.update_object(old, new).await?;
        self.upsert_ingress(updated).await
    }

    async fn delete(&self, old: EdgeIngress) -> Result<()> {
        self.inner.delete_object(old).await
    }
}

/// Builds the `Ingress` routing an edge ingress' platform domain to its
/// service.
///
/// The edge ingress must have been stored in the cluster, since the child
/// references it by UID.
pub fn build_ingress(edge: &EdgeIngress, config: &IngressConfig) -> Result<Ingress> {
    let name = edge.name_any();
    let owner = edge
        .controller_owner_ref(&())
        .ok_or_else(|| anyhow!("edge ingress {name} has no uid"))?;
    let domain = edge
        .status
        .as_ref()
        .map(|s| s.domain.clone())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| anyhow!("edge ingress {name} has no domain"))?;

    let mut annotations = BTreeMap::new();
    annotations.insert(ROUTER_TLS_ANNOTATION.to_string(), "true".to_string());
    annotations.insert(
        ROUTER_ENTRY_POINTS_ANNOTATION.to_string(),
        config.entry_point.clone(),
    );
    if let Some(acp) = &edge.spec.acp {
        annotations.insert(ACP_ANNOTATION.to_string(), acp.name.clone());
    }

    let backend = IngressBackend {
        service: Some(IngressServiceBackend {
            name: edge.spec.service.name.clone(),
            port: Some(ServiceBackendPort {
                number: Some(edge.spec.service.port),
                name: None,
            }),
        }),
        resource: None,
    };
    let rule = IngressRule {
        host: Some(domain.clone()),
        http: Some(HTTPIngressRuleValue {
            paths: vec![HTTPIngressPath {
                path: Some("/".to_string()),
                path_type: "Prefix".to_string(),
                backend,
            }],
        }),
    };

    Ok(Ingress {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: edge.namespace(),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                MANAGED_BY.to_string(),
            )])),
            annotations: Some(annotations),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: Some(config.ingress_class_name.clone()),
            tls: Some(vec![IngressTLS {
                hosts: Some(vec![domain]),
                secret_name: None,
            }]),
            rules: Some(vec![rule]),
            default_backend: None,
        }),
        status: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_agent_k8s_api::hub::{EdgeIngressAcp, EdgeIngressService, EdgeIngressSpec, EdgeIngressStatus};

    fn config() -> IngressConfig {
        IngressConfig {
            ingress_class_name: "traefik-hub".to_string(),
            entry_point: "websecure".to_string(),
        }
    }

    fn stored_edge_ingress() -> EdgeIngress {
        let mut edge = EdgeIngress::new(
            "whoami",
            EdgeIngressSpec {
                service: EdgeIngressService {
                    name: "whoami-svc".to_string(),
                    port: 80,
                },
                acp: Some(EdgeIngressAcp {
                    name: "my-acp".to_string(),
                }),
                custom_domains: vec!["whoami.example.com".to_string()],
            },
        );
        edge.metadata.namespace = Some("default".to_string());
        edge.metadata.uid = Some("8b2b2c2a-uid".to_string());
        edge.status = Some(EdgeIngressStatus {
            domain: "whoami.hub.example".to_string(),
            custom_domains: vec!["whoami.example.com".to_string()],
            ..Default::default()
        });
        edge
    }

    #[test]
    fn builds_child_ingress() {
        let ingress = build_ingress(&stored_edge_ingress(), &config()).unwrap();

        assert_eq!(ingress.metadata.name.as_deref(), Some("whoami"));
        assert_eq!(ingress.metadata.namespace.as_deref(), Some("default"));

        let annotations = ingress.metadata.annotations.unwrap();
        assert_eq!(annotations[ROUTER_TLS_ANNOTATION], "true");
        assert_eq!(annotations[ROUTER_ENTRY_POINTS_ANNOTATION], "websecure");
        assert_eq!(annotations[ACP_ANNOTATION], "my-acp");

        let labels = ingress.metadata.labels.unwrap();
        assert_eq!(labels[MANAGED_BY_LABEL], MANAGED_BY);

        let owners = ingress.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "EdgeIngress");
        assert_eq!(owners[0].uid, "8b2b2c2a-uid");
        assert_eq!(owners[0].controller, Some(true));

        let spec = ingress.spec.unwrap();
        assert_eq!(spec.ingress_class_name.as_deref(), Some("traefik-hub"));
        let tls = spec.tls.unwrap();
        assert_eq!(tls[0].hosts.as_deref().unwrap(), ["whoami.hub.example"]);
        let rules = spec.rules.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].host.as_deref(), Some("whoami.hub.example"));
        let path = &rules[0].http.as_ref().unwrap().paths[0];
        let service = path.backend.service.as_ref().unwrap();
        assert_eq!(service.name, "whoami-svc");
        assert_eq!(service.port.as_ref().unwrap().number, Some(80));
    }

    #[test]
    fn requires_stored_object() {
        let mut edge = stored_edge_ingress();
        edge.metadata.uid = None;
        assert!(build_ingress(&edge, &config()).is_err());

        let mut edge = stored_edge_ingress();
        edge.status = None;
        assert!(build_ingress(&edge, &config()).is_err());
    }

    #[test]
    fn omits_acp_annotation_without_policy() {
        let mut edge = stored_edge_ingress();
        edge.spec.acp = None;
        let ingress = build_ingress(&edge, &config()).unwrap();
        assert!(!ingress
            .metadata
            .annotations
            .unwrap()
            .contains_key(ACP_ANNOTATION));
    }
}
