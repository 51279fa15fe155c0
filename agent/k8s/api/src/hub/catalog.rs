use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Groups services exposed through a unified API portal.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hub.traefik.io",
    version = "v1alpha1",
    kind = "Catalog",
    status = "CatalogStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_domains: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<CatalogService>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogService {
    pub name: String,
    pub namespace: String,
    pub port: i32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path_prefix: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub open_api_spec_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spec_hash: String,
}
