use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Protects ingress traffic with an authentication method.
///
/// Exactly one method should be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hub.traefik.io",
    version = "v1alpha1",
    kind = "AccessControlPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt: Option<AccessControlPolicyJwt>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<AccessControlPolicyBasicAuth>,
}

/// Authenticates requests bearing a JSON Web Token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlPolicyJwt {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signing_secret: String,

    #[serde(default)]
    pub signing_secret_base64_encoded: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub public_key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jwks_file: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jwks_url: String,

    #[serde(default)]
    pub strip_authorization_header: bool,

    /// Maps a forwarded header name to the claim whose value it carries.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub forward_headers: BTreeMap<String, String>,

    /// Names the query parameter from which a token is read when the
    /// request has no `Authorization` header.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_query_key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub claims: String,
}

/// Authenticates requests with HTTP basic credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlPolicyBasicAuth {
    /// Entries of the form `user:password` or `user:{SHA256}<hex digest>`.
    #[serde(default)]
    pub users: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub realm: String,

    #[serde(default)]
    pub strip_authorization_header: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub forward_username_header: String,
}
