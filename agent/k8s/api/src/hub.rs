pub mod access_control_policy;
pub mod catalog;
pub mod edge_ingress;

pub use self::{
    access_control_policy::{
        AccessControlPolicy, AccessControlPolicyBasicAuth, AccessControlPolicyJwt,
        AccessControlPolicySpec,
    },
    catalog::{Catalog, CatalogService, CatalogSpec, CatalogStatus},
    edge_ingress::{
        ConnectionStatus, EdgeIngress, EdgeIngressAcp, EdgeIngressService, EdgeIngressSpec,
        EdgeIngressStatus,
    },
};
