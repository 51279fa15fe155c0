//! The platform's view of the resources the agent synchronizes.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod catalog;
mod client;
mod edge_ingress;

pub use self::{
    catalog::{Catalog, Catalogs},
    client::{Client, Error},
    edge_ingress::{EdgeIngress, EdgeIngressAcp, EdgeIngressService, EdgeIngresses},
};
use hub_agent_core::{MANAGED_BY, MANAGED_BY_LABEL};
use std::collections::BTreeMap;

fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string())])
}
