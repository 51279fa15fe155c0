#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use hub_agent_acp as acp;
pub use hub_agent_k8s_api as k8s;
pub use hub_agent_k8s_sync as sync;
pub use hub_agent_platform as platform;

mod args;
mod server;

pub use self::args::Args;
