use http::{request::Parts, HeaderMap};
use std::sync::Arc;

/// A compiled authorization handler.
///
/// Handlers are opaque to the routing core: they only see the request head
/// and return a decision.
#[async_trait::async_trait]
pub trait Authorize: Send + Sync + 'static {
    async fn authorize(&self, req: &Parts) -> Decision;
}

pub type SharedAuthorize = Arc<dyn Authorize>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed, with the given headers forwarded upstream.
    Allow(HeaderMap),

    /// The request is refused. The headers are returned to the client, e.g. to
    /// carry an authentication challenge.
    Deny(HeaderMap),
}

// === impl Decision ===

impl Decision {
    pub fn allow() -> Self {
        Self::Allow(HeaderMap::new())
    }

    pub fn deny() -> Self {
        Self::Deny(HeaderMap::new())
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}
