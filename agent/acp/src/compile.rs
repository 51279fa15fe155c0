//! Turns access control policies into authorization handlers.

mod basic;
mod jwt;

use crate::Policy;
use hub_agent_core::authz::SharedAuthorize;
use hub_agent_k8s_api::hub::AccessControlPolicyJwt;
use serde_json::{Map, Value};
use std::sync::Arc;

pub use self::{basic::BasicAuth, jwt::Jwt};

/// Compiles a policy into a handler.
pub trait Compile: Send + Sync + 'static {
    fn compile(&self, policy: &Policy) -> Result<SharedAuthorize, CompileError>;
}

/// Validates a bearer token against a JWT policy, returning its claims.
pub trait ValidateToken: Send + Sync + 'static {
    fn validate(&self, config: &AccessControlPolicyJwt, token: &str) -> anyhow::Result<Claims>;
}

pub type Claims = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("policy does not configure an authentication method")]
    NoMethod,

    #[error("policy configures more than one authentication method")]
    MultipleMethods,

    #[error("basic auth requires at least one user")]
    NoUsers,

    #[error("basic auth user {0} is not of the form user:password")]
    InvalidUser(usize),

    #[error("invalid realm: {0:?}")]
    InvalidRealm(String),

    #[error("invalid header name: {0:?}")]
    InvalidHeaderName(String),
}

/// Compiles JWT and basic auth policies.
#[derive(Clone)]
pub struct Compiler {
    tokens: Arc<dyn ValidateToken>,
}

/// Rejects every token.
#[derive(Copy, Clone, Debug, Default)]
pub struct RejectTokens;

// === impl Compiler ===

impl Compiler {
    pub fn new(tokens: Arc<dyn ValidateToken>) -> Self {
        Self { tokens }
    }
}

impl Compile for Compiler {
    fn compile(&self, policy: &Policy) -> Result<SharedAuthorize, CompileError> {
        match (&policy.spec.jwt, &policy.spec.basic_auth) {
            (Some(jwt), None) => Ok(Arc::new(Jwt::new(jwt.clone(), self.tokens.clone())?)),
            (None, Some(basic)) => Ok(Arc::new(BasicAuth::new(basic)?)),
            (None, None) => Err(CompileError::NoMethod),
            (Some(_), Some(_)) => Err(CompileError::MultipleMethods),
        }
    }
}

// === impl RejectTokens ===

impl ValidateToken for RejectTokens {
    fn validate(&self, _: &AccessControlPolicyJwt, _: &str) -> anyhow::Result<Claims> {
        tracing::warn!("No token validator is configured; rejecting token");
        anyhow::bail!("token validation is not configured")
    }
}

fn header_name(name: &str) -> Result<http::HeaderName, CompileError> {
    http::HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| CompileError::InvalidHeaderName(name.to_string()))
}
