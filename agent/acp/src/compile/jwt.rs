use super::{header_name, Claims, CompileError, ValidateToken};
use http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue};
use hub_agent_core::authz::{Authorize, Decision};
use hub_agent_k8s_api::hub::AccessControlPolicyJwt;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Authorizes requests bearing a valid JSON Web Token.
pub struct Jwt {
    config: AccessControlPolicyJwt,
    forward_headers: Vec<(HeaderName, String)>,
    tokens: Arc<dyn ValidateToken>,
}

const FORWARDED_URI: &str = "x-forwarded-uri";

// === impl Jwt ===

impl Jwt {
    pub fn new(
        config: AccessControlPolicyJwt,
        tokens: Arc<dyn ValidateToken>,
    ) -> Result<Self, CompileError> {
        let forward_headers = config
            .forward_headers
            .iter()
            .map(|(header, claim)| Ok((header_name(header)?, claim.clone())))
            .collect::<Result<Vec<_>, CompileError>>()?;
        Ok(Self {
            config,
            forward_headers,
            tokens,
        })
    }

    /// Reads the token from the `Authorization` header or, when configured,
    /// from a query parameter of the forwarded URI.
    fn token(&self, req: &Parts) -> Option<String> {
        let bearer = req
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if let Some(token) = bearer {
            return Some(token.to_string());
        }

        let key = self.config.token_query_key.as_str();
        if key.is_empty() {
            return None;
        }
        let uri = req
            .headers
            .get(FORWARDED_URI)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<http::Uri>().ok())
            .unwrap_or_else(|| req.uri.clone());
        url::form_urlencoded::parse(uri.query()?.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .filter(|t| !t.is_empty())
    }

    fn forwarded(&self, claims: &Claims) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, claim) in &self.forward_headers {
            let value = match claims.get(claim) {
                Some(Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => continue,
            };
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.insert(name.clone(), value);
                }
                Err(_) => debug!(header = %name, %claim, "Claim is not a valid header value"),
            }
        }
        if self.config.strip_authorization_header {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static(""));
        }
        headers
    }
}

#[async_trait::async_trait]
impl Authorize for Jwt {
    async fn authorize(&self, req: &Parts) -> Decision {
        let Some(token) = self.token(req) else {
            debug!("Missing token");
            return Decision::deny();
        };

        match self.tokens.validate(&self.config, &token) {
            Ok(claims) => Decision::Allow(self.forwarded(&claims)),
            Err(error) => {
                debug!(%error, "Invalid token");
                Decision::deny()
            }
        }
    }
}
