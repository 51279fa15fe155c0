use super::{header_name, CompileError};
use ahash::AHashMap as HashMap;
use base64::{engine::general_purpose::STANDARD, Engine};
use http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue};
use hub_agent_core::authz::{Authorize, Decision};
use hub_agent_k8s_api::hub::AccessControlPolicyBasicAuth;
use sha2::{Digest, Sha256};
use tracing::debug;

const DEFAULT_REALM: &str = "hub";
const SHA256_PREFIX: &str = "{SHA256}";

/// Authorizes requests carrying HTTP basic credentials of a known user.
#[derive(Debug)]
pub struct BasicAuth {
    users: HashMap<String, Password>,
    challenge: HeaderValue,
    strip_authorization: bool,
    forward_username: Option<HeaderName>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Password {
    Plain(String),
    /// Lowercase hex SHA-256 digest.
    Sha256(String),
}

// === impl BasicAuth ===

impl BasicAuth {
    pub fn new(config: &AccessControlPolicyBasicAuth) -> Result<Self, CompileError> {
        if config.users.is_empty() {
            return Err(CompileError::NoUsers);
        }

        let users = config
            .users
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let (user, password) = entry
                    .split_once(':')
                    .filter(|(user, _)| !user.is_empty())
                    .ok_or(CompileError::InvalidUser(i))?;
                let password = match password.strip_prefix(SHA256_PREFIX) {
                    Some(digest) => Password::Sha256(digest.to_ascii_lowercase()),
                    None => Password::Plain(password.to_string()),
                };
                Ok((user.to_string(), password))
            })
            .collect::<Result<HashMap<_, _>, CompileError>>()?;

        let realm = if config.realm.is_empty() {
            DEFAULT_REALM
        } else {
            config.realm.as_str()
        };
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
            .map_err(|_| CompileError::InvalidRealm(realm.to_string()))?;

        let forward_username = if config.forward_username_header.is_empty() {
            None
        } else {
            Some(header_name(&config.forward_username_header)?)
        };

        Ok(Self {
            users,
            challenge,
            strip_authorization: config.strip_authorization_header,
            forward_username,
        })
    }

    fn authenticate(&self, req: &Parts) -> Option<String> {
        let encoded = req
            .headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Basic ")?;
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let credentials = String::from_utf8(decoded).ok()?;
        let (user, password) = credentials.split_once(':')?;

        let matches = match self.users.get(user)? {
            Password::Plain(expected) => expected == password,
            Password::Sha256(expected) => *expected == hex::encode(Sha256::digest(password)),
        };
        matches.then(|| user.to_string())
    }
}

#[async_trait::async_trait]
impl Authorize for BasicAuth {
    async fn authorize(&self, req: &Parts) -> Decision {
        let Some(user) = self.authenticate(req) else {
            debug!("Invalid credentials");
            let mut headers = HeaderMap::new();
            headers.insert(header::WWW_AUTHENTICATE, self.challenge.clone());
            return Decision::Deny(headers);
        };

        let mut headers = HeaderMap::new();
        if let Some(name) = &self.forward_username {
            if let Ok(value) = HeaderValue::from_str(&user) {
                headers.insert(name.clone(), value);
            }
        }
        if self.strip_authorization {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static(""));
        }
        Decision::Allow(headers)
    }
}
