use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use tracing::debug;

/// Reads desired state from the platform API.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("platform responded {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

// === impl Client ===

impl Client {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub async fn edge_ingresses(&self) -> Result<Vec<crate::EdgeIngress>, Error> {
        self.get("edge-ingresses").await
    }

    pub async fn catalogs(&self) -> Result<Vec<crate::Catalog>, Error> {
        self.get("catalogs").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, "Fetching");
        let rsp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = rsp.status();
        if status != StatusCode::OK {
            let body = rsp.text().await.unwrap_or_default();
            return Err(Error::from_body(status, &body));
        }

        Ok(rsp.json().await?)
    }
}

// === impl Error ===

impl Error {
    fn from_body(status: StatusCode, body: &str) -> Self {
        let message = match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(ApiErrorBody { message }) => message,
            Err(_) => body.trim().to_string(),
        };
        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}
