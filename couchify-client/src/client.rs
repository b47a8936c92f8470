//! Design document upload: insert, or update over the current revision.

use crate::remote::{Remote, RemoteError};
use couchify_types::{DesignDocument, DESIGN_PREFIX};
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not build request URL for {0}")]
    Url(String),

    #[error("could not read {id}: {error}. reason: {reason}")]
    CouldNotRead {
        id: String,
        error: String,
        reason: String,
    },

    #[error("could not insert data: {error}. reason: {reason}")]
    CouldNotInsert { error: String, reason: String },

    #[error("could not update {id}: {error}. reason: {reason}")]
    CouldNotUpdate {
        id: String,
        error: String,
        reason: String,
    },
}

/// CouchDB's answer to a successful write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub rev: String,
}

#[derive(Debug, Default, Deserialize)]
struct CouchErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct RevisionOnly {
    #[serde(rename = "_rev")]
    rev: Option<String>,
}

/// Minimal CouchDB client for design document delivery
#[derive(Debug, Clone)]
pub struct CouchClient {
    http: reqwest::Client,
    remote: Remote,
    credentials: Option<(String, String)>,
}

impl CouchClient {
    pub fn new(remote: Remote) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let credentials = remote.credentials.clone();
        Ok(Self {
            http,
            remote,
            credentials,
        })
    }

    /// Authenticate with basic auth, overriding credentials from the remote
    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), pass.into()));
        self
    }

    /// Current revision of `id` in `db`, `None` if the document does not exist
    pub async fn current_rev(&self, db: &str, id: &str) -> Result<Option<String>, ClientError> {
        let response = self
            .request(Method::GET, self.doc_url(db, id)?)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(response.json::<RevisionOnly>().await?.rev),
            _ => {
                let body = error_body(response).await;
                Err(ClientError::CouldNotRead {
                    id: id.to_string(),
                    error: body.error,
                    reason: body.reason,
                })
            }
        }
    }

    /// Upsert `doc` into `db`
    ///
    /// An existing document is overwritten using its current revision; a
    /// missing one is inserted.
    pub async fn deploy(&self, db: &str, doc: &DesignDocument) -> Result<DeployResponse, ClientError> {
        let rev = self.current_rev(db, &doc.id).await?;
        match &rev {
            Some(rev) => tracing::info!("Updating {} in {} at rev {}", doc.id, db, rev),
            None => tracing::info!("Inserting {} into {}", doc.id, db),
        }

        let mut body = doc.clone();
        body.rev = rev.clone();

        let response = self
            .request(Method::PUT, self.doc_url(db, &doc.id)?)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.json::<DeployResponse>().await?);
        }

        let status = response.status();
        let err = error_body(response).await;
        tracing::debug!("Write of {} rejected with {}", doc.id, status);
        Err(match rev {
            Some(_) => ClientError::CouldNotUpdate {
                id: doc.id.clone(),
                error: err.error,
                reason: err.reason,
            },
            None => ClientError::CouldNotInsert {
                error: err.error,
                reason: err.reason,
            },
        })
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.credentials {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    fn doc_url(&self, db: &str, id: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.remote.base_url())
            .map_err(|_| ClientError::Url(self.remote.base_url()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::Url(self.remote.base_url()))?;
            segments.pop_if_empty().push(db);
            match id.strip_prefix(DESIGN_PREFIX) {
                Some(name) => segments.push("_design").push(name),
                None => segments.push(id),
            };
        }
        Ok(url)
    }
}

async fn error_body(response: reqwest::Response) -> CouchErrorBody {
    let status = response.status();
    let mut body = response.json::<CouchErrorBody>().await.unwrap_or_default();
    if body.error.is_empty() {
        body.error = status.to_string();
    }
    body
}
