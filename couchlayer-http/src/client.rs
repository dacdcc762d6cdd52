//! HTTP client for CouchDB-compatible document databases.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, trace};

use couchlayer_core::{
    client::{ClientBuilder, DocumentClient, Method, Request, WriteResult},
    config::StoreConfig,
    error::{StoreError, StoreResult},
    record::ID_FIELD,
};

/// Error body returned by the database on non-success responses.
#[derive(Debug, Deserialize)]
struct CouchErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Document database client speaking the CouchDB HTTP/JSON API.
#[derive(Debug, Clone)]
pub struct CouchHttpClient {
    client: reqwest::Client,
    base: Url,
}

impl CouchHttpClient {
    pub fn new(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Starts building a client for the endpoint named in `config`.
    pub fn builder(config: &StoreConfig) -> CouchHttpClientBuilder {
        CouchHttpClientBuilder::new(config.url())
    }

    /// Returns the server URL this client is configured for.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Builds `{base}/{collection}/{segments...}`, escaping each segment.
    fn url<'s>(&self, collection: &str, segments: impl IntoIterator<Item = &'s str>) -> StoreResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Initialization(format!("Cannot use {} as a base URL", self.base)))?
            .pop_if_empty()
            .push(collection)
            .extend(segments.into_iter().filter(|segment| !segment.is_empty()));

        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        id: &str,
        collection: &str,
    ) -> StoreResult<Value> {
        debug!(%method, %url, "request");

        let builder = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Delete => self.client.delete(url),
        };
        let builder = match body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        self.handle_response(response, id, collection).await
    }

    /// Decodes a successful body or maps the status to a store error.
    async fn handle_response(
        &self,
        response: reqwest::Response,
        id: &str,
        collection: &str,
    ) -> StoreResult<Value> {
        let status = response.status();
        trace!(status = %status, "response");

        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| StoreError::Serialization(e.to_string()));
        }

        let body = response
            .json::<CouchErrorResponse>()
            .await
            .unwrap_or(CouchErrorResponse { error: None, reason: None });

        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound(id.to_string(), collection.to_string()),
            StatusCode::CONFLICT => StoreError::Conflict(id.to_string(), collection.to_string()),
            _ => StoreError::Server {
                status: status.as_u16(),
                error: body.error.unwrap_or_else(|| status.to_string()),
                reason: body.reason.unwrap_or_default(),
            },
        })
    }
}

#[async_trait]
impl DocumentClient for CouchHttpClient {
    #[instrument(skip(self))]
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Value> {
        if id.is_empty() {
            return Err(StoreError::InvalidDocument("Document id must not be empty".to_string()));
        }
        let url = self.url(collection, [id])?;

        self.send(Method::Get, url, None, id, collection).await
    }

    #[instrument(skip(self, document))]
    async fn insert(&self, collection: &str, document: Value) -> StoreResult<WriteResult> {
        let id = document
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let url = self.url(collection, std::iter::empty())?;

        let response = self
            .send(Method::Post, url, Some(&document), &id, collection)
            .await?;

        Ok(serde_json::from_value(response)?)
    }

    #[instrument(skip(self, request), fields(collection = %request.collection, path = %request.path))]
    async fn request(&self, request: Request) -> StoreResult<Value> {
        let url = self.url(&request.collection, request.path.split('/'))?;

        self.send(request.method, url, request.body.as_ref(), "", &request.collection)
            .await
    }
}

/// Builder for [`CouchHttpClient`].
///
/// `build` verifies the server answers before handing out a client; an
/// unreachable or misbehaving endpoint is reported as
/// [`StoreError::Initialization`].
#[derive(Debug, Clone)]
pub struct CouchHttpClientBuilder {
    url: String,
    timeout: Option<Duration>,
    verify: bool,
}

impl CouchHttpClientBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
            verify: true,
        }
    }

    /// Sets a per-request timeout. None by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Skips the startup reachability check.
    pub fn skip_verify(mut self) -> Self {
        self.verify = false;
        self
    }
}

#[async_trait]
impl ClientBuilder for CouchHttpClientBuilder {
    type Client = CouchHttpClient;

    async fn build(self) -> StoreResult<Self::Client> {
        let base = Url::parse(&self.url).map_err(|e| StoreError::Initialization(e.to_string()))?;

        let mut builder = reqwest::Client::builder().user_agent(concat!("couchlayer/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Initialization(e.to_string()))?;

        if self.verify {
            let response = client
                .get(base.clone())
                .send()
                .await
                .map_err(|e| StoreError::Initialization(format!("{} is unreachable: {e}", base)))?;

            if !response.status().is_success() {
                return Err(StoreError::Initialization(format!(
                    "{} answered {}",
                    base,
                    response.status()
                )));
            }
            debug!(%base, "connected");
        }

        Ok(CouchHttpClient::new(client, base))
    }
}
