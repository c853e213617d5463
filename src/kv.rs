//! KV Store Abstraction
//!
//! The remote key-value service seen by the uploader: list namespaces, create a
//! namespace, write a value. [`CloudflareKvClient`] implements it against the
//! Cloudflare Workers KV v4 REST API.

use crate::config::{ApiSettings, Credentials};
use crate::error::KvError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Namespaces requested per listing call. Only the first page is read.
const LIST_PAGE_SIZE: u32 = 100;

/// A remote KV namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: String,
    pub title: String,
}

/// Remote key-value store operations
#[async_trait]
pub trait KvStore: Send + Sync {
    /// List the namespaces visible to the configured account
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, KvError>;

    /// Create a namespace with the given title
    async fn create_namespace(&self, title: &str) -> Result<Namespace, KvError>;

    /// Write `value` under `key` in the namespace `namespace_id`
    async fn write_value(&self, namespace_id: &str, key: &str, value: Vec<u8>)
        -> Result<(), KvError>;
}

/// Cloudflare response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Serialize)]
struct CreateNamespaceRequest<'a> {
    title: &'a str,
}

fn map_http_error(error: reqwest::Error) -> KvError {
    if error.is_timeout() {
        KvError::Transport(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        KvError::Transport(format!("Connection error: {}", error))
    } else {
        KvError::Transport(format!("HTTP error: {}", error))
    }
}

fn map_status(status: u16, body: String) -> KvError {
    match status {
        401 | 403 => KvError::AuthFailed(body),
        429 => KvError::RateLimited(body),
        _ => KvError::RequestFailed {
            status,
            message: body,
        },
    }
}

/// Parse a Cloudflare envelope, turning `success: false` into [`KvError::Api`].
fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<Option<T>, KvError> {
    let envelope: Envelope<T> = serde_json::from_str(body)
        .map_err(|e| KvError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    if !envelope.success {
        return Err(match envelope.errors.into_iter().next() {
            Some(first) => KvError::Api {
                code: first.code,
                message: first.message,
            },
            None => KvError::Api {
                code: 0,
                message: "request was not successful".to_string(),
            },
        });
    }

    Ok(envelope.result)
}

/// Workers KV client authenticated with an API key and account e-mail
pub struct CloudflareKvClient {
    client: Client,
    base_url: String,
    account_id: String,
    api_key: String,
    api_email: String,
}

impl CloudflareKvClient {
    pub fn new(credentials: &Credentials, api: &ApiSettings) -> Result<Self, KvError> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(api.connect_timeout_secs))
            .timeout(Duration::from_secs(api.request_timeout_secs));
        if !api.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| KvError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            account_id: credentials.account_id.clone(),
            api_key: credentials.api_key.clone(),
            api_email: credentials.api_email.clone(),
        })
    }

    fn namespaces_url(&self) -> String {
        format!(
            "{}/accounts/{}/storage/kv/namespaces",
            self.base_url,
            urlencoding::encode(&self.account_id)
        )
    }

    fn value_url(&self, namespace_id: &str, key: &str) -> String {
        format!(
            "{}/{}/values/{}",
            self.namespaces_url(),
            urlencoding::encode(namespace_id),
            urlencoding::encode(key)
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("X-Auth-Key", &self.api_key)
            .header("X-Auth-Email", &self.api_email)
    }

    async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<Option<T>, KvError> {
        let status = response.status();
        let body = response.text().await.map_err(map_http_error)?;

        if !status.is_success() {
            // Cloudflare puts the useful message inside the envelope when it can.
            return Err(match parse_envelope::<serde_json::Value>(&body) {
                Err(KvError::Api { message, .. }) => map_status(status.as_u16(), message),
                _ => map_status(status.as_u16(), body),
            });
        }

        parse_envelope(&body)
    }
}

#[async_trait]
impl KvStore for CloudflareKvClient {
    #[instrument(skip(self))]
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, KvError> {
        let response = self
            .authorized(self.client.get(self.namespaces_url()))
            .query(&[("per_page", LIST_PAGE_SIZE)])
            .send()
            .await
            .map_err(map_http_error)?;

        let namespaces: Vec<Namespace> = Self::read_envelope(response).await?.unwrap_or_default();
        debug!(count = namespaces.len(), "Listed namespaces");
        Ok(namespaces)
    }

    #[instrument(skip(self))]
    async fn create_namespace(&self, title: &str) -> Result<Namespace, KvError> {
        let response = self
            .authorized(self.client.post(self.namespaces_url()))
            .json(&CreateNamespaceRequest { title })
            .send()
            .await
            .map_err(map_http_error)?;

        Self::read_envelope(response)
            .await?
            .ok_or_else(|| KvError::InvalidResponse("No namespace in response".to_string()))
    }

    #[instrument(skip(self, value), fields(size = value.len()))]
    async fn write_value(
        &self,
        namespace_id: &str,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), KvError> {
        let response = self
            .authorized(self.client.put(self.value_url(namespace_id, key)))
            .header("Content-Type", "application/octet-stream")
            .body(value)
            .send()
            .await
            .map_err(map_http_error)?;

        Self::read_envelope::<serde_json::Value>(response).await?;
        Ok(())
    }
}
