use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Cap on response bodies kept in memory. Enrichment only needs the head of
/// a page to extract title/meta tags.
pub const MAX_BODY_BYTES: usize = 512 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    Head,
    Get,
}

/// A transport-level response before any redirect handling. `location` is
/// the raw `Location` header when the status is a redirect.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub location: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Seam between the pipeline and the network. The production implementation
/// wraps reqwest with redirects disabled; tests script responses and record
/// every outbound call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, method: FetchMethod, url: &str) -> Result<RawResponse>;
    async fn post_json(&self, url: &str, body: &Value) -> Result<RawResponse>;
}

pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// The client must be built with `redirect::Policy::none()`; redirect
    /// hops are re-validated one by one in the URL safety guard.
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn to_raw(mut resp: reqwest::Response) -> Result<RawResponse> {
        let status = resp.status().as_u16();
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Stream the body chunk by chunk and stop at the cap; a hostile host
        // must not be able to buffer an arbitrarily large response here.
        // Body read errors yield whatever was received so far.
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match resp.chunk().await {
                Ok(Some(chunk)) => {
                    let room = MAX_BODY_BYTES - buf.len();
                    if chunk.len() >= room {
                        buf.extend_from_slice(&chunk[..room]);
                        break;
                    }
                    buf.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(_) => break,
            }
        }
        let body = String::from_utf8_lossy(&buf).into_owned();

        Ok(RawResponse {
            status,
            location,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, method: FetchMethod, url: &str) -> Result<RawResponse> {
        let req = match method {
            FetchMethod::Head => self.http.head(url),
            FetchMethod::Get => self.http.get(url),
        };
        let resp = req.send().await.context("request failed")?;
        Self::to_raw(resp).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<RawResponse> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .context("request failed")?;
        Self::to_raw(resp).await
    }
}
