//! HTTP pull client.

use std::time::Duration;

use async_trait::async_trait;
use caption_sync_core::{PullRequest, PullResponse};
use reqwest::{Client, Method};
use url::Url;

use crate::error::{Result, TransportError};
use crate::traits::PullClient;

/// Sends pull requests as a JSON body and decodes the JSON response.
#[derive(Debug, Clone)]
pub struct HttpPullClient {
    client: Client,
    url: Url,
    method: Method,
}

impl HttpPullClient {
    /// Create a client for `url` using `method` (e.g. `"POST"`).
    ///
    /// `timeout` bounds each request; `None` leaves requests unbounded.
    pub fn new(url: Url, method: &str, timeout: Option<Duration>) -> Result<Self> {
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| TransportError::InvalidMethod(method.to_string()))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            url,
            method,
        })
    }

    /// The endpoint this client talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The HTTP method used for every request.
    pub fn method(&self) -> &Method {
        &self.method
    }
}

#[async_trait]
impl PullClient for HttpPullClient {
    async fn fetch(&self, request: &PullRequest) -> Result<PullResponse> {
        let response = self
            .client
            .request(self.method.clone(), self.url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        tracing::trace!(bytes = body.len(), "pull response received");
        Ok(PullResponse::decode(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Url {
        Url::parse("http://127.0.0.1:57000/output").unwrap()
    }

    #[test]
    fn test_method_is_normalized() {
        let client = HttpPullClient::new(endpoint(), "post", None).unwrap();
        assert_eq!(*client.method(), Method::POST);
        let client = HttpPullClient::new(endpoint(), " GET ", None).unwrap();
        assert_eq!(*client.method(), Method::GET);
    }

    #[test]
    fn test_invalid_method_rejected() {
        assert!(matches!(
            HttpPullClient::new(endpoint(), "PO ST", None),
            Err(TransportError::InvalidMethod(_))
        ));
    }
}
