// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;

use crate::config::FortiManagerSettings;
use crate::error::{FmError, FmResult};

/// Path every JSON-RPC request is posted to, relative to the base URL
pub const JSONRPC_PATH: &str = "jsonrpc";

/// Moves one JSON body to the remote and returns the decoded reply.
/// Implementations never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, path: &str, body: &Value) -> FmResult<Value>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, verify_tls: bool, use_proxy: bool) -> FmResult<Self> {
        let mut builder = Client::builder().danger_accept_invalid_certs(!verify_tls);
        if !use_proxy {
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| FmError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &FortiManagerSettings) -> FmResult<Self> {
        Self::new(&settings.url, !settings.insecure, settings.proxy)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn handle_response(&self, response: Response, url: &str) -> FmResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FmError::Transport(format!(
                "POST {url} failed with status {status}: {error_text}"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FmError::Transport(format!("Failed to parse JSON response from {url}: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, path: &str, body: &Value) -> FmResult<Value> {
        let url = self.endpoint(path);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| FmError::Transport(format!("Failed to send request to {url}: {e}")))?;

        self.handle_response(response, &url).await
    }
}
