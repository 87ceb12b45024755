use crate::error::RelayError;
use crate::io_struct::{SseDeltaParser, UpstreamChatRequest, ValidatedChat};
use actix_web::HttpResponse;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;

const UPSTREAM_ERROR_FALLBACK: &str = "The model failed to generate a response.";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub upstream_url: String,
    pub api_key_env: String,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct RelayState {
    pub client: reqwest::Client,
    pub upstream_url: String,
    pub api_key_env: String,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    error: Option<UpstreamErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorDetail {
    message: Option<String>,
}

impl RelayState {
    pub fn new(config: &RelayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self {
            client,
            upstream_url: config.upstream_url.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
        })
    }

    /// The credential is read per request, not cached at startup, so it can
    /// be rotated without a restart.
    pub fn require_api_key(&self) -> Result<String, RelayError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(RelayError::MissingCredential(self.api_key_env.clone())),
        }
    }

    /// Open a streaming completion call upstream and re-emit each text delta
    /// to the caller as it arrives. A failure before any streaming starts
    /// maps to a structured 500; a mid-stream failure aborts the byte stream.
    pub async fn relay_chat(
        &self,
        api_key: &str,
        req: ValidatedChat,
    ) -> Result<HttpResponse, RelayError> {
        let url = format!("{}/chat/completions", self.upstream_url);
        let body = UpstreamChatRequest::from(req);
        let resp = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RelayError::Upstream(err.to_string()))?;

        if !resp.status().is_success() {
            return Err(RelayError::Upstream(upstream_error_message(resp).await));
        }

        let mut parser = SseDeltaParser::new();
        let stream = resp.bytes_stream().filter_map(move |chunk| {
            let item = match chunk {
                Ok(bytes) => {
                    let text = parser.push(&bytes).concat();
                    if text.is_empty() {
                        None
                    } else {
                        Some(Ok(Bytes::from(text)))
                    }
                }
                Err(err) => Some(Err(actix_web::error::ErrorBadGateway(err))),
            };
            futures::future::ready(item)
        });

        Ok(HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .insert_header(("Cache-Control", "no-cache"))
            .streaming(Box::pin(stream)))
    }
}

async fn upstream_error_message(resp: reqwest::Response) -> String {
    match resp.json::<UpstreamErrorBody>().await {
        Ok(UpstreamErrorBody {
            error:
                Some(UpstreamErrorDetail {
                    message: Some(message),
                }),
        }) if !message.is_empty() => message,
        _ => UPSTREAM_ERROR_FALLBACK.to_string(),
    }
}
