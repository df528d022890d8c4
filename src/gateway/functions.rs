//! HTTPS client for the backend's serverless functions.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use super::FunctionResponse;
use crate::error::{Error, Result};

pub struct FunctionsClient {
    client: reqwest::Client,
    base_url: String,
    service_key: SecretString,
}

impl FunctionsClient {
    pub fn new(base_url: impl Into<String>, service_key: SecretString) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key,
        })
    }

    /// POST `body` to `<base_url>/<function>` and decode the envelope.
    ///
    /// Non-2xx responses become [`Error::Api`]. A 2xx with `success: false`
    /// is returned as-is; callers decide via [`FunctionResponse::into_result`].
    pub async fn invoke(
        &self,
        function: &str,
        body: &serde_json::Value,
    ) -> Result<FunctionResponse> {
        let url = format!("{}/{}", self.base_url, function);
        tracing::debug!(function, "invoking remote function");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.service_key.expose_secret())
            .header("apikey", self.service_key.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            // Some functions answer 200 with no body on success.
            return Ok(FunctionResponse::ok());
        }
        Ok(serde_json::from_str(&text)?)
    }
}
