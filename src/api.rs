use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Error;

/// Transport seam for the REST backend. Services depend on this trait so the
/// transport can be swapped for a test double.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn get_raw(&self, path: &str) -> Result<Value, Error>;
    async fn post_raw(&self, path: &str, body: Value) -> Result<Value, Error>;
    async fn delete(&self, path: &str) -> Result<(), Error>;
}

/// Typed GET over a gateway.
pub async fn get<T: DeserializeOwned>(gateway: &dyn Gateway, path: &str) -> Result<T, Error> {
    let value = gateway.get_raw(path).await?;
    Ok(serde_json::from_value(value)?)
}

/// Typed POST over a gateway.
pub async fn post<T: DeserializeOwned, B: Serialize>(
    gateway: &dyn Gateway,
    path: &str,
    body: &B,
) -> Result<T, Error> {
    let value = gateway.post_raw(path, serde_json::to_value(body)?).await?;
    Ok(serde_json::from_value(value)?)
}

/// Reqwest-backed gateway. Owns transport details only: JSON content type,
/// HTTP error mapping, and the single configured retry on network failures.
/// Retry never applies to non-2xx responses; those carry server intent.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    retry_attempts: u32,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, retry_attempts: u32) -> Result<Self, Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            retry_attempts,
        })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.retry_attempts {
            if attempt > 0 {
                warn!(%url, attempt, "retrying after network failure");
            }
            let mut req = self
                .client
                .request(method.clone(), &url)
                .header(CONTENT_TYPE, "application/json");
            if let Some(body) = body {
                req = req.json(body);
            }

            match req.send().await {
                Ok(res) => {
                    let status = res.status();
                    if !status.is_success() {
                        let message = res.text().await.unwrap_or_default();
                        return Err(Error::api(status.as_u16(), message));
                    }
                    let text = res.text().await.map_err(Error::from)?;
                    debug!(%url, %status, "request ok");
                    // DELETE and 204 responses have no body.
                    if text.trim().is_empty() {
                        return Ok(Value::Null);
                    }
                    return serde_json::from_str(&text).map_err(Error::from);
                }
                Err(e) => {
                    let err = Error::from(e);
                    if !err.is_retriable() {
                        return Err(err);
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Network("request failed".into())))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn get_raw(&self, path: &str) -> Result<Value, Error> {
        self.request(Method::GET, path, None).await
    }

    async fn post_raw(&self, path: &str, body: Value) -> Result<Value, Error> {
        self.request(Method::POST, path, Some(&body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        self.request(Method::DELETE, path, None).await?;
        Ok(())
    }
}
