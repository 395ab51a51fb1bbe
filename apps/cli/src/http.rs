use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::HttpError;

const USER_AGENT: &str = concat!("kahani/", env!("CARGO_PKG_VERSION"));

/// Body excerpts kept in error messages.
const MAX_ERROR_BODY: usize = 512;

pub fn client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Sends the request and turns any non-2xx status into [`HttpError::Status`].
pub async fn send(service: &'static str, request: RequestBuilder) -> Result<Response, HttpError> {
    let response = request
        .send()
        .await
        .map_err(|source| HttpError::Transport { service, source })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(MAX_ERROR_BODY)
        .collect();
    Err(HttpError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}

pub async fn send_json<T: DeserializeOwned>(
    service: &'static str,
    request: RequestBuilder,
) -> Result<T, HttpError> {
    let text = text(service, request).await?;
    serde_json::from_str(&text).map_err(|e| HttpError::Decode {
        service,
        reason: e.to_string(),
    })
}

pub async fn text(service: &'static str, request: RequestBuilder) -> Result<String, HttpError> {
    send(service, request)
        .await?
        .text()
        .await
        .map_err(|source| HttpError::Transport { service, source })
}

pub async fn bytes(service: &'static str, request: RequestBuilder) -> Result<Vec<u8>, HttpError> {
    let body = send(service, request)
        .await?
        .bytes()
        .await
        .map_err(|source| HttpError::Transport { service, source })?;
    Ok(body.to_vec())
}
