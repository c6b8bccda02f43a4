//! Shared HTTP plumbing for the publish and notify stages.

pub mod retry;

pub use retry::{RetryPolicy, retry};

use crate::error::{ReleaseError, Result};
use reqwest::{Client, Response};
use std::time::Duration;
use url::Url;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Builds a client with a per-request timeout.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?)
}

/// Joins `path` onto `base`, tolerating a trailing slash on `base`.
///
/// `path` is always treated as relative, even when its first segment
/// contains a colon (Telegram's `bot<id>:<secret>` segment).
pub fn endpoint(base: &str, path: &str) -> Result<Url> {
    let base = format!("{}/", base.trim_end_matches('/'));
    Ok(Url::parse(&base)?.join(&format!("./{}", path.trim_start_matches('/')))?)
}

/// Passes 2xx responses through and turns anything else into
/// [`ReleaseError::Api`] carrying the response body.
pub async fn check_status(service: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ReleaseError::Api {
        service,
        status: status.as_u16(),
        body,
    })
}
