use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::{FailureKind, ProviderError};

const LOG_BODY_MAX: usize = 2000;

pub(crate) fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::new(FailureKind::Network, format!("building http client: {e}")))
}

fn classify(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_decode() {
        FailureKind::Parse
    } else {
        FailureKind::Network
    }
}

/// Send `req` and decode a JSON body, bounding the whole exchange by `timeout`.
///
/// Non-2xx responses come back as `HttpStatus` with the (truncated) body; they are
/// never retried here.
pub(crate) async fn get_json(
    req: RequestBuilder,
    timeout: Duration,
    what: &str,
) -> Result<Value, ProviderError> {
    let exchange = async {
        let resp = req
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::new(classify(&e), format!("{what}: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::new(classify(&e), format!("{what}: reading body: {e}")))?;
        if !status.is_success() {
            let body = truncate_for_log(body, LOG_BODY_MAX);
            warn!(provider_call = what, status = status.as_u16(), body = %body, "provider returned non-success status");
            return Err(ProviderError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("{what}: status={status} body={body}"),
            ));
        }
        debug!(provider_call = what, bytes = body.len(), "provider response received");
        serde_json::from_str::<Value>(&body)
            .map_err(|e| ProviderError::parse(format!("{what}: invalid json: {e}")))
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(res) => res,
        Err(_) => Err(ProviderError::new(
            FailureKind::Timeout,
            format!("{what}: no response within {}ms", timeout.as_millis()),
        )),
    }
}
