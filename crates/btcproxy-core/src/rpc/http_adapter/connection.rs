use std::time::Duration;

use reqwest::Url;

use crate::error::CoreError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) fn parse_connection(connection: &str) -> Result<String, CoreError> {
    let parsed = Url::parse(connection).map_err(|e| {
        CoreError::Config(format!(
            "invalid connection `{connection}`: expected HTTP(S) URL ({e})"
        ))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(connection.to_owned()),
        other => Err(CoreError::Config(format!(
            "unsupported connection scheme `{other}`; expected http or https"
        ))),
    }
}

/// Build the pooled HTTP client. `timeout` bounds a whole request, so it has
/// to cover the slowest RPC the caller expects to make.
pub(super) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, CoreError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .pool_max_idle_per_host(32)
        .tcp_nodelay(true)
        .build()
        .map_err(|e| CoreError::Config(format!("failed to build HTTP client: {e}")))
}
